//! Collaborator contracts: instruction-set semantics and the constraint
//! solver (spec §6, listed as external collaborators with contracts only).
//!
//! Mirrors the shape of `InstructionSemantics`-style traits the way
//! `core/translate/monadic/mod.rs` hands a single opcode off to its
//! per-instruction handler: one method, one input context, one output.

use std::collections::BTreeMap;

use crate::constraint::{Constraint, Label};
use crate::event::{Event, EventStructure};
use crate::location::ThreadId;
use crate::value::{IdGen, VarId};

/// What a branching instruction decided, as reported by the semantics
/// module (spec §4.1, §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchVerdict {
    Next,
    Jump(Label),
    /// `value` is the guard passed to [`crate::monad::choice`]; see that
    /// function's doc comment for the boolean-guard convention.
    CondJump(crate::value::SymValue, Label),
}

/// The per-instruction context handed to the semantics module (spec §4.1):
/// program-order index, owning thread, the instruction itself, the
/// current visit count of this address's back-jump target (0 unless this
/// address is itself a loop head being re-entered), and the labels
/// attached to this address.
#[derive(Debug, Clone)]
pub struct InstrContext<'a, Instr> {
    pub po_index: u32,
    pub thread: ThreadId,
    pub instruction: &'a Instr,
    pub unroll_count: u32,
    pub labels: &'a [Label],
}

/// What building one instruction's semantics yields: the event-producing
/// trace fragment, the program-order index for the *next* instruction, and
/// the branch verdict that tells the driver where to go next.
pub struct InstrOutcome {
    pub fragment: crate::monad::Trace<()>,
    pub next_po_index: u32,
    pub verdict: BranchVerdict,
}

/// The instruction-set semantics collaborator (spec §6: "Instruction
/// semantics: `build_semantics(instr-context) → monadic fragment ⟶
/// (updated program-order-index, branch-verdict)`").
pub trait InstructionSemantics<Instr> {
    fn build(&self, ctx: &InstrContext<'_, Instr>, ids: &IdGen) -> InstrOutcome;

    /// The locations this instruction set wants an init-write for when
    /// `initwrites` is enabled, given the full program. Used once, up
    /// front, by the driver (spec §4.1: "Initial writes (one per observed
    /// location)").
    fn observed_locations(&self) -> Vec<i64> {
        Vec::new()
    }

    /// Whether a would-be atomic read-modify-write pair is one the
    /// instruction set actually recognizes as such (spec §4.5:
    /// "`atomic_load_store` ... provided the instruction set allows that
    /// pair"). Defaults to accepting every same-location atomic/atomic
    /// pair; instruction sets with combined CAS events should override
    /// this to exclude their own combined occurrences, which are already
    /// counted elsewhere.
    fn atomic_pair_allowed(&self, _load: &Event, _store: &Event) -> bool {
        true
    }
}

/// A resolved variable assignment, produced by a successful solve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    bindings: BTreeMap<VarId, i64>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, var: VarId, value: i64) {
        self.bindings.insert(var, value);
    }

    pub fn get(&self, var: VarId) -> Option<i64> {
        self.bindings.get(&var).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, i64)> + '_ {
        self.bindings.iter().map(|(k, v)| (*k, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Apply every binding to an event structure, folding left to right.
    /// Order does not matter: each binding only rewrites occurrences of
    /// its own variable.
    pub fn apply_to_structure(&self, structure: &EventStructure) -> EventStructure {
        let mut out = structure.clone();
        for (var, value) in self.iter() {
            out = out.substitute(var, value);
        }
        out
    }

    pub fn apply_to_event(&self, event: &Event) -> Event {
        let mut out = event.clone();
        for (var, value) in self.iter() {
            out = out.substitute(var, value);
        }
        out
    }
}

/// The outcome of handing a constraint set to the solver (spec §6:
/// `solve(constraints) → NoSolns | Maybe(substitution, residual-constraints)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    NoSolns,
    Solved {
        substitution: Substitution,
        residual: Vec<Constraint>,
    },
}

impl SolveOutcome {
    pub fn is_no_solns(&self) -> bool {
        matches!(self, SolveOutcome::NoSolns)
    }

    /// `when_unsolved` (spec §4.4, §9): true iff every residual constraint
    /// is an `Unroll` sentinel, meaning the abstract structure was only
    /// left unsolvable because some trace hit the unroll bound, not
    /// because of a genuine contradiction.
    pub fn residual_is_all_unroll(residual: &[Constraint]) -> bool {
        !residual.is_empty() && residual.iter().all(Constraint::is_unroll)
    }
}

/// The constraint solver collaborator (spec §6).
pub trait ConstraintSolver {
    fn solve(&self, constraints: &[Constraint]) -> SolveOutcome;
}
