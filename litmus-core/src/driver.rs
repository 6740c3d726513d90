//! The instruction driver (spec §4.1): walks each thread's code from its
//! start label, invoking the semantics module per instruction and folding
//! the resulting fragments into one [`Trace`].
//!
//! Grounded in the walk-and-fold shape of `core/translate/mod.rs`'s
//! statement-by-statement emission loop, generalized from "one emitted
//! program" to "every nondeterministic candidate trace", which is exactly
//! what [`Trace`] is for.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::warn;

use crate::config::Config;
use crate::constraint::{Constraint, InitialState, Label};
use crate::error::{LitmusError, Result};
use crate::event::{Annotations, Event, EventKind, EventStructure};
use crate::location::{Location, ThreadId};
use crate::monad::{self, Trace};
use crate::semantics::{BranchVerdict, InstrContext, InstructionSemantics};
use crate::value::{IdGen, SymValue};

/// A byte/word offset within a thread's code, used only to tell forward
/// jumps from back-jumps (spec glossary: "a jump whose target address is
/// not strictly greater than the jumping instruction's address").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub u32);

/// An ordered sequence of `(address, instruction)` pairs reachable under a
/// label.
#[derive(Debug, Clone)]
pub struct CodeBlock<Instr> {
    pub instructions: Vec<(Address, Instr)>,
}

impl<Instr> CodeBlock<Instr> {
    pub fn new(instructions: Vec<(Address, Instr)>) -> Self {
        Self { instructions }
    }
}

/// The parsed program: a mapping from labels to code blocks (spec §4.1).
/// Backed by an `IndexMap` so block iteration, where it happens, is in
/// declaration order.
#[derive(Debug, Clone, Default)]
pub struct Program<Instr> {
    blocks: IndexMap<Label, CodeBlock<Instr>>,
}

impl<Instr> Program<Instr> {
    pub fn new() -> Self {
        Self {
            blocks: IndexMap::new(),
        }
    }

    pub fn insert_block(&mut self, label: Label, block: CodeBlock<Instr>) {
        self.blocks.insert(label, block);
    }

    pub fn block(&self, label: &Label) -> Option<&CodeBlock<Instr>> {
        self.blocks.get(label)
    }

    /// The address of the first instruction under `label`, used to decide
    /// whether a jump into it is a back-jump.
    pub fn entry_address(&self, label: &Label) -> Option<Address> {
        self.block(label).and_then(|b| b.instructions.first().map(|(a, _)| *a))
    }
}

/// One thread's entry point (spec §4.1: "list of (thread-id, entry code
/// block) start points").
#[derive(Debug, Clone)]
pub struct StartPoint {
    pub thread: ThreadId,
    pub entry: Label,
}

/// The result of running the instruction driver over every thread (spec
/// §6: `glommed_event_structures`).
#[derive(Debug, Clone)]
pub struct DriverResult {
    pub structures: Vec<(usize, Vec<Constraint>, EventStructure)>,
    pub too_far: bool,
}

/// Per-label back-jump visit counts, scoped to one trace path. Cloned
/// (never shared) when a `CondJump` forks the trace (spec §9: "when the
/// composer forks at a `CondJump`, each branch must observe an independent
/// copy").
type VisitMap = HashMap<Label, u32>;

/// Entry point: run every thread to completion (modulo the unroll bound)
/// and optionally compose in the init-writes, producing the full list of
/// abstract `(constraints, event-structure)` candidates plus the
/// aggregate `too_far` flag (spec §6).
pub fn glommed_event_structures<Instr: Clone, S: InstructionSemantics<Instr>>(
    program: &Program<Instr>,
    semantics: &S,
    starts: &[StartPoint],
    config: &Config,
    init_state: &InitialState,
) -> Result<DriverResult> {
    let ids = IdGen::new();
    let mut combined: Trace<()> = Trace::unit(());

    if config.initwrites {
        let iw = initwrites_trace(semantics, &ids, init_state);
        combined = combined.flat_map(move |_| iw.clone());
    }

    for start in starts {
        let thread_trace = run_thread(program, semantics, &ids, start, config)?;
        combined = combined.flat_map(move |_| thread_trace.clone());
    }

    let (outputs, too_far) = combined.into_outputs();
    let structures = outputs
        .into_iter()
        .enumerate()
        .map(|(i, (cs, es))| (i, cs, es))
        .collect();
    Ok(DriverResult { structures, too_far })
}

/// One init-write event per location the instruction set cares about,
/// composed together (spec §4.1: "Initial writes ... are composed in
/// parallel when the `initwrites` option is enabled"). Order among them is
/// irrelevant since they touch disjoint locations, so folding them with
/// `flat_map` is equivalent to genuine parallel composition here.
fn initwrites_trace<Instr, S: InstructionSemantics<Instr>>(
    semantics: &S,
    ids: &IdGen,
    init_state: &InitialState,
) -> Trace<()> {
    let mut trace = Trace::unit(());
    for address in semantics.observed_locations() {
        let event = Event {
            id: ids.fresh_event(),
            thread: ThreadId(u32::MAX),
            po_index: 0,
            kind: EventKind::InitWrite,
            location: Some(Location::Global(SymValue::Const(address))),
            read_value: None,
            written_value: Some(SymValue::Const(init_state.get(address))),
            annotations: Annotations::empty(),
        };
        let fragment = Trace::from_event((), event);
        trace = trace.flat_map(move |_| fragment.clone());
    }
    trace
}

/// Run one thread from `start.entry`, position 0, program-order index 0,
/// with an empty visit map.
fn run_thread<Instr: Clone, S: InstructionSemantics<Instr>>(
    program: &Program<Instr>,
    semantics: &S,
    ids: &IdGen,
    start: &StartPoint,
    config: &Config,
) -> Result<Trace<()>> {
    step(
        program,
        semantics,
        ids,
        start.thread,
        &start.entry,
        0,
        0,
        VisitMap::new(),
        config,
    )
}

/// Fold over the instruction at `(label, pos)`, then recurse into
/// whatever the branch verdict says comes next.
#[allow(clippy::too_many_arguments)]
fn step<Instr: Clone, S: InstructionSemantics<Instr>>(
    program: &Program<Instr>,
    semantics: &S,
    ids: &IdGen,
    thread: ThreadId,
    label: &Label,
    pos: usize,
    po_index: u32,
    visits: VisitMap,
    config: &Config,
) -> Result<Trace<()>> {
    let block = program
        .block(label)
        .ok_or_else(|| LitmusError::UndefinedLabel(label.0.clone()))?;
    let (address, instruction) = block
        .instructions
        .get(pos)
        .map(|(a, i)| (*a, i))
        .expect("position within a resolved block is always in range");

    let ctx = InstrContext {
        po_index,
        thread,
        instruction,
        unroll_count: visits.get(label).copied().unwrap_or(0),
        labels: std::slice::from_ref(label),
    };
    let outcome = semantics.build(&ctx, ids);
    let fragment = outcome.fragment;
    let next_po_index = outcome.next_po_index;

    match outcome.verdict {
        BranchVerdict::Next => {
            if pos + 1 < block.instructions.len() {
                let rest = step(
                    program,
                    semantics,
                    ids,
                    thread,
                    label,
                    pos + 1,
                    next_po_index,
                    visits,
                    config,
                )?;
                Ok(fragment.sequence(move |_| rest.clone()))
            } else {
                Ok(fragment)
            }
        }
        BranchVerdict::Jump(target) => {
            let rest = resolve_jump(
                program, semantics, ids, thread, address, &target, next_po_index, visits, config,
            )?;
            Ok(fragment.sequence(move |_| rest.clone()))
        }
        BranchVerdict::CondJump(guard, target) => {
            let taken = resolve_jump(
                program,
                semantics,
                ids,
                thread,
                address,
                &target,
                next_po_index,
                visits.clone(),
                config,
            )?;
            let not_taken = if pos + 1 < block.instructions.len() {
                step(
                    program,
                    semantics,
                    ids,
                    thread,
                    label,
                    pos + 1,
                    next_po_index,
                    visits,
                    config,
                )?
            } else {
                Trace::unit(())
            };
            Ok(fragment.sequence(move |_| {
                monad::choice(guard, taken.clone(), not_taken.clone())
            }))
        }
    }
}

/// Resolve a jump to `target`: detect whether it is a back-jump, bump the
/// visit counter if so, and either abandon the trace at the unroll bound
/// or continue stepping into the target block.
#[allow(clippy::too_many_arguments)]
fn resolve_jump<Instr: Clone, S: InstructionSemantics<Instr>>(
    program: &Program<Instr>,
    semantics: &S,
    ids: &IdGen,
    thread: ThreadId,
    from_address: Address,
    target: &Label,
    next_po_index: u32,
    mut visits: VisitMap,
    config: &Config,
) -> Result<Trace<()>> {
    let target_address = program
        .entry_address(target)
        .ok_or_else(|| LitmusError::UndefinedLabel(target.0.clone()))?;
    let is_back_jump = target_address <= from_address;

    if is_back_jump {
        let count = visits.entry(target.clone()).or_insert(0);
        *count += 1;
        if *count > config.unroll {
            warn!(label = %target, bound = config.unroll, "loop-unroll limit reached");
            return Ok(monad::too_far(target.clone()));
        }
    }

    step(
        program,
        semantics,
        ids,
        thread,
        target,
        0,
        next_po_index,
        visits,
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantics::InstrOutcome;

    #[derive(Debug, Clone)]
    enum Toy {
        WriteOne,
        Halt,
    }

    struct ToySemantics;

    impl InstructionSemantics<Toy> for ToySemantics {
        fn build(&self, ctx: &InstrContext<'_, Toy>, ids: &IdGen) -> InstrOutcome {
            match ctx.instruction {
                Toy::WriteOne => {
                    let event = Event {
                        id: ids.fresh_event(),
                        thread: ctx.thread,
                        po_index: ctx.po_index,
                        kind: EventKind::MemoryWrite,
                        location: Some(Location::Global(SymValue::Const(0))),
                        read_value: None,
                        written_value: Some(SymValue::Const(1)),
                        annotations: Annotations::empty(),
                    };
                    InstrOutcome {
                        fragment: Trace::from_event((), event),
                        next_po_index: ctx.po_index + 1,
                        verdict: BranchVerdict::Next,
                    }
                }
                Toy::Halt => InstrOutcome {
                    fragment: Trace::unit(()),
                    next_po_index: ctx.po_index,
                    verdict: BranchVerdict::Next,
                },
            }
        }
    }

    fn straight_line_program() -> Program<Toy> {
        let mut program = Program::new();
        program.insert_block(
            Label("T0".to_string()),
            CodeBlock::new(vec![
                (Address(0), Toy::WriteOne),
                (Address(1), Toy::Halt),
            ]),
        );
        program
    }

    #[test]
    fn straight_line_thread_produces_one_candidate() {
        let program = straight_line_program();
        let semantics = ToySemantics;
        let config = Config::default();
        let starts = vec![StartPoint {
            thread: ThreadId(0),
            entry: Label("T0".to_string()),
        }];
        let result =
            glommed_event_structures(&program, &semantics, &starts, &config, &InitialState::new())
                .expect("driver should not error on a well-formed program");
        assert_eq!(result.structures.len(), 1);
        assert!(!result.too_far);
        let (_, _, structure) = &result.structures[0];
        assert_eq!(structure.events.len(), 1);
    }

    #[test]
    fn jump_to_undefined_label_is_an_error() {
        let mut program: Program<Toy> = Program::new();
        program.insert_block(
            Label("T0".to_string()),
            CodeBlock::new(vec![(Address(0), Toy::Halt)]),
        );
        // Overwrite with a semantics stub that always jumps nowhere.
        struct JumpNowhere;
        impl InstructionSemantics<Toy> for JumpNowhere {
            fn build(&self, ctx: &InstrContext<'_, Toy>, _ids: &IdGen) -> InstrOutcome {
                InstrOutcome {
                    fragment: Trace::unit(()),
                    next_po_index: ctx.po_index,
                    verdict: BranchVerdict::Jump(Label("nope".to_string())),
                }
            }
        }
        let config = Config::default();
        let starts = vec![StartPoint {
            thread: ThreadId(0),
            entry: Label("T0".to_string()),
        }];
        let result = glommed_event_structures(
            &program,
            &JumpNowhere,
            &starts,
            &config,
            &InitialState::new(),
        );
        assert!(matches!(result, Err(LitmusError::UndefinedLabel(_))));
    }
}
