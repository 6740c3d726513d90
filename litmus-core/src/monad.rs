//! The monadic composer (spec §2, §6, §9).
//!
//! Spec §9 leaves the representation open: "a continuation-passing lazy
//! generator, a vector of partial candidates, or explicit trampolining".
//! This core picks the vector-of-partial-candidates strategy: `Trace<T>` is
//! a list monad over `Candidate<T>`, each candidate carrying the
//! constraints and event-structure fragment accumulated along that one
//! nondeterministic path, plus its own `too_far` marker. `choice` is what
//! gives the list its branching; `flat_map` is `sequence-then`;
//! [`parallel`] is `parallel-compose`.
//!
//! Grounded in the same shape as `core/translate/monadic/types.rs`'s
//! `Emit<'a, T>` (a value wrapped together with the effects accumulated
//! producing it) but fanned out to a `Vec` of alternatives instead of one
//! `EmitState`, because here the driver must keep every branch alive
//! rather than commit to one as it goes.

use crate::constraint::{Constraint, Label};
use crate::event::EventStructure;
use crate::value::SymValue;

/// One nondeterministic path through the composition so far.
#[derive(Debug, Clone)]
pub struct Candidate<T> {
    pub value: T,
    pub constraints: Vec<Constraint>,
    pub structure: EventStructure,
    pub too_far: bool,
}

impl<T> Candidate<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Candidate<U> {
        Candidate {
            value: f(self.value),
            constraints: self.constraints,
            structure: self.structure,
            too_far: self.too_far,
        }
    }
}

/// A finite list of candidate paths — the monadic composer's output type.
#[derive(Debug, Clone)]
pub struct Trace<T> {
    candidates: Vec<Candidate<T>>,
}

impl<T: Clone> Trace<T> {
    /// `unit`: the trivial single-candidate trace with no effects yet.
    pub fn unit(value: T) -> Trace<T> {
        Trace {
            candidates: vec![Candidate {
                value,
                constraints: Vec::new(),
                structure: EventStructure::default(),
                too_far: false,
            }],
        }
    }

    /// A trace contributing exactly one event and no constraints.
    pub fn from_event(value: T, event: crate::event::Event) -> Trace<T> {
        Trace::from_structure(value, EventStructure::singleton(event))
    }

    /// A trace contributing a caller-built structure (several events and
    /// their intra-instruction relations at once — e.g. a load whose
    /// value feeds a register write) and no constraints.
    pub fn from_structure(value: T, structure: EventStructure) -> Trace<T> {
        Trace {
            candidates: vec![Candidate {
                value,
                constraints: Vec::new(),
                structure,
                too_far: false,
            }],
        }
    }

    /// No candidates at all — the identity of [`Trace::concat`], used when
    /// a branch has no feasible continuation left to explore.
    pub fn empty() -> Trace<T> {
        Trace {
            candidates: Vec::new(),
        }
    }

    pub fn concat(mut self, mut other: Trace<T>) -> Trace<T> {
        self.candidates.append(&mut other.candidates);
        self
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Attach one more constraint to every surviving candidate.
    pub fn with_constraint(mut self, c: Constraint) -> Trace<T> {
        for cand in &mut self.candidates {
            cand.constraints.push(c.clone());
        }
        self
    }

    pub fn map<U: Clone>(self, f: impl Fn(T) -> U) -> Trace<U> {
        Trace {
            candidates: self.candidates.into_iter().map(|c| c.map(&f)).collect(),
        }
    }

    /// `sequence-then` / `>>>`: for every surviving candidate, run the
    /// continuation on its value and splice the continuation's
    /// constraints and events onto this candidate's own.
    pub fn flat_map<U: Clone>(self, f: impl Fn(T) -> Trace<U>) -> Trace<U> {
        let mut out = Vec::new();
        for cand in self.candidates {
            let next = f(cand.value);
            for ncand in next.candidates {
                let mut constraints = cand.constraints.clone();
                constraints.extend(ncand.constraints);
                out.push(Candidate {
                    value: ncand.value,
                    constraints,
                    structure: cand.structure.merge(&ncand.structure),
                    too_far: cand.too_far || ncand.too_far,
                });
            }
        }
        Trace { candidates: out }
    }

    /// Like [`Trace::flat_map`], but additionally chains each thread's
    /// exit events from this trace to the continuation's entry events on
    /// the same thread (spec §3/§4.5: `po_iico` is "program order
    /// extended with intra-instruction causal order" — the data/control
    /// relations must already carry plain program order, not just true
    /// dependencies). This is what the instruction driver uses to
    /// compose one instruction's fragment with the rest of the thread;
    /// [`Trace::flat_map`] itself stays a plain, dependency-agnostic
    /// list-monad bind for callers (like [`choice`]'s branches) that
    /// don't want extra edges inserted.
    pub fn sequence<U: Clone>(self, f: impl Fn(T) -> Trace<U>) -> Trace<U> {
        let mut out = Vec::new();
        for cand in self.candidates {
            let next = f(cand.value);
            for ncand in next.candidates {
                let mut constraints = cand.constraints.clone();
                constraints.extend(ncand.constraints.clone());
                let mut structure = cand.structure.merge(&ncand.structure);
                for &thread in &cand.structure.threads {
                    if !ncand.structure.threads.contains(&thread) {
                        continue;
                    }
                    for from in cand.structure.maximal_on_thread(thread) {
                        for to in ncand.structure.minimal_on_thread(thread) {
                            structure.control.insert((from, to));
                        }
                    }
                }
                out.push(Candidate {
                    value: ncand.value,
                    constraints,
                    structure,
                    too_far: cand.too_far || ncand.too_far,
                });
            }
        }
        Trace { candidates: out }
    }

    /// Extract the `(constraints, event-structure)` pairs plus the
    /// aggregated `too_far` flag (spec §6: `get_output` and the top-level
    /// `too_far` bit of `glommed_event_structures`).
    pub fn into_outputs(self) -> (Vec<(Vec<Constraint>, EventStructure)>, bool) {
        let too_far = self.candidates.iter().any(|c| c.too_far);
        let outputs = self
            .candidates
            .into_iter()
            .map(|c| (c.constraints, c.structure))
            .collect();
        (outputs, too_far)
    }
}

/// `parallel-compose (|*|)`: Cartesian product of two independent traces,
/// merging each pair's event structure and constraints. Used to compose
/// sibling threads and to compose init-writes alongside the thread traces
/// (spec §4.1).
pub fn parallel<T: Clone, U: Clone>(a: Trace<T>, b: Trace<U>) -> Trace<(T, U)> {
    let mut out = Vec::new();
    for ca in &a.candidates {
        for cb in &b.candidates {
            let mut constraints = ca.constraints.clone();
            constraints.extend(cb.constraints.clone());
            out.push(Candidate {
                value: (ca.value.clone(), cb.value.clone()),
                constraints,
                structure: ca.structure.merge(&cb.structure),
                too_far: ca.too_far || cb.too_far,
            });
        }
    }
    Trace { candidates: out }
}

/// `choice(value, t, f)`: branch on a (possibly symbolic) boolean guard.
/// By convention (enforced by the instruction semantics module) `value` is
/// always either a determined 0/1 constant or a variable known to resolve
/// to 0 or 1 — this keeps every constraint a plain `Assign(var, expr)`
/// equality, matching the two-variant `Constraint` model (spec §3) without
/// needing a disequality variant.
///
/// Both branches are explored by design (spec §4.1: "both branches are
/// explored; the solver later discards the infeasible one"); when the
/// guard is already a constant, the non-taken branch can never produce a
/// satisfiable residual, so it is dropped here rather than carried all the
/// way through the solver for no reason.
pub fn choice<T: Clone>(guard: SymValue, on_true: Trace<T>, on_false: Trace<T>) -> Trace<T> {
    match guard {
        SymValue::Const(1) => on_true,
        SymValue::Const(_) => on_false,
        SymValue::Var(v) => {
            let taken = on_true.with_constraint(Constraint::eq(v, SymValue::Const(1)));
            let not_taken = on_false.with_constraint(Constraint::eq(v, SymValue::Const(0)));
            taken.concat(not_taken)
        }
    }
}

/// `tooFar(label)`: the sentinel trace for a trace abandoned past the
/// unroll bound (spec §4.1). Carries an `Unroll(label)` constraint,
/// guaranteeing the solver can never find it satisfiable, and sets
/// `too_far` so the aggregate flag propagates up through `flat_map`.
pub fn too_far(label: Label) -> Trace<()> {
    Trace {
        candidates: vec![Candidate {
            value: (),
            constraints: vec![Constraint::Unroll(label)],
            structure: EventStructure::default(),
            too_far: true,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::VarId;

    #[test]
    fn unit_has_single_candidate_no_effects() {
        let t = Trace::unit(42);
        let (outputs, too_far) = t.into_outputs();
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].0.is_empty());
        assert!(!too_far);
    }

    #[test]
    fn choice_on_variable_explores_both_branches() {
        let guard = SymValue::Var(VarId(0));
        let t = choice(guard, Trace::unit("yes"), Trace::unit("no"));
        assert_eq!(t.len(), 2);
        let (outputs, _) = t.into_outputs();
        assert_eq!(outputs.len(), 2);
        assert!(outputs
            .iter()
            .any(|(cs, _)| cs.contains(&Constraint::eq(VarId(0), SymValue::Const(1)))));
        assert!(outputs
            .iter()
            .any(|(cs, _)| cs.contains(&Constraint::eq(VarId(0), SymValue::Const(0)))));
    }

    #[test]
    fn choice_on_constant_drops_infeasible_branch() {
        let t = choice(SymValue::Const(0), Trace::unit("yes"), Trace::unit("no"));
        let (outputs, _) = t.into_outputs();
        assert_eq!(outputs.len(), 1);
    }

    #[test]
    fn too_far_sets_flag_and_unroll_constraint() {
        let label = Label("L".to_string());
        let t = too_far(label.clone());
        let (outputs, too_far_flag) = t.into_outputs();
        assert!(too_far_flag);
        assert_eq!(outputs[0].0, vec![Constraint::Unroll(label)]);
    }

    #[test]
    fn flat_map_merges_constraints_and_events() {
        let t = Trace::unit(1).flat_map(|v| Trace::unit(v + 1));
        let (outputs, _) = t.into_outputs();
        assert_eq!(outputs.len(), 1);
    }

    #[test]
    fn parallel_is_cartesian_product() {
        let a = Trace::unit(1).concat(Trace::unit(2));
        let b = Trace::unit("x").concat(Trace::unit("y"));
        let p = parallel(a, b);
        assert_eq!(p.len(), 4);
    }
}
