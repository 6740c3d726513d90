//! Memory RF enumerator (spec §4.4).

use itertools::Itertools;

use crate::config::Config;
use crate::constraint::{Constraint, Expr, InitialState, RfKey, RfMap, RfValue};
use crate::event::{Event, EventStructure};
use crate::location::Location;
use crate::semantics::{ConstraintSolver, SolveOutcome};
use crate::value::{EventId, SymValue};

/// One load's candidate RF source: the initial state, or a specific store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RfChoice {
    Init,
    Store(EventId),
}

/// One surviving tuple's outcome: a substituted structure, its extended
/// RFMap, and whatever constraints the solver could not discharge
/// (possibly empty, possibly all-`Unroll`, per spec §4.7's `when_unsolved`
/// handling, which is the caller's job, not this module's).
pub struct MemCandidate {
    pub structure: EventStructure,
    pub rfmap: RfMap,
    pub residual: Vec<Constraint>,
}

/// Enumerate every compatible-store tuple across all memory loads, solve
/// each, and return the survivors (spec §4.4).
pub fn enumerate<Solv: ConstraintSolver>(
    structure: &EventStructure,
    rfmap_in: &RfMap,
    carried_constraints: &[Constraint],
    init_state: &InitialState,
    config: &Config,
    solver: &Solv,
) -> Vec<MemCandidate> {
    let loads: Vec<&Event> = structure.memory_loads().collect();
    let stores: Vec<&Event> = structure.memory_stores().collect();

    let per_load_candidates: Vec<Vec<RfChoice>> = loads
        .iter()
        .map(|load| candidates_for(load, &stores, structure, config))
        .collect();

    if per_load_candidates.iter().any(|c| c.is_empty()) {
        // A load with literally no candidates (can only happen when
        // `initwrites` is enabled and no init-write event was ever
        // emitted for its location) yields nothing for this structure.
        return Vec::new();
    }

    per_load_candidates
        .into_iter()
        .multi_cartesian_product()
        .filter_map(|tuple| {
            solve_tuple(
                structure,
                rfmap_in,
                carried_constraints,
                &loads,
                &tuple,
                init_state,
                solver,
            )
        })
        .collect()
}

fn candidates_for(
    load: &Event,
    stores: &[&Event],
    structure: &EventStructure,
    config: &Config,
) -> Vec<RfChoice> {
    let mut out = Vec::new();
    if !config.initwrites {
        out.push(RfChoice::Init);
    }
    for &store in stores {
        if compatible(load, store, structure, config.optace) {
            out.push(RfChoice::Store(store.id));
        }
    }
    out
}

/// `w` is compatible with `r` iff `w != r` and, when both locations are
/// determined, they are equal (spec §4.4).
fn compatible(load: &Event, store: &Event, structure: &EventStructure, optace: bool) -> bool {
    if load.id == store.id {
        return false;
    }
    if let (Some(lv), Some(sv)) = (location_value(load.location), location_value(store.location)) {
        if let (SymValue::Const(a), SymValue::Const(b)) = (lv, sv) {
            if a != b {
                return false;
            }
        }
    }
    if optace && structure.precedes(load.id, store.id) {
        return false;
    }
    true
}

fn location_value(loc: Option<Location>) -> Option<SymValue> {
    match loc {
        Some(Location::Global(v)) | Some(Location::Deref(v)) => Some(v),
        _ => None,
    }
}

fn solve_tuple<Solv: ConstraintSolver>(
    structure: &EventStructure,
    rfmap_in: &RfMap,
    carried_constraints: &[Constraint],
    loads: &[&Event],
    tuple: &[RfChoice],
    init_state: &InitialState,
    solver: &Solv,
) -> Option<MemCandidate> {
    let mut constraints = carried_constraints.to_vec();
    let mut rfmap = rfmap_in.clone();

    for (&load, &choice) in loads.iter().zip(tuple.iter()) {
        match choice {
            RfChoice::Store(store_id) => {
                let store = structure.event(store_id)?;
                rfmap.insert(RfKey::Load(load.id), RfValue::Store(store_id));

                if let (Some(lv), Some(sv)) = (location_value(load.location), location_value(store.location)) {
                    match unify(lv, sv) {
                        Unification::Contradiction => return None,
                        Unification::Constraint(c) => constraints.push(c),
                        Unification::AlreadyEqual => {}
                    }
                }
                if let (Some(rv), Some(wv)) = (load.read_value, store.written_value) {
                    match unify(rv, wv) {
                        Unification::Contradiction => return None,
                        Unification::Constraint(c) => constraints.push(c),
                        Unification::AlreadyEqual => {}
                    }
                }
            }
            RfChoice::Init => {
                rfmap.insert(RfKey::Load(load.id), RfValue::Init);
                match (location_value(load.location), load.read_value) {
                    (Some(SymValue::Const(addr)), Some(rv)) => {
                        let init = init_state.get(addr);
                        match unify(rv, SymValue::Const(init)) {
                            Unification::Contradiction => return None,
                            Unification::Constraint(c) => constraints.push(c),
                            Unification::AlreadyEqual => {}
                        }
                    }
                    (Some(SymValue::Var(_)), Some(SymValue::Var(v))) => {
                        if let Some(loc) = load.location {
                            constraints.push(Constraint::Assign(
                                v,
                                Expr::ReadInit(loc, init_state.clone()),
                            ));
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    match solver.solve(&constraints) {
        SolveOutcome::NoSolns => None,
        SolveOutcome::Solved { substitution, residual } => {
            let structure = substitution.apply_to_structure(structure);
            Some(MemCandidate {
                structure,
                rfmap,
                residual,
            })
        }
    }
}

enum Unification {
    AlreadyEqual,
    Constraint(Constraint),
    Contradiction,
}

fn unify(a: SymValue, b: SymValue) -> Unification {
    match (a, b) {
        (SymValue::Const(x), SymValue::Const(y)) if x == y => Unification::AlreadyEqual,
        (SymValue::Const(_), SymValue::Const(_)) => Unification::Contradiction,
        (SymValue::Var(v), other) => Unification::Constraint(Constraint::Assign(v, Expr::Atom(other))),
        (other, SymValue::Var(v)) => Unification::Constraint(Constraint::Assign(v, Expr::Atom(other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Annotations, EventKind};
    use crate::location::ThreadId;
    use crate::semantics::Substitution;
    use crate::value::VarId;

    struct AlwaysSolves;
    impl ConstraintSolver for AlwaysSolves {
        fn solve(&self, constraints: &[Constraint]) -> SolveOutcome {
            let mut sub = Substitution::new();
            for c in constraints {
                if let Constraint::Assign(var, Expr::Atom(SymValue::Const(v))) = c {
                    sub.bind(*var, *v);
                }
            }
            SolveOutcome::Solved { substitution: sub, residual: Vec::new() }
        }
    }

    fn mem_event(id: u32, kind: EventKind, addr: i64, value: Option<SymValue>) -> Event {
        Event {
            id: EventId(id),
            thread: ThreadId(0),
            po_index: id,
            kind,
            location: Some(Location::Global(SymValue::Const(addr))),
            read_value: if kind == EventKind::MemoryRead { value } else { None },
            written_value: if kind == EventKind::MemoryWrite { value } else { None },
            annotations: Annotations::empty(),
        }
    }

    #[test]
    fn single_store_and_init_are_both_candidates_without_initwrites() {
        let store = mem_event(0, EventKind::MemoryWrite, 0, Some(SymValue::Const(1)));
        let load = mem_event(1, EventKind::MemoryRead, 0, Some(SymValue::Var(VarId(0))));
        let structure = EventStructure {
            events: vec![store, load],
            threads: vec![ThreadId(0)],
            ..Default::default()
        };
        let config = Config::default();
        let candidates = enumerate(
            &structure,
            &RfMap::new(),
            &[],
            &InitialState::new(),
            &config,
            &AlwaysSolves,
        );
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn optace_rejects_store_that_must_follow_the_load() {
        let load = mem_event(0, EventKind::MemoryRead, 0, Some(SymValue::Var(VarId(0))));
        let store = mem_event(1, EventKind::MemoryWrite, 0, Some(SymValue::Const(1)));
        let mut structure = EventStructure {
            events: vec![load.clone(), store.clone()],
            threads: vec![ThreadId(0)],
            ..Default::default()
        };
        structure.data.insert((load.id, store.id));
        let mut config = Config::default();
        config.optace = true;
        let candidates = enumerate(
            &structure,
            &RfMap::new(),
            &[],
            &InitialState::new(),
            &config,
            &AlwaysSolves,
        );
        // Only the Init candidate should survive; reading from `store` is
        // pruned because the load strictly precedes it.
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].rfmap.get(&RfKey::Load(load.id)),
            Some(&RfValue::Init)
        );
    }

    #[test]
    fn init_read_of_a_symbolic_address_emits_a_read_init_constraint() {
        // `location_value` only returns `None` for register locations; a
        // memory load with a still-symbolic address is `Global(Var(_))`,
        // which must still reach the `ReadInit` constraint, not fall
        // through to the no-op arm.
        let addr_var = VarId(0);
        let read_var = VarId(1);
        let load = Event {
            id: EventId(0),
            thread: ThreadId(0),
            po_index: 0,
            kind: EventKind::MemoryRead,
            location: Some(Location::Global(SymValue::Var(addr_var))),
            read_value: Some(SymValue::Var(read_var)),
            written_value: None,
            annotations: Annotations::empty(),
        };
        let structure = EventStructure {
            events: vec![load.clone()],
            threads: vec![ThreadId(0)],
            ..Default::default()
        };
        let mut init_state = InitialState::new();
        init_state.set(5, 42);
        let carried = vec![Constraint::Assign(addr_var, Expr::constant(5))];
        let candidates = enumerate(
            &structure,
            &RfMap::new(),
            &carried,
            &init_state,
            &Config::default(),
            &crate::solver::UnionFindSolver::new(),
        );
        assert_eq!(candidates.len(), 1);
        let resolved = candidates[0].structure.event(load.id).unwrap();
        assert_eq!(resolved.read_value, Some(SymValue::Const(42)));
    }
}
