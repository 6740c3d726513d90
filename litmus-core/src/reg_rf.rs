//! Register RF resolver (spec §4.3).

use crate::constraint::{Constraint, Expr, InitialState, RfKey, RfMap, RfValue};
use crate::event::{Event, EventStructure};
use crate::location::Location;
use crate::semantics::{ConstraintSolver, SolveOutcome};

/// Outcome of resolving every register load in a structure.
pub enum RegResolution {
    /// No solution to the register-level equation system. Per spec §7
    /// this is a constructive-consistency invariant, so reaching this in
    /// practice is an internal bug, but callers still decide what to do
    /// ("this entire abstract structure is infeasible; skip it").
    Infeasible,
    Resolved {
        structure: EventStructure,
        rfmap: RfMap,
        residual: Vec<Constraint>,
    },
}

/// Build the unique register RF, emit its equality constraints, and solve.
pub fn solve_regs<Solv: ConstraintSolver>(
    structure: &EventStructure,
    mut constraints: Vec<Constraint>,
    init_state: &InitialState,
    solver: &Solv,
) -> RegResolution {
    let mut rfmap = RfMap::new();

    for load in structure.register_loads().collect::<Vec<_>>() {
        let Some(Location::Register(thread, reg)) = load.location else {
            continue;
        };
        let store = latest_register_store(structure, load, thread, reg);

        match store {
            Some(store) => {
                rfmap.insert(RfKey::Load(load.id), RfValue::Store(store.id));
                if let (Some(read), Some(written)) = (load.read_value, store.written_value) {
                    if let Some(var) = read.as_var() {
                        constraints.push(Constraint::Assign(var, Expr::Atom(written)));
                    }
                }
            }
            None => {
                rfmap.insert(RfKey::Load(load.id), RfValue::Init);
                if let Some(read) = load.read_value {
                    if let Some(var) = read.as_var() {
                        let init = init_state.get_register(thread, reg);
                        constraints.push(Constraint::Assign(var, Expr::constant(init)));
                    }
                }
            }
        }
    }

    for thread in structure.threads.clone() {
        for reg in register_ids_on_thread(structure, thread) {
            let stores: Vec<&Event> = structure
                .register_stores()
                .filter(|e| matches!(e.location, Some(Location::Register(t, r)) if t == thread && r == reg))
                .collect();
            if let Some(last) = latest_among(structure, &stores) {
                let key = RfKey::Final(crate::constraint::LocationKey(register_key(thread, reg)));
                rfmap.insert(key, RfValue::Store(last));
            }
        }
    }

    match solver.solve(&constraints) {
        SolveOutcome::NoSolns => RegResolution::Infeasible,
        SolveOutcome::Solved { substitution, residual } => {
            let structure = substitution.apply_to_structure(structure);
            let rfmap = apply_substitution_to_rfmap(&rfmap, &substitution);
            RegResolution::Resolved {
                structure,
                rfmap,
                residual,
            }
        }
    }
}

fn latest_register_store<'a>(
    structure: &'a EventStructure,
    load: &Event,
    thread: crate::location::ThreadId,
    reg: crate::location::RegId,
) -> Option<&'a Event> {
    let candidates: Vec<&Event> = structure
        .register_stores()
        .filter(|e| {
            matches!(e.location, Some(Location::Register(t, r)) if t == thread && r == reg)
                && structure.precedes(e.id, load.id)
        })
        .collect();
    latest_among(structure, &candidates).and_then(|id| structure.event(id))
}

/// The candidate that precedes no other candidate: the unique maximum
/// under intra-causality, relying on the invariant that same-register
/// same-thread writes are totally ordered (spec §4.3).
fn latest_among(structure: &EventStructure, candidates: &[&Event]) -> Option<crate::value::EventId> {
    candidates
        .iter()
        .find(|c| {
            !candidates
                .iter()
                .any(|other| other.id != c.id && structure.precedes(c.id, other.id))
        })
        .map(|c| c.id)
}

fn register_ids_on_thread(
    structure: &EventStructure,
    thread: crate::location::ThreadId,
) -> Vec<crate::location::RegId> {
    let mut regs: Vec<crate::location::RegId> = structure
        .events
        .iter()
        .filter_map(|e| match e.location {
            Some(Location::Register(t, r)) if t == thread => Some(r),
            _ => None,
        })
        .collect();
    regs.sort();
    regs.dedup();
    regs
}

/// Registers don't have a natural `i64` address for `LocationKey`, so
/// derive a stable synthetic one from the thread/register pair. This key
/// is only ever used to look the binding back up, never interpreted as a
/// memory address.
fn register_key(thread: crate::location::ThreadId, reg: crate::location::RegId) -> i64 {
    ((thread.0 as i64) << 32) | (reg.0 as i64) | (1i64 << 62)
}

fn apply_substitution_to_rfmap(rfmap: &RfMap, substitution: &crate::semantics::Substitution) -> RfMap {
    // RFMap values are event identifiers, never symbolic, so substitution
    // only affects the structure; the map is carried through unchanged.
    let _ = substitution;
    rfmap.clone()
}
