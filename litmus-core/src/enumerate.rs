//! Driver entry (spec §4.7): orchestrates §4.3 → §4.4 → §4.5 with
//! continuation plumbing, folding every delivered concrete execution (and
//! every loop-exceeded notice) into the caller's accumulator.

use tracing::{debug, trace};

use crate::config::Config;
use crate::constraint::{Constraint, InitialState};
use crate::cycle;
use crate::event::EventStructure;
use crate::finalize::{self, ConcreteExecution, FinalizationSpec};
use crate::mem_rf;
use crate::reg_rf::{self, RegResolution};
use crate::semantics::{ConstraintSolver, InstructionSemantics, SolveOutcome};

/// `calculate_rf_with_cnstrnts` (spec §6): fold semantics over every
/// concrete execution reachable from one abstract `(structure,
/// constraints)` candidate.
#[allow(clippy::too_many_arguments)]
pub fn calculate_rf_with_cnstrnts<Instr, S, Solv, Acc>(
    structure: &EventStructure,
    constraints: Vec<Constraint>,
    init_state: &InitialState,
    config: &Config,
    semantics: &S,
    solver: &Solv,
    fspec: &FinalizationSpec<'_>,
    mut on_concrete: impl FnMut(ConcreteExecution, Acc) -> Acc,
    mut on_loop_exceeded: impl FnMut(Acc) -> Acc,
    accumulator: Acc,
) -> Acc
where
    S: InstructionSemantics<Instr>,
    Solv: ConstraintSolver,
{
    let mut acc = accumulator;

    let resolution = reg_rf::solve_regs(structure, constraints, init_state, solver);
    let (reg_structure, rfmap, residual) = match resolution {
        RegResolution::Infeasible => {
            debug!("register RF unsatisfiable; dropping abstract structure");
            return acc;
        }
        RegResolution::Resolved {
            structure,
            rfmap,
            residual,
        } => (structure, rfmap, residual),
    };

    let mem_candidates = mem_rf::enumerate(
        &reg_structure,
        &rfmap,
        &residual,
        init_state,
        config,
        solver,
    );

    for candidate in mem_candidates {
        if !candidate.residual.is_empty() {
            if SolveOutcome::residual_is_all_unroll(&candidate.residual) {
                if config.debug.solver {
                    trace!("unrolling too deep at a residual Unroll constraint");
                }
                acc = on_loop_exceeded(acc);
            } else {
                debug_assert!(
                    cycle::rfmap_is_cyclic(&candidate.structure, &candidate.rfmap),
                    "a non-Unroll residual must witness a cyclic RFMap (spec §9 when_unsolved)"
                );
                if config.debug.rfm {
                    trace!("residual constraints left after memory RF; dropping candidate");
                }
            }
            continue;
        }

        if config.optace && !cycle::check_rfmap(&candidate.structure, &candidate.rfmap) {
            if config.debug.rfm {
                trace!("check_rfmap rejected candidate: intervening store found");
            }
            continue;
        }

        let concretes = finalize::finalize(
            &candidate.structure,
            &candidate.rfmap,
            init_state,
            config,
            semantics,
            fspec,
        );
        for concrete in concretes {
            acc = on_concrete(concrete, acc);
        }
    }

    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Annotations, Event, EventKind};
    use crate::location::{Location, ThreadId};
    use crate::semantics::{InstrContext, InstrOutcome, Substitution};
    use crate::value::{EventId, IdGen, SymValue};

    struct AlwaysSolves;
    impl ConstraintSolver for AlwaysSolves {
        fn solve(&self, constraints: &[Constraint]) -> SolveOutcome {
            let mut sub = Substitution::new();
            for c in constraints {
                if let Constraint::Assign(var, crate::constraint::Expr::Atom(SymValue::Const(v))) = c {
                    sub.bind(*var, *v);
                }
            }
            SolveOutcome::Solved {
                substitution: sub,
                residual: Vec::new(),
            }
        }
    }

    struct NoSemantics;
    impl InstructionSemantics<()> for NoSemantics {
        fn build(&self, _ctx: &InstrContext<'_, ()>, _ids: &IdGen) -> InstrOutcome {
            unreachable!()
        }
    }

    #[test]
    fn single_thread_write_then_read_delivers_one_concrete() {
        let w = Event {
            id: EventId(0),
            thread: ThreadId(0),
            po_index: 0,
            kind: EventKind::MemoryWrite,
            location: Some(Location::Global(SymValue::Const(0))),
            read_value: None,
            written_value: Some(SymValue::Const(1)),
            annotations: Annotations::empty(),
        };
        let r = Event {
            id: EventId(1),
            thread: ThreadId(0),
            po_index: 1,
            kind: EventKind::MemoryRead,
            location: Some(Location::Global(SymValue::Const(0))),
            read_value: Some(SymValue::Var(crate::value::VarId(0))),
            written_value: None,
            annotations: Annotations::empty(),
        };
        let mut structure = EventStructure {
            events: vec![w.clone(), r.clone()],
            threads: vec![ThreadId(0)],
            ..Default::default()
        };
        structure.data.insert((w.id, r.id));

        let config = Config::default();
        let fspec = FinalizationSpec {
            observed_locations: &[0],
            filter: None,
        };

        let delivered = calculate_rf_with_cnstrnts(
            &structure,
            Vec::new(),
            &InitialState::new(),
            &config,
            &NoSemantics,
            &AlwaysSolves,
            &fspec,
            |concrete, mut acc: Vec<ConcreteExecution>| {
                acc.push(concrete);
                acc
            },
            |acc| acc,
            Vec::new(),
        );

        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].final_state.get(0), 1);
    }
}
