//! A default constraint solver (spec §6 collaborator contract).
//!
//! Not specified by name in the source system — supplied here so the
//! crate is runnable end to end. Implements `solve` by fixpoint
//! propagation of `Assign(var, expr)` equations: repeatedly evaluate every
//! not-yet-resolved expression against the bindings found so far, bind any
//! variable whose expression becomes fully determined, and stop when a
//! pass makes no further progress. A directly conflicting binding (the
//! same variable constrained to two different constants) is reported as
//! `NoSolns`; anything left unresolved (including `Unroll` sentinels,
//! which never resolve) is returned as residual, exactly as a real
//! algebraic solver would leave a genuinely underdetermined system.

use std::collections::HashMap;

use crate::constraint::{Constraint, Expr, InitialState};
use crate::location::Location;
use crate::semantics::{ConstraintSolver, Substitution, SolveOutcome};
use crate::value::{SymValue, VarId};

#[derive(Debug, Default)]
pub struct UnionFindSolver;

impl UnionFindSolver {
    pub fn new() -> Self {
        Self
    }
}

impl ConstraintSolver for UnionFindSolver {
    fn solve(&self, constraints: &[Constraint]) -> SolveOutcome {
        let mut bindings: HashMap<VarId, i64> = HashMap::new();
        let mut unroll = Vec::new();
        let mut pending: Vec<(VarId, Expr)> = Vec::new();

        for c in constraints {
            match c {
                Constraint::Assign(var, expr) => pending.push((*var, expr.clone())),
                Constraint::Unroll(_) => unroll.push(c.clone()),
            }
        }

        loop {
            let mut progressed = false;
            let mut still_pending = Vec::new();
            for (var, expr) in pending {
                match eval(&expr, &bindings) {
                    Some(value) => match bindings.get(&var) {
                        Some(&existing) if existing != value => return SolveOutcome::NoSolns,
                        Some(_) => {}
                        None => {
                            bindings.insert(var, value);
                            progressed = true;
                        }
                    },
                    None => still_pending.push((var, expr)),
                }
            }
            pending = still_pending;
            if !progressed {
                break;
            }
        }

        let mut substitution = Substitution::new();
        for (var, value) in &bindings {
            substitution.bind(*var, *value);
        }
        let residual = pending
            .into_iter()
            .map(|(var, expr)| Constraint::Assign(var, expr))
            .chain(unroll)
            .collect();

        SolveOutcome::Solved { substitution, residual }
    }
}

fn eval(expr: &Expr, bindings: &HashMap<VarId, i64>) -> Option<i64> {
    match expr {
        Expr::Atom(SymValue::Const(c)) => Some(*c),
        Expr::Atom(SymValue::Var(v)) => bindings.get(v).copied(),
        Expr::Add(a, b) => Some(eval(a, bindings)? + eval(b, bindings)?),
        Expr::Sub(a, b) => Some(eval(a, bindings)? - eval(b, bindings)?),
        Expr::ReadInit(loc, state) => eval_read_init(loc, state, bindings),
    }
}

fn eval_read_init(loc: &Location, state: &InitialState, bindings: &HashMap<VarId, i64>) -> Option<i64> {
    match loc {
        Location::Global(SymValue::Const(addr)) | Location::Deref(SymValue::Const(addr)) => {
            Some(state.get(*addr))
        }
        Location::Global(SymValue::Var(v)) | Location::Deref(SymValue::Var(v)) => {
            bindings.get(v).map(|addr| state.get(*addr))
        }
        Location::Register(thread, reg) => Some(state.get_register(*thread, *reg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Expr::Add(Box::new(Expr::constant(2)), Box::new(Expr::constant(3))), 5)]
    #[case(Expr::Sub(Box::new(Expr::constant(10)), Box::new(Expr::constant(4))), 6)]
    #[case(Expr::Sub(Box::new(Expr::constant(1)), Box::new(Expr::constant(1))), 0)]
    fn evaluates_arithmetic_expressions(#[case] expr: Expr, #[case] expected: i64) {
        let v = VarId(0);
        let constraints = vec![Constraint::Assign(v, expr)];
        match UnionFindSolver::new().solve(&constraints) {
            SolveOutcome::Solved { substitution, .. } => {
                assert_eq!(substitution.get(v), Some(expected))
            }
            SolveOutcome::NoSolns => panic!("expected a solution"),
        }
    }

    #[test]
    fn resolves_a_chain_of_equalities() {
        let a = VarId(0);
        let b = VarId(1);
        let constraints = vec![
            Constraint::Assign(a, Expr::Atom(SymValue::Var(b))),
            Constraint::Assign(b, Expr::constant(7)),
        ];
        let outcome = UnionFindSolver::new().solve(&constraints);
        match outcome {
            SolveOutcome::Solved { substitution, residual } => {
                assert!(residual.is_empty());
                assert_eq!(substitution.get(a), Some(7));
                assert_eq!(substitution.get(b), Some(7));
            }
            SolveOutcome::NoSolns => panic!("expected a solution"),
        }
    }

    #[test]
    fn conflicting_constants_are_unsatisfiable() {
        let a = VarId(0);
        let constraints = vec![
            Constraint::Assign(a, Expr::constant(1)),
            Constraint::Assign(a, Expr::constant(2)),
        ];
        assert!(matches!(
            UnionFindSolver::new().solve(&constraints),
            SolveOutcome::NoSolns
        ));
    }

    #[test]
    fn unroll_sentinel_always_survives_as_residual() {
        let label = crate::constraint::Label("L".to_string());
        let constraints = vec![Constraint::Unroll(label.clone())];
        match UnionFindSolver::new().solve(&constraints) {
            SolveOutcome::Solved { residual, .. } => {
                assert_eq!(residual, vec![Constraint::Unroll(label)]);
            }
            SolveOutcome::NoSolns => panic!("Unroll alone is not a contradiction"),
        }
    }
}
