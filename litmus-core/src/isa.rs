//! A small default instruction set (store/load/fence/mov/jump/conditional
//! jump), supplied so the crate is runnable end to end. Not part of the
//! original system's scope — the instruction semantics module is listed
//! there as an external collaborator with a contract only — but every
//! concrete litmus test needs one, and the test scenarios (§8) are
//! written against instructions exactly like these.

use crate::constraint::{Constraint, Expr, Label};
use crate::event::{Annotations, Event, EventKind, EventStructure};
use crate::location::{Location, RegId};
use crate::monad::Trace;
use crate::semantics::{BranchVerdict, InstrContext, InstrOutcome, InstructionSemantics};
use crate::value::{IdGen, SymValue};

/// The value stored by a `Store`: either an immediate or whatever a
/// register currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Imm(i64),
    Reg(RegId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    /// `r := imm`
    Mov(RegId, i64),
    /// `r := mem[addr]`
    Load(RegId, i64),
    /// `mem[addr] := src`
    Store(i64, Source),
    /// A full memory barrier; no events of its own location, just a node
    /// in program order.
    Fence,
    Jmp(Label),
    /// Jump to `label` when `r` is zero; falls through otherwise. `r`
    /// must hold a boolean (0 or 1) by construction — see the
    /// boolean-guard convention in [`crate::monad::choice`].
    JmpZero(RegId, Label),
}

pub struct ToySemantics {
    observed: Vec<i64>,
}

impl ToySemantics {
    pub fn new(observed_locations: Vec<i64>) -> Self {
        Self {
            observed: observed_locations,
        }
    }
}

impl InstructionSemantics<Instr> for ToySemantics {
    fn build(&self, ctx: &InstrContext<'_, Instr>, ids: &IdGen) -> InstrOutcome {
        match ctx.instruction {
            Instr::Mov(dst, imm) => {
                let event = register_write_event(ids, ctx, *dst, SymValue::Const(*imm));
                InstrOutcome {
                    fragment: Trace::from_event((), event),
                    next_po_index: ctx.po_index + 1,
                    verdict: BranchVerdict::Next,
                }
            }
            Instr::Load(dst, addr) => {
                let read_var = ids.fresh_var();
                let read_event = memory_read_event(ids, ctx, *addr, read_var);
                let write_event = register_write_event(ids, ctx, *dst, read_var);
                let mut structure = EventStructure::singleton(read_event.clone());
                structure = structure.merge(&EventStructure::singleton(write_event.clone()));
                structure.data.insert((read_event.id, write_event.id));
                InstrOutcome {
                    fragment: Trace::from_structure((), structure),
                    next_po_index: ctx.po_index + 1,
                    verdict: BranchVerdict::Next,
                }
            }
            Instr::Store(addr, Source::Imm(value)) => {
                let event = memory_write_event(ids, ctx, *addr, SymValue::Const(*value));
                InstrOutcome {
                    fragment: Trace::from_event((), event),
                    next_po_index: ctx.po_index + 1,
                    verdict: BranchVerdict::Next,
                }
            }
            Instr::Store(addr, Source::Reg(src)) => {
                let read_var = ids.fresh_var();
                let read_event = register_read_event(ids, ctx, *src, read_var);
                let write_event = memory_write_event(ids, ctx, *addr, read_var);
                let mut structure = EventStructure::singleton(read_event.clone());
                structure = structure.merge(&EventStructure::singleton(write_event.clone()));
                structure.data.insert((read_event.id, write_event.id));
                InstrOutcome {
                    fragment: Trace::from_structure((), structure),
                    next_po_index: ctx.po_index + 1,
                    verdict: BranchVerdict::Next,
                }
            }
            Instr::Fence => {
                let event = Event {
                    id: ids.fresh_event(),
                    thread: ctx.thread,
                    po_index: ctx.po_index,
                    kind: EventKind::Barrier,
                    location: None,
                    read_value: None,
                    written_value: None,
                    annotations: Annotations::empty(),
                };
                InstrOutcome {
                    fragment: Trace::from_event((), event),
                    next_po_index: ctx.po_index + 1,
                    verdict: BranchVerdict::Next,
                }
            }
            Instr::Jmp(label) => InstrOutcome {
                fragment: Trace::unit(()),
                next_po_index: ctx.po_index,
                verdict: BranchVerdict::Jump(label.clone()),
            },
            Instr::JmpZero(reg, label) => {
                let read_var = ids.fresh_var();
                let read_event = register_read_event(ids, ctx, *reg, read_var);
                let guard = ids.fresh_var();
                let guard_var = guard.as_var().expect("fresh_var always yields a Var");
                // `guard = 1 - r`: true (1) exactly when `r` is zero,
                // valid because `r` is guaranteed boolean by convention.
                let fragment = Trace::from_event((), read_event).with_constraint(Constraint::Assign(
                    guard_var,
                    Expr::Sub(Box::new(Expr::constant(1)), Box::new(Expr::Atom(read_var))),
                ));
                InstrOutcome {
                    fragment,
                    next_po_index: ctx.po_index + 1,
                    verdict: BranchVerdict::CondJump(guard, label.clone()),
                }
            }
        }
    }

    fn observed_locations(&self) -> Vec<i64> {
        self.observed.clone()
    }
}

fn register_write_event(
    ids: &IdGen,
    ctx: &InstrContext<'_, Instr>,
    reg: RegId,
    value: SymValue,
) -> Event {
    Event {
        id: ids.fresh_event(),
        thread: ctx.thread,
        po_index: ctx.po_index,
        kind: EventKind::RegisterWrite,
        location: Some(Location::Register(ctx.thread, reg)),
        read_value: None,
        written_value: Some(value),
        annotations: Annotations::empty(),
    }
}

fn register_read_event(
    ids: &IdGen,
    ctx: &InstrContext<'_, Instr>,
    reg: RegId,
    value: SymValue,
) -> Event {
    Event {
        id: ids.fresh_event(),
        thread: ctx.thread,
        po_index: ctx.po_index,
        kind: EventKind::RegisterRead,
        location: Some(Location::Register(ctx.thread, reg)),
        read_value: Some(value),
        written_value: None,
        annotations: Annotations::empty(),
    }
}

fn memory_read_event(ids: &IdGen, ctx: &InstrContext<'_, Instr>, addr: i64, value: SymValue) -> Event {
    Event {
        id: ids.fresh_event(),
        thread: ctx.thread,
        po_index: ctx.po_index,
        kind: EventKind::MemoryRead,
        location: Some(Location::Global(SymValue::Const(addr))),
        read_value: Some(value),
        written_value: None,
        annotations: Annotations::empty(),
    }
}

fn memory_write_event(ids: &IdGen, ctx: &InstrContext<'_, Instr>, addr: i64, value: SymValue) -> Event {
    Event {
        id: ids.fresh_event(),
        thread: ctx.thread,
        po_index: ctx.po_index,
        kind: EventKind::MemoryWrite,
        location: Some(Location::Global(SymValue::Const(addr))),
        read_value: None,
        written_value: Some(value),
        annotations: Annotations::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::IdGen;

    #[test]
    fn load_emits_a_data_edge_into_the_register_write() {
        let ids = IdGen::new();
        let semantics = ToySemantics::new(vec![0]);
        let ctx = InstrContext {
            po_index: 0,
            thread: crate::location::ThreadId(0),
            instruction: &Instr::Load(RegId(1), 0),
            unroll_count: 0,
            labels: &[],
        };
        let outcome = semantics.build(&ctx, &ids);
        let (outputs, _) = outcome.fragment.into_outputs();
        assert_eq!(outputs.len(), 1);
        let (_, structure) = &outputs[0];
        assert_eq!(structure.events.len(), 2);
        assert_eq!(structure.data.len(), 1);
    }

    #[test]
    fn jmpzero_produces_a_condjump_verdict() {
        let ids = IdGen::new();
        let semantics = ToySemantics::new(vec![]);
        let ctx = InstrContext {
            po_index: 0,
            thread: crate::location::ThreadId(0),
            instruction: &Instr::JmpZero(RegId(0), Label("L".to_string())),
            unroll_count: 0,
            labels: &[],
        };
        let outcome = semantics.build(&ctx, &ids);
        assert!(matches!(outcome.verdict, BranchVerdict::CondJump(_, _)));
    }
}
