//! Symbolic values and the fresh-identifier generator threaded through the
//! instruction driver.
//!
//! Grounded in `core/translate/monadic/alloc.rs`'s resource-allocation
//! primitives (`alloc_reg`, `alloc_label`, ...): there, a single
//! `EmitState` counter hands out fresh `Reg`/`Label`/`Cursor` values as the
//! emitter walks a single-threaded computation. Here the driver explores
//! many candidate paths concurrently (spec §5: "all state is value-based
//! and tree-shaped"), so the counters live behind `Cell`s shared by
//! reference rather than a `&mut` threaded through one computation — the
//! counters themselves are still a single write-only side effect, same as
//! the `too_far` flag (spec §5).

use std::cell::Cell;

/// A freshly allocated symbolic variable's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub u32);

/// A symbolic value: either a concrete constant or a named variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymValue {
    Const(i64),
    Var(VarId),
}

impl SymValue {
    /// A value is determined once it is a concrete constant.
    pub fn is_determined(&self) -> bool {
        matches!(self, SymValue::Const(_))
    }

    pub fn as_const(&self) -> Option<i64> {
        match self {
            SymValue::Const(v) => Some(*v),
            SymValue::Var(_) => None,
        }
    }

    pub fn as_var(&self) -> Option<VarId> {
        match self {
            SymValue::Var(v) => Some(*v),
            SymValue::Const(_) => None,
        }
    }

    /// Replace this value by `value` if it is the variable `var`; identity
    /// otherwise. Used to propagate a solver substitution without mutating
    /// anything in place.
    pub fn substitute(&self, var: VarId, value: i64) -> SymValue {
        match self {
            SymValue::Var(v) if *v == var => SymValue::Const(value),
            other => *other,
        }
    }
}

/// Unique event identifier, prior to relabelling (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub u32);

/// Fresh-identifier source for events and symbolic variables.
///
/// Shared by reference across the whole enumeration of a test (spec §5:
/// single-threaded, depth-first, no suspension points), so plain `Cell`s
/// are sufficient — no locking, no atomics.
#[derive(Debug, Default)]
pub struct IdGen {
    next_event: Cell<u32>,
    next_var: Cell<u32>,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_event(&self) -> EventId {
        let id = self.next_event.get();
        self.next_event.set(id + 1);
        EventId(id)
    }

    pub fn fresh_var(&self) -> SymValue {
        let id = self.next_var.get();
        self.next_var.set(id + 1);
        SymValue::Var(VarId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_distinct() {
        let ids = IdGen::new();
        let a = ids.fresh_event();
        let b = ids.fresh_event();
        assert_ne!(a, b);
        let x = ids.fresh_var();
        let y = ids.fresh_var();
        assert_ne!(x, y);
    }

    #[test]
    fn substitute_replaces_matching_var_only() {
        let v0 = VarId(0);
        let v1 = VarId(1);
        assert_eq!(SymValue::Var(v0).substitute(v0, 7), SymValue::Const(7));
        assert_eq!(
            SymValue::Var(v1).substitute(v0, 7),
            SymValue::Var(v1)
        );
        assert_eq!(SymValue::Const(3).substitute(v0, 7), SymValue::Const(3));
    }

    #[test]
    fn is_determined() {
        assert!(SymValue::Const(0).is_determined());
        assert!(!SymValue::Var(VarId(0)).is_determined());
    }
}
