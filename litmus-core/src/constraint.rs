//! Constraints and the reads-from map (spec §3).

use indexmap::IndexMap;

use crate::location::Location;
use crate::value::{EventId, SymValue, VarId};

/// A code label, as it appears in the parsed program (spec §4.1).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(pub String);

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A snapshot of the initial store, passed by value at constraint-creation
/// time so a `ReadInit` constraint can resolve without reaching back into
/// mutable state (spec §9: "the core assumes the solver resolves it using
/// the initial state snapshot passed by value at constraint-creation
/// time").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitialState {
    globals: IndexMap<i64, i64>,
    registers: IndexMap<(crate::location::ThreadId, crate::location::RegId), i64>,
}

impl InitialState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, address: i64, value: i64) {
        self.globals.insert(address, value);
    }

    /// The initial value of a global at `address`, defaulting to zero for
    /// addresses the test never mentions.
    pub fn get(&self, address: i64) -> i64 {
        self.globals.get(&address).copied().unwrap_or(0)
    }

    pub fn set_register(&mut self, thread: crate::location::ThreadId, reg: crate::location::RegId, value: i64) {
        self.registers.insert((thread, reg), value);
    }

    /// The initial value of a register, defaulting to zero.
    pub fn get_register(&self, thread: crate::location::ThreadId, reg: crate::location::RegId) -> i64 {
        self.registers.get(&(thread, reg)).copied().unwrap_or(0)
    }
}

/// An expression ranging over symbolic-value atoms, arithmetic over them,
/// and deferred initial-value lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Atom(SymValue),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    /// Emitted only when a load's location is still symbolic at
    /// constraint-creation time (spec §9); the solver resolves it against
    /// `InitialState` once the location becomes determined.
    ReadInit(Location, InitialState),
}

impl Expr {
    pub fn atom(value: SymValue) -> Expr {
        Expr::Atom(value)
    }

    pub fn constant(value: i64) -> Expr {
        Expr::Atom(SymValue::Const(value))
    }
}

/// Either an equation to add to the system, or the sentinel inserted when
/// the loop-unroll bound is exceeded (spec §3, §4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Assign(VarId, Expr),
    Unroll(Label),
}

impl Constraint {
    pub fn eq(var: VarId, value: SymValue) -> Constraint {
        Constraint::Assign(var, Expr::Atom(value))
    }

    pub fn is_unroll(&self) -> bool {
        matches!(self, Constraint::Unroll(_))
    }
}

/// A key into the reads-from map: a load occurrence, or the declared
/// final-value slot for a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RfKey {
    Load(EventId),
    Final(LocationKey),
}

/// `Location` is not `Hash`/`Eq`-friendly once it carries a symbolic
/// `SymValue`, but by the time a `Final` key is inserted (§4.5) every
/// location involved is a resolved constant, so the map key is the plain
/// address rather than the full `Location`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey(pub i64);

/// What a `RfKey` resolves to: the initial state, or a specific store
/// event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RfValue {
    Init,
    Store(EventId),
}

/// The reads-from map (spec §3). Backed by an `IndexMap` so iteration is in
/// insertion order, satisfying the stable-ordering guarantee of spec §5
/// ("stable iteration over the underlying maps/sets").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RfMap {
    entries: IndexMap<RfKey, RfValue>,
}

impl RfMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the binding for `key`. RFMaps are never edited
    /// in place in the caller's sense (spec §3: "each intermediate version
    /// is a fresh value") — callers that need that discipline should
    /// `clone` before calling `insert`.
    pub fn insert(&mut self, key: RfKey, value: RfValue) {
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: &RfKey) -> Option<&RfValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &RfKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RfKey, &RfValue)> {
        self.entries.iter()
    }

    pub fn loads(&self) -> impl Iterator<Item = (EventId, &RfValue)> {
        self.entries.iter().filter_map(|(k, v)| match k {
            RfKey::Load(e) => Some((*e, v)),
            RfKey::Final(_) => None,
        })
    }

    /// Produce a new map with `key` bound to `value`, without touching
    /// `self` — the "fresh value" discipline spec §3 asks for.
    pub fn with(&self, key: RfKey, value: RfValue) -> RfMap {
        let mut next = self.clone();
        next.insert(key, value);
        next
    }
}
