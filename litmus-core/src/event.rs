//! Events and event structures (spec §3).
//!
//! `Event` plays the role `InsnSpec` plays in
//! `core/translate/monadic/insn.rs`: a plain data record describing one
//! occurrence, built once by the driver and never mutated afterwards except
//! by whole-structure substitution.

use std::collections::{BTreeSet, HashMap, HashSet};

use bitflags::bitflags;

use crate::location::{Location, ThreadId};
use crate::value::{EventId, SymValue, VarId};

bitflags! {
    /// Instruction-set-specific annotations on an event (acquire/release,
    /// exclusivity, atomicity). Kept as a bitflags set rather than booleans
    /// because the set of relevant annotations is owned by the instruction
    /// semantics module, not this core (spec §3: "annotation sets (e.g.,
    /// acquire/release/exclusive markers specific to the instruction set)").
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Annotations: u8 {
        const ACQUIRE  = 0b0001;
        const RELEASE  = 0b0010;
        const EXCLUSIVE = 0b0100;
        const ATOMIC   = 0b1000;
    }
}

/// What kind of occurrence an event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MemoryRead,
    MemoryWrite,
    RegisterRead,
    RegisterWrite,
    Barrier,
    AtomicMarker,
    InitWrite,
}

impl EventKind {
    pub fn is_memory(&self) -> bool {
        matches!(
            self,
            EventKind::MemoryRead | EventKind::MemoryWrite | EventKind::InitWrite
        )
    }

    pub fn is_load(&self) -> bool {
        matches!(self, EventKind::MemoryRead | EventKind::RegisterRead)
    }

    pub fn is_store(&self) -> bool {
        matches!(
            self,
            EventKind::MemoryWrite | EventKind::RegisterWrite | EventKind::InitWrite
        )
    }
}

/// A single atomic occurrence in a candidate execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub thread: ThreadId,
    pub po_index: u32,
    pub kind: EventKind,
    pub location: Option<Location>,
    pub read_value: Option<SymValue>,
    pub written_value: Option<SymValue>,
    pub annotations: Annotations,
}

impl Event {
    pub fn is_memory(&self) -> bool {
        self.kind.is_memory()
    }

    /// Apply a solver substitution `var := value` to every symbolic field.
    /// Returns a fresh `Event`; the original is left untouched (spec §3:
    /// "events ... never mutated thereafter except by variable
    /// substitution, which replaces a symbolic value atom by a constant
    /// throughout").
    pub fn substitute(&self, var: VarId, value: i64) -> Event {
        Event {
            location: self.location.map(|l| l.substitute(var, value)),
            read_value: self.read_value.map(|v| v.substitute(var, value)),
            written_value: self.written_value.map(|v| v.substitute(var, value)),
            ..self.clone()
        }
    }
}

/// A relation over events, represented as an edge set. Used for both
/// `intra-causality-data` and `intra-causality-control`.
pub type Relation = BTreeSet<(EventId, EventId)>;

/// Transitive closure of a direct-edge relation via one DFS per source
/// node. Event structures are at most a few hundred events (spec §9), so
/// the naive per-node reachability walk is adequate.
fn transitive_closure(direct: &Relation) -> Relation {
    let mut adjacency: HashMap<EventId, Vec<EventId>> = HashMap::new();
    for &(from, to) in direct {
        adjacency.entry(from).or_default().push(to);
    }

    let mut closure = Relation::new();
    for &start in adjacency.keys() {
        let mut stack = adjacency.get(&start).cloned().unwrap_or_default();
        let mut seen: HashSet<EventId> = HashSet::new();
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            closure.insert((start, node));
            if let Some(next) = adjacency.get(&node) {
                stack.extend(next.iter().copied());
            }
        }
    }
    closure
}

/// The set of events of a candidate execution together with its intra-thread
/// ordering relations (spec §3).
#[derive(Debug, Clone, Default)]
pub struct EventStructure {
    pub events: Vec<Event>,
    pub data: Relation,
    pub control: Relation,
    pub threads: Vec<ThreadId>,
}

impl EventStructure {
    pub fn event(&self, id: EventId) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn memory_events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| e.is_memory())
    }

    pub fn memory_loads(&self) -> impl Iterator<Item = &Event> {
        self.events
            .iter()
            .filter(|e| e.kind == EventKind::MemoryRead)
    }

    pub fn memory_stores(&self) -> impl Iterator<Item = &Event> {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::MemoryWrite | EventKind::InitWrite))
    }

    pub fn register_loads(&self) -> impl Iterator<Item = &Event> {
        self.events
            .iter()
            .filter(|e| e.kind == EventKind::RegisterRead)
    }

    pub fn register_stores(&self) -> impl Iterator<Item = &Event> {
        self.events
            .iter()
            .filter(|e| e.kind == EventKind::RegisterWrite)
    }

    /// `po_iico`: program order extended with intra-instruction causal
    /// order (spec §4.5) — the transitive closure of `data` union `control`.
    /// Spec §4.3/§4.4/§4.5's "strictly before in po_iico" means transitive
    /// reachability, not just the direct edges the driver inserts between
    /// adjacent instructions, so the closure is computed here rather than
    /// left to callers.
    pub fn po_iico(&self) -> Relation {
        transitive_closure(&self.data.union(&self.control).cloned().collect())
    }

    /// `true` iff `a` strictly precedes `b` in `po_iico`.
    pub fn precedes(&self, a: EventId, b: EventId) -> bool {
        self.po_iico().contains(&(a, b))
    }

    /// Events on `thread` with no successor on the same thread within this
    /// structure — the "exit points" a following fragment's events chain
    /// onto.
    pub fn maximal_on_thread(&self, thread: crate::location::ThreadId) -> Vec<EventId> {
        let ids: Vec<EventId> = self
            .events
            .iter()
            .filter(|e| e.thread == thread)
            .map(|e| e.id)
            .collect();
        ids.iter()
            .copied()
            .filter(|&id| !ids.iter().any(|&other| other != id && self.precedes(id, other)))
            .collect()
    }

    /// Events on `thread` with no predecessor on the same thread within
    /// this structure — the "entry points" a preceding fragment's events
    /// chain into.
    pub fn minimal_on_thread(&self, thread: crate::location::ThreadId) -> Vec<EventId> {
        let ids: Vec<EventId> = self
            .events
            .iter()
            .filter(|e| e.thread == thread)
            .map(|e| e.id)
            .collect();
        ids.iter()
            .copied()
            .filter(|&id| !ids.iter().any(|&other| other != id && self.precedes(other, id)))
            .collect()
    }

    /// A structure containing a single event and no relations, the unit
    /// the instruction driver builds on for each emitted occurrence.
    pub fn singleton(event: Event) -> EventStructure {
        let thread = event.thread;
        EventStructure {
            events: vec![event],
            data: Relation::new(),
            control: Relation::new(),
            threads: vec![thread],
        }
    }

    /// Union two structures built on disjoint event sets: concatenate
    /// events, union both relations and the thread list. This is the
    /// structure-level half of `parallel-compose` and `sequence-then`
    /// (spec §9): both combinators grow the event set, never shrink it.
    pub fn merge(&self, other: &EventStructure) -> EventStructure {
        let mut events = self.events.clone();
        events.extend(other.events.iter().cloned());
        let mut threads = self.threads.clone();
        for t in &other.threads {
            if !threads.contains(t) {
                threads.push(*t);
            }
        }
        EventStructure {
            events,
            data: self.data.union(&other.data).cloned().collect(),
            control: self.control.union(&other.control).cloned().collect(),
            threads,
        }
    }

    /// Apply a substitution to every event, leaving relations untouched
    /// (relations are over identifiers, which substitution never changes).
    pub fn substitute(&self, var: VarId, value: i64) -> EventStructure {
        EventStructure {
            events: self.events.iter().map(|e| e.substitute(var, value)).collect(),
            data: self.data.clone(),
            control: self.control.clone(),
            threads: self.threads.clone(),
        }
    }

    /// Debug-only acyclicity check for a single thread's relations (spec
    /// §3 invariant: both relations are acyclic within any single thread).
    #[cfg(debug_assertions)]
    pub fn assert_acyclic_per_thread(&self) {
        for &thread in &self.threads {
            let ids: Vec<EventId> = self
                .events
                .iter()
                .filter(|e| e.thread == thread)
                .map(|e| e.id)
                .collect();
            let edges: Vec<(EventId, EventId)> = self
                .po_iico()
                .iter()
                .filter(|(a, b)| ids.contains(a) && ids.contains(b))
                .cloned()
                .collect();
            debug_assert!(
                !crate::cycle::has_cycle(&ids, &edges),
                "intra-thread po_iico must be acyclic for thread {thread:?}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_event(id: u32, thread: u32, kind: EventKind) -> Event {
        Event {
            id: EventId(id),
            thread: ThreadId(thread),
            po_index: id,
            kind,
            location: None,
            read_value: None,
            written_value: None,
            annotations: Annotations::empty(),
        }
    }

    #[test]
    fn po_iico_is_union_of_data_and_control() {
        let mut es = EventStructure {
            events: vec![
                mk_event(0, 0, EventKind::MemoryWrite),
                mk_event(1, 0, EventKind::MemoryRead),
            ],
            threads: vec![ThreadId(0)],
            ..Default::default()
        };
        es.data.insert((EventId(0), EventId(1)));
        assert!(es.precedes(EventId(0), EventId(1)));
        assert!(!es.precedes(EventId(1), EventId(0)));
    }

    #[test]
    fn precedes_sees_through_a_chain_of_control_edges() {
        // Mov r1, 1; Mov r2, 2; Store x, r1 — three instructions chained
        // by `control` edges two hops apart. `precedes` must still see the
        // first event as before the last.
        let mut es = EventStructure {
            events: vec![
                mk_event(0, 0, EventKind::RegisterWrite),
                mk_event(1, 0, EventKind::RegisterWrite),
                mk_event(2, 0, EventKind::MemoryWrite),
            ],
            threads: vec![ThreadId(0)],
            ..Default::default()
        };
        es.control.insert((EventId(0), EventId(1)));
        es.control.insert((EventId(1), EventId(2)));
        assert!(es.precedes(EventId(0), EventId(2)));
        assert!(!es.precedes(EventId(2), EventId(0)));
    }

    #[test]
    fn substitute_rewrites_symbolic_fields_only() {
        let mut e = mk_event(0, 0, EventKind::MemoryWrite);
        e.written_value = Some(SymValue::Var(VarId(3)));
        let substituted = e.substitute(VarId(3), 9);
        assert_eq!(substituted.written_value, Some(SymValue::Const(9)));
    }
}
