//! The event relabeller (spec §4.2): renumbers events so memory events
//! occupy the contiguous prefix `0..n_mem-1`, a precondition the rest of
//! the pipeline (§4.3 onward) relies on when iterating "by event
//! identifier" for stable ordering (spec §5).

use std::collections::HashMap;

use crate::event::EventStructure;
use crate::value::EventId;

/// Compute the relabelling and apply it, returning a fresh structure.
/// Idempotent: relabelling an already-relabelled structure is the identity
/// (spec §8), since memory events are already first in original order and
/// get assigned their own identifiers back.
pub fn relabel(structure: &EventStructure) -> EventStructure {
    let mapping = build_mapping(structure);
    apply_mapping(structure, &mapping)
}

fn build_mapping(structure: &EventStructure) -> HashMap<EventId, EventId> {
    let mut mapping = HashMap::with_capacity(structure.events.len());
    let mut next = 0u32;
    for event in structure.events.iter().filter(|e| e.is_memory()) {
        mapping.insert(event.id, EventId(next));
        next += 1;
    }
    for event in structure.events.iter().filter(|e| !e.is_memory()) {
        mapping.insert(event.id, EventId(next));
        next += 1;
    }
    mapping
}

fn apply_mapping(structure: &EventStructure, mapping: &HashMap<EventId, EventId>) -> EventStructure {
    let events = structure
        .events
        .iter()
        .map(|e| {
            let mut e = e.clone();
            e.id = mapping[&e.id];
            e
        })
        .collect();
    let remap_relation = |rel: &crate::event::Relation| {
        rel.iter().map(|(a, b)| (mapping[a], mapping[b])).collect()
    };
    EventStructure {
        events,
        data: remap_relation(&structure.data),
        control: remap_relation(&structure.control),
        threads: structure.threads.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Annotations, Event, EventKind};
    use crate::location::ThreadId;

    fn mk(id: u32, kind: EventKind) -> Event {
        Event {
            id: EventId(id),
            thread: ThreadId(0),
            po_index: id,
            kind,
            location: None,
            read_value: None,
            written_value: None,
            annotations: Annotations::empty(),
        }
    }

    #[test]
    fn memory_events_become_the_contiguous_prefix() {
        let structure = EventStructure {
            events: vec![
                mk(0, EventKind::RegisterRead),
                mk(1, EventKind::MemoryWrite),
                mk(2, EventKind::RegisterWrite),
                mk(3, EventKind::MemoryRead),
            ],
            threads: vec![ThreadId(0)],
            ..Default::default()
        };
        let relabelled = relabel(&structure);
        let mem_ids: Vec<u32> = relabelled
            .memory_events()
            .map(|e| e.id.0)
            .collect();
        assert_eq!(mem_ids, vec![0, 1]);
        assert_eq!(relabelled.events.len(), 4);
    }

    #[test]
    fn relabelling_twice_is_the_identity() {
        let structure = EventStructure {
            events: vec![mk(5, EventKind::MemoryWrite), mk(1, EventKind::RegisterRead)],
            threads: vec![ThreadId(0)],
            ..Default::default()
        };
        let once = relabel(&structure);
        let twice = relabel(&once);
        assert_eq!(once.events, twice.events);
    }
}
