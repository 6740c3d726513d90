//! Cycle and validity checks (spec §4.6).
//!
//! `rfmap_is_cyclic` and `check_rfmap` both reduce to "does this small
//! directed graph over events have a cycle", so the graph algorithm lives
//! here once and the two spec-level checks are thin call sites.

use std::collections::HashMap;

use crate::event::{EventStructure, Relation};
use crate::location::Location;
use crate::constraint::{RfKey, RfMap, RfValue};
use crate::value::EventId;

/// Tarjan's SCC algorithm over `nodes`/`edges`, returning `true` iff any
/// strongly connected component has more than one node, or a node has a
/// self-loop. Spec §9: "Tarjan or Kosaraju SCC over a small directed
/// graph (events as nodes); no need for incremental structures" — there
/// are at most a few hundred events per candidate, so the naive recursive
/// formulation is adequate.
pub fn has_cycle(nodes: &[EventId], edges: &[(EventId, EventId)]) -> bool {
    let mut adjacency: HashMap<EventId, Vec<EventId>> = HashMap::new();
    for &node in nodes {
        adjacency.entry(node).or_default();
    }
    for &(from, to) in edges {
        if from == to {
            return true;
        }
        adjacency.entry(from).or_default().push(to);
    }

    let mut tarjan = Tarjan {
        adjacency,
        index: 0,
        indices: HashMap::new(),
        lowlink: HashMap::new(),
        on_stack: HashMap::new(),
        stack: Vec::new(),
    };
    for &node in nodes {
        if !tarjan.indices.contains_key(&node) {
            if tarjan.strongconnect(node) {
                return true;
            }
        }
    }
    false
}

struct Tarjan {
    adjacency: HashMap<EventId, Vec<EventId>>,
    index: u32,
    indices: HashMap<EventId, u32>,
    lowlink: HashMap<EventId, u32>,
    on_stack: HashMap<EventId, bool>,
    stack: Vec<EventId>,
}

impl Tarjan {
    /// Returns `true` as soon as a nontrivial SCC is found, short-circuiting
    /// the rest of the search (the caller only wants a yes/no answer).
    fn strongconnect(&mut self, v: EventId) -> bool {
        self.indices.insert(v, self.index);
        self.lowlink.insert(v, self.index);
        self.index += 1;
        self.stack.push(v);
        self.on_stack.insert(v, true);

        let neighbors = self.adjacency.get(&v).cloned().unwrap_or_default();
        for w in neighbors {
            if !self.indices.contains_key(&w) {
                if self.strongconnect(w) {
                    return true;
                }
                let v_low = self.lowlink[&v];
                let w_low = self.lowlink[&w];
                self.lowlink.insert(v, v_low.min(w_low));
            } else if *self.on_stack.get(&w).unwrap_or(&false) {
                let v_low = self.lowlink[&v];
                let w_idx = self.indices[&w];
                self.lowlink.insert(v, v_low.min(w_idx));
            }
        }

        if self.lowlink[&v] == self.indices[&v] {
            let mut size = 0;
            while let Some(w) = self.stack.pop() {
                self.on_stack.insert(w, false);
                size += 1;
                if w == v {
                    break;
                }
            }
            if size > 1 {
                return true;
            }
        }
        false
    }
}

/// `rfmap_is_cyclic` (spec §4.6): union of `po_iico` and
/// `{(w, r) | RFMap(Load r) = Store w}`, checked for cycles. Used only in
/// debug-only `when_unsolved` assertions (spec §9).
pub fn rfmap_is_cyclic(structure: &EventStructure, rfmap: &RfMap) -> bool {
    let node_ids: Vec<EventId> = structure.events.iter().map(|e| e.id).collect();
    let mut edges: Relation = structure.po_iico();
    for (key, value) in rfmap.iter() {
        if let (RfKey::Load(r), RfValue::Store(w)) = (key, value) {
            edges.insert((*w, *r));
        }
    }
    has_cycle(&node_ids, &edges.into_iter().collect::<Vec<_>>())
}

/// `check_rfmap` (spec §4.6, only consulted when `optace`): for each
/// memory load-to-store RF edge, reject if some other store to the same
/// location sits strictly between them in `po_iico`; for init-reads,
/// reject if any store to the same location precedes the load on its own
/// thread.
pub fn check_rfmap(structure: &EventStructure, rfmap: &RfMap) -> bool {
    let po_iico = structure.po_iico();
    for (key, value) in rfmap.iter() {
        let RfKey::Load(r) = key else { continue };
        let Some(load) = structure.event(*r) else {
            continue;
        };
        let Some(loc) = load.location else { continue };

        match value {
            RfValue::Store(w) => {
                for store in structure.memory_stores() {
                    if store.id == *w {
                        continue;
                    }
                    if same_location(store.location, Some(loc))
                        && po_iico.contains(&(*w, store.id))
                        && po_iico.contains(&(store.id, *r))
                    {
                        return false;
                    }
                }
            }
            RfValue::Init => {
                for store in structure.memory_stores() {
                    if same_location(store.location, Some(loc))
                        && po_iico.contains(&(store.id, *r))
                    {
                        return false;
                    }
                }
            }
        }
    }
    true
}

fn same_location(a: Option<Location>, b: Option<Location>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acyclic_chain_has_no_cycle() {
        let nodes = vec![EventId(0), EventId(1), EventId(2)];
        let edges = vec![(EventId(0), EventId(1)), (EventId(1), EventId(2))];
        assert!(!has_cycle(&nodes, &edges));
    }

    #[test]
    fn direct_cycle_is_detected() {
        let nodes = vec![EventId(0), EventId(1)];
        let edges = vec![(EventId(0), EventId(1)), (EventId(1), EventId(0))];
        assert!(has_cycle(&nodes, &edges));
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let nodes = vec![EventId(0)];
        let edges = vec![(EventId(0), EventId(0))];
        assert!(has_cycle(&nodes, &edges));
    }
}
