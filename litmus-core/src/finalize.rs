//! Finalization (spec §4.5): derived relations, final-store selection, and
//! the coherence-acyclicity gate that turns a surviving RFMap into a
//! delivered concrete execution.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;

use crate::config::{Config, SpeedCheck};
use crate::constraint::{InitialState, LocationKey, RfKey, RfMap, RfValue};
use crate::cycle;
use crate::event::{Event, EventStructure, Relation};
use crate::location::Location;
use crate::semantics::InstructionSemantics;
use crate::value::{EventId, SymValue};

/// The derived final state: every location's resolved value (spec §4.5
/// step 2).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalState {
    values: BTreeMap<i64, i64>,
}

impl FinalState {
    pub fn get(&self, address: i64) -> i64 {
        self.values.get(&address).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}

/// A fully-resolved candidate execution (spec §3: "Concrete execution").
#[derive(Debug, Clone)]
pub struct ConcreteExecution {
    pub structure: EventStructure,
    pub rfmap: RfMap,
    pub final_state: FinalState,
    pub po_iico: Relation,
    pub ppoloc: Relation,
    pub store_load_vbf: Relation,
    pub init_load_vbf: Relation,
    pub atomic_load_store: Relation,
    pub pco: Relation,
}

/// The test-level knobs finalization needs that are not part of the
/// enumerator's own `Config` (spec §4.5: "the test's observation clause",
/// "the optional test-level filter predicate").
pub struct FinalizationSpec<'a> {
    pub observed_locations: &'a [i64],
    pub filter: Option<&'a dyn Fn(&FinalState) -> bool>,
}

fn resolved_address(loc: Option<Location>) -> Option<i64> {
    match loc {
        Some(Location::Global(SymValue::Const(a))) | Some(Location::Deref(SymValue::Const(a))) => {
            Some(a)
        }
        _ => None,
    }
}

/// Run finalization over one surviving (structure, RFMap) pair, producing
/// every concrete execution it expands into.
pub fn finalize<Instr, S: InstructionSemantics<Instr>>(
    structure: &EventStructure,
    rfmap_in: &RfMap,
    init_state: &InitialState,
    config: &Config,
    semantics: &S,
    spec: &FinalizationSpec<'_>,
) -> Vec<ConcreteExecution> {
    let po_iico = structure.po_iico();
    let ppoloc = build_ppoloc(structure, &po_iico);
    let store_load_vbf = build_store_load_vbf(rfmap_in);
    let init_load_vbf = build_init_load_vbf(structure, rfmap_in);
    let atomic_load_store = build_atomic_load_store(structure, &po_iico, semantics);

    let store_groups = group_stores_by_location(structure);
    let candidate_locations: Vec<i64> = store_groups
        .keys()
        .copied()
        .filter(|addr| {
            !config.observed_finals_only || spec.observed_locations.contains(addr)
        })
        .collect();

    let candidate_lists: Vec<Vec<EventId>> = candidate_locations
        .iter()
        .map(|addr| {
            let stores = &store_groups[addr];
            if config.optace {
                dominant_stores(stores, &ppoloc)
            } else {
                stores.clone()
            }
        })
        .collect();

    let selections: Vec<Vec<EventId>> = if candidate_lists.is_empty() {
        vec![Vec::new()]
    } else {
        candidate_lists.into_iter().multi_cartesian_product().collect()
    };

    let mut results = Vec::new();
    for selection in selections {
        if let Some(concrete) = finalize_selection(
            structure,
            rfmap_in,
            init_state,
            config,
            spec,
            &candidate_locations,
            &selection,
            &po_iico,
            &ppoloc,
            &store_load_vbf,
            &init_load_vbf,
            &atomic_load_store,
        ) {
            results.push(concrete);
        }
    }
    results
}

fn group_stores_by_location(structure: &EventStructure) -> BTreeMap<i64, Vec<EventId>> {
    let mut groups: BTreeMap<i64, Vec<EventId>> = BTreeMap::new();
    for store in structure.memory_stores() {
        if let Some(addr) = resolved_address(store.location) {
            groups.entry(addr).or_default().push(store.id);
        }
    }
    for ids in groups.values_mut() {
        ids.sort();
    }
    groups
}

/// Stores not strictly before any other store to the same location under
/// `ppoloc`: a write with a later same-thread write to the same location
/// can never be the final value (spec §4.5: "the set of stores not
/// strictly before any other store to the same location").
fn dominant_stores(stores: &[EventId], ppoloc: &Relation) -> Vec<EventId> {
    stores
        .iter()
        .copied()
        .filter(|&s| !stores.iter().any(|&s2| s2 != s && ppoloc.contains(&(s, s2))))
        .collect()
}

fn build_ppoloc(structure: &EventStructure, po_iico: &Relation) -> Relation {
    po_iico
        .iter()
        .filter(|(a, b)| {
            let (Some(ea), Some(eb)) = (structure.event(*a), structure.event(*b)) else {
                return false;
            };
            ea.is_memory()
                && eb.is_memory()
                && resolved_address(ea.location).is_some()
                && resolved_address(ea.location) == resolved_address(eb.location)
        })
        .cloned()
        .collect()
}

fn build_store_load_vbf(rfmap: &RfMap) -> Relation {
    rfmap
        .iter()
        .filter_map(|(k, v)| match (k, v) {
            (RfKey::Load(r), RfValue::Store(w)) => Some((*w, *r)),
            _ => None,
        })
        .collect()
}

fn build_init_load_vbf(structure: &EventStructure, rfmap: &RfMap) -> Relation {
    let mut rel = Relation::new();
    for (k, v) in rfmap.iter() {
        let (RfKey::Load(r), RfValue::Init) = (k, v) else {
            continue;
        };
        let Some(load) = structure.event(*r) else { continue };
        let Some(addr) = resolved_address(load.location) else {
            continue;
        };
        for store in structure.memory_stores() {
            if resolved_address(store.location) == Some(addr) {
                rel.insert((*r, store.id));
            }
        }
    }
    rel
}

fn build_atomic_load_store<Instr, S: InstructionSemantics<Instr>>(
    structure: &EventStructure,
    po_iico: &Relation,
    semantics: &S,
) -> Relation {
    use crate::event::EventKind;

    let mut rel = Relation::new();
    let atomics: Vec<&Event> = structure
        .events
        .iter()
        .filter(|e| e.annotations.contains(crate::event::Annotations::ATOMIC))
        .collect();

    for &r in atomics.iter().filter(|e| e.kind == EventKind::MemoryRead) {
        for &w in atomics.iter().filter(|e| e.kind == EventKind::MemoryWrite) {
            if resolved_address(r.location) != resolved_address(w.location) {
                continue;
            }
            if !po_iico.contains(&(r.id, w.id)) {
                continue;
            }
            if !semantics.atomic_pair_allowed(r, w) {
                continue;
            }
            let intervening = atomics.iter().any(|e| {
                e.id != r.id
                    && e.id != w.id
                    && resolved_address(e.location) == resolved_address(r.location)
                    && po_iico.contains(&(r.id, e.id))
                    && po_iico.contains(&(e.id, w.id))
            });
            if !intervening {
                rel.insert((r.id, w.id));
            }
        }
    }
    rel
}

#[allow(clippy::too_many_arguments)]
fn finalize_selection(
    structure: &EventStructure,
    rfmap_in: &RfMap,
    init_state: &InitialState,
    config: &Config,
    spec: &FinalizationSpec<'_>,
    candidate_locations: &[i64],
    selection: &[EventId],
    po_iico: &Relation,
    ppoloc: &Relation,
    store_load_vbf: &Relation,
    init_load_vbf: &Relation,
    atomic_load_store: &Relation,
) -> Option<ConcreteExecution> {
    let mut rfmap = rfmap_in.clone();
    let mut finals: BTreeMap<i64, Option<EventId>> = BTreeMap::new();
    for (&addr, &store) in candidate_locations.iter().zip(selection.iter()) {
        rfmap.insert(RfKey::Final(LocationKey(addr)), RfValue::Store(store));
        finals.insert(addr, Some(store));
    }

    let addresses_with_loads: HashSet<i64> = structure
        .memory_loads()
        .filter_map(|l| resolved_address(l.location))
        .collect();
    for addr in addresses_with_loads {
        if !finals.contains_key(&addr) {
            rfmap.insert(RfKey::Final(LocationKey(addr)), RfValue::Init);
            finals.insert(addr, None);
        }
    }

    let final_state = build_final_state(structure, init_state, &finals);

    if config.check_filter {
        if let Some(filter) = spec.filter {
            if !filter(&final_state) {
                return None;
            }
        }
    }
    if config.speedcheck != SpeedCheck::Off {
        if let Some(filter) = spec.filter {
            if !filter(&final_state) {
                return None;
            }
        }
    }

    let last_store_vbf = build_last_store_vbf(structure, &finals);

    let mut pco = Relation::new();
    if config.initwrites {
        seed_init_writes(structure, &finals, &mut pco);
    }
    if config.optace {
        if apply_uniproc(structure, ppoloc, &rfmap, &mut pco).is_err() {
            return None;
        }
    }
    for edge in &last_store_vbf {
        pco.insert(*edge);
    }

    let mem_ids: Vec<EventId> = structure.memory_events().map(|e| e.id).collect();
    if cycle::has_cycle(&mem_ids, &pco.iter().cloned().collect::<Vec<_>>()) {
        return None;
    }

    Some(ConcreteExecution {
        structure: structure.clone(),
        rfmap,
        final_state,
        po_iico: po_iico.clone(),
        ppoloc: ppoloc.clone(),
        store_load_vbf: store_load_vbf.clone(),
        init_load_vbf: init_load_vbf.clone(),
        atomic_load_store: atomic_load_store.clone(),
        pco,
    })
}

fn build_final_state(
    structure: &EventStructure,
    init_state: &InitialState,
    finals: &BTreeMap<i64, Option<EventId>>,
) -> FinalState {
    let mut values = BTreeMap::new();
    for (&addr, &chosen) in finals {
        let value = match chosen {
            Some(store_id) => structure
                .event(store_id)
                .and_then(|e| e.written_value)
                .and_then(|v| v.as_const())
                .unwrap_or_else(|| init_state.get(addr)),
            None => init_state.get(addr),
        };
        values.insert(addr, value);
    }
    FinalState { values }
}

fn build_last_store_vbf(
    structure: &EventStructure,
    finals: &BTreeMap<i64, Option<EventId>>,
) -> Relation {
    let mut rel = Relation::new();
    for (&addr, &chosen) in finals {
        let Some(w) = chosen else { continue };
        for store in structure.memory_stores() {
            if store.id != w && resolved_address(store.location) == Some(addr) {
                rel.insert((store.id, w));
            }
        }
        for load in structure.memory_loads() {
            if load.id != w && resolved_address(load.location) == Some(addr) {
                rel.insert((load.id, w));
            }
        }
    }
    rel
}

fn seed_init_writes(
    structure: &EventStructure,
    finals: &BTreeMap<i64, Option<EventId>>,
    pco: &mut Relation,
) {
    use crate::event::EventKind;

    for init_write in structure
        .events
        .iter()
        .filter(|e| e.kind == EventKind::InitWrite)
    {
        let Some(addr) = resolved_address(init_write.location) else {
            continue;
        };
        if finals.contains_key(&addr) {
            for store in structure.memory_stores() {
                if store.id != init_write.id && resolved_address(store.location) == Some(addr) {
                    pco.insert((init_write.id, store.id));
                }
            }
        }
    }
}

/// The "uniproc" derivation (spec §4.5, §9 glossary): if load `r` precedes
/// `r'` under `ppoloc` and `r` reads from `w`, then `w` must precede
/// whatever `r'` reads from. Returns `Err` the moment a reverse edge is
/// already present, signalling an immediate conflict (spec: "if that
/// derivation detects a conflict, skip the entire structure").
fn apply_uniproc(
    structure: &EventStructure,
    ppoloc: &Relation,
    rfmap: &RfMap,
    pco: &mut Relation,
) -> Result<(), ()> {
    let loads: Vec<&Event> = structure.memory_loads().collect();
    for &(a, b) in ppoloc {
        let (Some(r), Some(r_prime)) = (
            loads.iter().find(|e| e.id == a),
            loads.iter().find(|e| e.id == b),
        ) else {
            continue;
        };
        let w = rfmap.get(&RfKey::Load(r.id));
        let w_prime = rfmap.get(&RfKey::Load(r_prime.id));
        match (w, w_prime) {
            (Some(RfValue::Store(w)), Some(RfValue::Store(w_prime))) => {
                if w == w_prime {
                    continue;
                }
                if pco.contains(&(*w_prime, *w)) {
                    return Err(());
                }
                pco.insert((*w, *w_prime));
            }
            (Some(RfValue::Store(_)), Some(RfValue::Init)) => {
                // `r` reads a real store, `r'` reads Init, yet `r` must
                // precede `r'`: impossible, the store would have to
                // precede the initial state.
                return Err(());
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Annotations, EventKind};
    use crate::location::ThreadId;

    struct NoSemantics;
    impl InstructionSemantics<()> for NoSemantics {
        fn build(
            &self,
            _ctx: &crate::semantics::InstrContext<'_, ()>,
            _ids: &crate::value::IdGen,
        ) -> crate::semantics::InstrOutcome {
            unreachable!("not exercised in these tests")
        }
    }

    fn mem_event(id: u32, po: u32, kind: EventKind, addr: i64, value: Option<i64>) -> Event {
        Event {
            id: EventId(id),
            thread: ThreadId(0),
            po_index: po,
            kind,
            location: Some(Location::Global(SymValue::Const(addr))),
            read_value: if kind == EventKind::MemoryRead {
                value.map(SymValue::Const)
            } else {
                None
            },
            written_value: if kind == EventKind::MemoryWrite {
                value.map(SymValue::Const)
            } else {
                None
            },
            annotations: Annotations::empty(),
        }
    }

    #[test]
    fn single_write_then_read_produces_one_final_state() {
        let w = mem_event(0, 0, EventKind::MemoryWrite, 0, Some(1));
        let r = mem_event(1, 1, EventKind::MemoryRead, 0, Some(1));
        let mut structure = EventStructure {
            events: vec![w.clone(), r.clone()],
            threads: vec![ThreadId(0)],
            ..Default::default()
        };
        structure.data.insert((w.id, r.id));

        let mut rfmap = RfMap::new();
        rfmap.insert(RfKey::Load(r.id), RfValue::Store(w.id));

        let config = Config::default();
        let fspec = FinalizationSpec {
            observed_locations: &[0],
            filter: None,
        };
        let results = finalize(&structure, &rfmap, &InitialState::new(), &config, &NoSemantics, &fspec);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].final_state.get(0), 1);
    }

    #[test]
    fn filter_rejects_matching_final_state() {
        let w = mem_event(0, 0, EventKind::MemoryWrite, 0, Some(1));
        let structure = EventStructure {
            events: vec![w.clone()],
            threads: vec![ThreadId(0)],
            ..Default::default()
        };
        let rfmap = RfMap::new();
        let config = Config::default();
        let reject_all = |_: &FinalState| false;
        let fspec = FinalizationSpec {
            observed_locations: &[0],
            filter: Some(&reject_all),
        };
        let results = finalize(&structure, &rfmap, &InitialState::new(), &config, &NoSemantics, &fspec);
        assert!(results.is_empty());
    }
}
