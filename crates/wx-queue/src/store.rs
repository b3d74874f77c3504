//! Latest-state store for every connected station

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use wx_core::{CompleteReading, StationId, StationRecord};

/// Slot membership; each station id appears in exactly one slot
#[derive(Debug)]
struct SlotTable {
    assigned: HashMap<StationId, usize>,
    slots: Vec<Vec<StationId>>,
}

/// Result of draining one slot
#[derive(Debug, Default)]
pub struct SlotDrain {
    /// Complete readings that were new, in slot order
    pub due: Vec<CompleteReading>,
    /// Stations that were new but still missing fields; these updates are dropped
    pub incomplete: Vec<StationId>,
}

/// Canonical per-station records plus their flush slot assignment.
///
/// The slot table and the record map sit behind separate locks so that
/// registering a new station never waits on merges and vice versa.
#[derive(Debug)]
pub struct StationStore {
    slot_count: usize,
    next_slot: AtomicUsize,
    slots: Mutex<SlotTable>,
    records: Mutex<HashMap<StationId, StationRecord>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // No critical section leaves partial state behind; poisoning is ignored
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StationStore {
    /// Create a store whose stations are spread over `slot_count` slots
    pub fn new(slot_count: usize) -> Self {
        let slot_count = slot_count.max(1);
        Self {
            slot_count,
            next_slot: AtomicUsize::new(0),
            slots: Mutex::new(SlotTable {
                assigned: HashMap::new(),
                slots: vec![Vec::new(); slot_count],
            }),
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Accept one or more freshly parsed readings.
    ///
    /// Unseen stations are assigned a slot and stored as-is; known stations
    /// have the reading merged into their canonical record.
    pub fn on_data_receive<I>(&self, records: I)
    where
        I: IntoIterator<Item = StationRecord>,
    {
        let records: Vec<StationRecord> = records.into_iter().collect();
        if records.is_empty() {
            return;
        }

        {
            let mut table = lock(&self.slots);
            for record in &records {
                if table.assigned.contains_key(&record.station_id) {
                    continue;
                }
                let slot = self.next_slot.fetch_add(1, Ordering::Relaxed) % self.slot_count;
                table.assigned.insert(record.station_id, slot);
                table.slots[slot].push(record.station_id);
                debug!(station = record.station_id, slot, "Registered station");
            }
        }

        let mut latest = lock(&self.records);
        for mut record in records {
            match latest.get_mut(&record.station_id) {
                Some(existing) => existing.merge_from(&record),
                None => {
                    record.is_new = true;
                    latest.insert(record.station_id, record);
                }
            }
        }
    }

    /// Slot a station was assigned when first seen
    pub fn slot_of(&self, station_id: StationId) -> Option<usize> {
        lock(&self.slots).assigned.get(&station_id).copied()
    }

    /// Snapshot of a station's canonical record
    pub fn latest(&self, station_id: StationId) -> Option<StationRecord> {
        lock(&self.records).get(&station_id).cloned()
    }

    pub fn station_count(&self) -> usize {
        lock(&self.slots).assigned.len()
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Consume every new record of the stations assigned to `slot`.
    ///
    /// Each consumed record is demoted (`is_new = false`) whether or not it
    /// was complete, so an update is dispatched at most once.
    pub fn drain_slot(&self, slot: usize) -> SlotDrain {
        let station_ids = match lock(&self.slots).slots.get(slot) {
            Some(ids) => ids.clone(),
            None => return SlotDrain::default(),
        };

        let mut drain = SlotDrain::default();
        let mut latest = lock(&self.records);
        for station_id in station_ids {
            let Some(record) = latest.get_mut(&station_id) else {
                continue;
            };
            if !record.is_new {
                continue;
            }
            record.is_new = false;

            match record.to_complete() {
                Some(reading) => drain.due.push(reading),
                None => drain.incomplete.push(station_id),
            }
        }
        drain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::complete_record;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_round_robin_assignment() {
        let store = StationStore::new(4);
        store.on_data_receive((1..=6).map(|id| StationRecord::new(id, 0)));

        assert_eq!(store.slot_of(1), Some(0));
        assert_eq!(store.slot_of(2), Some(1));
        assert_eq!(store.slot_of(4), Some(3));
        assert_eq!(store.slot_of(5), Some(0));
        assert_eq!(store.slot_of(6), Some(1));
        assert_eq!(store.slot_of(99), None);
    }

    #[test]
    fn test_assignment_is_permanent() {
        let store = StationStore::new(10);
        store.on_data_receive([StationRecord::new(1, 0), StationRecord::new(2, 0)]);
        let before = store.slot_of(2);

        for round in 0..20 {
            store.on_data_receive([StationRecord::new(2, round), StationRecord::new(100 + round as i32, 0)]);
        }

        assert_eq!(store.slot_of(2), before);
        assert_eq!(store.station_count(), 22);
    }

    #[test]
    fn test_concurrent_registration_lands_in_one_slot() {
        let store = Arc::new(StationStore::new(7));

        std::thread::scope(|scope| {
            for producer in 0..8 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for id in 0..500 {
                        // Every producer reports the same stations
                        store.on_data_receive([StationRecord::new(id, producer)]);
                    }
                });
            }
        });

        assert_eq!(store.station_count(), 500);
        let table = lock(&store.slots);
        let mut seen = HashSet::new();
        for (slot, ids) in table.slots.iter().enumerate() {
            for id in ids {
                assert!(seen.insert(*id), "station {id} in more than one slot");
                assert_eq!(table.assigned[id], slot);
            }
        }
        assert_eq!(seen.len(), 500);
    }

    #[test]
    fn test_merge_into_canonical_record() {
        let store = StationStore::new(2);

        let mut first = StationRecord::new(8, 100);
        first.temperature = Some(20.0);
        first.has_hailed = Some(true);
        store.on_data_receive([first]);

        let mut second = StationRecord::new(8, 110);
        second.visibility = Some(9.5);
        store.on_data_receive(Some(second));

        let latest = store.latest(8).unwrap();
        assert_eq!(latest.timestamp, 110);
        assert_eq!(latest.temperature, Some(20.0));
        assert_eq!(latest.has_hailed, Some(true));
        assert_eq!(latest.visibility, Some(9.5));
        assert!(latest.is_new);
    }

    #[test]
    fn test_drain_consumes_once() {
        let store = StationStore::new(1);
        store.on_data_receive([complete_record(1, 10), complete_record(2, 10)]);

        let drain = store.drain_slot(0);
        assert_eq!(drain.due.len(), 2);
        assert!(drain.incomplete.is_empty());

        let again = store.drain_slot(0);
        assert!(again.due.is_empty());

        store.on_data_receive([StationRecord::new(2, 20)]);
        let after_update = store.drain_slot(0);
        assert_eq!(after_update.due.len(), 1);
        assert_eq!(after_update.due[0].station_id, 2);
        assert_eq!(after_update.due[0].timestamp, 20);
    }

    #[test]
    fn test_drain_drops_incomplete() {
        let store = StationStore::new(1);
        let mut partial = complete_record(5, 10);
        partial.temperature = None;
        store.on_data_receive([partial, complete_record(6, 10)]);

        let drain = store.drain_slot(0);
        assert_eq!(drain.incomplete, vec![5]);
        assert_eq!(drain.due.len(), 1);
        assert_eq!(drain.due[0].station_id, 6);

        // Demoted even though it was never sent
        assert!(!store.latest(5).unwrap().is_new);
        assert!(store.drain_slot(0).incomplete.is_empty());
    }

    #[test]
    fn test_drain_only_touches_its_slot() {
        let store = StationStore::new(3);
        store.on_data_receive((1..=3).map(|id| complete_record(id, 0)));

        let drain = store.drain_slot(1);
        assert_eq!(drain.due.len(), 1);
        assert_eq!(drain.due[0].station_id, 2);
        assert!(store.latest(1).unwrap().is_new);
        assert!(store.latest(3).unwrap().is_new);

        assert!(store.drain_slot(7).due.is_empty());
    }
}
