//! Nullable store: thread-safe in-memory delegation state storage for testing.

use rewards_store::{DelegationStateStore, RetentionPolicy, StoreError, StoredDelegationState};
use rewards_types::{Address, Cycle};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// An in-memory delegation state store.
///
/// Keys are ordered `(cycle, delegate)` like the LMDB layout, so iteration order
/// matches the real backend.
pub struct NullStateStore {
    states: Mutex<BTreeMap<(Cycle, Address), StoredDelegationState>>,
    retention: RetentionPolicy,
    upserts: AtomicUsize,
}

impl NullStateStore {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            states: Mutex::new(BTreeMap::new()),
            retention,
            upserts: AtomicUsize::new(0),
        }
    }

    /// Number of `upsert` calls so far.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.states.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored cycles, ascending, with duplicates removed.
    pub fn cycles(&self) -> Vec<Cycle> {
        let mut cycles: Vec<Cycle> = self.states.lock().unwrap().keys().map(|(c, _)| *c).collect();
        cycles.dedup();
        cycles
    }
}

impl Default for NullStateStore {
    fn default() -> Self {
        Self::new(RetentionPolicy::Archive)
    }
}

impl DelegationStateStore for NullStateStore {
    fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    fn get(&self, delegate: &Address, cycle: Cycle) -> Result<StoredDelegationState, StoreError> {
        self.states
            .lock()
            .unwrap()
            .get(&(cycle, delegate.clone()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("delegation state {delegate}@{cycle}")))
    }

    fn upsert(&self, state: &StoredDelegationState) -> Result<(), StoreError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.states
            .lock()
            .unwrap()
            .insert((state.cycle(), state.delegate().clone()), state.clone());
        Ok(())
    }

    fn exists(&self, delegate: &Address, cycle: Cycle) -> Result<bool, StoreError> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .contains_key(&(cycle, delegate.clone())))
    }

    fn states_for_cycle(&self, cycle: Cycle) -> Result<Vec<StoredDelegationState>, StoreError> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .iter()
            .filter(|((c, _), _)| *c == cycle)
            .map(|(_, state)| state.clone())
            .collect())
    }

    fn delete_before(&self, cycle: Cycle) -> Result<usize, StoreError> {
        let mut states = self.states.lock().unwrap();
        let before = states.len();
        states.retain(|(c, _), _| *c >= cycle);
        Ok(before - states.len())
    }

    fn last_fetched_cycle(&self) -> Result<Cycle, StoreError> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .keys()
            .next_back()
            .map(|(c, _)| *c)
            .unwrap_or(0))
    }
}
