//! Process-wide fetch coordination.
//!
//! Tracks which delegates are being reconstructed for which cycle, so two
//! workers never reconstruct the same pair at once, and the last cycle the
//! collector finished. This is a liveness aid only; the store remains the
//! source of truth across restarts.
//!
//! One lock covers the whole state. Writers take it exclusively, readers share it.

use rewards_types::{Address, Cycle};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct FetchState {
    last_fetched_cycle: Cycle,
    delegates_being_fetched: HashMap<Cycle, HashSet<Address>>,
}

/// Shared fetch bookkeeping. Construct one per collector and share it via `Arc`.
#[derive(Debug, Default)]
pub struct FetchCoordinator {
    state: RwLock<FetchState>,
}

impl FetchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, FetchState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FetchState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mark_fetching(&self, cycle: Cycle, delegates: &[Address]) {
        self.write()
            .delegates_being_fetched
            .entry(cycle)
            .or_default()
            .extend(delegates.iter().cloned());
    }

    pub fn unmark_fetching(&self, cycle: Cycle, delegates: &[Address]) {
        let mut state = self.write();
        if let Some(set) = state.delegates_being_fetched.get_mut(&cycle) {
            for delegate in delegates {
                set.remove(delegate);
            }
            if set.is_empty() {
                state.delegates_being_fetched.remove(&cycle);
            }
        }
    }

    pub fn is_fetching(&self, cycle: Cycle, delegate: &Address) -> bool {
        self.read()
            .delegates_being_fetched
            .get(&cycle)
            .is_some_and(|set| set.contains(delegate))
    }

    /// Number of delegates in flight for `cycle`.
    pub fn fetching_count(&self, cycle: Cycle) -> usize {
        self.read()
            .delegates_being_fetched
            .get(&cycle)
            .map_or(0, HashSet::len)
    }

    pub fn set_last_fetched_cycle(&self, cycle: Cycle) {
        self.write().last_fetched_cycle = cycle;
    }

    /// Raise the last fetched cycle to `cycle`; never lowers it.
    pub fn advance_last_fetched_cycle(&self, cycle: Cycle) {
        let mut state = self.write();
        state.last_fetched_cycle = state.last_fetched_cycle.max(cycle);
    }

    pub fn last_fetched_cycle(&self) -> Cycle {
        self.read().last_fetched_cycle
    }

    /// Mark `(cycle, delegate)` as in flight unless it already is.
    ///
    /// The check and the mark happen under one write lock. The returned guard
    /// unmarks the pair when dropped, on every exit path.
    pub fn begin(self: &Arc<Self>, cycle: Cycle, delegate: &Address) -> Option<FetchGuard> {
        let mut state = self.write();
        let inserted = state
            .delegates_being_fetched
            .entry(cycle)
            .or_default()
            .insert(delegate.clone());
        if !inserted {
            return None;
        }
        Some(FetchGuard {
            coordinator: Arc::clone(self),
            cycle,
            delegate: delegate.clone(),
        })
    }
}

/// Holds a `(cycle, delegate)` pair in flight until dropped.
#[derive(Debug)]
pub struct FetchGuard {
    coordinator: Arc<FetchCoordinator>,
    cycle: Cycle,
    delegate: Address,
}

impl FetchGuard {
    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    pub fn delegate(&self) -> &Address {
        &self.delegate
    }
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        self.coordinator
            .unmark_fetching(self.cycle, std::slice::from_ref(&self.delegate));
    }
}
