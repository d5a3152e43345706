//! Delegation state storage trait.

use rewards_ledger::{derive, overstake_factor, DelegationState, DelegationStateBalanceInfo};
use rewards_types::{Address, Cycle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::retention::RetentionPolicy;
use crate::statistics::CycleStatistics;
use crate::StoreError;

/// A reconstructed state together with its derived per-address figures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDelegationState {
    pub state: DelegationState,
    /// Overstake factor in millionths the balances were derived with.
    pub overstake_factor: i64,
    pub balances: BTreeMap<Address, DelegationStateBalanceInfo>,
}

impl StoredDelegationState {
    /// Derive balances from `state` using the staking parameters it carries.
    pub fn from_state(state: DelegationState) -> Self {
        let overstake_factor = overstake_factor(&state, &state.parameters);
        let balances = derive(&state, &state.parameters);
        Self {
            state,
            overstake_factor,
            balances,
        }
    }

    pub fn delegate(&self) -> &Address {
        &self.state.delegate
    }

    pub fn cycle(&self) -> Cycle {
        self.state.cycle
    }
}

/// Persistent storage for delegation states, keyed by (delegate, cycle).
///
/// Writes replace whole records, so concurrent writers of the same key resolve
/// as last writer wins.
pub trait DelegationStateStore: Send + Sync {
    /// Retention policy applied by [`prune`](Self::prune).
    fn retention(&self) -> RetentionPolicy;

    /// Get the state of `delegate` for `cycle`, or [`StoreError::NotFound`].
    fn get(&self, delegate: &Address, cycle: Cycle) -> Result<StoredDelegationState, StoreError>;

    /// Insert the state, replacing any existing record with the same key.
    fn upsert(&self, state: &StoredDelegationState) -> Result<(), StoreError>;

    fn exists(&self, delegate: &Address, cycle: Cycle) -> Result<bool, StoreError>;

    /// All states of `cycle`, ordered by delegate.
    fn states_for_cycle(&self, cycle: Cycle) -> Result<Vec<StoredDelegationState>, StoreError>;

    /// Delete every state with a cycle below `cycle`. Returns how many were deleted.
    fn delete_before(&self, cycle: Cycle) -> Result<usize, StoreError>;

    /// Highest stored cycle, or 0 when the store is empty.
    fn last_fetched_cycle(&self) -> Result<Cycle, StoreError>;

    /// Apply the retention policy after `cycle` has been processed.
    fn prune(&self, cycle: Cycle) -> Result<usize, StoreError> {
        match self.retention().prune_below(cycle) {
            Some(below) => self.delete_before(below),
            None => Ok(0),
        }
    }

    /// Own vs external staked/delegated sums for every delegate stored at `cycle`.
    fn statistics(&self, cycle: Cycle) -> Result<CycleStatistics, StoreError> {
        let states = self.states_for_cycle(cycle)?;
        Ok(CycleStatistics::from_states(cycle, &states))
    }
}
