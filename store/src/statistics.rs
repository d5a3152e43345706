//! Per-cycle aggregates over stored states.

use rewards_types::{Address, Cycle, Mutez};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::delegation_state::StoredDelegationState;

/// Staked and delegated sums of one delegate, split between its own address
/// and everyone else.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateCycleStatistics {
    pub external_staked: Mutez,
    pub own_staked: Mutez,
    pub external_delegated: Mutez,
    pub own_delegated: Mutez,
}

impl DelegateCycleStatistics {
    pub fn from_state(state: &StoredDelegationState) -> Self {
        let mut stats = Self::default();
        for (address, info) in &state.balances {
            if *address == state.state.delegate {
                stats.own_staked += &info.staked_balance;
                stats.own_delegated += &info.delegated_balance;
            } else {
                stats.external_staked += &info.staked_balance;
                stats.external_delegated += &info.delegated_balance;
            }
        }
        stats
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStatistics {
    pub cycle: Cycle,
    pub delegates: BTreeMap<Address, DelegateCycleStatistics>,
}

impl CycleStatistics {
    pub fn from_states(cycle: Cycle, states: &[StoredDelegationState]) -> Self {
        let delegates = states
            .iter()
            .filter(|s| s.state.cycle == cycle)
            .map(|s| (s.state.delegate.clone(), DelegateCycleStatistics::from_state(s)))
            .collect();
        Self { cycle, delegates }
    }
}
