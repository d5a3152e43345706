//! Reconstructed delegation snapshot.

use rewards_types::{Address, Cycle, Level, Mutez, OperationHash, StakingParameters};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::balance_update::{BalanceUpdate, BalanceUpdateSource};

/// Balance of one tracked address at the snapshot point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBalance {
    /// Reconstructed spendable balance.
    pub balance: Mutez,
    pub staked_balance: Mutez,
    pub unstaked_balance: Mutez,
    /// Delegate the address delegates to.
    pub baker: Address,
    /// Delegate holding the address's stake. Same as `baker` unless the
    /// address stakes elsewhere.
    pub stake_baker: Address,
}

/// Position of the balance update at which the minimum was reached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: BalanceUpdateSource,
    pub operation: Option<OperationHash>,
    pub content_index: Option<usize>,
    pub internal_index: Option<usize>,
}

impl From<&BalanceUpdate> for Provenance {
    fn from(update: &BalanceUpdate) -> Self {
        Self {
            source: update.source,
            operation: update.operation.clone(),
            content_index: update.content_index,
            internal_index: update.internal_index,
        }
    }
}

/// Balances of a delegate and its delegators at the point its minimum
/// delegated balance for a cycle was reached.
///
/// `total_balance` always equals the sum of `balances`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationState {
    pub delegate: Address,
    pub cycle: Cycle,
    /// Level of the block containing the snapshot point.
    pub level: Level,
    pub balances: BTreeMap<Address, AddressBalance>,
    pub total_balance: Mutez,
    pub parameters: StakingParameters,
    pub provenance: Provenance,
}

impl DelegationState {
    pub fn balance_of(&self, address: &Address) -> Option<&Mutez> {
        self.balances.get(address).map(|b| &b.balance)
    }

    /// Staked balance of the delegate itself.
    pub fn own_staked(&self) -> Mutez {
        self.balances
            .get(&self.delegate)
            .map(|b| b.staked_balance.clone())
            .unwrap_or_default()
    }

    /// Staked balance of every address other than the delegate.
    pub fn external_staked(&self) -> Mutez {
        self.balances
            .iter()
            .filter(|(address, _)| **address != self.delegate)
            .map(|(_, b)| &b.staked_balance)
            .sum()
    }
}
