//! Chain data as the collector consumes it.
//!
//! These are decoded views of the node's JSON, reduced to what balance
//! reconstruction needs. Every balance change here is already attributed to an
//! address; changes the node reports without one (burns, mints, protocol
//! accounts) are dropped when the block is decoded.

use rewards_types::{Address, Cycle, Level, Mutez, OperationHash};
use serde::{Deserialize, Serialize};

/// A signed balance change attributed to one address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub address: Address,
    pub change: Mutez,
}

impl BalanceChange {
    pub fn new(address: Address, change: impl Into<Mutez>) -> Self {
        Self {
            address,
            change: change.into(),
        }
    }
}

/// Result of an operation emitted by a contract while executing a content item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalResult {
    pub balance_updates: Vec<BalanceChange>,
}

/// One content item of an operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationContent {
    /// Fee updates (content metadata balance updates).
    pub fee_updates: Vec<BalanceChange>,
    /// Updates of the applied operation result.
    pub result_updates: Vec<BalanceChange>,
    pub internal_results: Vec<InternalResult>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub hash: OperationHash,
    pub contents: Vec<OperationContent>,
}

/// A block: block-level balance updates plus operations grouped by validation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub level: Level,
    pub balance_updates: Vec<BalanceChange>,
    pub operations: Vec<Vec<Operation>>,
}

/// Minimum delegated balance the protocol recorded for a delegate in a cycle.
///
/// `level == 0` means no minimum was recorded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinDelegated {
    pub amount: Mutez,
    pub level: Level,
    pub cycle: Cycle,
}

impl MinDelegated {
    pub fn is_recorded(&self) -> bool {
        self.level > 0
    }
}

/// Delegate record as of some block height.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateInfo {
    pub address: Address,
    pub full_balance: Mutez,
    pub current_frozen_deposits: Mutez,
    pub delegated_contracts: Vec<Address>,
    pub min_delegated: MinDelegated,
}

impl DelegateInfo {
    /// Spendable balance of the delegate's own account: full balance less the
    /// frozen deposits.
    pub fn liquid_balance(&self) -> Mutez {
        self.full_balance.clone() - &self.current_frozen_deposits
    }
}

/// Staking position of a contract.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractStaking {
    pub staked_balance: Mutez,
    pub unstaked_balance: Mutez,
    /// Delegate holding the stake, when the contract has any staked.
    pub stake_baker: Option<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_delegated_sentinel() {
        assert!(!MinDelegated::default().is_recorded());
        let recorded = MinDelegated {
            amount: Mutez::from(10),
            level: 5,
            cycle: 0,
        };
        assert!(recorded.is_recorded());
    }

    #[test]
    fn liquid_balance_excludes_frozen_deposits() {
        let info = DelegateInfo {
            address: Address::new("tz1ELYevTeKz1tb8J8cqtYnz2vRdv9tamNmr"),
            full_balance: Mutez::from(1_500),
            current_frozen_deposits: Mutez::from(400),
            delegated_contracts: vec![],
            min_delegated: MinDelegated::default(),
        };
        assert_eq!(info.liquid_balance(), Mutez::from(1_100));
    }
}
