//! Replay of a block's ledger up to a delegate's recorded minimum.

use rewards_chain::{Block, ContractStaking, DelegateInfo};
use rewards_types::{Address, Cycle, Level, Mutez, StakingParameters};
use std::collections::BTreeMap;

use crate::balance_update::{build_ledger, BalanceUpdate};
use crate::error::ReconstructError;
use crate::state::{AddressBalance, DelegationState, Provenance};

/// A pending reconstruction: seeded balances waiting for the block replay.
///
/// The participant set is fixed once seeding is done. Updates touching any
/// other address are skipped during the replay.
#[derive(Clone, Debug)]
pub struct Reconstruction {
    delegate: Address,
    cycle: Cycle,
    level: Level,
    target: Mutez,
    parameters: StakingParameters,
    balances: BTreeMap<Address, AddressBalance>,
}

impl Reconstruction {
    /// Start a reconstruction for `info`, seeding the delegate with its
    /// spendable balance (full balance less frozen deposits) and no stake.
    ///
    /// Fails with [`ReconstructError::NoMinimumRecorded`] if the delegate has no
    /// minimum recorded, so callers can bail out before fetching anything.
    pub fn for_delegate(info: &DelegateInfo) -> Result<Self, ReconstructError> {
        if !info.min_delegated.is_recorded() {
            return Err(ReconstructError::NoMinimumRecorded {
                delegate: info.address.clone(),
                cycle: info.min_delegated.cycle,
            });
        }

        let mut reconstruction = Self {
            delegate: info.address.clone(),
            cycle: info.min_delegated.cycle,
            level: info.min_delegated.level,
            target: info.min_delegated.amount.clone(),
            parameters: StakingParameters::default(),
            balances: BTreeMap::new(),
        };
        reconstruction.track(
            info.address.clone(),
            info.liquid_balance(),
            ContractStaking::default(),
        );
        Ok(reconstruction)
    }

    /// Staking parameters carried into the resulting state.
    pub fn with_parameters(mut self, parameters: StakingParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Level of the block to replay.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Level the seed balances must be read at: the block before the one
    /// replayed.
    pub fn seed_level(&self) -> Level {
        self.level - 1
    }

    pub fn delegate(&self) -> &Address {
        &self.delegate
    }

    pub fn target(&self) -> &Mutez {
        &self.target
    }

    /// Track `address` with its seed balance. A later call for the same address
    /// replaces the earlier seed.
    pub fn track(&mut self, address: Address, balance: Mutez, staking: ContractStaking) {
        let stake_baker = staking
            .stake_baker
            .unwrap_or_else(|| self.delegate.clone());
        self.balances.insert(
            address,
            AddressBalance {
                balance,
                staked_balance: staking.staked_balance,
                unstaked_balance: staking.unstaked_balance,
                baker: self.delegate.clone(),
                stake_baker,
            },
        );
    }

    /// Replace the staking figures of a tracked address, keeping its balance.
    /// Returns `false` if the address is not tracked.
    pub fn set_staking(&mut self, address: &Address, staking: ContractStaking) -> bool {
        let stake_baker = staking
            .stake_baker
            .unwrap_or_else(|| self.delegate.clone());
        match self.balances.get_mut(address) {
            Some(entry) => {
                entry.staked_balance = staking.staked_balance;
                entry.unstaked_balance = staking.unstaked_balance;
                entry.stake_baker = stake_baker;
                true
            }
            None => false,
        }
    }

    pub fn is_tracked(&self, address: &Address) -> bool {
        self.balances.contains_key(address)
    }

    pub fn tracked_count(&self) -> usize {
        self.balances.len()
    }

    /// Replay `block` and return the state at the first update that brings the
    /// tracked total to the target.
    pub fn replay(self, block: &Block) -> Result<DelegationState, ReconstructError> {
        self.replay_with(block, |_, _| {})
    }

    /// Like [`replay`](Self::replay), calling `on_applied` with every applied
    /// update and the running total after it.
    pub fn replay_with<F>(self, block: &Block, on_applied: F) -> Result<DelegationState, ReconstructError>
    where
        F: FnMut(&BalanceUpdate, &Mutez),
    {
        self.replay_ledger(&build_ledger(block), on_applied)
    }

    /// Replay an already built ledger.
    pub fn replay_ledger<F>(
        mut self,
        ledger: &[BalanceUpdate],
        mut on_applied: F,
    ) -> Result<DelegationState, ReconstructError>
    where
        F: FnMut(&BalanceUpdate, &Mutez),
    {
        let mut total: Mutez = self.balances.values().map(|b| &b.balance).sum();

        for update in ledger {
            let Some(entry) = self.balances.get_mut(&update.address) else {
                continue;
            };
            entry.balance += &update.amount;
            total += &update.amount;
            on_applied(update, &total);

            if total >= self.target {
                return Ok(DelegationState {
                    delegate: self.delegate,
                    cycle: self.cycle,
                    level: self.level,
                    balances: self.balances,
                    total_balance: total,
                    parameters: self.parameters,
                    provenance: Provenance::from(update),
                });
            }
        }

        Err(ReconstructError::NotReached {
            delegate: self.delegate,
            target: self.target,
            reached: total,
        })
    }
}
