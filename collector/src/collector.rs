//! Chain-facing half of the collector: fetches what a reconstruction needs and
//! runs the replay.

use std::future::Future;
use std::sync::Arc;

use rewards_chain::{ChainError, ChainSource, DelegateInfo};
use rewards_ledger::{BalanceUpdate, DelegationState, Reconstruction};
use rewards_types::{Address, Cycle, Mutez};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::CollectorError;

/// Race `fut` against `cancel`.
async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, CollectorError>
where
    F: Future<Output = Result<T, ChainError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CollectorError::Cancelled),
        result = fut => result.map_err(CollectorError::from),
    }
}

/// Reconstructs delegation states from a [`ChainSource`].
pub struct Collector<C> {
    chain: Arc<C>,
}

impl<C> Clone for Collector<C> {
    fn clone(&self) -> Self {
        Self {
            chain: Arc::clone(&self.chain),
        }
    }
}

impl<C: ChainSource> Collector<C> {
    pub fn new(chain: Arc<C>) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &Arc<C> {
        &self.chain
    }

    pub async fn last_completed_cycle(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Cycle, CollectorError> {
        cancellable(cancel, self.chain.last_completed_cycle()).await
    }

    /// Delegates active at the last block of `cycle`.
    pub async fn get_active_delegates_from_cycle(
        &self,
        cycle: Cycle,
        cancel: &CancellationToken,
    ) -> Result<Vec<Address>, CollectorError> {
        let level = cancellable(cancel, self.chain.cycle_end_level(cycle)).await?;
        cancellable(cancel, self.chain.list_active_delegates(level)).await
    }

    /// The delegate's record as of the last block of `cycle`.
    pub async fn get_delegate_from_cycle(
        &self,
        delegate: &Address,
        cycle: Cycle,
        cancel: &CancellationToken,
    ) -> Result<DelegateInfo, CollectorError> {
        let level = cancellable(cancel, self.chain.cycle_end_level(cycle)).await?;
        cancellable(cancel, self.chain.get_delegate(delegate, level)).await
    }

    /// Reconstruct the state of `info` at its recorded minimum.
    ///
    /// Seed balances and staking figures are read at the block before the
    /// minimum; the block at the minimum is then replayed. A delegate with no
    /// recorded minimum fails before anything is fetched.
    pub async fn get_delegation_state(
        &self,
        info: &DelegateInfo,
        debug_ledger: bool,
        cancel: &CancellationToken,
    ) -> Result<DelegationState, CollectorError> {
        let reconstruction = Reconstruction::for_delegate(info)?;
        let seed_level = reconstruction.seed_level();

        let parameters = cancellable(
            cancel,
            self.chain.get_staking_parameters(&info.address, seed_level),
        )
        .await?;
        let mut reconstruction = reconstruction.with_parameters(parameters);

        let block = cancellable(cancel, self.chain.get_block(reconstruction.level())).await?;

        let delegate_staking = cancellable(
            cancel,
            self.chain.get_contract_staking(&info.address, seed_level),
        )
        .await?;
        reconstruction.set_staking(&info.address, delegate_staking.clone());

        for contract in &info.delegated_contracts {
            let balance = cancellable(
                cancel,
                self.chain.get_contract_balance(contract, seed_level),
            )
            .await?;
            // A delegate listed among its own delegators is reseeded from its
            // contract balance; its staking is already known.
            let staking = if *contract == info.address {
                delegate_staking.clone()
            } else {
                cancellable(cancel, self.chain.get_contract_staking(contract, seed_level)).await?
            };
            reconstruction.track(contract.clone(), balance, staking);
        }

        debug!(
            delegate = %info.address,
            level = reconstruction.level(),
            tracked = reconstruction.tracked_count(),
            target = %reconstruction.target(),
            "replaying block"
        );

        let state = if debug_ledger {
            let delegate = info.address.clone();
            reconstruction.replay_with(&block, |update, total| {
                log_ledger_entry(&delegate, update, total)
            })?
        } else {
            reconstruction.replay(&block)?
        };
        Ok(state)
    }

    /// Fetch `delegate` as of `cycle` and reconstruct its state.
    pub async fn reconstruct(
        &self,
        delegate: &Address,
        cycle: Cycle,
        debug_ledger: bool,
        cancel: &CancellationToken,
    ) -> Result<DelegationState, CollectorError> {
        let info = self.get_delegate_from_cycle(delegate, cycle, cancel).await?;
        self.get_delegation_state(&info, debug_ledger, cancel).await
    }
}

fn log_ledger_entry(delegate: &Address, update: &BalanceUpdate, total: &Mutez) {
    debug!(
        delegate = %delegate,
        source = update.source.as_str(),
        operation = update.operation.as_ref().map(|h| h.as_str()).unwrap_or(""),
        content_index = ?update.content_index,
        internal_index = ?update.internal_index,
        address = %update.address,
        amount = %update.amount,
        total = %total,
        "ledger entry"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewards_chain::{
        BalanceChange, Block, ContractStaking, MinDelegated, Operation, OperationContent,
        ProtocolConstants,
    };
    use rewards_ledger::{derive, overstake_factor, BalanceUpdateSource, ReconstructError};
    use rewards_nullables::NullChainSource;
    use rewards_types::{OperationHash, StakingParameters};
    use std::time::Duration;

    const CYCLE: Cycle = 2;
    const MIN_LEVEL: i64 = 250;

    fn baker() -> Address {
        Address::new("tz1ELYevTeKz1tb8J8cqtYnz2vRdv9tamNmr")
    }

    fn alice() -> Address {
        Address::new("tz1VNRtHZdLzSJfyvvz2cxAoR1kWoNDWMisL")
    }

    fn chain() -> NullChainSource {
        NullChainSource::new(ProtocolConstants {
            blocks_per_cycle: 100,
            first_level: 1,
        })
    }

    fn info(level: i64) -> DelegateInfo {
        DelegateInfo {
            address: baker(),
            full_balance: Mutez::from(1_000),
            current_frozen_deposits: Mutez::from(200),
            delegated_contracts: vec![alice()],
            min_delegated: MinDelegated {
                amount: Mutez::from(1_300),
                level,
                cycle: CYCLE,
            },
        }
    }

    fn block() -> Block {
        Block {
            level: MIN_LEVEL,
            balance_updates: vec![],
            operations: vec![vec![Operation {
                hash: OperationHash::new("ooTransfer"),
                contents: vec![OperationContent {
                    fee_updates: vec![BalanceChange::new(alice(), -10)],
                    result_updates: vec![BalanceChange::new(alice(), 600)],
                    internal_results: vec![],
                }],
            }]],
        }
    }

    fn scripted() -> NullChainSource {
        let chain = chain();
        chain.set_delegate(CYCLE, info(MIN_LEVEL));
        chain.set_block(block());
        chain.set_balance(&alice(), MIN_LEVEL - 1, 0);
        chain.set_staking(
            &baker(),
            MIN_LEVEL - 1,
            ContractStaking {
                staked_balance: Mutez::from(400),
                ..Default::default()
            },
        );
        chain.set_parameters(&baker(), StakingParameters::with_limit(2_000_000));
        chain
    }

    #[tokio::test]
    async fn test_reconstruct_reaches_target() {
        let collector = Collector::new(Arc::new(scripted()));
        let state = collector
            .reconstruct(&baker(), CYCLE, true, &CancellationToken::new())
            .await
            .unwrap();

        // Seed 800 + 0, then -10 (fee), then +600 crosses 1_300.
        assert_eq!(state.total_balance, Mutez::from(1_390));
        assert_eq!(state.level, MIN_LEVEL);
        assert_eq!(state.cycle, CYCLE);
        assert_eq!(state.provenance.source, BalanceUpdateSource::OperationResult);
        assert_eq!(state.balances[&baker()].staked_balance, Mutez::from(400));
        assert_eq!(state.balances[&alice()].balance, Mutez::from(590));
        assert_eq!(
            state.parameters.limit_of_staking_over_baking_millionth,
            2_000_000
        );
    }

    #[tokio::test]
    async fn test_delegate_listed_among_its_delegators() {
        let chain = scripted();
        chain.set_delegate(
            CYCLE,
            DelegateInfo {
                delegated_contracts: vec![baker(), alice()],
                ..info(MIN_LEVEL)
            },
        );
        // Contract balance differs from the 800 derived from full less frozen.
        chain.set_balance(&baker(), MIN_LEVEL - 1, 900);
        chain.set_staking(
            &alice(),
            MIN_LEVEL - 1,
            ContractStaking {
                staked_balance: Mutez::from(400),
                ..Default::default()
            },
        );
        chain.set_parameters(&baker(), StakingParameters::with_limit(500_000));
        let chain = Arc::new(chain);
        let collector = Collector::new(Arc::clone(&chain));

        let state = collector
            .reconstruct(&baker(), CYCLE, false, &CancellationToken::new())
            .await
            .unwrap();

        // Seed 900 + 0, then -10, then +600.
        assert_eq!(state.balances.len(), 2);
        assert_eq!(state.balances[&baker()].balance, Mutez::from(900));
        assert_eq!(state.balances[&baker()].staked_balance, Mutez::from(400));
        assert_eq!(state.total_balance, Mutez::from(1_490));
        assert_eq!(chain.staking_fetch_count(), 2);

        // 400 own stake allows 200 external; half of alice's 400 is over.
        assert_eq!(overstake_factor(&state, &state.parameters), 500_000);
        let derived = derive(&state, &state.parameters);
        assert_eq!(derived[&alice()].overstaked_balance, Mutez::from(200));
        assert!(derived[&baker()].overstaked_balance.is_zero());
        assert_eq!(derived[&baker()].delegated_balance, Mutez::from(900));
    }

    #[tokio::test]
    async fn test_no_minimum_skips_block_fetch() {
        let chain = Arc::new(scripted());
        chain.set_delegate(CYCLE, info(0));
        let collector = Collector::new(Arc::clone(&chain));

        let err = collector
            .reconstruct(&baker(), CYCLE, false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CollectorError::Reconstruct(ReconstructError::NoMinimumRecorded { .. })
        ));
        assert_eq!(chain.block_fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_balance_is_a_chain_error() {
        let chain = scripted();
        chain.set_delegate(
            CYCLE,
            DelegateInfo {
                delegated_contracts: vec![alice(), Address::new("KT1VNRtHZdLzSJfyvvz2cxAoR1kWoNDWMisL")],
                ..info(MIN_LEVEL)
            },
        );
        let collector = Collector::new(Arc::new(chain));
        let err = collector
            .reconstruct(&baker(), CYCLE, false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::Chain(ChainError::NotFound(_))));
        assert!(!err.is_ineligible());
    }

    #[tokio::test]
    async fn test_cancellation_aborts_requests() {
        let chain = scripted();
        chain.set_delay(Duration::from_secs(30));
        let collector = Collector::new(Arc::new(chain));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            collector.reconstruct(&baker(), CYCLE, false, &cancel),
        )
        .await
        .expect("cancellation should end the request")
        .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_active_delegates_at_cycle_end() {
        let chain = chain();
        chain.set_active_delegates(CYCLE, vec![baker(), alice()]);
        let collector = Collector::new(Arc::new(chain));
        let delegates = collector
            .get_active_delegates_from_cycle(CYCLE, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(delegates, vec![baker(), alice()]);
    }
}
