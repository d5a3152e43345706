use async_trait::async_trait;
use rewards_types::{Address, Cycle, Level, Mutez, StakingParameters};

use crate::constants::{CurrentLevel, ProtocolConstants};
use crate::error::ChainError;
use crate::model::{Block, ContractStaking, DelegateInfo};

/// Read access to chain state at arbitrary heights.
///
/// Implementations must be safe to call concurrently; the collector issues many
/// requests in parallel against one shared source.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Position of the current head.
    async fn current_level(&self) -> Result<CurrentLevel, ChainError>;

    async fn protocol_constants(&self) -> Result<ProtocolConstants, ChainError>;

    /// Delegates active at `level`.
    async fn list_active_delegates(&self, level: Level) -> Result<Vec<Address>, ChainError>;

    async fn get_delegate(&self, delegate: &Address, level: Level)
        -> Result<DelegateInfo, ChainError>;

    async fn get_block(&self, level: Level) -> Result<Block, ChainError>;

    /// Spendable balance of a contract at `level`.
    async fn get_contract_balance(
        &self,
        address: &Address,
        level: Level,
    ) -> Result<Mutez, ChainError>;

    async fn get_contract_staking(
        &self,
        address: &Address,
        level: Level,
    ) -> Result<ContractStaking, ChainError>;

    /// Staking parameters in force for a delegate at `level`.
    async fn get_staking_parameters(
        &self,
        delegate: &Address,
        level: Level,
    ) -> Result<StakingParameters, ChainError>;

    async fn current_cycle(&self) -> Result<Cycle, ChainError> {
        Ok(self.current_level().await?.cycle)
    }

    /// The most recent cycle whose last block is already on chain.
    async fn last_completed_cycle(&self) -> Result<Cycle, ChainError> {
        Ok(self.current_cycle().await? - 1)
    }

    async fn cycle_end_level(&self, cycle: Cycle) -> Result<Level, ChainError> {
        Ok(self.protocol_constants().await?.cycle_end_level(cycle))
    }
}
