//! Nullable chain source: scripted chain data for testing.

use async_trait::async_trait;
use rewards_chain::{
    Block, ChainError, ChainSource, ContractStaking, CurrentLevel, DelegateInfo, ProtocolConstants,
};
use rewards_types::{Address, Cycle, Level, Mutez, StakingParameters};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A chain source answering from scripted data.
///
/// Anything not scripted answers [`ChainError::NotFound`], except staking
/// figures and staking parameters which default to zero.
pub struct NullChainSource {
    constants: ProtocolConstants,
    head: Mutex<CurrentLevel>,
    active_delegates: Mutex<HashMap<Level, Vec<Address>>>,
    delegates: Mutex<HashMap<(Address, Level), DelegateInfo>>,
    blocks: Mutex<HashMap<Level, Block>>,
    balances: Mutex<HashMap<(Address, Level), Mutez>>,
    staking: Mutex<HashMap<(Address, Level), ContractStaking>>,
    parameters: Mutex<HashMap<Address, StakingParameters>>,
    failing: Mutex<HashSet<Address>>,
    delay: Mutex<Option<Duration>>,
    block_fetches: AtomicUsize,
    delegate_fetches: AtomicUsize,
    staking_fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Counts a call as in flight until dropped.
struct InFlight<'a> {
    source: &'a NullChainSource,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.source.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl NullChainSource {
    pub fn new(constants: ProtocolConstants) -> Self {
        Self {
            constants,
            head: Mutex::new(CurrentLevel {
                level: constants.first_level,
                cycle: 0,
                cycle_position: 0,
            }),
            active_delegates: Mutex::new(HashMap::new()),
            delegates: Mutex::new(HashMap::new()),
            blocks: Mutex::new(HashMap::new()),
            balances: Mutex::new(HashMap::new()),
            staking: Mutex::new(HashMap::new()),
            parameters: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            delay: Mutex::new(None),
            block_fetches: AtomicUsize::new(0),
            delegate_fetches: AtomicUsize::new(0),
            staking_fetches: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn constants(&self) -> ProtocolConstants {
        self.constants
    }

    /// Move the head to the first block of `cycle`.
    pub fn set_head_cycle(&self, cycle: Cycle) {
        *self.head.lock().unwrap() = CurrentLevel {
            level: self.constants.cycle_start_level(cycle),
            cycle,
            cycle_position: 0,
        };
    }

    /// Script the active delegate list at the last block of `cycle`.
    pub fn set_active_delegates(&self, cycle: Cycle, delegates: Vec<Address>) {
        let level = self.constants.cycle_end_level(cycle);
        self.active_delegates.lock().unwrap().insert(level, delegates);
    }

    /// Script the delegate record at the last block of `cycle`.
    pub fn set_delegate(&self, cycle: Cycle, info: DelegateInfo) {
        let level = self.constants.cycle_end_level(cycle);
        self.delegates
            .lock()
            .unwrap()
            .insert((info.address.clone(), level), info);
    }

    pub fn set_block(&self, block: Block) {
        self.blocks.lock().unwrap().insert(block.level, block);
    }

    pub fn set_balance(&self, address: &Address, level: Level, balance: impl Into<Mutez>) {
        self.balances
            .lock()
            .unwrap()
            .insert((address.clone(), level), balance.into());
    }

    pub fn set_staking(&self, address: &Address, level: Level, staking: ContractStaking) {
        self.staking
            .lock()
            .unwrap()
            .insert((address.clone(), level), staking);
    }

    pub fn set_parameters(&self, delegate: &Address, parameters: StakingParameters) {
        self.parameters
            .lock()
            .unwrap()
            .insert(delegate.clone(), parameters);
    }

    /// Make every `get_delegate` call for `delegate` fail with a transport error.
    pub fn fail_delegate(&self, delegate: &Address) {
        self.failing.lock().unwrap().insert(delegate.clone());
    }

    /// Delay every call by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn block_fetch_count(&self) -> usize {
        self.block_fetches.load(Ordering::SeqCst)
    }

    pub fn delegate_fetch_count(&self) -> usize {
        self.delegate_fetches.load(Ordering::SeqCst)
    }

    pub fn staking_fetch_count(&self) -> usize {
        self.staking_fetches.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight { source: self };

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        guard
    }
}

#[async_trait]
impl ChainSource for NullChainSource {
    async fn current_level(&self) -> Result<CurrentLevel, ChainError> {
        let _call = self.enter().await;
        Ok(*self.head.lock().unwrap())
    }

    async fn protocol_constants(&self) -> Result<ProtocolConstants, ChainError> {
        Ok(self.constants)
    }

    async fn list_active_delegates(&self, level: Level) -> Result<Vec<Address>, ChainError> {
        let _call = self.enter().await;
        self.active_delegates
            .lock()
            .unwrap()
            .get(&level)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("active delegates at {level}")))
    }

    async fn get_delegate(
        &self,
        delegate: &Address,
        level: Level,
    ) -> Result<DelegateInfo, ChainError> {
        let _call = self.enter().await;
        self.delegate_fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(delegate) {
            return Err(ChainError::RequestFailed(format!(
                "HTTP status 500 for delegate {delegate}"
            )));
        }
        self.delegates
            .lock()
            .unwrap()
            .get(&(delegate.clone(), level))
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("delegate {delegate} at {level}")))
    }

    async fn get_block(&self, level: Level) -> Result<Block, ChainError> {
        let _call = self.enter().await;
        self.block_fetches.fetch_add(1, Ordering::SeqCst);
        self.blocks
            .lock()
            .unwrap()
            .get(&level)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("block {level}")))
    }

    async fn get_contract_balance(
        &self,
        address: &Address,
        level: Level,
    ) -> Result<Mutez, ChainError> {
        let _call = self.enter().await;
        self.balances
            .lock()
            .unwrap()
            .get(&(address.clone(), level))
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("balance of {address} at {level}")))
    }

    async fn get_contract_staking(
        &self,
        address: &Address,
        level: Level,
    ) -> Result<ContractStaking, ChainError> {
        let _call = self.enter().await;
        self.staking_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .staking
            .lock()
            .unwrap()
            .get(&(address.clone(), level))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_staking_parameters(
        &self,
        delegate: &Address,
        _level: Level,
    ) -> Result<StakingParameters, ChainError> {
        let _call = self.enter().await;
        Ok(self
            .parameters
            .lock()
            .unwrap()
            .get(delegate)
            .copied()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewards_chain::MinDelegated;

    const BAKER: &str = "tz1ELYevTeKz1tb8J8cqtYnz2vRdv9tamNmr";

    fn constants() -> ProtocolConstants {
        ProtocolConstants {
            blocks_per_cycle: 100,
            first_level: 1,
        }
    }

    #[tokio::test]
    async fn test_scripted_delegate_at_cycle_end() {
        let chain = NullChainSource::new(constants());
        let baker = Address::new(BAKER);
        chain.set_delegate(
            3,
            DelegateInfo {
                address: baker.clone(),
                full_balance: Mutez::from(10),
                current_frozen_deposits: Mutez::zero(),
                delegated_contracts: vec![],
                min_delegated: MinDelegated::default(),
            },
        );

        let end = chain.cycle_end_level(3).await.unwrap();
        assert_eq!(end, 400);
        assert!(chain.get_delegate(&baker, end).await.is_ok());
        assert!(matches!(
            chain.get_delegate(&baker, end - 1).await,
            Err(ChainError::NotFound(_))
        ));
        assert_eq!(chain.delegate_fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_head_and_completed_cycle() {
        let chain = NullChainSource::new(constants());
        chain.set_head_cycle(7);
        assert_eq!(chain.current_cycle().await.unwrap(), 7);
        assert_eq!(chain.last_completed_cycle().await.unwrap(), 6);
        assert_eq!(chain.current_level().await.unwrap().level, 701);
    }

    #[tokio::test]
    async fn test_failing_delegate() {
        let chain = NullChainSource::new(constants());
        let baker = Address::new(BAKER);
        chain.fail_delegate(&baker);
        assert!(matches!(
            chain.get_delegate(&baker, 100).await,
            Err(ChainError::RequestFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_unscripted_staking_is_zero() {
        let chain = NullChainSource::new(constants());
        let staking = chain
            .get_contract_staking(&Address::new(BAKER), 5)
            .await
            .unwrap();
        assert!(staking.staked_balance.is_zero());
        assert!(staking.stake_baker.is_none());
        assert_eq!(chain.max_in_flight(), 1);
    }
}
