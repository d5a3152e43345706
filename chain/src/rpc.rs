//! [`ChainSource`] over a node's JSON RPC.

use async_trait::async_trait;
use reqwest::StatusCode;
use rewards_types::{Address, Level, Mutez, OperationHash, StakingParameters};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};

use crate::constants::{CurrentLevel, ProtocolConstants};
use crate::error::ChainError;
use crate::model::{
    BalanceChange, Block, ContractStaking, DelegateInfo, InternalResult, MinDelegated, Operation,
    OperationContent,
};
use crate::source::ChainSource;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const APPLIED: &str = "applied";

/// Chain source backed by a node RPC endpoint.
#[derive(Clone)]
pub struct RpcChainSource {
    base_url: String,
    http_client: reqwest::Client,
}

impl RpcChainSource {
    pub fn new(base_url: &str) -> Result<Self, ChainError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ChainError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ChainError::RequestFailed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn block_path(level: Level) -> String {
        format!("/chains/main/blocks/{level}")
    }

    /// GET `path`, returning `None` on 404.
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ChainError> {
        let url = format!("{}{}", self.base_url, path);
        trace!(%url, "chain rpc request");

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ChainError::Unreachable(format!("request timed out: {e}"))
            } else if e.is_connect() {
                ChainError::Unreachable(format!("connection failed: {e}"))
            } else {
                ChainError::RequestFailed(e.to_string())
            }
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ChainError::RequestFailed(format!(
                "HTTP status {} for {path}",
                response.status()
            )));
        }

        let body = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("{path}: {e}")))?;
        Ok(Some(body))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ChainError> {
        self.get_optional(path)
            .await?
            .ok_or_else(|| ChainError::NotFound(path.to_string()))
    }

    async fn get_contract_delegate(
        &self,
        address: &Address,
        level: Level,
    ) -> Result<Option<Address>, ChainError> {
        let path = format!(
            "{}/context/contracts/{address}/delegate",
            Self::block_path(level)
        );
        self.get_optional(&path).await
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcCurrentLevel {
    level: Level,
    cycle: i64,
    cycle_position: i64,
}

#[derive(Debug, Deserialize)]
struct RpcConstants {
    blocks_per_cycle: i64,
}

#[derive(Debug, Deserialize)]
struct RpcLevelInfo {
    level: Level,
    cycle: i64,
}

#[derive(Debug, Deserialize)]
struct RpcMinDelegated {
    amount: Mutez,
    #[serde(default)]
    level: Option<RpcLevelInfo>,
}

#[derive(Debug, Deserialize)]
struct RpcDelegate {
    full_balance: Mutez,
    current_frozen_deposits: Mutez,
    #[serde(default)]
    delegated_contracts: Vec<Address>,
    #[serde(default)]
    min_delegated_in_current_cycle: Option<RpcMinDelegated>,
}

#[derive(Debug, Deserialize)]
struct RpcStakingParameters {
    limit_of_staking_over_baking_millionth: i64,
    #[serde(default)]
    edge_of_baking_over_staking_billionth: i64,
}

#[derive(Debug, Default, Deserialize)]
struct RpcStaker {
    #[serde(default)]
    contract: Option<String>,
    #[serde(default)]
    delegate: Option<String>,
    #[serde(default)]
    baker: Option<String>,
    #[serde(default)]
    baker_own_stake: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcBalanceUpdate {
    #[serde(default)]
    contract: Option<String>,
    #[serde(default)]
    delegate: Option<String>,
    #[serde(default)]
    staker: Option<RpcStaker>,
    change: Mutez,
}

impl RpcBalanceUpdate {
    fn account(&self) -> Option<&str> {
        if let Some(contract) = &self.contract {
            return Some(contract);
        }
        if let Some(delegate) = &self.delegate {
            return Some(delegate);
        }
        let staker = self.staker.as_ref()?;
        staker
            .contract
            .as_deref()
            .or(staker.delegate.as_deref())
            .or(staker.baker.as_deref())
            .or(staker.baker_own_stake.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct RpcOperationResult {
    status: String,
    #[serde(default)]
    balance_updates: Vec<RpcBalanceUpdate>,
}

#[derive(Debug, Deserialize)]
struct RpcInternalResult {
    #[serde(default)]
    result: Option<RpcOperationResult>,
}

#[derive(Debug, Default, Deserialize)]
struct RpcContentMetadata {
    #[serde(default)]
    balance_updates: Vec<RpcBalanceUpdate>,
    #[serde(default)]
    operation_result: Option<RpcOperationResult>,
    #[serde(default)]
    internal_operation_results: Vec<RpcInternalResult>,
}

#[derive(Debug, Deserialize)]
struct RpcContent {
    #[serde(default)]
    metadata: Option<RpcContentMetadata>,
}

#[derive(Debug, Deserialize)]
struct RpcOperation {
    hash: String,
    #[serde(default)]
    contents: Vec<RpcContent>,
}

#[derive(Debug, Deserialize)]
struct RpcHeader {
    level: Level,
}

#[derive(Debug, Default, Deserialize)]
struct RpcBlockMetadata {
    #[serde(default)]
    balance_updates: Vec<RpcBalanceUpdate>,
}

#[derive(Debug, Deserialize)]
struct RpcBlock {
    header: RpcHeader,
    #[serde(default)]
    metadata: Option<RpcBlockMetadata>,
    #[serde(default)]
    operations: Vec<Vec<RpcOperation>>,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Keep only updates attributable to an account.
///
/// Accounts outside the implicit/originated address families (rollups,
/// bond owners) can never be tracked by a reconstruction and are dropped.
fn decode_updates(updates: Vec<RpcBalanceUpdate>) -> Vec<BalanceChange> {
    let mut decoded = Vec::with_capacity(updates.len());
    for update in updates {
        let Some(account) = update.account() else {
            continue;
        };
        match Address::parse(account) {
            Ok(address) => decoded.push(BalanceChange::new(address, update.change)),
            Err(_) => debug!(account, "skipping balance update of unsupported account"),
        }
    }
    decoded
}

/// Balance updates of a result, empty unless it was applied.
fn decode_result(result: Option<RpcOperationResult>) -> Vec<BalanceChange> {
    match result {
        Some(result) if result.status == APPLIED => decode_updates(result.balance_updates),
        _ => Vec::new(),
    }
}

fn decode_content(content: RpcContent) -> OperationContent {
    let metadata = content.metadata.unwrap_or_default();
    let internal_results = metadata
        .internal_operation_results
        .into_iter()
        .map(|internal| InternalResult {
            balance_updates: decode_result(internal.result),
        })
        .collect();

    OperationContent {
        fee_updates: decode_updates(metadata.balance_updates),
        result_updates: decode_result(metadata.operation_result),
        internal_results,
    }
}

fn decode_block(block: RpcBlock) -> Block {
    let operations = block
        .operations
        .into_iter()
        .map(|pass| {
            pass.into_iter()
                .map(|op| Operation {
                    hash: OperationHash::new(op.hash),
                    contents: op.contents.into_iter().map(decode_content).collect(),
                })
                .collect()
        })
        .collect();

    Block {
        level: block.header.level,
        balance_updates: decode_updates(block.metadata.unwrap_or_default().balance_updates),
        operations,
    }
}

fn decode_delegate(address: &Address, delegate: RpcDelegate) -> DelegateInfo {
    let min_delegated = match delegate.min_delegated_in_current_cycle {
        Some(RpcMinDelegated {
            amount,
            level: Some(level),
        }) => MinDelegated {
            amount,
            level: level.level,
            cycle: level.cycle,
        },
        Some(RpcMinDelegated { amount, level: None }) => MinDelegated {
            amount,
            ..MinDelegated::default()
        },
        None => MinDelegated::default(),
    };

    DelegateInfo {
        address: address.clone(),
        full_balance: delegate.full_balance,
        current_frozen_deposits: delegate.current_frozen_deposits,
        delegated_contracts: delegate.delegated_contracts,
        min_delegated,
    }
}

#[async_trait]
impl ChainSource for RpcChainSource {
    async fn current_level(&self) -> Result<CurrentLevel, ChainError> {
        let head: RpcCurrentLevel = self.get("/chains/main/blocks/head/helpers/current_level").await?;
        Ok(CurrentLevel {
            level: head.level,
            cycle: head.cycle,
            cycle_position: head.cycle_position,
        })
    }

    async fn protocol_constants(&self) -> Result<ProtocolConstants, ChainError> {
        let constants: RpcConstants = self.get("/chains/main/blocks/head/context/constants").await?;
        if constants.blocks_per_cycle <= 0 {
            return Err(ChainError::InvalidResponse(format!(
                "blocks_per_cycle must be positive, got {}",
                constants.blocks_per_cycle
            )));
        }
        let head = self.current_level().await?;
        Ok(ProtocolConstants::from_current_level(
            constants.blocks_per_cycle,
            head,
        ))
    }

    async fn list_active_delegates(&self, level: Level) -> Result<Vec<Address>, ChainError> {
        let path = format!("{}/context/delegates?active=true", Self::block_path(level));
        self.get(&path).await
    }

    async fn get_delegate(
        &self,
        delegate: &Address,
        level: Level,
    ) -> Result<DelegateInfo, ChainError> {
        let path = format!("{}/context/delegates/{delegate}", Self::block_path(level));
        let raw: RpcDelegate = self.get(&path).await?;
        Ok(decode_delegate(delegate, raw))
    }

    async fn get_block(&self, level: Level) -> Result<Block, ChainError> {
        let raw: RpcBlock = self.get(&Self::block_path(level)).await?;
        Ok(decode_block(raw))
    }

    async fn get_contract_balance(
        &self,
        address: &Address,
        level: Level,
    ) -> Result<Mutez, ChainError> {
        let path = format!(
            "{}/context/contracts/{address}/balance",
            Self::block_path(level)
        );
        self.get(&path).await
    }

    async fn get_contract_staking(
        &self,
        address: &Address,
        level: Level,
    ) -> Result<ContractStaking, ChainError> {
        let contract = format!("{}/context/contracts/{address}", Self::block_path(level));
        // Both endpoints answer `null` (or 404) for contracts that never staked.
        let staked: Option<Option<Mutez>> =
            self.get_optional(&format!("{contract}/staked_balance")).await?;
        let unstaked: Option<Option<Mutez>> = self
            .get_optional(&format!("{contract}/unstaked_frozen_balance"))
            .await?;

        let staked_balance = staked.flatten().unwrap_or_default();
        let unstaked_balance = unstaked.flatten().unwrap_or_default();
        let stake_baker = if staked_balance.is_positive() {
            self.get_contract_delegate(address, level).await?
        } else {
            None
        };

        Ok(ContractStaking {
            staked_balance,
            unstaked_balance,
            stake_baker,
        })
    }

    async fn get_staking_parameters(
        &self,
        delegate: &Address,
        level: Level,
    ) -> Result<StakingParameters, ChainError> {
        let path = format!(
            "{}/context/delegates/{delegate}/active_staking_parameters",
            Self::block_path(level)
        );
        let raw: RpcStakingParameters = self.get(&path).await?;
        Ok(StakingParameters {
            limit_of_staking_over_baking_millionth: raw.limit_of_staking_over_baking_millionth,
            edge_of_baking_over_staking_billionth: raw.edge_of_baking_over_staking_billionth,
        })
    }
}
