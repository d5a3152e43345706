//! Chain data access for protocol rewards collection.
//!
//! The collector never talks to a node directly; it goes through the
//! [`ChainSource`] trait. [`RpcChainSource`] implements it over the node's JSON
//! RPC, and the `rewards-nullables` crate provides a scripted in-memory source
//! for tests.

pub mod constants;
pub mod error;
pub mod model;
pub mod rpc;
pub mod source;

pub use constants::{CurrentLevel, ProtocolConstants};
pub use error::ChainError;
pub use model::{
    BalanceChange, Block, ContractStaking, DelegateInfo, InternalResult, MinDelegated, Operation,
    OperationContent,
};
pub use rpc::RpcChainSource;
pub use source::ChainSource;
