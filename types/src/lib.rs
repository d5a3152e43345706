//! Fundamental types for protocol rewards collection.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! addresses, operation hashes, big-integer amounts, cycles and staking parameters.

pub mod address;
pub mod amount;
pub mod error;
pub mod hash;
pub mod params;

pub use address::Address;
pub use amount::Mutez;
pub use error::TypesError;
pub use hash::OperationHash;
pub use params::{StakingParameters, OVERSTAKE_PRECISION};

/// A baking cycle number.
pub type Cycle = i64;

/// A block height.
pub type Level = i64;
