//! Delegation state reconstruction.
//!
//! Given the block at which a delegate's minimum delegated balance was recorded,
//! the ledger crate recovers the balances of the delegate and its delegators at
//! the exact point inside that block where the minimum was reached, then derives
//! per-address delegated, staked and overstaked figures.
//!
//! Everything here is pure and synchronous. Fetching the inputs is the
//! collector's job.

pub mod balance_update;
pub mod error;
pub mod overstake;
pub mod reconstruct;
pub mod state;

pub use balance_update::{build_ledger, BalanceUpdate, BalanceUpdateSource};
pub use error::ReconstructError;
pub use overstake::{derive, overstake_factor, DelegationStateBalanceInfo};
pub use reconstruct::Reconstruction;
pub use state::{AddressBalance, DelegationState, Provenance};
