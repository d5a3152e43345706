//! Storage traits for reconstructed delegation states.
//!
//! Backends (LMDB, in-memory for testing) implement [`DelegationStateStore`].
//! The collector depends only on the trait.

pub mod delegation_state;
pub mod error;
pub mod retention;
pub mod statistics;

pub use delegation_state::{DelegationStateStore, StoredDelegationState};
pub use error::StoreError;
pub use retention::RetentionPolicy;
pub use statistics::{CycleStatistics, DelegateCycleStatistics};
