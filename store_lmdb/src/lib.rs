//! LMDB storage backend for delegation states.
//!
//! Implements the `rewards-store` traits using the `heed` LMDB bindings.

pub mod delegation_state;
pub mod environment;
pub mod error;

pub use delegation_state::LmdbDelegationStateStore;
pub use environment::LmdbEnvironment;
pub use error::LmdbError;
