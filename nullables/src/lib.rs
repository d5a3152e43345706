//! Nullable infrastructure for deterministic testing.
//!
//! The chain and the state store are abstracted behind traits. This crate
//! provides test-friendly implementations that:
//! - Return scripted values
//! - Count and optionally slow down calls so tests can observe concurrency
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod chain;
pub mod store;

pub use chain::NullChainSource;
pub use store::NullStateStore;
