//! Collection of delegation states: fetch coordination, bounded parallel
//! reconstruction, persistence, plus the process plumbing (configuration,
//! logging, shutdown) shared by binaries.

pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch_state;
pub mod logging;
pub mod parallel_processor;
pub mod shutdown;

pub use collector::Collector;
pub use config::{CollectorConfig, StorageConfig, StorageMode, DEFAULT_LMDB_MAP_SIZE};
pub use engine::{Engine, EngineSettings, FetchOptions, FetchReport};
pub use error::CollectorError;
pub use fetch_state::{FetchCoordinator, FetchGuard};
pub use logging::{init_logging, LogFormat};
pub use parallel_processor::ParallelProcessor;
pub use shutdown::ShutdownController;
