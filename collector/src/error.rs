use rewards_chain::ChainError;
use rewards_ledger::ReconstructError;
use rewards_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("{0}")]
    Reconstruct(#[from] ReconstructError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("cancelled")]
    Cancelled,

    #[error("task failed: {0}")]
    TaskFailed(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollectorError {
    /// The delegate simply has no state for the cycle: no minimum recorded, or
    /// the minimum was never crossed by tracked updates. Not a failure.
    pub fn is_ineligible(&self) -> bool {
        matches!(self, Self::Reconstruct(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
