use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain node unreachable: {0}")]
    Unreachable(String),

    #[error("chain RPC request failed: {0}")]
    RequestFailed(String),

    #[error("not found on chain: {0}")]
    NotFound(String),

    #[error("invalid response from chain node: {0}")]
    InvalidResponse(String),
}
