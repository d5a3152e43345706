use rewards_types::{Address, Cycle, Mutez};
use thiserror::Error;

/// Reasons a delegate has no reconstructable state for a cycle.
///
/// Both variants are terminal for the (delegate, cycle) pair: retrying with the
/// same chain data yields the same answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconstructError {
    #[error("delegate {delegate} has no minimum delegated balance recorded (cycle {cycle})")]
    NoMinimumRecorded { delegate: Address, cycle: Cycle },

    #[error("delegate {delegate}: replay reached {reached} without crossing target {target}")]
    NotReached {
        delegate: Address,
        target: Mutez,
        reached: Mutez,
    },
}
