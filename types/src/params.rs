//! Staking parameters a delegate declares on chain.

use serde::{Deserialize, Serialize};

/// Scale of the fixed-point fractions used by the overstake computation
/// (one millionth).
pub const OVERSTAKE_PRECISION: i64 = 1_000_000;

/// Active staking parameters of a delegate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingParameters {
    /// How much external stake the baker accepts relative to its own stake,
    /// in millionths. `0` means no external stake counts; `1_000_000` means
    /// external stake up to 1x the baker's own.
    pub limit_of_staking_over_baking_millionth: i64,

    /// Share of staking rewards the baker keeps, in billionths. Carried along
    /// with the parameters but not used by the overstake computation.
    #[serde(default)]
    pub edge_of_baking_over_staking_billionth: i64,
}

impl StakingParameters {
    pub fn with_limit(limit_of_staking_over_baking_millionth: i64) -> Self {
        Self {
            limit_of_staking_over_baking_millionth,
            edge_of_baking_over_staking_billionth: 0,
        }
    }
}
