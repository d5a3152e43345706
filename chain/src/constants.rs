//! Cycle/level arithmetic.

use rewards_types::{Cycle, Level};
use serde::{Deserialize, Serialize};

/// Position of the chain head.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentLevel {
    pub level: Level,
    pub cycle: Cycle,
    /// Zero-based position of `level` within `cycle`.
    pub cycle_position: i64,
}

/// Protocol parameters needed to map cycles to block heights.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConstants {
    pub blocks_per_cycle: i64,
    /// Level of the first block of cycle 0.
    pub first_level: Level,
}

impl ProtocolConstants {
    /// Derive constants from the head position, assuming cycles have had
    /// `blocks_per_cycle` blocks since cycle 0.
    pub fn from_current_level(blocks_per_cycle: i64, current: CurrentLevel) -> Self {
        let first_level =
            current.level - current.cycle_position - current.cycle * blocks_per_cycle;
        Self {
            blocks_per_cycle,
            first_level,
        }
    }

    pub fn cycle_start_level(&self, cycle: Cycle) -> Level {
        self.first_level + cycle * self.blocks_per_cycle
    }

    /// Height of the last block of `cycle`.
    pub fn cycle_end_level(&self, cycle: Cycle) -> Level {
        self.cycle_start_level(cycle + 1) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAINNET_LIKE: ProtocolConstants = ProtocolConstants {
        blocks_per_cycle: 8192,
        first_level: 1,
    };

    #[test]
    fn cycle_bounds() {
        assert_eq!(MAINNET_LIKE.cycle_start_level(0), 1);
        assert_eq!(MAINNET_LIKE.cycle_end_level(0), 8192);
        assert_eq!(MAINNET_LIKE.cycle_end_level(175), 1_441_792);
    }

    #[test]
    fn derived_from_head_position() {
        let head = CurrentLevel {
            level: 1_441_800,
            cycle: 176,
            cycle_position: 7,
        };
        assert_eq!(ProtocolConstants::from_current_level(8192, head), MAINNET_LIKE);
    }
}
