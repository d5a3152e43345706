//! Delegated and overstaked balances of a reconstructed state.
//!
//! A baker accepts external stake up to `limit_of_staking_over_baking_millionth`
//! times its own stake. Whatever external stake exceeds that allowance is
//! overstaked; the excess is spread over all external stakers in proportion to
//! their stake.

use num::BigInt;
use rewards_types::{Address, Mutez, StakingParameters, OVERSTAKE_PRECISION};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::state::DelegationState;

/// Derived figures for one address of a [`DelegationState`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationStateBalanceInfo {
    pub balance: Mutez,
    pub staked_balance: Mutez,
    pub unstaked_balance: Mutez,
    pub delegated_balance: Mutez,
    pub overstaked_balance: Mutez,
    pub baker: Address,
    pub stake_baker: Address,
}

/// Share of every external staker's stake that exceeds the baker's limit, in
/// millionths, clamped to `[0, OVERSTAKE_PRECISION]`.
pub fn overstake_factor(state: &DelegationState, parameters: &StakingParameters) -> i64 {
    let precision = BigInt::from(OVERSTAKE_PRECISION);
    let limit = BigInt::from(parameters.limit_of_staking_over_baking_millionth.max(0));

    let external = state.external_staked();
    if !external.is_positive() {
        return 0;
    }

    let allowed = state.own_staked().mul_div(&limit, &precision);
    let excess = (external.clone() - allowed).clamp_non_negative();
    let factor = excess
        .mul_div(&precision, external.as_bigint())
        .min(Mutez::from(OVERSTAKE_PRECISION))
        .clamp_non_negative();

    // Within [0, OVERSTAKE_PRECISION] after clamping.
    factor.to_i64().unwrap_or(OVERSTAKE_PRECISION)
}

/// Per-address delegated, staked and overstaked balances of `state`.
///
/// Depends only on the inputs; the delegate's own address is never overstaked.
pub fn derive(
    state: &DelegationState,
    parameters: &StakingParameters,
) -> BTreeMap<Address, DelegationStateBalanceInfo> {
    let precision = BigInt::from(OVERSTAKE_PRECISION);
    let factor = BigInt::from(overstake_factor(state, parameters));

    state
        .balances
        .iter()
        .map(|(address, entry)| {
            let overstaked_balance = if *address == state.delegate {
                Mutez::zero()
            } else {
                entry.staked_balance.mul_div(&factor, &precision)
            };
            let info = DelegationStateBalanceInfo {
                balance: entry.balance.clone(),
                staked_balance: entry.staked_balance.clone(),
                unstaked_balance: entry.unstaked_balance.clone(),
                delegated_balance: entry.balance.clone(),
                overstaked_balance,
                baker: entry.baker.clone(),
                stake_baker: entry.stake_baker.clone(),
            };
            (address.clone(), info)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance_update::BalanceUpdateSource;
    use crate::state::{AddressBalance, Provenance};

    const BAKER: &str = "tz1ELYevTeKz1tb8J8cqtYnz2vRdv9tamNmr";
    const ALICE: &str = "tz1VNRtHZdLzSJfyvvz2cxAoR1kWoNDWMisL";
    const BOB: &str = "tz18vxoSEtntT8WJnjrXKD8qxcepcJeTGmkA";

    fn entry(balance: i64, staked: i64) -> AddressBalance {
        AddressBalance {
            balance: Mutez::from(balance),
            staked_balance: Mutez::from(staked),
            unstaked_balance: Mutez::zero(),
            baker: Address::new(BAKER),
            stake_baker: Address::new(BAKER),
        }
    }

    fn state(entries: &[(&str, i64, i64)]) -> DelegationState {
        let balances: BTreeMap<_, _> = entries
            .iter()
            .map(|(a, balance, staked)| (Address::new(*a), entry(*balance, *staked)))
            .collect();
        let total_balance = balances.values().map(|b| &b.balance).sum();
        DelegationState {
            delegate: Address::new(BAKER),
            cycle: 1,
            level: 10,
            balances,
            total_balance,
            parameters: StakingParameters::default(),
            provenance: Provenance {
                source: BalanceUpdateSource::Block,
                operation: None,
                content_index: None,
                internal_index: None,
            },
        }
    }

    #[test]
    fn single_external_staker_half_overstaked() {
        let s = state(&[(BAKER, 5_000, 1_000), (ALICE, 3_000, 1_000)]);
        let params = StakingParameters::with_limit(500_000);
        assert_eq!(overstake_factor(&s, &params), 500_000);

        let infos = derive(&s, &params);
        let alice = &infos[&Address::new(ALICE)];
        assert_eq!(alice.overstaked_balance, Mutez::from(500));
        assert_eq!(alice.delegated_balance, Mutez::from(3_000));
        assert_eq!(infos[&Address::new(BAKER)].overstaked_balance, Mutez::zero());
    }

    #[test]
    fn two_external_stakers_share_the_excess() {
        let s = state(&[
            (BAKER, 5_000, 1_000),
            (ALICE, 3_000, 1_000),
            (BOB, 4_000, 1_000),
        ]);
        let params = StakingParameters::with_limit(500_000);
        assert_eq!(overstake_factor(&s, &params), 750_000);

        let infos = derive(&s, &params);
        assert_eq!(infos[&Address::new(ALICE)].overstaked_balance, Mutez::from(750));
        assert_eq!(infos[&Address::new(BOB)].overstaked_balance, Mutez::from(750));
        assert_eq!(infos[&Address::new(ALICE)].delegated_balance, Mutez::from(3_000));
        assert_eq!(infos[&Address::new(BOB)].delegated_balance, Mutez::from(4_000));
    }

    #[test]
    fn zero_limit_overstakes_everything() {
        let s = state(&[(BAKER, 0, 1_000), (ALICE, 0, 10)]);
        assert_eq!(
            overstake_factor(&s, &StakingParameters::with_limit(0)),
            OVERSTAKE_PRECISION
        );
    }

    #[test]
    fn allowance_exactly_met_is_not_overstaked() {
        let s = state(&[(BAKER, 0, 1_000), (ALICE, 0, 1_000)]);
        assert_eq!(
            overstake_factor(&s, &StakingParameters::with_limit(1_000_000)),
            0
        );
    }

    #[test]
    fn no_external_stake_means_no_factor() {
        let s = state(&[(BAKER, 100, 1_000), (ALICE, 100, 0)]);
        assert_eq!(overstake_factor(&s, &StakingParameters::with_limit(0)), 0);
        assert!(derive(&s, &StakingParameters::with_limit(0))
            .values()
            .all(|info| info.overstaked_balance.is_zero()));
    }

    #[test]
    fn baker_without_own_stake() {
        let s = state(&[(BAKER, 100, 0), (ALICE, 100, 400)]);
        let params = StakingParameters::with_limit(5_000_000);
        assert_eq!(overstake_factor(&s, &params), OVERSTAKE_PRECISION);
        assert_eq!(
            derive(&s, &params)[&Address::new(ALICE)].overstaked_balance,
            Mutez::from(400)
        );
    }

    #[test]
    fn derive_is_idempotent() {
        let s = state(&[(BAKER, 5_000, 1_000), (ALICE, 3_000, 1_700)]);
        let params = StakingParameters::with_limit(250_000);
        assert_eq!(derive(&s, &params), derive(&s, &params));
    }
}
