//! Position Unwinding
//!
//! A directional position is asymmetric: a trader who expects passage holds
//! pass-base plus fail-quote conditionals; one who expects failure holds
//! fail-base plus pass-quote. Exiting before resolution means reverse-swapping
//! part of the position into the complementary conditionals and then merging
//! matched pairs back into the regular tokens.
//!
//! Everything here is a pure function of freshly read balances. The unwind is
//! a multi-step sequence over the ledger and is not atomic as a whole, so no
//! step may trust amounts planned before an earlier step ran. Re-planning
//! from live balances is what makes a retry after partial failure safe:
//! tokens that were already converted (and merged away) are simply no longer
//! in the balances, so they cannot be swapped twice.

use anchor_lang::prelude::*;

use crate::amm::{SwapDirection, MAX_BPS};
use crate::state::Side;

/// Slippage tolerance applied to unwind swaps, in basis points.
///
/// Deliberately wide: the unwinder is exiting, not speculating, and should
/// tolerate significant price impact. Never unbounded, though; a quoted
/// output is still enforced to within this band.
pub const UNWIND_SLIPPAGE_BPS: u64 = 2_000;

/// A user's four conditional balances for one proposal
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ConditionalBalances {
    pub pass_base: u64,
    pub fail_base: u64,
    pub pass_quote: u64,
    pub fail_quote: u64,
}

/// One planned reverse swap
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PlannedSwap {
    pub amount_in: u64,
    pub direction: SwapDirection,
}

/// The reverse swaps needed to unwind a slice of a position.
///
/// Either leg may be absent when its amount rounds to zero; the legs are
/// order-independent.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ClosePlan {
    pub pass_market: Option<PlannedSwap>,
    pub fail_market: Option<PlannedSwap>,
}

/// Size the reverse swaps for closing `percent` of a position, from live
/// balances.
///
/// For a pass position: sell `percent` of held pass-base on the pass market
/// and `percent` of held fail-quote on the fail market. Symmetric for a fail
/// position. The swapped conditionals pair with the retained portion of the
/// opposite leg, producing the matched pairs a merge needs.
pub fn plan_close(side: Side, percent: u8, balances: ConditionalBalances) -> Result<ClosePlan> {
    require!(
        (1..=100).contains(&percent),
        PositionError::InvalidPercent
    );

    let slice = |amount: u64| amount as u128 * percent as u128 / 100;

    let (pass_in, pass_direction, fail_in, fail_direction) = match side {
        Side::Pass => (
            slice(balances.pass_base),
            SwapDirection::BaseToQuote,
            slice(balances.fail_quote),
            SwapDirection::QuoteToBase,
        ),
        Side::Fail => (
            slice(balances.pass_quote),
            SwapDirection::QuoteToBase,
            slice(balances.fail_base),
            SwapDirection::BaseToQuote,
        ),
    };

    let leg = |amount_in: u128, direction: SwapDirection| {
        (amount_in > 0).then_some(PlannedSwap {
            amount_in: amount_in as u64,
            direction,
        })
    };

    Ok(ClosePlan {
        pass_market: leg(pass_in, pass_direction),
        fail_market: leg(fail_in, fail_direction),
    })
}

/// How much each vault can merge right now: the minimum of the two
/// conditional balances per asset. Returns `(base_amount, quote_amount)`.
///
/// Always re-derived from balances read *after* the reverse swaps, never from
/// the amounts the plan predicted.
pub fn matched_merge_amounts(balances: ConditionalBalances) -> (u64, u64) {
    (
        balances.pass_base.min(balances.fail_base),
        balances.pass_quote.min(balances.fail_quote),
    )
}

/// The worst acceptable output for an unwind swap quoted at `quoted`.
pub fn unwind_min_out(quoted: u64) -> u64 {
    (quoted as u128 * (MAX_BPS - UNWIND_SLIPPAGE_BPS) as u128 / MAX_BPS as u128) as u64
}

#[error_code]
pub enum PositionError {
    #[msg("Close percentage must be between 1 and 100")]
    InvalidPercent,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amm::Pool;
    use crate::state::VaultState;

    #[test]
    fn test_plan_pass_position() {
        let balances = ConditionalBalances {
            pass_base: 1_000,
            fail_quote: 600,
            ..Default::default()
        };

        let plan = plan_close(Side::Pass, 50, balances).unwrap();
        assert_eq!(
            plan.pass_market,
            Some(PlannedSwap {
                amount_in: 500,
                direction: SwapDirection::BaseToQuote
            })
        );
        assert_eq!(
            plan.fail_market,
            Some(PlannedSwap {
                amount_in: 300,
                direction: SwapDirection::QuoteToBase
            })
        );
    }

    #[test]
    fn test_plan_fail_position() {
        let balances = ConditionalBalances {
            fail_base: 800,
            pass_quote: 400,
            ..Default::default()
        };

        let plan = plan_close(Side::Fail, 25, balances).unwrap();
        assert_eq!(
            plan.fail_market,
            Some(PlannedSwap {
                amount_in: 200,
                direction: SwapDirection::BaseToQuote
            })
        );
        assert_eq!(
            plan.pass_market,
            Some(PlannedSwap {
                amount_in: 100,
                direction: SwapDirection::QuoteToBase
            })
        );
    }

    #[test]
    fn test_zero_legs_are_skipped() {
        let balances = ConditionalBalances {
            pass_base: 1_000,
            fail_quote: 1, // 50% of 1 rounds to zero
            ..Default::default()
        };

        let plan = plan_close(Side::Pass, 50, balances).unwrap();
        assert!(plan.pass_market.is_some());
        assert!(plan.fail_market.is_none());
    }

    #[test]
    fn test_percent_bounds() {
        let balances = ConditionalBalances::default();
        assert!(plan_close(Side::Pass, 0, balances).is_err());
        assert!(plan_close(Side::Pass, 101, balances).is_err());
        plan_close(Side::Pass, 1, balances).unwrap();
        plan_close(Side::Pass, 100, balances).unwrap();
    }

    #[test]
    fn test_merge_moves_exactly_the_minimum() {
        let balances = ConditionalBalances {
            pass_base: 100,
            fail_base: 60,
            ..Default::default()
        };

        let (base_merge, quote_merge) = matched_merge_amounts(balances);
        assert_eq!(base_merge, 60);
        assert_eq!(quote_merge, 0);

        // moving 60 of each leaves 40 pass-base behind
        let mut vault = VaultState::default();
        vault.activate().unwrap();
        vault.split(100).unwrap();
        vault.merge(base_merge).unwrap();
        assert_eq!(vault.escrow, 40);

        // and a 70-merge was never offered to begin with
        assert!(crate::state::ensure_balances_for_merge(100, 60, 70).is_err());
    }

    #[test]
    fn test_unwind_slippage_is_bounded() {
        assert_eq!(unwind_min_out(10_000), 8_000);
        assert_eq!(unwind_min_out(0), 0);
        // wide, but never unlimited
        assert!(unwind_min_out(u64::MAX) > 0);
    }

    /// One reverse swap lands, the other fails. The merge still consumes what
    /// was actually produced, and a retry sizes itself from the fresh
    /// balances: the already-converted tokens are gone, so they cannot be
    /// swapped twice.
    #[test]
    fn test_retry_after_partial_failure() {
        let mut pass_pool = Pool::default();
        let mut fail_pool = Pool::default();
        pass_pool.open(100_000, 100_000).unwrap();
        fail_pool.open(100_000, 100_000).unwrap();

        // a fail position: 1000 fail-base + 1000 pass-quote
        let mut balances = ConditionalBalances {
            fail_base: 1_000,
            pass_quote: 1_000,
            ..Default::default()
        };

        // --- first invocation: fail-market leg lands, pass-market leg fails
        let plan = plan_close(Side::Fail, 50, balances).unwrap();
        let leg = plan.fail_market.unwrap();
        let out = fail_pool
            .swap(leg.amount_in, leg.direction, 0)
            .unwrap();
        balances.fail_base -= leg.amount_in;
        balances.fail_quote += out;
        // (pass-market leg: simulated submission failure, balances untouched)

        let (base_merge, quote_merge) = matched_merge_amounts(balances);
        assert_eq!(base_merge, 0); // no pass-base was produced
        assert_eq!(quote_merge, balances.fail_quote.min(balances.pass_quote));
        balances.pass_quote -= quote_merge;
        balances.fail_quote -= quote_merge;

        // --- retry: re-planned from live balances
        let retry = plan_close(Side::Fail, 50, balances).unwrap();
        let fail_leg = retry.fail_market.unwrap();
        let pass_leg = retry.pass_market.unwrap();

        // half of what remains, not a replay of the original 500
        assert_eq!(fail_leg.amount_in, balances.fail_base / 2);
        assert!(fail_leg.amount_in < 500);
        assert_eq!(pass_leg.amount_in, balances.pass_quote / 2);

        let fail_out = fail_pool.swap(fail_leg.amount_in, fail_leg.direction, 0).unwrap();
        let pass_out = pass_pool.swap(pass_leg.amount_in, pass_leg.direction, 0).unwrap();
        balances.fail_base -= fail_leg.amount_in;
        balances.fail_quote += fail_out;
        balances.pass_quote -= pass_leg.amount_in;
        balances.pass_base += pass_out;

        let (base_merge, quote_merge) = matched_merge_amounts(balances);
        assert_eq!(base_merge, balances.pass_base.min(balances.fail_base));
        assert!(base_merge > 0);
        assert!(quote_merge > 0);
    }

    /// End-to-end: split, trade into a fail position, unwind half of it.
    /// Conservation must hold exactly at every step.
    #[test]
    fn test_split_trade_unwind_round_trip() {
        let seed = 10_000u64;

        let mut base_vault = VaultState::default();
        let mut quote_vault = VaultState::default();
        base_vault.activate().unwrap();
        quote_vault.activate().unwrap();

        // proposer seeds both markets with 10k/10k
        base_vault.split(seed).unwrap();
        quote_vault.split(seed).unwrap();
        let mut pass_pool = Pool::default();
        let mut fail_pool = Pool::default();
        pass_pool.open(seed, seed).unwrap();
        fail_pool.open(seed, seed).unwrap();

        // trader deposits 1000 base and splits
        base_vault.split(1_000).unwrap();
        let mut user = ConditionalBalances {
            pass_base: 1_000,
            fail_base: 1_000,
            ..Default::default()
        };
        let mut user_regular_base = 0u64;
        let mut user_regular_quote = 0u64;

        // sell all pass-base into the pass market at the 0.3% fee
        let quoted = pass_pool.quote(1_000, SwapDirection::BaseToQuote).unwrap();
        let out = pass_pool
            .swap(1_000, SwapDirection::BaseToQuote, unwind_min_out(quoted))
            .unwrap();
        assert_eq!(out, quoted);
        user.pass_base = 0;
        user.pass_quote = out;

        // the trader now holds a fail position: fail-base + pass-quote
        assert!(user.fail_base > 0 && user.pass_quote > 0);

        // unwind half of it
        let plan = plan_close(Side::Fail, 50, user).unwrap();
        let fail_leg = plan.fail_market.unwrap();
        let pass_leg = plan.pass_market.unwrap();
        assert_eq!(fail_leg.amount_in, 500);
        assert_eq!(pass_leg.amount_in, out / 2);

        let fail_out = fail_pool.swap(fail_leg.amount_in, fail_leg.direction, 0).unwrap();
        user.fail_base -= fail_leg.amount_in;
        user.fail_quote += fail_out;

        let pass_out = pass_pool.swap(pass_leg.amount_in, pass_leg.direction, 0).unwrap();
        user.pass_quote -= pass_leg.amount_in;
        user.pass_base += pass_out;

        // merge exactly the matched amounts, re-derived from live balances
        let (base_merge, quote_merge) = matched_merge_amounts(user);
        assert_eq!(base_merge, user.pass_base.min(user.fail_base));
        assert_eq!(quote_merge, user.pass_quote.min(user.fail_quote));

        base_vault.merge(base_merge).unwrap();
        quote_vault.merge(quote_merge).unwrap();
        user.pass_base -= base_merge;
        user.fail_base -= base_merge;
        user.pass_quote -= quote_merge;
        user.fail_quote -= quote_merge;
        user_regular_base += base_merge;
        user_regular_quote += quote_merge;

        // vault conservation held throughout (escrow backs every outstanding pair)
        assert_eq!(base_vault.escrow, base_vault.pass_supply);
        assert_eq!(base_vault.escrow, base_vault.fail_supply);
        assert_eq!(base_vault.escrow, seed + 1_000 - base_merge);
        assert_eq!(quote_vault.escrow, seed - quote_merge);

        // every conditional token is accounted for: user holdings plus pool
        // reserves equal the outstanding supplies
        assert_eq!(
            user.pass_base + pass_pool.base_reserves,
            base_vault.pass_supply
        );
        assert_eq!(
            user.fail_base + fail_pool.base_reserves,
            base_vault.fail_supply
        );
        assert_eq!(
            user.pass_quote + pass_pool.quote_reserves,
            quote_vault.pass_supply
        );
        assert_eq!(
            user.fail_quote + fail_pool.quote_reserves,
            quote_vault.fail_supply
        );

        // the unwind recovered real tokens
        assert!(user_regular_base > 0);
        assert!(user_regular_quote > 0);

        // both pools kept their invariant through the whole session
        assert!(pass_pool.k() >= (seed as u128).pow(2));
        assert!(fail_pool.k() >= (seed as u128).pow(2));
    }
}
