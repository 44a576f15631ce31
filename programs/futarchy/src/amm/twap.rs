//! Time-Weighted Average Price Oracle
//!
//! The oracle decides the proposal's outcome, so it has to be hard to push
//! around. A raw TWAP over prices could be shifted heavily by a few extreme
//! outlier trades; instead we integrate *observations*, which can only move
//! by `max_observation_change_per_update` per update, and only once per
//! `min_update_interval_seconds`. A manipulator who lands one giant trade
//! moves the spot price a lot but the aggregation only marginally.
//!
//! Resolution reads strictly the aggregations, never the instantaneous spot
//! price. An observation window also has a start delay: observations recorded
//! before `created_at + start_delay_seconds` move the clamped observation but
//! do not count toward resolution, giving the markets a grace period to find
//! a price before being judged.

use anchor_lang::prelude::*;

use crate::amm::{MAX_BPS, PRICE_SCALE};
use crate::state::Side;

/// Largest representable 1e12-scaled price. Anything above this is treated
/// as a corrupt or manipulated input and the update is dropped.
pub const MAX_PRICE: u128 = u64::MAX as u128 * PRICE_SCALE;

/// What an [`TwapOracle::update`] call did
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TwapUpdate {
    /// Rate limit not yet elapsed; nothing changed
    Skipped,
    /// Observations and aggregations advanced
    Recorded,
}

/// Dual-market TWAP state, embedded in the proposal account
#[derive(
    AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, InitSpace, Debug, Default,
)]
pub struct TwapOracle {
    /// When the proposal's markets were funded
    pub created_at: i64,

    /// Timestamp of the last recorded update
    pub last_updated: i64,

    /// Seconds after `created_at` before observations count toward resolution
    pub start_delay_seconds: u32,

    /// Minimum seconds between recorded updates
    pub min_update_interval_seconds: u32,

    /// The most an observation can move per update (1e12-scaled)
    pub max_observation_change_per_update: u128,

    /// How far the pass TWAP must exceed the fail TWAP to pass, in bps
    pub pass_threshold_bps: u16,

    /// Last clamped pass-market observation
    pub pass_observation: u128,

    /// Last clamped fail-market observation
    pub fail_observation: u128,

    /// Running sum of pass observation * elapsed seconds
    pub pass_aggregation: u128,

    /// Running sum of fail observation * elapsed seconds
    pub fail_aggregation: u128,
}

impl TwapOracle {
    pub fn new(
        now: i64,
        initial_observation: u128,
        max_observation_change_per_update: u128,
        start_delay_seconds: u32,
        min_update_interval_seconds: u32,
        pass_threshold_bps: u16,
    ) -> Self {
        Self {
            created_at: now,
            last_updated: now,
            start_delay_seconds,
            min_update_interval_seconds,
            max_observation_change_per_update,
            pass_threshold_bps,
            pass_observation: initial_observation,
            fail_observation: initial_observation,
            pass_aggregation: 0,
            fail_aggregation: 0,
        }
    }

    fn twap_start(&self) -> i64 {
        self.created_at + self.start_delay_seconds as i64
    }

    /// Record both markets' spot prices.
    ///
    /// A no-op (`Skipped`) inside the rate-limit window, which also makes the
    /// call idempotent under identical inputs. Each price's delta from its
    /// last observation is clamped to `max_observation_change_per_update`
    /// before it is weighted into the aggregation. Time only moves forward:
    /// `last_updated` never decreases.
    pub fn update(&mut self, pass_price: u128, fail_price: u128, now: i64) -> Result<TwapUpdate> {
        for price in [pass_price, fail_price] {
            require_gt!(price, 0, OracleError::PriceBandExceeded);
            require_gte!(MAX_PRICE, price, OracleError::PriceBandExceeded);
        }

        if now < self.last_updated + self.min_update_interval_seconds as i64 {
            return Ok(TwapUpdate::Skipped);
        }

        let new_pass = clamp_observation(
            self.pass_observation,
            pass_price,
            self.max_observation_change_per_update,
        );
        let new_fail = clamp_observation(
            self.fail_observation,
            fail_price,
            self.max_observation_change_per_update,
        );

        let twap_start = self.twap_start();
        if now > twap_start {
            // don't let the first post-delay update weigh in the whole
            // pre-start period
            let effective_last = self.last_updated.max(twap_start);
            let elapsed = (now - effective_last) as u128;

            self.pass_aggregation = self
                .pass_aggregation
                .saturating_add(new_pass.saturating_mul(elapsed));
            self.fail_aggregation = self
                .fail_aggregation
                .saturating_add(new_fail.saturating_mul(elapsed));
        }

        self.pass_observation = new_pass;
        self.fail_observation = new_fail;
        self.last_updated = now;

        Ok(TwapUpdate::Recorded)
    }

    /// Time-weighted average price of one market since the start delay passed.
    pub fn twap(&self, side: Side) -> Result<u128> {
        let twap_start = self.twap_start();
        require_gt!(self.last_updated, twap_start, OracleError::TwapNotStarted);

        let aggregation = match side {
            Side::Pass => self.pass_aggregation,
            Side::Fail => self.fail_aggregation,
        };
        require_neq!(aggregation, 0, OracleError::NoObservations);

        let elapsed = (self.last_updated - twap_start) as u128;
        Ok(aggregation / elapsed)
    }

    /// Signed pass-fail gap in basis points, relative to the fail TWAP.
    pub fn gap_bps(&self) -> Result<i64> {
        let pass = self.twap(Side::Pass)? as i128;
        let fail = self.twap(Side::Fail)? as i128;

        let bps = (pass - fail) * MAX_BPS as i128 / fail;
        Ok(bps.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// Decide the outcome: the proposal passes iff the pass TWAP exceeds the
    /// fail TWAP by strictly more than the threshold.
    ///
    /// Pure in the oracle state, so repeated calls return the same decision.
    pub fn resolve(&self) -> Result<Side> {
        let pass = self.twap(Side::Pass)?;
        let fail = self.twap(Side::Fail)?;

        let threshold =
            fail.saturating_mul(MAX_BPS as u128 + self.pass_threshold_bps as u128) / MAX_BPS as u128;

        if pass > threshold {
            Ok(Side::Pass)
        } else {
            Ok(Side::Fail)
        }
    }
}

fn clamp_observation(last: u128, price: u128, max_change: u128) -> u128 {
    if price > last {
        price.min(last.saturating_add(max_change))
    } else {
        price.max(last.saturating_sub(max_change))
    }
}

#[error_code]
pub enum OracleError {
    #[msg("Price outside the representable band; observation dropped")]
    PriceBandExceeded,
    #[msg("TWAP start delay has not elapsed")]
    TwapNotStarted,
    #[msg("No observations recorded")]
    NoObservations,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: u128 = PRICE_SCALE;

    fn oracle(max_change: u128, start_delay: u32) -> TwapOracle {
        TwapOracle::new(0, ONE, max_change, start_delay, 60, 300)
    }

    #[test]
    fn test_clamp_is_actually_applied() {
        let mut o = oracle(ONE / 10, 0);

        // a 10x price spike on the pass market
        o.update(10 * ONE, ONE, 60).unwrap();

        let clamped = ONE + ONE / 10;
        assert_eq!(o.pass_observation, clamped);
        assert_eq!(o.pass_aggregation, clamped * 60);

        // the naive (unclamped) aggregation would have been far larger
        let naive = 10 * ONE * 60;
        assert_eq!(naive - o.pass_aggregation, (10 * ONE - clamped) * 60);
    }

    #[test]
    fn test_rate_limit_skips() {
        let mut o = oracle(ONE, 0);

        o.update(ONE, ONE, 60).unwrap();
        let before = o;

        assert_eq!(o.update(2 * ONE, ONE, 90).unwrap(), TwapUpdate::Skipped);
        assert_eq!(o, before);

        assert_eq!(o.update(2 * ONE, ONE, 120).unwrap(), TwapUpdate::Recorded);
    }

    #[test]
    fn test_start_delay_grace_period() {
        let mut o = oracle(ONE, 120);

        // observations move during the grace period, aggregations don't
        o.update(2 * ONE, ONE, 60).unwrap();
        assert_eq!(o.pass_observation, 2 * ONE);
        assert_eq!(o.pass_aggregation, 0);
        assert!(o.twap(Side::Pass).is_err());

        // only the 60 seconds past the start delay are weighted
        o.update(2 * ONE, ONE, 180).unwrap();
        assert_eq!(o.pass_aggregation, 2 * ONE * 60);
        assert_eq!(o.twap(Side::Pass).unwrap(), 2 * ONE);
    }

    #[test]
    fn test_gap_and_threshold_resolution() {
        let mut o = oracle(ONE, 0);
        o.pass_threshold_bps = 300;

        // steady 2.5% premium on the pass market
        o.update(ONE + ONE / 40, ONE, 100).unwrap();
        assert_eq!(o.gap_bps().unwrap(), 250);

        // 250 bps gap does not clear a 300 bps threshold
        assert_eq!(o.resolve().unwrap(), Side::Fail);

        // but clears a 200 bps threshold
        o.pass_threshold_bps = 200;
        assert_eq!(o.resolve().unwrap(), Side::Pass);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut o = oracle(ONE, 0);
        o.update(3 * ONE / 2, ONE, 100).unwrap();

        let first = o.resolve().unwrap();
        let second = o.resolve().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_negative_gap() {
        let mut o = oracle(ONE, 0);
        // fail market trading 50% above pass
        o.update(ONE, 3 * ONE / 2, 100).unwrap();

        assert!(o.gap_bps().unwrap() < 0);
        assert_eq!(o.resolve().unwrap(), Side::Fail);
    }

    #[test]
    fn test_price_band_guard_drops_update() {
        let mut o = oracle(ONE, 0);
        let before = o;

        assert!(o.update(MAX_PRICE + 1, ONE, 60).is_err());
        assert!(o.update(ONE, 0, 60).is_err());
        // the dropped update corrupted nothing
        assert_eq!(o, before);

        // and the next well-formed update proceeds normally
        assert_eq!(o.update(ONE, ONE, 60).unwrap(), TwapUpdate::Recorded);
    }
}
