//! Constant-Product Conditional Market
//!
//! Each proposal carries two of these pools: the pass market and the fail
//! market. A pool trades the proposal's base-conditional tokens against its
//! quote-conditional tokens using the classic `x * y = k` curve with a fixed
//! taker fee folded into the reserves.
//!
//! The invariant `k` never decreases across a swap. This is asserted after
//! every trade, so a pricing bug can reject a transaction but can never leak
//! value out of the pool.

use anchor_lang::prelude::*;

pub const MAX_BPS: u64 = 10_000;

/// Taker fee, retained by the pool reserves (0.3%)
pub const TAKER_FEE_BPS: u64 = 30;

/// Prices are quote units per base unit, scaled by 1e12
pub const PRICE_SCALE: u128 = 1_000_000_000_000;

/// Which reserve a swap consumes
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum SwapDirection {
    /// Sell base-conditionals for quote-conditionals
    BaseToQuote,
    /// Sell quote-conditionals for base-conditionals
    QuoteToBase,
}

/// Market lifecycle status
#[derive(
    AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, InitSpace, Debug, Default,
)]
pub enum MarketStatus {
    /// Reserves not yet seeded
    #[default]
    Uninitialized,
    /// Open for trading
    Active,
    /// Proposal decided; no further swaps
    Closed,
}

/// One conditional market's reserves, embedded in the proposal account
#[derive(
    AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, InitSpace, Debug, Default,
)]
pub struct Pool {
    /// Lifecycle status
    pub status: MarketStatus,

    /// Base-conditional reserve
    pub base_reserves: u64,

    /// Quote-conditional reserve
    pub quote_reserves: u64,
}

impl Pool {
    /// Seed the reserves and open the market. Valid exactly once.
    pub fn open(&mut self, base_reserves: u64, quote_reserves: u64) -> Result<()> {
        require!(
            self.status == MarketStatus::Uninitialized,
            AmmError::MarketAlreadyOpen
        );
        require_gt!(base_reserves, 0, AmmError::ZeroReserves);
        require_gt!(quote_reserves, 0, AmmError::ZeroReserves);

        self.base_reserves = base_reserves;
        self.quote_reserves = quote_reserves;
        self.status = MarketStatus::Active;

        Ok(())
    }

    /// Stop trading and drain the recorded reserves.
    ///
    /// Returns `(base, quote)` so the caller can unwind the backing tokens.
    pub fn close(&mut self) -> Result<(u64, u64)> {
        require!(self.status == MarketStatus::Active, AmmError::MarketNotActive);
        self.status = MarketStatus::Closed;

        let drained = (self.base_reserves, self.quote_reserves);
        self.base_reserves = 0;
        self.quote_reserves = 0;

        Ok(drained)
    }

    pub fn k(&self) -> u128 {
        self.base_reserves as u128 * self.quote_reserves as u128
    }

    /// Spot price in quote units per base unit, scaled by [`PRICE_SCALE`].
    pub fn spot_price(&self) -> Result<u128> {
        require_neq!(self.base_reserves, 0, AmmError::ZeroReserves);
        Ok(self.quote_reserves as u128 * PRICE_SCALE / self.base_reserves as u128)
    }

    /// Execute a swap against the reserves.
    ///
    /// Fails with `SlippageExceeded` if the output would fall below
    /// `min_amount_out`. The caller's amount is never clamped to what the
    /// pool could accept more favorably; a bad trade is rejected, not fixed.
    pub fn swap(
        &mut self,
        amount_in: u64,
        direction: SwapDirection,
        min_amount_out: u64,
    ) -> Result<u64> {
        require!(self.status == MarketStatus::Active, AmmError::MarketNotActive);
        require_gt!(amount_in, 0, AmmError::ZeroAmount);

        let k = self.k();

        let amount_out = self.compute_output(amount_in, direction)?;
        require_gte!(amount_out, min_amount_out, AmmError::SlippageExceeded);

        match direction {
            SwapDirection::BaseToQuote => {
                self.base_reserves = self
                    .base_reserves
                    .checked_add(amount_in)
                    .ok_or(AmmError::Overflow)?;
                self.quote_reserves -= amount_out;
            }
            SwapDirection::QuoteToBase => {
                self.quote_reserves = self
                    .quote_reserves
                    .checked_add(amount_in)
                    .ok_or(AmmError::Overflow)?;
                self.base_reserves -= amount_out;
            }
        }

        require_gte!(self.k(), k, AmmError::InvariantViolated);

        Ok(amount_out)
    }

    /// Pure pricing function: what would a swap of `amount_in` return right
    /// now? Used for UI estimates and for sizing position unwinds. Never
    /// mutates the reserves.
    pub fn quote(&self, amount_in: u64, direction: SwapDirection) -> Result<u64> {
        require!(self.status == MarketStatus::Active, AmmError::MarketNotActive);
        require_gt!(amount_in, 0, AmmError::ZeroAmount);
        self.compute_output(amount_in, direction)
    }

    // airlifted from uniswap v1:
    // https://github.com/Uniswap/v1-contracts/blob/c10c08d81d6114f694baa8bd32f555a40f6264da/contracts/uniswap_exchange.vy#L106-L111
    fn compute_output(&self, amount_in: u64, direction: SwapDirection) -> Result<u64> {
        let (input_reserve, output_reserve) = match direction {
            SwapDirection::BaseToQuote => (self.base_reserves, self.quote_reserves),
            SwapDirection::QuoteToBase => (self.quote_reserves, self.base_reserves),
        };

        require_neq!(input_reserve, 0, AmmError::ZeroReserves);
        require_neq!(output_reserve, 0, AmmError::ZeroReserves);

        let amount_in_with_fee = amount_in as u128 * (MAX_BPS - TAKER_FEE_BPS) as u128;

        let numerator = amount_in_with_fee
            .checked_mul(output_reserve as u128)
            .ok_or(AmmError::Overflow)?;
        let denominator = (input_reserve as u128 * MAX_BPS as u128) + amount_in_with_fee;

        Ok((numerator / denominator) as u64)
    }
}

#[error_code]
pub enum AmmError {
    #[msg("Market is not active")]
    MarketNotActive,
    #[msg("Market has already been opened")]
    MarketAlreadyOpen,
    #[msg("Reserves must be positive")]
    ZeroReserves,
    #[msg("Amount must be greater than zero")]
    ZeroAmount,
    #[msg("Slippage tolerance exceeded")]
    SlippageExceeded,
    #[msg("Arithmetic overflow")]
    Overflow,
    #[msg("Constant-product invariant violated")]
    InvariantViolated,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(base: u64, quote: u64) -> Pool {
        let mut pool = Pool::default();
        pool.open(base, quote).unwrap();
        pool
    }

    #[test]
    fn test_swap_output_matches_curve() {
        let mut p = pool(1_000_000, 1_000_000);

        // out = (in * 9970 * out_res) / (in_res * 10000 + in * 9970)
        let out = p.swap(100_000, SwapDirection::BaseToQuote, 0).unwrap();
        assert_eq!(out, 90_661);
        assert_eq!(p.base_reserves, 1_100_000);
        assert_eq!(p.quote_reserves, 909_339);
    }

    #[test]
    fn test_k_never_decreases() {
        let mut p = pool(1_000_000, 2_000_000);
        let mut k = p.k();

        for (amount, direction) in [
            (50_000, SwapDirection::BaseToQuote),
            (125_000, SwapDirection::QuoteToBase),
            (1, SwapDirection::BaseToQuote),
            (999_999, SwapDirection::QuoteToBase),
        ] {
            p.swap(amount, direction, 0).unwrap();
            let new_k = p.k();
            assert!(new_k >= k);
            k = new_k;
        }
    }

    #[test]
    fn test_slippage_exceeded() {
        let mut p = pool(1_000_000, 1_000_000);

        let quoted = p.quote(100_000, SwapDirection::BaseToQuote).unwrap();
        let err = p.swap(100_000, SwapDirection::BaseToQuote, quoted + 1);
        assert!(err.is_err());

        // the failed swap left the reserves untouched
        assert_eq!(p.base_reserves, 1_000_000);
        assert_eq!(p.quote_reserves, 1_000_000);
    }

    #[test]
    fn test_quote_is_pure_and_matches_swap() {
        let mut p = pool(5_000_000, 3_000_000);

        let quoted = p.quote(250_000, SwapDirection::QuoteToBase).unwrap();
        assert_eq!(p.base_reserves, 5_000_000);

        let out = p.swap(250_000, SwapDirection::QuoteToBase, quoted).unwrap();
        assert_eq!(out, quoted);
    }

    #[test]
    fn test_fee_reduces_output() {
        let p = pool(1_000_000, 1_000_000);
        let with_fee = p.quote(100_000, SwapDirection::BaseToQuote).unwrap();

        // feeless constant product for comparison
        let feeless = (100_000u128 * 1_000_000 / 1_100_000) as u64;
        assert!(with_fee < feeless);
    }

    #[test]
    fn test_no_swaps_once_closed() {
        let mut p = pool(1_000_000, 1_000_000);
        let (base, quote) = p.close().unwrap();
        assert_eq!((base, quote), (1_000_000, 1_000_000));

        assert!(p.swap(1_000, SwapDirection::BaseToQuote, 0).is_err());
        assert!(p.quote(1_000, SwapDirection::BaseToQuote).is_err());
    }

    #[test]
    fn test_spot_price_scaling() {
        // 2 quote units per base unit
        let p = pool(1_000_000, 2_000_000);
        assert_eq!(p.spot_price().unwrap(), 2 * PRICE_SCALE);
    }
}
