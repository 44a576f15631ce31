//! Fee Assessment
//!
//! Fees are charged on the spread of a deposit-back flow: when a keeper
//! withdraws from an external liquidity position and re-deposits, whatever
//! was withdrawn but not re-committed is treated as realized profit and is
//! subject to the fee. A net loss or an exact round-trip contributes nothing.

/// Per-asset fee: `max(0, withdrawn - deposited)`, never negative.
///
/// Returns `(base_fee, quote_fee)`.
pub fn calculate_fees(
    withdrawn_base: u64,
    deposited_base: u64,
    withdrawn_quote: u64,
    deposited_quote: u64,
) -> (u64, u64) {
    (
        withdrawn_base.saturating_sub(deposited_base),
        withdrawn_quote.saturating_sub(deposited_quote),
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_pays_nothing() {
        assert_eq!(calculate_fees(500, 500, 0, 0), (0, 0));
    }

    #[test]
    fn test_profit_is_the_spread() {
        assert_eq!(calculate_fees(500, 300, 0, 0), (200, 0));
    }

    #[test]
    fn test_loss_never_goes_negative() {
        assert_eq!(calculate_fees(300, 500, 0, 0), (0, 0));
    }

    #[test]
    fn test_assets_are_independent() {
        assert_eq!(calculate_fees(500, 300, 300, 500), (200, 0));
        assert_eq!(calculate_fees(0, 0, 1_000, 250), (0, 750));
    }
}
