//! Proposal State
//!
//! The aggregate root of one decision market. A proposal owns, by value, the
//! two conditional token vaults (one per underlying asset), the two
//! constant-product markets (pass and fail), and the TWAP oracle that decides
//! its outcome.
//!
//! ## Lifecycle
//!
//! ```text
//! Pending --finalize--> Passed --execute--> Executed
//!         \-finalize--> Failed
//! ```
//!
//! Transitions are monotonic: nothing skips a state and nothing reverses.

use anchor_lang::prelude::*;

use crate::amm::{Pool, TwapOracle, TwapUpdate};
use crate::state::{Side, VaultAsset, VaultState};

/// One decision market
///
/// Seeds: ["proposal", id.to_le_bytes()]
#[account]
#[derive(InitSpace)]
pub struct Proposal {
    /// Unique proposal identifier
    pub id: u64,

    /// Proposal creator; receives the market liquidity back at finalization
    pub proposer: Pubkey,

    /// What is being decided
    /// Example: "Hire a head of growth?"
    #[max_len(256)]
    pub question: String,

    /// Unix timestamp when the proposal was created
    pub created_at: i64,

    /// Unix timestamp when the voting window ends
    pub end_time: i64,

    /// Unix timestamp of finalization (0 while pending)
    pub finalized_at: i64,

    /// Underlying base token mint (the asset being governed, e.g. a DAO token)
    pub base_mint: Pubkey,

    /// Underlying quote token mint (e.g. USDC)
    pub quote_mint: Pubkey,

    /// Conditional-on-pass base token mint
    pub pass_base_mint: Pubkey,

    /// Conditional-on-fail base token mint
    pub fail_base_mint: Pubkey,

    /// Conditional-on-pass quote token mint
    pub pass_quote_mint: Pubkey,

    /// Conditional-on-fail quote token mint
    pub fail_quote_mint: Pubkey,

    /// Lifecycle status
    pub status: ProposalStatus,

    /// Vault escrowing the base token across both markets
    pub base_vault: VaultState,

    /// Vault escrowing the quote token across both markets
    pub quote_vault: VaultState,

    /// Pass-conditional market
    pub pass_market: Pool,

    /// Fail-conditional market
    pub fail_market: Pool,

    /// Price oracle deciding the outcome
    pub oracle: TwapOracle,

    /// Event ordering sequence number, bumped on every mutation
    pub seq_num: u64,

    /// PDA bump seed
    pub bump: u8,
}

/// Proposal lifecycle status
#[derive(
    AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, InitSpace, Debug, Default,
)]
pub enum ProposalStatus {
    /// Markets are open for trading
    #[default]
    Pending,
    /// The pass TWAP cleared the threshold
    Passed,
    /// The pass TWAP did not clear the threshold
    Failed,
    /// The attached action has been carried out
    Executed,
}

/// What `finalize` decided and how much market liquidity it recovered
#[derive(Clone, Copy, Debug)]
pub struct FinalizeOutcome {
    pub status: ProposalStatus,
    pub recovered_base: u64,
    pub recovered_quote: u64,
}

impl Proposal {
    pub const SEED: &'static [u8] = b"proposal";

    pub fn underlying_mint(&self, asset: VaultAsset) -> Pubkey {
        match asset {
            VaultAsset::Base => self.base_mint,
            VaultAsset::Quote => self.quote_mint,
        }
    }

    pub fn conditional_mint(&self, asset: VaultAsset, side: Side) -> Pubkey {
        match (asset, side) {
            (VaultAsset::Base, Side::Pass) => self.pass_base_mint,
            (VaultAsset::Base, Side::Fail) => self.fail_base_mint,
            (VaultAsset::Quote, Side::Pass) => self.pass_quote_mint,
            (VaultAsset::Quote, Side::Fail) => self.fail_quote_mint,
        }
    }

    /// The (base-conditional, quote-conditional) mints a market trades
    pub fn market_mints(&self, market: Side) -> (Pubkey, Pubkey) {
        (
            self.conditional_mint(VaultAsset::Base, market),
            self.conditional_mint(VaultAsset::Quote, market),
        )
    }

    pub fn vault(&self, asset: VaultAsset) -> &VaultState {
        match asset {
            VaultAsset::Base => &self.base_vault,
            VaultAsset::Quote => &self.quote_vault,
        }
    }

    pub fn vault_mut(&mut self, asset: VaultAsset) -> &mut VaultState {
        match asset {
            VaultAsset::Base => &mut self.base_vault,
            VaultAsset::Quote => &mut self.quote_vault,
        }
    }

    pub fn market(&self, side: Side) -> &Pool {
        match side {
            Side::Pass => &self.pass_market,
            Side::Fail => &self.fail_market,
        }
    }

    pub fn market_mut(&mut self, side: Side) -> &mut Pool {
        match side {
            Side::Pass => &mut self.pass_market,
            Side::Fail => &mut self.fail_market,
        }
    }

    /// The winning side, once decided
    pub fn winner(&self) -> Option<Side> {
        match self.status {
            ProposalStatus::Pending => None,
            ProposalStatus::Passed | ProposalStatus::Executed => Some(Side::Pass),
            ProposalStatus::Failed => Some(Side::Fail),
        }
    }

    /// Trading (swaps, splits, merges, unwinds) is only allowed while the
    /// proposal is pending and inside the voting window.
    pub fn assert_trading(&self, now: i64) -> Result<()> {
        require!(
            self.status == ProposalStatus::Pending,
            ProposalError::ProposalNotPending
        );
        require!(now < self.end_time, ProposalError::TradingEnded);
        Ok(())
    }

    /// Sample both markets' spot prices into the oracle.
    ///
    /// Called on every market interaction and by the permissionless crank.
    pub fn observe(&mut self, now: i64) -> Result<TwapUpdate> {
        let pass_price = self.pass_market.spot_price()?;
        let fail_price = self.fail_market.spot_price()?;
        self.oracle.update(pass_price, fail_price, now)
    }

    /// Read the oracle and settle the proposal.
    ///
    /// One-time, idempotent transition: once decided, repeated calls return
    /// the already-decided status instead of re-deciding. On the deciding
    /// call, both markets close, both vaults finalize, and the winning
    /// conditionals held as market reserves are redeemed back against escrow
    /// (the recovered amounts are returned so the caller can pay the
    /// proposer out).
    pub fn finalize(&mut self, now: i64) -> Result<FinalizeOutcome> {
        if self.status != ProposalStatus::Pending {
            return Ok(FinalizeOutcome {
                status: self.status,
                recovered_base: 0,
                recovered_quote: 0,
            });
        }

        require_gte!(now, self.end_time, ProposalError::VotingPeriodNotOver);

        let winner = self.oracle.resolve()?;

        let pass_reserves = self.pass_market.close()?;
        let fail_reserves = self.fail_market.close()?;
        let (recovered_base, recovered_quote) = match winner {
            Side::Pass => pass_reserves,
            Side::Fail => fail_reserves,
        };

        self.base_vault.finalize()?;
        self.quote_vault.finalize()?;
        self.base_vault.redeem(recovered_base, winner)?;
        self.quote_vault.redeem(recovered_quote, winner)?;

        self.status = match winner {
            Side::Pass => ProposalStatus::Passed,
            Side::Fail => ProposalStatus::Failed,
        };
        self.finalized_at = now;

        Ok(FinalizeOutcome {
            status: self.status,
            recovered_base,
            recovered_quote,
        })
    }

    /// Carry out the proposal's attached action. Valid exactly once, and
    /// only from `Passed`.
    pub fn execute(&mut self) -> Result<()> {
        match self.status {
            ProposalStatus::Passed => {
                self.status = ProposalStatus::Executed;
                Ok(())
            }
            ProposalStatus::Executed => err!(ProposalError::ProposalAlreadyExecuted),
            _ => err!(ProposalError::ProposalNotPassed),
        }
    }
}

#[error_code]
pub enum ProposalError {
    #[msg("Proposal is not pending")]
    ProposalNotPending,
    #[msg("Voting window has ended")]
    TradingEnded,
    #[msg("Voting window has not ended yet")]
    VotingPeriodNotOver,
    #[msg("Proposal did not pass")]
    ProposalNotPassed,
    #[msg("Proposal has already been executed")]
    ProposalAlreadyExecuted,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amm::PRICE_SCALE;

    const END_TIME: i64 = 1_000;
    const LIQUIDITY: u64 = 1_000_000;

    /// A funded proposal whose pass market trades at `pass_premium_bps`
    /// above the fail market for the whole window.
    fn funded_proposal(pass_premium_bps: u64, threshold_bps: u16) -> Proposal {
        let mut proposal = Proposal {
            id: 0,
            proposer: Pubkey::default(),
            question: "Hire a head of growth?".to_string(),
            created_at: 0,
            end_time: END_TIME,
            finalized_at: 0,
            base_mint: Pubkey::new_unique(),
            quote_mint: Pubkey::new_unique(),
            pass_base_mint: Pubkey::new_unique(),
            fail_base_mint: Pubkey::new_unique(),
            pass_quote_mint: Pubkey::new_unique(),
            fail_quote_mint: Pubkey::new_unique(),
            status: ProposalStatus::Pending,
            base_vault: VaultState::default(),
            quote_vault: VaultState::default(),
            pass_market: Pool::default(),
            fail_market: Pool::default(),
            oracle: TwapOracle::new(0, PRICE_SCALE, u128::MAX / 4, 0, 60, threshold_bps),
            seq_num: 0,
            bump: 0,
        };

        proposal.base_vault.activate().unwrap();
        proposal.quote_vault.activate().unwrap();
        proposal.base_vault.split(2 * LIQUIDITY).unwrap();
        proposal.quote_vault.split(2 * LIQUIDITY).unwrap();

        let pass_quote = LIQUIDITY + LIQUIDITY * pass_premium_bps / 10_000;
        proposal.pass_market.open(LIQUIDITY, pass_quote).unwrap();
        proposal.fail_market.open(LIQUIDITY, LIQUIDITY).unwrap();

        // extra quote conditionals beyond the seeded reserves stay with the
        // proposer; top the vault up so supplies match what circulates
        let extra = pass_quote.saturating_sub(LIQUIDITY);
        if extra > 0 {
            proposal.quote_vault.split(extra).unwrap();
        }

        proposal.observe(END_TIME).unwrap();
        proposal
    }

    #[test]
    fn test_finalize_too_early() {
        let mut proposal = funded_proposal(500, 300);
        assert!(proposal.finalize(END_TIME - 1).is_err());
        assert_eq!(proposal.status, ProposalStatus::Pending);
    }

    #[test]
    fn test_finalize_passes_above_threshold() {
        let mut proposal = funded_proposal(500, 300);

        let outcome = proposal.finalize(END_TIME).unwrap();
        assert_eq!(outcome.status, ProposalStatus::Passed);
        assert_eq!(proposal.winner(), Some(Side::Pass));
        assert!(proposal.finalized_at > 0);

        // markets closed, vaults finalized, reserves recovered from escrow
        assert!(proposal
            .pass_market
            .swap(1, crate::amm::SwapDirection::BaseToQuote, 0)
            .is_err());
        assert_eq!(outcome.recovered_base, LIQUIDITY);
        assert_eq!(
            proposal.base_vault.escrow,
            2 * LIQUIDITY - outcome.recovered_base
        );
    }

    #[test]
    fn test_finalize_fails_below_threshold() {
        let mut proposal = funded_proposal(250, 300);

        let outcome = proposal.finalize(END_TIME).unwrap();
        assert_eq!(outcome.status, ProposalStatus::Failed);
        assert_eq!(proposal.winner(), Some(Side::Fail));
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut proposal = funded_proposal(500, 300);

        let first = proposal.finalize(END_TIME).unwrap();
        let again = proposal.finalize(END_TIME + 9_999).unwrap();

        // the decision is returned, not re-made, and nothing is recovered twice
        assert_eq!(again.status, first.status);
        assert_eq!(again.recovered_base, 0);
        assert_eq!(again.recovered_quote, 0);
    }

    #[test]
    fn test_execute_exactly_once_from_passed() {
        let mut proposal = funded_proposal(500, 300);
        proposal.finalize(END_TIME).unwrap();

        proposal.execute().unwrap();
        assert_eq!(proposal.status, ProposalStatus::Executed);
        assert!(proposal.execute().is_err());
    }

    #[test]
    fn test_execute_requires_passed() {
        let mut proposal = funded_proposal(0, 300);

        // still pending
        assert!(proposal.execute().is_err());

        proposal.finalize(END_TIME).unwrap();
        assert_eq!(proposal.status, ProposalStatus::Failed);
        assert!(proposal.execute().is_err());
    }

    #[test]
    fn test_trading_window() {
        let mut proposal = funded_proposal(500, 300);
        proposal.assert_trading(END_TIME - 1).unwrap();
        assert!(proposal.assert_trading(END_TIME).is_err());

        proposal.finalize(END_TIME).unwrap();
        assert!(proposal.assert_trading(0).is_err());
    }
}
