//! # Futarchy: Decision Markets on Solana
//!
//! Proposals are decided by markets, not votes. Each proposal carries two
//! parallel markets trading conditional claims on the same underlying
//! tokens: one priced as if the proposal passes, one as if it fails. If the
//! time-weighted price of the pass market beats the fail market by a
//! threshold, the proposal passes.
//!
//! ## How it works
//! - Vaults mint pass/fail conditional tokens 1:1 against deposits and merge
//!   matched pairs back into the underlying.
//! - Two constant-product markets trade those conditionals; a TWAP oracle
//!   integrates their prices on every interaction.
//! - At the end of the window, finalization reads only the TWAP gap, so a
//!   single large trade cannot buy an outcome.

use anchor_lang::prelude::*;

pub mod amm;
pub mod fees;
pub mod instructions;
pub mod position;
pub mod state;

pub use amm::SwapDirection;
pub use instructions::*;
pub use state::{Side, VaultAsset};

// Replace with your deployed program ID
declare_id!("613BRiXuAEn7vibs2oAYzpGW9fXgjzDNuFMM4wPzLdY");

/// Main futarchy program
#[program]
pub mod futarchy {
    use super::*;

    /// Initialize the protocol with global configuration
    pub fn initialize(ctx: Context<Initialize>, params: InitializeParams) -> Result<()> {
        ctx.accounts.initialize(params, &ctx.bumps)
    }

    /// Update protocol configuration (admin only)
    pub fn update_config(ctx: Context<UpdateConfig>, params: UpdateConfigParams) -> Result<()> {
        ctx.accounts.update_config(params)
    }

    /// Create the proposal account (Step 1)
    pub fn create_proposal(
        ctx: Context<CreateProposal>,
        question: String,
        trading_period_seconds: u32,
    ) -> Result<()> {
        ctx.accounts
            .create_proposal(question, trading_period_seconds, &ctx.bumps)
    }

    /// Create one asset's conditional mints, escrow and market reserves
    /// (Step 2 for the base asset, Step 3 for the quote asset)
    pub fn create_vault_accounts(
        ctx: Context<CreateVaultAccounts>,
        asset: VaultAsset,
    ) -> Result<()> {
        ctx.accounts.create_vault_accounts(asset)
    }

    /// Seed both markets and open the proposal for trading (Step 4)
    pub fn fund_markets(
        ctx: Context<FundMarkets>,
        base_liquidity: u64,
        quote_liquidity: u64,
    ) -> Result<()> {
        ctx.accounts.fund_markets(base_liquidity, quote_liquidity)
    }

    /// Deposit the underlying, receiving both conditional types 1:1
    pub fn split_tokens(
        ctx: Context<InteractWithVault>,
        asset: VaultAsset,
        amount: u64,
    ) -> Result<()> {
        ctx.accounts.split(asset, amount)
    }

    /// Burn a matched conditional pair, releasing the underlying
    pub fn merge_tokens(
        ctx: Context<InteractWithVault>,
        asset: VaultAsset,
        amount: u64,
    ) -> Result<()> {
        ctx.accounts.merge(asset, amount)
    }

    /// Redeem winning conditionals for the underlying after finalization
    pub fn redeem_tokens(ctx: Context<InteractWithVault>, asset: VaultAsset) -> Result<u64> {
        ctx.accounts.redeem(asset)
    }

    /// Swap conditionals on the pass or fail market
    pub fn swap(
        ctx: Context<Swap>,
        market: Side,
        direction: SwapDirection,
        amount_in: u64,
        min_amount_out: u64,
    ) -> Result<u64> {
        ctx.accounts.swap(market, direction, amount_in, min_amount_out)
    }

    /// Record an oracle observation (permissionless)
    pub fn crank_twap(ctx: Context<CrankTwap>) -> Result<()> {
        ctx.accounts.crank_twap()
    }

    /// Unwind a percentage of a pass or fail position back into the
    /// underlying tokens
    pub fn close_position(ctx: Context<ClosePosition>, side: Side, percent: u8) -> Result<()> {
        ctx.accounts.close_position(side, percent)
    }

    /// Settle the proposal from the TWAP gap once the window has elapsed
    /// (permissionless, idempotent)
    pub fn finalize_proposal(ctx: Context<FinalizeProposal>) -> Result<()> {
        ctx.accounts.finalize_proposal()
    }

    /// Carry out a passed proposal's action, exactly once
    pub fn execute_proposal(ctx: Context<ExecuteProposal>) -> Result<()> {
        ctx.accounts.execute_proposal()
    }

    /// Sweep the spread of a deposit-back flow to the fee collector
    pub fn collect_fees(
        ctx: Context<CollectFees>,
        withdrawn_base: u64,
        deposited_base: u64,
        withdrawn_quote: u64,
        deposited_quote: u64,
    ) -> Result<()> {
        ctx.accounts.collect_fees(
            withdrawn_base,
            deposited_base,
            withdrawn_quote,
            deposited_quote,
        )
    }
}
