//! Fee Collection
//!
//! Invoked by the keeper as the tail of a deposit-back flow against an
//! external liquidity position: it reports what was withdrawn and what was
//! re-deposited, and the spread is swept to the configured collector.
//!
//! Creating the collector's token accounts is batched into the same atomic
//! instruction and is idempotent: repeating the call with existing accounts
//! is safe. If no fee collector is configured, this is a documented no-op
//! that reports itself as skipped rather than failing: running without fee
//! collection is a valid deployment choice.

use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::AssociatedToken,
    token_interface::{transfer_checked, Mint, TokenAccount, TokenInterface, TransferChecked},
};

use crate::fees::calculate_fees;
use crate::state::Config;

/// Event emitted when fees are swept
#[event]
pub struct FeesCollected {
    pub collector: Pubkey,
    pub base_fee: u64,
    pub quote_fee: u64,
}

/// Event emitted when fee collection is skipped because it is not configured
#[event]
pub struct FeeCollectionSkipped {
    pub keeper: Pubkey,
}

#[derive(Accounts)]
pub struct CollectFees<'info> {
    /// The keeper running the deposit-back flow; must be the admin
    #[account(
        mut,
        constraint = keeper.key() == config.admin @ CollectFeesError::Unauthorized,
    )]
    pub keeper: Signer<'info>,

    #[account(
        seeds = [Config::SEED],
        bump = config.bump,
    )]
    pub config: Box<Account<'info, Config>>,

    pub base_mint: Box<InterfaceAccount<'info, Mint>>,

    pub quote_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(
        mut,
        associated_token::mint = base_mint,
        associated_token::authority = keeper,
    )]
    pub keeper_base: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = quote_mint,
        associated_token::authority = keeper,
    )]
    pub keeper_quote: Box<InterfaceAccount<'info, TokenAccount>>,

    /// CHECK: validated against the configured fee collector in the handler
    pub fee_collector: Option<UncheckedAccount<'info>>,

    #[account(
        init_if_needed,
        payer = keeper,
        associated_token::mint = base_mint,
        associated_token::authority = fee_collector,
    )]
    pub fee_collector_base: Option<Box<InterfaceAccount<'info, TokenAccount>>>,

    #[account(
        init_if_needed,
        payer = keeper,
        associated_token::mint = quote_mint,
        associated_token::authority = fee_collector,
    )]
    pub fee_collector_quote: Option<Box<InterfaceAccount<'info, TokenAccount>>>,

    pub token_program: Interface<'info, TokenInterface>,
    pub associated_token_program: Program<'info, AssociatedToken>,
    pub system_program: Program<'info, System>,
}

impl<'info> CollectFees<'info> {
    pub fn collect_fees(
        &mut self,
        withdrawn_base: u64,
        deposited_base: u64,
        withdrawn_quote: u64,
        deposited_quote: u64,
    ) -> Result<()> {
        let Some(configured_collector) = self.config.fee_collector else {
            msg!("fee collection not configured; skipping");
            emit!(FeeCollectionSkipped {
                keeper: self.keeper.key(),
            });
            return Ok(());
        };

        let (Some(fee_collector), Some(fee_collector_base), Some(fee_collector_quote)) = (
            &self.fee_collector,
            &self.fee_collector_base,
            &self.fee_collector_quote,
        ) else {
            return err!(CollectFeesError::MissingCollectorAccounts);
        };
        require_keys_eq!(
            fee_collector.key(),
            configured_collector,
            CollectFeesError::WrongCollector
        );

        let (base_fee, quote_fee) = calculate_fees(
            withdrawn_base,
            deposited_base,
            withdrawn_quote,
            deposited_quote,
        );

        for (amount, from, mint, to) in [
            (
                base_fee,
                &self.keeper_base,
                &self.base_mint,
                fee_collector_base,
            ),
            (
                quote_fee,
                &self.keeper_quote,
                &self.quote_mint,
                fee_collector_quote,
            ),
        ] {
            if amount == 0 {
                continue;
            }

            transfer_checked(
                CpiContext::new(
                    self.token_program.to_account_info(),
                    TransferChecked {
                        from: from.to_account_info(),
                        mint: mint.to_account_info(),
                        to: to.to_account_info(),
                        authority: self.keeper.to_account_info(),
                    },
                ),
                amount,
                mint.decimals,
            )?;
        }

        emit!(FeesCollected {
            collector: configured_collector,
            base_fee,
            quote_fee,
        });

        msg!("fees swept: {} base, {} quote", base_fee, quote_fee);

        Ok(())
    }
}

#[error_code]
pub enum CollectFeesError {
    #[msg("Only the admin keeper can sweep fees")]
    Unauthorized,
    #[msg("Fee collector accounts were not supplied")]
    MissingCollectorAccounts,
    #[msg("Account does not match the configured fee collector")]
    WrongCollector,
}
