//! Proposal Finalization
//!
//! Permissionless: once the voting window has elapsed, anyone may ask the
//! oracle for its verdict. The decision reads strictly the time-weighted
//! aggregations, never the instantaneous spot price.
//!
//! Finalization is a one-time transition but the instruction is idempotent:
//! calling it again after the proposal is decided logs the existing status
//! and succeeds without touching anything.
//!
//! On the deciding call the markets close, and the winning conditionals held
//! as market reserves are redeemed 1:1 against escrow and returned to the
//! proposer who funded them. The losing market's reserves are worthless by
//! construction and stay where they are.

use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::AssociatedToken,
    token_interface::{
        burn, transfer_checked, Burn, Mint, TokenAccount, TokenInterface, TransferChecked,
    },
};

use crate::state::{Proposal, ProposalStatus, Side};

/// Event emitted when a proposal is decided
#[event]
pub struct ProposalFinalized {
    pub proposal_id: u64,
    pub status: u8,
    pub pass_twap: u128,
    pub fail_twap: u128,
    pub gap_bps: i64,
    pub recovered_base: u64,
    pub recovered_quote: u64,
}

#[derive(Accounts)]
pub struct FinalizeProposal<'info> {
    /// Anyone may finalize once the window has elapsed; pays rent for the
    /// proposer's token accounts if they don't exist yet
    #[account(mut)]
    pub cranker: Signer<'info>,

    #[account(mut)]
    pub proposal: Box<Account<'info, Proposal>>,

    /// CHECK: must be the proposer recorded on the proposal
    #[account(
        constraint = proposer.key() == proposal.proposer @ FinalizeError::WrongProposer,
    )]
    pub proposer: UncheckedAccount<'info>,

    #[account(constraint = base_mint.key() == proposal.base_mint)]
    pub base_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(constraint = quote_mint.key() == proposal.quote_mint)]
    pub quote_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(mut, constraint = pass_base_mint.key() == proposal.pass_base_mint)]
    pub pass_base_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(mut, constraint = fail_base_mint.key() == proposal.fail_base_mint)]
    pub fail_base_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(mut, constraint = pass_quote_mint.key() == proposal.pass_quote_mint)]
    pub pass_quote_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(mut, constraint = fail_quote_mint.key() == proposal.fail_quote_mint)]
    pub fail_quote_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(
        mut,
        associated_token::mint = base_mint,
        associated_token::authority = proposal,
    )]
    pub base_escrow: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = quote_mint,
        associated_token::authority = proposal,
    )]
    pub quote_escrow: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = pass_base_mint,
        associated_token::authority = proposal,
    )]
    pub pass_market_base_reserve: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = pass_quote_mint,
        associated_token::authority = proposal,
    )]
    pub pass_market_quote_reserve: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = fail_base_mint,
        associated_token::authority = proposal,
    )]
    pub fail_market_base_reserve: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = fail_quote_mint,
        associated_token::authority = proposal,
    )]
    pub fail_market_quote_reserve: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        init_if_needed,
        payer = cranker,
        associated_token::mint = base_mint,
        associated_token::authority = proposer,
    )]
    pub proposer_base: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        init_if_needed,
        payer = cranker,
        associated_token::mint = quote_mint,
        associated_token::authority = proposer,
    )]
    pub proposer_quote: Box<InterfaceAccount<'info, TokenAccount>>,

    pub token_program: Interface<'info, TokenInterface>,
    pub associated_token_program: Program<'info, AssociatedToken>,
    pub system_program: Program<'info, System>,
}

impl<'info> FinalizeProposal<'info> {
    pub fn finalize_proposal(&mut self) -> Result<()> {
        let clock = Clock::get()?;

        if self.proposal.status != ProposalStatus::Pending {
            msg!(
                "proposal {} already decided: {:?}",
                self.proposal.id,
                self.proposal.status
            );
            return Ok(());
        }

        let outcome = self.proposal.finalize(clock.unix_timestamp)?;

        let (winning_base_mint, winning_base_reserve, winning_quote_mint, winning_quote_reserve) =
            match outcome.status {
                ProposalStatus::Passed => (
                    &self.pass_base_mint,
                    &self.pass_market_base_reserve,
                    &self.pass_quote_mint,
                    &self.pass_market_quote_reserve,
                ),
                _ => (
                    &self.fail_base_mint,
                    &self.fail_market_base_reserve,
                    &self.fail_quote_mint,
                    &self.fail_market_quote_reserve,
                ),
            };

        let id_bytes = self.proposal.id.to_le_bytes();
        let seeds = &[Proposal::SEED, id_bytes.as_ref(), &[self.proposal.bump]];
        let signer_seeds = &[&seeds[..]];

        // redeem the recovered market reserves: burn the winning conditionals
        // and pay the escrowed underlying out to the proposer
        for (amount, conditional_mint, reserve, escrow, underlying_mint, destination) in [
            (
                outcome.recovered_base,
                winning_base_mint,
                winning_base_reserve,
                &self.base_escrow,
                &self.base_mint,
                &self.proposer_base,
            ),
            (
                outcome.recovered_quote,
                winning_quote_mint,
                winning_quote_reserve,
                &self.quote_escrow,
                &self.quote_mint,
                &self.proposer_quote,
            ),
        ] {
            if amount == 0 {
                continue;
            }

            burn(
                CpiContext::new_with_signer(
                    self.token_program.to_account_info(),
                    Burn {
                        mint: conditional_mint.to_account_info(),
                        from: reserve.to_account_info(),
                        authority: self.proposal.to_account_info(),
                    },
                    signer_seeds,
                ),
                amount,
            )?;

            transfer_checked(
                CpiContext::new_with_signer(
                    self.token_program.to_account_info(),
                    TransferChecked {
                        from: escrow.to_account_info(),
                        mint: underlying_mint.to_account_info(),
                        to: destination.to_account_info(),
                        authority: self.proposal.to_account_info(),
                    },
                    signer_seeds,
                ),
                amount,
                underlying_mint.decimals,
            )?;
        }

        self.proposal.seq_num += 1;

        emit!(ProposalFinalized {
            proposal_id: self.proposal.id,
            status: outcome.status as u8,
            pass_twap: self.proposal.oracle.twap(Side::Pass)?,
            fail_twap: self.proposal.oracle.twap(Side::Fail)?,
            gap_bps: self.proposal.oracle.gap_bps()?,
            recovered_base: outcome.recovered_base,
            recovered_quote: outcome.recovered_quote,
        });

        msg!(
            "proposal {} finalized: {:?}",
            self.proposal.id,
            outcome.status
        );

        Ok(())
    }
}

#[error_code]
pub enum FinalizeError {
    #[msg("Account is not the recorded proposer")]
    WrongProposer,
}
