//! Position Unwinding
//!
//! Converts a slice of a directional position back into the regular tokens:
//! two reverse swaps (one per market, either skippable) followed by merging
//! whatever matched pairs exist afterwards.
//!
//! The merge amounts are re-read from the token accounts *after* the swaps
//! land, never taken from the plan. A reverse swap that cannot meet even the
//! wide unwind slippage band is skipped with a log rather than aborting the
//! unwind; the merge then simply consumes whatever pairs exist, and the
//! caller can re-invoke later. The next invocation plans from the new
//! balances, so nothing is ever unwound twice.

use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::AssociatedToken,
    token_interface::{
        burn, transfer_checked, Burn, Mint, TokenAccount, TokenInterface, TransferChecked,
    },
};

use crate::amm::SwapDirection;
use crate::position::{
    matched_merge_amounts, plan_close, unwind_min_out, ConditionalBalances, PlannedSwap,
};
use crate::state::{Config, Proposal, Side, VaultAsset};

/// Event emitted when a position slice is unwound
#[event]
pub struct PositionClosed {
    pub proposal_id: u64,
    pub user: Pubkey,
    pub side: u8,
    pub percent: u8,
    pub base_merged: u64,
    pub quote_merged: u64,
    pub seq_num: u64,
}

#[derive(Accounts)]
pub struct ClosePosition<'info> {
    #[account(mut)]
    pub user: Signer<'info>,

    #[account(
        seeds = [Config::SEED],
        bump = config.bump,
    )]
    pub config: Box<Account<'info, Config>>,

    #[account(mut)]
    pub proposal: Box<Account<'info, Proposal>>,

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
        init_if_needed,
        payer = user,
        associated_token::mint = pass_base_mint,
        associated_token::authority = user,
    )]
    pub user_pass_base: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        init_if_needed,
        payer = user,
        associated_token::mint = fail_base_mint,
        associated_token::authority = user,
    )]
    pub user_fail_base: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        init_if_needed,
        payer = user,
        associated_token::mint = pass_quote_mint,
        associated_token::authority = user,
    )]
    pub user_pass_quote: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        init_if_needed,
        payer = user,
        associated_token::mint = fail_quote_mint,
        associated_token::authority = user,
    )]
    pub user_fail_quote: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = base_mint,
        associated_token::authority = user,
    )]
    pub user_base: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = quote_mint,
        associated_token::authority = user,
    )]
    pub user_quote: Box<InterfaceAccount<'info, TokenAccount>>,

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

    pub token_program: Interface<'info, TokenInterface>,
    pub associated_token_program: Program<'info, AssociatedToken>,
    pub system_program: Program<'info, System>,
}

impl<'info> ClosePosition<'info> {
    pub fn close_position(&mut self, side: Side, percent: u8) -> Result<()> {
        let clock = Clock::get()?;

        require!(!self.config.paused, ClosePositionError::ProtocolPaused);
        self.proposal.assert_trading(clock.unix_timestamp)?;

        if let Err(e) = self.proposal.observe(clock.unix_timestamp) {
            msg!("oracle observation dropped: {}", e);
        }

        // step 1-2: size the reverse swaps from live balances
        let balances = ConditionalBalances {
            pass_base: self.user_pass_base.amount,
            fail_base: self.user_fail_base.amount,
            pass_quote: self.user_pass_quote.amount,
            fail_quote: self.user_fail_quote.amount,
        };
        let plan = plan_close(side, percent, balances)?;

        // step 3: execute the legs; order-independent
        if let Some(leg) = plan.pass_market {
            self.execute_leg(Side::Pass, leg)?;
        }
        if let Some(leg) = plan.fail_market {
            self.execute_leg(Side::Fail, leg)?;
        }

        // step 4: merge the matched pairs that actually exist now
        self.user_pass_base.reload()?;
        self.user_fail_base.reload()?;
        self.user_pass_quote.reload()?;
        self.user_fail_quote.reload()?;

        let (base_merged, quote_merged) = matched_merge_amounts(ConditionalBalances {
            pass_base: self.user_pass_base.amount,
            fail_base: self.user_fail_base.amount,
            pass_quote: self.user_pass_quote.amount,
            fail_quote: self.user_fail_quote.amount,
        });

        if base_merged > 0 {
            self.merge_pair(VaultAsset::Base, base_merged)?;
        }
        if quote_merged > 0 {
            self.merge_pair(VaultAsset::Quote, quote_merged)?;
        }

        self.proposal.seq_num += 1;

        emit!(PositionClosed {
            proposal_id: self.proposal.id,
            user: self.user.key(),
            side: side as u8,
            percent,
            base_merged,
            quote_merged,
            seq_num: self.proposal.seq_num,
        });

        Ok(())
    }

    /// One reverse swap against one market, inside the unwind slippage band.
    /// A leg that cannot clear the band is logged and skipped, not fatal.
    fn execute_leg(&mut self, market: Side, leg: PlannedSwap) -> Result<()> {
        let pool = self.proposal.market(market);
        let quoted = pool.quote(leg.amount_in, leg.direction)?;
        let min_out = unwind_min_out(quoted);

        let amount_out = match self
            .proposal
            .market_mut(market)
            .swap(leg.amount_in, leg.direction, min_out)
        {
            Ok(amount_out) => amount_out,
            Err(e) => {
                msg!("unwind leg on {:?} market skipped: {}", market, e);
                return Ok(());
            }
        };

        let (user_in, user_out, market_in, market_out, in_mint, out_mint) =
            self.leg_accounts(market, leg.direction);

        transfer_checked(
            CpiContext::new(
                self.token_program.to_account_info(),
                TransferChecked {
                    from: user_in.to_account_info(),
                    mint: in_mint.to_account_info(),
                    to: market_in.to_account_info(),
                    authority: self.user.to_account_info(),
                },
            ),
            leg.amount_in,
            in_mint.decimals,
        )?;

        let id_bytes = self.proposal.id.to_le_bytes();
        let seeds = &[Proposal::SEED, id_bytes.as_ref(), &[self.proposal.bump]];
        let signer_seeds = &[&seeds[..]];

        transfer_checked(
            CpiContext::new_with_signer(
                self.token_program.to_account_info(),
                TransferChecked {
                    from: market_out.to_account_info(),
                    mint: out_mint.to_account_info(),
                    to: user_out.to_account_info(),
                    authority: self.proposal.to_account_info(),
                },
                signer_seeds,
            ),
            amount_out,
            out_mint.decimals,
        )?;

        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn leg_accounts(
        &self,
        market: Side,
        direction: SwapDirection,
    ) -> (
        &Box<InterfaceAccount<'info, TokenAccount>>,
        &Box<InterfaceAccount<'info, TokenAccount>>,
        &Box<InterfaceAccount<'info, TokenAccount>>,
        &Box<InterfaceAccount<'info, TokenAccount>>,
        &Box<InterfaceAccount<'info, Mint>>,
        &Box<InterfaceAccount<'info, Mint>>,
    ) {
        let (user_base, user_quote, market_base, market_quote, base_mint, quote_mint) =
            match market {
                Side::Pass => (
                    &self.user_pass_base,
                    &self.user_pass_quote,
                    &self.pass_market_base_reserve,
                    &self.pass_market_quote_reserve,
                    &self.pass_base_mint,
                    &self.pass_quote_mint,
                ),
                Side::Fail => (
                    &self.user_fail_base,
                    &self.user_fail_quote,
                    &self.fail_market_base_reserve,
                    &self.fail_market_quote_reserve,
                    &self.fail_base_mint,
                    &self.fail_quote_mint,
                ),
            };

        match direction {
            SwapDirection::BaseToQuote => (
                user_base,
                user_quote,
                market_base,
                market_quote,
                base_mint,
                quote_mint,
            ),
            SwapDirection::QuoteToBase => (
                user_quote,
                user_base,
                market_quote,
                market_base,
                quote_mint,
                base_mint,
            ),
        }
    }

    /// Burn a matched conditional pair and release the underlying.
    fn merge_pair(&mut self, asset: VaultAsset, amount: u64) -> Result<()> {
        self.proposal.vault_mut(asset).merge(amount)?;

        let (pass_mint, fail_mint, user_pass, user_fail, escrow, underlying_mint, user_underlying) =
            match asset {
                VaultAsset::Base => (
                    &self.pass_base_mint,
                    &self.fail_base_mint,
                    &self.user_pass_base,
                    &self.user_fail_base,
                    &self.base_escrow,
                    &self.base_mint,
                    &self.user_base,
                ),
                VaultAsset::Quote => (
                    &self.pass_quote_mint,
                    &self.fail_quote_mint,
                    &self.user_pass_quote,
                    &self.user_fail_quote,
                    &self.quote_escrow,
                    &self.quote_mint,
                    &self.user_quote,
                ),
            };

        for (mint, source) in [(pass_mint, user_pass), (fail_mint, user_fail)] {
            burn(
                CpiContext::new(
                    self.token_program.to_account_info(),
                    Burn {
                        mint: mint.to_account_info(),
                        from: source.to_account_info(),
                        authority: self.user.to_account_info(),
                    },
                ),
                amount,
            )?;
        }

        let id_bytes = self.proposal.id.to_le_bytes();
        let seeds = &[Proposal::SEED, id_bytes.as_ref(), &[self.proposal.bump]];
        let signer_seeds = &[&seeds[..]];

        transfer_checked(
            CpiContext::new_with_signer(
                self.token_program.to_account_info(),
                TransferChecked {
                    from: escrow.to_account_info(),
                    mint: underlying_mint.to_account_info(),
                    to: user_underlying.to_account_info(),
                    authority: self.proposal.to_account_info(),
                },
                signer_seeds,
            ),
            amount,
            underlying_mint.decimals,
        )?;

        Ok(())
    }
}

#[error_code]
pub enum ClosePositionError {
    #[msg("Protocol is paused")]
    ProtocolPaused,
}
