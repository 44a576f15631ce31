//! Conditional Token Trading
//!
//! Swaps base-conditionals against quote-conditionals on one of the two
//! markets. Every swap first samples the pre-trade prices into the TWAP
//! oracle, then executes against the constant-product curve; pricing the
//! elapsed interval before the trade lands is what keeps a single large
//! swap from dragging the resolution signal with it.

use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::AssociatedToken,
    token_interface::{
        transfer_checked, Mint, TokenAccount, TokenInterface, TransferChecked,
    },
};

use crate::amm::SwapDirection;
use crate::state::{Config, Proposal, Side};

/// Event emitted on every executed swap
#[event]
pub struct SwapExecuted {
    pub proposal_id: u64,
    pub user: Pubkey,
    pub market: u8,
    pub amount_in: u64,
    pub amount_out: u64,
    pub seq_num: u64,
}

#[derive(Accounts)]
#[instruction(market: Side)]
pub struct Swap<'info> {
    #[account(mut)]
    pub user: Signer<'info>,

    #[account(
        seeds = [Config::SEED],
        bump = config.bump,
    )]
    pub config: Box<Account<'info, Config>>,

    #[account(mut)]
    pub proposal: Box<Account<'info, Proposal>>,

    #[account(
        constraint = base_conditional_mint.key() == proposal.market_mints(market).0
            @ SwapError::WrongMint,
    )]
    pub base_conditional_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(
        constraint = quote_conditional_mint.key() == proposal.market_mints(market).1
            @ SwapError::WrongMint,
    )]
    pub quote_conditional_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(
        init_if_needed,
        payer = user,
        associated_token::mint = base_conditional_mint,
        associated_token::authority = user,
    )]
    pub user_base_conditional: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        init_if_needed,
        payer = user,
        associated_token::mint = quote_conditional_mint,
        associated_token::authority = user,
    )]
    pub user_quote_conditional: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = base_conditional_mint,
        associated_token::authority = proposal,
    )]
    pub market_base_reserve: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = quote_conditional_mint,
        associated_token::authority = proposal,
    )]
    pub market_quote_reserve: Box<InterfaceAccount<'info, TokenAccount>>,

    pub token_program: Interface<'info, TokenInterface>,
    pub associated_token_program: Program<'info, AssociatedToken>,
    pub system_program: Program<'info, System>,
}

impl<'info> Swap<'info> {
    pub fn swap(
        &mut self,
        market: Side,
        direction: SwapDirection,
        amount_in: u64,
        min_amount_out: u64,
    ) -> Result<u64> {
        let clock = Clock::get()?;

        require!(!self.config.paused, SwapError::ProtocolPaused);
        self.proposal.assert_trading(clock.unix_timestamp)?;

        // sample pre-trade prices; a dropped observation is not fatal to the
        // trade, the oracle just waits for the next interval
        if let Err(e) = self.proposal.observe(clock.unix_timestamp) {
            msg!("oracle observation dropped: {}", e);
        }

        let (user_in, user_out) = match direction {
            SwapDirection::BaseToQuote => {
                (&self.user_base_conditional, &self.user_quote_conditional)
            }
            SwapDirection::QuoteToBase => {
                (&self.user_quote_conditional, &self.user_base_conditional)
            }
        };
        let (market_in, market_out) = match direction {
            SwapDirection::BaseToQuote => (&self.market_base_reserve, &self.market_quote_reserve),
            SwapDirection::QuoteToBase => (&self.market_quote_reserve, &self.market_base_reserve),
        };
        let (in_mint, out_mint) = match direction {
            SwapDirection::BaseToQuote => (&self.base_conditional_mint, &self.quote_conditional_mint),
            SwapDirection::QuoteToBase => (&self.quote_conditional_mint, &self.base_conditional_mint),
        };

        require_gte!(user_in.amount, amount_in, SwapError::InsufficientBalance);

        let amount_out =
            self.proposal
                .market_mut(market)
                .swap(amount_in, direction, min_amount_out)?;

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
            amount_in,
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

        self.proposal.seq_num += 1;

        emit!(SwapExecuted {
            proposal_id: self.proposal.id,
            user: self.user.key(),
            market: market as u8,
            amount_in,
            amount_out,
            seq_num: self.proposal.seq_num,
        });

        Ok(amount_out)
    }
}

#[error_code]
pub enum SwapError {
    #[msg("Protocol is paused")]
    ProtocolPaused,
    #[msg("Mint does not belong to this market")]
    WrongMint,
    #[msg("Insufficient token balance")]
    InsufficientBalance,
}
