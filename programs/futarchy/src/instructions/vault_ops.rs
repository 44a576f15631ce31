//! Vault Interactions
//!
//! Split, merge and redeem all touch the same accounts (one underlying
//! asset's escrow plus its two conditional mints), so they share a single
//! accounts struct, parameterized by which asset's vault is being used.
//!
//! Split and merge emit a balance-changed event after every call; downstream
//! liquidity tracking consumes these. The price oracle does not: it only
//! samples the markets.

use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::AssociatedToken,
    token_interface::{
        burn, mint_to, transfer_checked, Burn, Mint, MintTo, TokenAccount, TokenInterface,
        TransferChecked,
    },
};

use crate::state::{ensure_balances_for_merge, Config, Proposal, Side, VaultAsset, VaultError};

/// Event emitted whenever a vault's escrow or supplies change
#[event]
pub struct VaultBalanceChanged {
    pub proposal_id: u64,
    pub asset: u8,
    pub escrow: u64,
    pub pass_supply: u64,
    pub fail_supply: u64,
    pub seq_num: u64,
}

/// Event emitted when winning conditionals are redeemed
#[event]
pub struct ConditionalsRedeemed {
    pub proposal_id: u64,
    pub asset: u8,
    pub user: Pubkey,
    pub tokens_burned: u64,
}

/// Accounts shared by split, merge and redeem
#[derive(Accounts)]
#[instruction(asset: VaultAsset)]
pub struct InteractWithVault<'info> {
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
        constraint = underlying_mint.key() == proposal.underlying_mint(asset)
            @ VaultOpError::WrongMint,
    )]
    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(
        mut,
        constraint = pass_conditional_mint.key()
            == proposal.conditional_mint(asset, Side::Pass) @ VaultOpError::WrongMint,
    )]
    pub pass_conditional_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(
        mut,
        constraint = fail_conditional_mint.key()
            == proposal.conditional_mint(asset, Side::Fail) @ VaultOpError::WrongMint,
    )]
    pub fail_conditional_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(
        mut,
        associated_token::mint = underlying_mint,
        associated_token::authority = user,
    )]
    pub user_underlying: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        init_if_needed,
        payer = user,
        associated_token::mint = pass_conditional_mint,
        associated_token::authority = user,
    )]
    pub user_pass_conditional: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        init_if_needed,
        payer = user,
        associated_token::mint = fail_conditional_mint,
        associated_token::authority = user,
    )]
    pub user_fail_conditional: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = underlying_mint,
        associated_token::authority = proposal,
    )]
    pub escrow: Box<InterfaceAccount<'info, TokenAccount>>,

    pub token_program: Interface<'info, TokenInterface>,
    pub associated_token_program: Program<'info, AssociatedToken>,
    pub system_program: Program<'info, System>,
}

impl<'info> InteractWithVault<'info> {
    fn proposal_signer_seeds(&self) -> ([u8; 8], u8) {
        (self.proposal.id.to_le_bytes(), self.proposal.bump)
    }

    fn emit_balance_changed(&self, asset: VaultAsset) {
        let vault = self.proposal.vault(asset);
        emit!(VaultBalanceChanged {
            proposal_id: self.proposal.id,
            asset: asset as u8,
            escrow: vault.escrow,
            pass_supply: vault.pass_supply,
            fail_supply: vault.fail_supply,
            seq_num: self.proposal.seq_num,
        });
    }

    /// Deposit `amount` of the regular token, receiving `amount` of both
    /// conditional types.
    pub fn split(&mut self, asset: VaultAsset, amount: u64) -> Result<()> {
        require!(!self.config.paused, VaultOpError::ProtocolPaused);
        require_gte!(
            self.user_underlying.amount,
            amount,
            VaultError::InsufficientUnderlyingTokens
        );

        // state first: rejects zero amounts and non-active vaults
        self.proposal.vault_mut(asset).split(amount)?;

        transfer_checked(
            CpiContext::new(
                self.token_program.to_account_info(),
                TransferChecked {
                    from: self.user_underlying.to_account_info(),
                    mint: self.underlying_mint.to_account_info(),
                    to: self.escrow.to_account_info(),
                    authority: self.user.to_account_info(),
                },
            ),
            amount,
            self.underlying_mint.decimals,
        )?;

        let (id_bytes, bump) = self.proposal_signer_seeds();
        let seeds = &[Proposal::SEED, id_bytes.as_ref(), &[bump]];
        let signer_seeds = &[&seeds[..]];

        for (mint, destination) in [
            (&self.pass_conditional_mint, &self.user_pass_conditional),
            (&self.fail_conditional_mint, &self.user_fail_conditional),
        ] {
            mint_to(
                CpiContext::new_with_signer(
                    self.token_program.to_account_info(),
                    MintTo {
                        mint: mint.to_account_info(),
                        to: destination.to_account_info(),
                        authority: self.proposal.to_account_info(),
                    },
                    signer_seeds,
                ),
                amount,
            )?;
        }

        self.proposal.seq_num += 1;
        self.emit_balance_changed(asset);

        Ok(())
    }

    /// Burn `amount` of both conditional types, receiving `amount` of the
    /// regular token back.
    pub fn merge(&mut self, asset: VaultAsset, amount: u64) -> Result<()> {
        require!(!self.config.paused, VaultOpError::ProtocolPaused);
        ensure_balances_for_merge(
            self.user_pass_conditional.amount,
            self.user_fail_conditional.amount,
            amount,
        )?;

        self.proposal.vault_mut(asset).merge(amount)?;

        for (mint, source) in [
            (&self.pass_conditional_mint, &self.user_pass_conditional),
            (&self.fail_conditional_mint, &self.user_fail_conditional),
        ] {
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

        let (id_bytes, bump) = self.proposal_signer_seeds();
        let seeds = &[Proposal::SEED, id_bytes.as_ref(), &[bump]];
        let signer_seeds = &[&seeds[..]];

        transfer_checked(
            CpiContext::new_with_signer(
                self.token_program.to_account_info(),
                TransferChecked {
                    from: self.escrow.to_account_info(),
                    mint: self.underlying_mint.to_account_info(),
                    to: self.user_underlying.to_account_info(),
                    authority: self.proposal.to_account_info(),
                },
                signer_seeds,
            ),
            amount,
            self.underlying_mint.decimals,
        )?;

        self.proposal.seq_num += 1;
        self.emit_balance_changed(asset);

        Ok(())
    }

    /// Burn the caller's entire winning conditional balance for the
    /// underlying, 1:1. The losing type is not redeemable.
    pub fn redeem(&mut self, asset: VaultAsset) -> Result<u64> {
        let winner = self
            .proposal
            .winner()
            .ok_or(VaultOpError::ProposalNotFinalized)?;

        let (winning_mint, winning_account) = match winner {
            Side::Pass => (&self.pass_conditional_mint, &self.user_pass_conditional),
            Side::Fail => (&self.fail_conditional_mint, &self.user_fail_conditional),
        };

        let balance = winning_account.amount;
        require_gt!(balance, 0, VaultOpError::NoWinningTokens);

        self.proposal.vault_mut(asset).redeem(balance, winner)?;

        burn(
            CpiContext::new(
                self.token_program.to_account_info(),
                Burn {
                    mint: winning_mint.to_account_info(),
                    from: winning_account.to_account_info(),
                    authority: self.user.to_account_info(),
                },
            ),
            balance,
        )?;

        let (id_bytes, bump) = self.proposal_signer_seeds();
        let seeds = &[Proposal::SEED, id_bytes.as_ref(), &[bump]];
        let signer_seeds = &[&seeds[..]];

        transfer_checked(
            CpiContext::new_with_signer(
                self.token_program.to_account_info(),
                TransferChecked {
                    from: self.escrow.to_account_info(),
                    mint: self.underlying_mint.to_account_info(),
                    to: self.user_underlying.to_account_info(),
                    authority: self.proposal.to_account_info(),
                },
                signer_seeds,
            ),
            balance,
            self.underlying_mint.decimals,
        )?;

        self.proposal.seq_num += 1;

        emit!(ConditionalsRedeemed {
            proposal_id: self.proposal.id,
            asset: asset as u8,
            user: self.user.key(),
            tokens_burned: balance,
        });

        Ok(balance)
    }
}

#[error_code]
pub enum VaultOpError {
    #[msg("Protocol is paused")]
    ProtocolPaused,
    #[msg("Mint does not belong to this proposal")]
    WrongMint,
    #[msg("Proposal has not been finalized")]
    ProposalNotFinalized,
    #[msg("No winning tokens to redeem")]
    NoWinningTokens,
}
