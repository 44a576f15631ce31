//! Proposal Creation Pipeline
//!
//! Creating a decision market takes four mints, two escrows and four market
//! reserve accounts, far too much for one transaction's stack. The process
//! is split into sequential steps; every component stays `Uninitialized`
//! until the funding step, which flips the whole proposal live together, so
//! a half-created proposal can never trade.
//!
//! Step 1: CreateProposal      - Initializes the proposal account.
//! Step 2: CreateVaultAccounts - Conditional mints, escrow and market
//!                               reserves for the base asset.
//! Step 3: CreateVaultAccounts - Same, for the quote asset.
//! Step 4: FundMarkets         - Seeds both markets, activates both vaults,
//!                               starts the oracle.

use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::AssociatedToken,
    token_interface::{
        mint_to, transfer_checked, Mint, MintTo, TokenAccount, TokenInterface, TransferChecked,
    },
};

use crate::amm::{Pool, TwapOracle, PRICE_SCALE};
use crate::state::{Config, Proposal, ProposalStatus, VaultAsset};

// =============================================================================
// STEP 1: CREATE PROPOSAL
// =============================================================================

/// Event emitted when a proposal account is created
#[event]
pub struct ProposalCreated {
    pub proposal_id: u64,
    pub proposer: Pubkey,
    pub end_time: i64,
}

#[derive(Accounts)]
#[instruction(question: String)]
pub struct CreateProposal<'info> {
    #[account(mut)]
    pub proposer: Signer<'info>,

    #[account(
        mut,
        seeds = [Config::SEED],
        bump = config.bump,
    )]
    pub config: Account<'info, Config>,

    #[account(
        init,
        payer = proposer,
        space = 8 + Proposal::INIT_SPACE,
        seeds = [Proposal::SEED, config.proposal_count.to_le_bytes().as_ref()],
        bump,
    )]
    pub proposal: Box<Account<'info, Proposal>>,

    /// Underlying base token (the governed asset)
    pub base_mint: Box<InterfaceAccount<'info, Mint>>,

    /// Underlying quote token (e.g. USDC)
    pub quote_mint: Box<InterfaceAccount<'info, Mint>>,

    pub system_program: Program<'info, System>,
}

impl<'info> CreateProposal<'info> {
    pub fn create_proposal(
        &mut self,
        question: String,
        trading_period_seconds: u32,
        bumps: &CreateProposalBumps,
    ) -> Result<()> {
        let clock = Clock::get()?;

        require!(!self.config.paused, CreateProposalError::ProtocolPaused);
        require!(question.len() <= 256, CreateProposalError::QuestionTooLong);
        require_gt!(
            trading_period_seconds,
            0,
            CreateProposalError::InvalidTradingPeriod
        );
        require!(
            self.base_mint.key() != self.quote_mint.key(),
            CreateProposalError::DuplicateMints
        );

        let proposal_id = self.config.proposal_count;

        self.proposal.set_inner(Proposal {
            id: proposal_id,
            proposer: self.proposer.key(),
            question,
            created_at: clock.unix_timestamp,
            end_time: clock.unix_timestamp + trading_period_seconds as i64,
            finalized_at: 0,
            base_mint: self.base_mint.key(),
            quote_mint: self.quote_mint.key(),
            pass_base_mint: Pubkey::default(),
            fail_base_mint: Pubkey::default(),
            pass_quote_mint: Pubkey::default(),
            fail_quote_mint: Pubkey::default(),
            status: ProposalStatus::Pending,
            base_vault: Default::default(),
            quote_vault: Default::default(),
            pass_market: Pool::default(),
            fail_market: Pool::default(),
            oracle: TwapOracle::default(),
            seq_num: 0,
            bump: bumps.proposal,
        });

        self.config.proposal_count += 1;

        emit!(ProposalCreated {
            proposal_id,
            proposer: self.proposer.key(),
            end_time: self.proposal.end_time,
        });

        Ok(())
    }
}

// =============================================================================
// STEPS 2 & 3: CREATE VAULT ACCOUNTS (once per asset)
// =============================================================================

/// Event emitted when one asset's vault accounts exist
#[event]
pub struct VaultAccountsCreated {
    pub proposal_id: u64,
    pub asset: u8,
    pub pass_conditional_mint: Pubkey,
    pub fail_conditional_mint: Pubkey,
}

#[derive(Accounts)]
#[instruction(asset: VaultAsset)]
pub struct CreateVaultAccounts<'info> {
    #[account(mut)]
    pub proposer: Signer<'info>,

    #[account(
        mut,
        constraint = proposal.proposer == proposer.key() @ CreateProposalError::Unauthorized,
        constraint = proposal.status == ProposalStatus::Pending @ CreateProposalError::ProposalNotPending,
    )]
    pub proposal: Box<Account<'info, Proposal>>,

    #[account(
        constraint = underlying_mint.key() == proposal.underlying_mint(asset)
            @ CreateProposalError::WrongMint,
    )]
    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(
        init,
        payer = proposer,
        mint::decimals = underlying_mint.decimals,
        mint::authority = proposal,
        seeds = [b"conditional", proposal.key().as_ref(), &[asset as u8, 0]],
        bump,
    )]
    pub pass_conditional_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(
        init,
        payer = proposer,
        mint::decimals = underlying_mint.decimals,
        mint::authority = proposal,
        seeds = [b"conditional", proposal.key().as_ref(), &[asset as u8, 1]],
        bump,
    )]
    pub fail_conditional_mint: Box<InterfaceAccount<'info, Mint>>,

    /// Escrow backing every conditional pair of this asset
    #[account(
        init,
        payer = proposer,
        associated_token::mint = underlying_mint,
        associated_token::authority = proposal,
    )]
    pub escrow: Box<InterfaceAccount<'info, TokenAccount>>,

    /// Pass-conditional market reserve
    #[account(
        init,
        payer = proposer,
        associated_token::mint = pass_conditional_mint,
        associated_token::authority = proposal,
    )]
    pub pass_market_reserve: Box<InterfaceAccount<'info, TokenAccount>>,

    /// Fail-conditional market reserve
    #[account(
        init,
        payer = proposer,
        associated_token::mint = fail_conditional_mint,
        associated_token::authority = proposal,
    )]
    pub fail_market_reserve: Box<InterfaceAccount<'info, TokenAccount>>,

    pub token_program: Interface<'info, TokenInterface>,
    pub associated_token_program: Program<'info, AssociatedToken>,
    pub system_program: Program<'info, System>,
}

impl<'info> CreateVaultAccounts<'info> {
    pub fn create_vault_accounts(&mut self, asset: VaultAsset) -> Result<()> {
        let pass_key = self.pass_conditional_mint.key();
        let fail_key = self.fail_conditional_mint.key();

        match asset {
            VaultAsset::Base => {
                self.proposal.pass_base_mint = pass_key;
                self.proposal.fail_base_mint = fail_key;
            }
            VaultAsset::Quote => {
                self.proposal.pass_quote_mint = pass_key;
                self.proposal.fail_quote_mint = fail_key;
            }
        }

        emit!(VaultAccountsCreated {
            proposal_id: self.proposal.id,
            asset: asset as u8,
            pass_conditional_mint: pass_key,
            fail_conditional_mint: fail_key,
        });

        Ok(())
    }
}

// =============================================================================
// STEP 4: FUND MARKETS
// =============================================================================

/// Event emitted when the markets go live
#[event]
pub struct MarketsFunded {
    pub proposal_id: u64,
    pub base_liquidity: u64,
    pub quote_liquidity: u64,
    pub initial_observation: u128,
}

#[derive(Accounts)]
pub struct FundMarkets<'info> {
    #[account(mut)]
    pub proposer: Signer<'info>,

    #[account(
        seeds = [Config::SEED],
        bump = config.bump,
    )]
    pub config: Box<Account<'info, Config>>,

    #[account(
        mut,
        constraint = proposal.proposer == proposer.key() @ CreateProposalError::Unauthorized,
        constraint = proposal.pass_base_mint != Pubkey::default()
            && proposal.pass_quote_mint != Pubkey::default()
            @ CreateProposalError::VaultAccountsMissing,
    )]
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
        mut,
        associated_token::mint = base_mint,
        associated_token::authority = proposer,
    )]
    pub proposer_base: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = quote_mint,
        associated_token::authority = proposer,
    )]
    pub proposer_quote: Box<InterfaceAccount<'info, TokenAccount>>,

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
        associated_token::mint = fail_base_mint,
        associated_token::authority = proposal,
    )]
    pub fail_market_base_reserve: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = pass_quote_mint,
        associated_token::authority = proposal,
    )]
    pub pass_market_quote_reserve: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = fail_quote_mint,
        associated_token::authority = proposal,
    )]
    pub fail_market_quote_reserve: Box<InterfaceAccount<'info, TokenAccount>>,

    pub token_program: Interface<'info, TokenInterface>,
}

impl<'info> FundMarkets<'info> {
    pub fn fund_markets(&mut self, base_liquidity: u64, quote_liquidity: u64) -> Result<()> {
        let clock = Clock::get()?;

        require!(!self.config.paused, CreateProposalError::ProtocolPaused);
        require_gte!(
            base_liquidity,
            self.config.min_liquidity,
            CreateProposalError::InsufficientLiquidity
        );
        require_gte!(
            quote_liquidity,
            self.config.min_liquidity,
            CreateProposalError::InsufficientLiquidity
        );

        // the state layer rejects double-funding: activate and open are
        // valid exactly once
        self.proposal.base_vault.activate()?;
        self.proposal.quote_vault.activate()?;
        self.proposal.base_vault.split(base_liquidity)?;
        self.proposal.quote_vault.split(quote_liquidity)?;
        self.proposal
            .pass_market
            .open(base_liquidity, quote_liquidity)?;
        self.proposal
            .fail_market
            .open(base_liquidity, quote_liquidity)?;

        let initial_observation =
            quote_liquidity as u128 * PRICE_SCALE / base_liquidity as u128;
        self.proposal.oracle = TwapOracle::new(
            clock.unix_timestamp,
            initial_observation,
            self.config.twap_max_observation_change_per_update,
            self.config.twap_start_delay_seconds,
            self.config.twap_min_update_interval_seconds,
            self.config.pass_threshold_bps,
        );

        // escrow the underlying
        for (from, mint, to, amount) in [
            (
                &self.proposer_base,
                &self.base_mint,
                &self.base_escrow,
                base_liquidity,
            ),
            (
                &self.proposer_quote,
                &self.quote_mint,
                &self.quote_escrow,
                quote_liquidity,
            ),
        ] {
            transfer_checked(
                CpiContext::new(
                    self.token_program.to_account_info(),
                    TransferChecked {
                        from: from.to_account_info(),
                        mint: mint.to_account_info(),
                        to: to.to_account_info(),
                        authority: self.proposer.to_account_info(),
                    },
                ),
                amount,
                mint.decimals,
            )?;
        }

        // mint the conditional pairs straight into the market reserves
        let id_bytes = self.proposal.id.to_le_bytes();
        let proposal_seeds = &[Proposal::SEED, id_bytes.as_ref(), &[self.proposal.bump]];
        let signer_seeds = &[&proposal_seeds[..]];

        for (mint, reserve, amount) in [
            (
                &self.pass_base_mint,
                &self.pass_market_base_reserve,
                base_liquidity,
            ),
            (
                &self.fail_base_mint,
                &self.fail_market_base_reserve,
                base_liquidity,
            ),
            (
                &self.pass_quote_mint,
                &self.pass_market_quote_reserve,
                quote_liquidity,
            ),
            (
                &self.fail_quote_mint,
                &self.fail_market_quote_reserve,
                quote_liquidity,
            ),
        ] {
            mint_to(
                CpiContext::new_with_signer(
                    self.token_program.to_account_info(),
                    MintTo {
                        mint: mint.to_account_info(),
                        to: reserve.to_account_info(),
                        authority: self.proposal.to_account_info(),
                    },
                    signer_seeds,
                ),
                amount,
            )?;
        }

        self.proposal.seq_num += 1;

        emit!(MarketsFunded {
            proposal_id: self.proposal.id,
            base_liquidity,
            quote_liquidity,
            initial_observation,
        });

        Ok(())
    }
}

#[error_code]
pub enum CreateProposalError {
    #[msg("Protocol is paused")]
    ProtocolPaused,
    #[msg("Question exceeds maximum length")]
    QuestionTooLong,
    #[msg("Trading period must be positive")]
    InvalidTradingPeriod,
    #[msg("Base and quote mints must differ")]
    DuplicateMints,
    #[msg("Only the proposer can set up the proposal")]
    Unauthorized,
    #[msg("Proposal is not pending")]
    ProposalNotPending,
    #[msg("Mint does not belong to this proposal")]
    WrongMint,
    #[msg("Vault accounts have not been created yet")]
    VaultAccountsMissing,
    #[msg("Initial liquidity below minimum")]
    InsufficientLiquidity,
}
