//! Protocol Initialization
//!
//! Sets up the global configuration for the futarchy protocol.
//! This is typically called once during deployment; every parameter is
//! validated here and trusted afterwards.

use anchor_lang::prelude::*;

use crate::amm::MAX_BPS;
use crate::state::Config;

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug)]
pub struct InitializeParams {
    /// Destination wallet for swept fees; `None` disables fee collection
    pub fee_collector: Option<Pubkey>,
    /// Minimum liquidity per side when funding a proposal's markets
    pub min_liquidity: u64,
    /// Default pass threshold for new proposals, in basis points
    pub pass_threshold_bps: u16,
    /// Seconds before oracle observations count toward resolution
    pub twap_start_delay_seconds: u32,
    /// Minimum seconds between oracle observations
    pub twap_min_update_interval_seconds: u32,
    /// The most an observation can move per update (1e12-scaled)
    pub twap_max_observation_change_per_update: u128,
}

/// Accounts required for protocol initialization
#[derive(Accounts)]
pub struct Initialize<'info> {
    /// Protocol administrator (becomes the admin)
    #[account(mut)]
    pub admin: Signer<'info>,

    /// Global configuration account (created)
    #[account(
        init,
        payer = admin,
        space = 8 + Config::INIT_SPACE,
        seeds = [Config::SEED],
        bump,
    )]
    pub config: Account<'info, Config>,

    /// System program
    pub system_program: Program<'info, System>,
}

impl<'info> Initialize<'info> {
    pub fn initialize(
        &mut self,
        params: InitializeParams,
        bumps: &InitializeBumps,
    ) -> Result<()> {
        require!(
            params.pass_threshold_bps as u64 <= MAX_BPS,
            InitializeError::ThresholdTooHigh
        );
        require_gt!(params.min_liquidity, 0, InitializeError::InvalidMinLiquidity);
        require_gt!(
            params.twap_max_observation_change_per_update,
            0,
            InitializeError::InvalidTwapParams
        );
        require_gt!(
            params.twap_min_update_interval_seconds,
            0,
            InitializeError::InvalidTwapParams
        );

        self.config.set_inner(Config {
            admin: self.admin.key(),
            fee_collector: params.fee_collector,
            proposal_count: 0,
            min_liquidity: params.min_liquidity,
            pass_threshold_bps: params.pass_threshold_bps,
            twap_start_delay_seconds: params.twap_start_delay_seconds,
            twap_min_update_interval_seconds: params.twap_min_update_interval_seconds,
            twap_max_observation_change_per_update: params
                .twap_max_observation_change_per_update,
            paused: false,
            bump: bumps.config,
        });

        msg!("Protocol initialized");
        msg!("Admin: {}", self.admin.key());
        match params.fee_collector {
            Some(collector) => msg!("Fee collector: {}", collector),
            // valid deployment choice; collect_fees becomes a reported no-op
            None => msg!("Fee collection disabled: no collector configured"),
        }
        msg!("Pass threshold: {} bps", params.pass_threshold_bps);

        Ok(())
    }
}

#[error_code]
pub enum InitializeError {
    #[msg("Pass threshold cannot exceed 100%")]
    ThresholdTooHigh,
    #[msg("Minimum liquidity must be positive")]
    InvalidMinLiquidity,
    #[msg("Invalid TWAP oracle parameters")]
    InvalidTwapParams,
}
