//! Admin Configuration Updates
//!
//! Only fields passed as `Some` are touched; everything else keeps its
//! current value. Changes only affect proposals created afterwards.

use anchor_lang::prelude::*;

use crate::amm::MAX_BPS;
use crate::state::Config;

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug)]
pub struct UpdateConfigParams {
    pub paused: Option<bool>,
    pub min_liquidity: Option<u64>,
    pub pass_threshold_bps: Option<u16>,
}

/// Event emitted when the configuration changes
#[event]
pub struct ConfigUpdated {
    pub admin: Pubkey,
    pub paused: bool,
    pub min_liquidity: u64,
    pub pass_threshold_bps: u16,
}

#[derive(Accounts)]
pub struct UpdateConfig<'info> {
    #[account(
        constraint = admin.key() == config.admin @ UpdateConfigError::Unauthorized,
    )]
    pub admin: Signer<'info>,

    #[account(
        mut,
        seeds = [Config::SEED],
        bump = config.bump,
    )]
    pub config: Account<'info, Config>,
}

impl<'info> UpdateConfig<'info> {
    pub fn update_config(&mut self, params: UpdateConfigParams) -> Result<()> {
        if let Some(paused) = params.paused {
            self.config.paused = paused;
        }
        if let Some(min_liquidity) = params.min_liquidity {
            require_gt!(min_liquidity, 0, UpdateConfigError::InvalidValue);
            self.config.min_liquidity = min_liquidity;
        }
        if let Some(threshold) = params.pass_threshold_bps {
            require!(
                threshold as u64 <= MAX_BPS,
                UpdateConfigError::InvalidValue
            );
            self.config.pass_threshold_bps = threshold;
        }

        emit!(ConfigUpdated {
            admin: self.admin.key(),
            paused: self.config.paused,
            min_liquidity: self.config.min_liquidity,
            pass_threshold_bps: self.config.pass_threshold_bps,
        });

        Ok(())
    }
}

#[error_code]
pub enum UpdateConfigError {
    #[msg("Only the admin can update the configuration")]
    Unauthorized,
    #[msg("Invalid configuration value")]
    InvalidValue,
}
