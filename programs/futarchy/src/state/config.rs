//! Global Protocol Configuration
//!
//! This account stores protocol-wide settings that apply to all proposals.

use anchor_lang::prelude::*;

/// Global configuration account (singleton PDA)
///
/// Seeds: ["config"]
#[account]
#[derive(InitSpace)]
pub struct Config {
    /// Protocol administrator with special privileges
    pub admin: Pubkey,

    /// Destination wallet for swept fees.
    ///
    /// `None` disables fee collection entirely. This is a valid deployment
    /// choice, not an error: `collect_fees` becomes a no-op that reports
    /// itself as skipped.
    pub fee_collector: Option<Pubkey>,

    /// Total proposals created (used as incrementing ID)
    pub proposal_count: u64,

    /// Minimum liquidity required on each side when funding a proposal's markets
    pub min_liquidity: u64,

    /// How far the pass-market TWAP must exceed the fail-market TWAP for a
    /// proposal to pass, in basis points
    pub pass_threshold_bps: u16,

    /// Seconds after proposal creation before oracle observations count
    /// toward resolution
    pub twap_start_delay_seconds: u32,

    /// Minimum seconds between oracle observations
    pub twap_min_update_interval_seconds: u32,

    /// The most an oracle observation can move per update (1e12-scaled price units)
    pub twap_max_observation_change_per_update: u128,

    /// Whether the protocol is paused
    pub paused: bool,

    /// PDA bump seed
    pub bump: u8,
}

impl Config {
    pub const SEED: &'static [u8] = b"config";
}
