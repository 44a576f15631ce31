//! Permissionless Oracle Crank
//!
//! The oracle normally samples on every trade, but a quiet market would stop
//! integrating and its TWAP would go stale at whatever the last trade left
//! behind. Anyone may crank an observation in; the oracle's own rate limit
//! and clamp make spamming it useless.

use anchor_lang::prelude::*;

use crate::amm::TwapUpdate;
use crate::state::{Proposal, ProposalStatus};

/// Event emitted when an observation is recorded
#[event]
pub struct TwapObserved {
    pub proposal_id: u64,
    pub pass_observation: u128,
    pub fail_observation: u128,
    pub recorded: bool,
}

#[derive(Accounts)]
pub struct CrankTwap<'info> {
    pub cranker: Signer<'info>,

    #[account(
        mut,
        constraint = proposal.status == ProposalStatus::Pending @ CrankError::ProposalDecided,
    )]
    pub proposal: Box<Account<'info, Proposal>>,
}

impl<'info> CrankTwap<'info> {
    pub fn crank_twap(&mut self) -> Result<()> {
        let clock = Clock::get()?;

        let update = self.proposal.observe(clock.unix_timestamp)?;

        emit!(TwapObserved {
            proposal_id: self.proposal.id,
            pass_observation: self.proposal.oracle.pass_observation,
            fail_observation: self.proposal.oracle.fail_observation,
            recorded: update == TwapUpdate::Recorded,
        });

        if let Ok(gap) = self.proposal.oracle.gap_bps() {
            msg!("pass-fail gap: {} bps", gap);
        }

        Ok(())
    }
}

#[error_code]
pub enum CrankError {
    #[msg("Proposal has already been decided")]
    ProposalDecided,
}
