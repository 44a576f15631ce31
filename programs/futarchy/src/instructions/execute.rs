//! Proposal Execution
//!
//! Carrying out the attached action is a separate, permissionless step after
//! finalization: valid exactly once, and only from `Passed`. The action
//! itself (a treasury transfer, a parameter change) lives with the governing
//! integration; this transition is the single source of truth for whether it
//! has been performed.

use anchor_lang::prelude::*;

use crate::state::Proposal;

/// Event emitted when a passed proposal is executed
#[event]
pub struct ProposalExecuted {
    pub proposal_id: u64,
    pub executor: Pubkey,
    pub timestamp: i64,
}

#[derive(Accounts)]
pub struct ExecuteProposal<'info> {
    pub executor: Signer<'info>,

    #[account(mut)]
    pub proposal: Box<Account<'info, Proposal>>,
}

impl<'info> ExecuteProposal<'info> {
    pub fn execute_proposal(&mut self) -> Result<()> {
        let clock = Clock::get()?;

        self.proposal.execute()?;
        self.proposal.seq_num += 1;

        emit!(ProposalExecuted {
            proposal_id: self.proposal.id,
            executor: self.executor.key(),
            timestamp: clock.unix_timestamp,
        });

        msg!("proposal {} executed", self.proposal.id);

        Ok(())
    }
}
