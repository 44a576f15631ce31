//! Program State
//!
//! One `Config` singleton plus one `Proposal` account per decision market.
//! The proposal embeds its vaults, markets and oracle by value; none of them
//! hold a reference back to the proposal.

use anchor_lang::prelude::*;

pub mod config;
pub mod proposal;
pub mod vault;

pub use config::*;
pub use proposal::*;
pub use vault::*;

/// Which outcome a conditional claim pays on
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Side {
    Pass,
    Fail,
}
