pub mod close_position;
pub mod collect_fees;
pub mod crank_twap;
pub mod create_proposal;
pub mod execute;
pub mod finalize;
pub mod initialize;
pub mod swap;
pub mod update_config;
pub mod vault_ops;

pub use close_position::*;
pub use collect_fees::*;
pub use crank_twap::*;
pub use create_proposal::*;
pub use execute::*;
pub use finalize::*;
pub use initialize::*;
pub use swap::*;
pub use update_config::*;
pub use vault_ops::*;
