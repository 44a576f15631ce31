//! Automated Market Making
//!
//! Constant-product conditional markets plus the TWAP oracle that integrates
//! their prices into a resolution signal.

pub mod pool;
pub mod twap;

pub use pool::*;
pub use twap::*;
