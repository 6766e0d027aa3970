//! Validation module - transactions, blocks and the script verifier seam

mod block;
mod script;
mod transaction;

pub use block::*;
pub use script::*;
pub use transaction::*;
