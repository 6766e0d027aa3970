//! Consensus module - compact targets, stake modifiers, kernel hashing and
//! proof-of-stake validation

mod kernel;
mod modifier;
mod selector;
mod stake;
mod target;

pub use kernel::*;
pub use modifier::*;
pub use selector::*;
pub use stake::*;
pub use target::*;
