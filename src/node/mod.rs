//! Node module - genesis, block production and a synthetic network used to
//! exercise the kernel end to end

mod genesis;
mod simnet;
mod staker;

pub use genesis::*;
pub use simnet::*;
pub use staker::*;
