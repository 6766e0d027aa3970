//! Chain module - block metadata, collaborator interfaces and the
//! in-memory chain index

mod memory;
mod metadata;
mod params;
mod shared;
mod view;

pub use memory::*;
pub use metadata::*;
pub use params::*;
pub use shared::*;
pub use view::*;
