pub mod capacity;
pub mod state_machine;

pub use capacity::*;
pub use state_machine::*;
