pub mod distribution_scheduler;

pub use distribution_scheduler::*;
