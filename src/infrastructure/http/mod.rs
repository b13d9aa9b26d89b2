pub mod controllers;
pub mod middleware;
pub mod router;
pub mod validation;

pub use router::build_router;
