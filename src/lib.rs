pub mod application;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use config::*;
pub use domain::entities::*;
pub use domain::errors::{DomainError, DomainResult};
pub use shared::events::{EventBus, LocalEventBus, SystemEvent};
