pub mod conversation;
pub mod message;
pub mod pagination;
pub mod user;

pub use conversation::*;
pub use message::*;
pub use pagination::*;
pub use user::*;
