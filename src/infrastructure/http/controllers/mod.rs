pub mod availability;
pub mod conversations;
pub mod realtime;
