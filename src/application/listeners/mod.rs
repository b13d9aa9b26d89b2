pub mod fanout;

pub use fanout::{run_fanout_listener, FanoutRouter};
