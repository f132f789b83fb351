//! Tracing subscriber setup shared by the steem-notify binaries.
pub mod logging;

pub use logging::{init, LogConfig, LogFormat, LogOutput};
