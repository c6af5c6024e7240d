//! Per-request logging: inbound request line and end-of-stream summary

mod formatter;
mod request_log;
mod summary;

pub use formatter::*;
pub use request_log::*;
pub use summary::*;
