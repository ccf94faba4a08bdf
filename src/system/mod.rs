//! System-level modules
//!
//! - Logging system initialization (tracing subscriber, file rotation)

pub mod logging;

pub use logging::init_logging;
