//! Startup and shutdown orchestration

pub mod shutdown;
pub mod startup;
