//! CLI command implementations

pub mod config_gen;
pub mod stats;

pub use config_gen::config_generate;
pub use stats::link_stats;
