//! Mode routing
//!
//! This module provides unified entry points for different execution modes:
//! - Server mode (HTTP server)
//! - CLI mode (Command-line interface)
//!
//! The mode selection is based on command-line arguments and feature flags.

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export mode functions for convenience
#[cfg(feature = "server")]
pub use server::run_server;

#[cfg(feature = "cli")]
pub use cli::run_cli;

/// Mode detection result
#[derive(Debug, PartialEq)]
pub enum Mode {
    #[cfg(feature = "server")]
    Server,
    #[cfg(feature = "cli")]
    Cli,
    Unknown,
}

/// Detect which mode to run based on command-line arguments
///
/// # Mode Detection Logic
/// 1. If there are any arguments and CLI feature is enabled -> CLI mode
/// 2. If server feature is enabled -> Server mode (default)
/// 3. Otherwise -> Unknown (no features enabled)
pub fn detect_mode(args: &[String]) -> Mode {
    #[cfg(feature = "cli")]
    if args.len() > 1 {
        return Mode::Cli;
    }

    #[cfg(feature = "server")]
    return Mode::Server;

    #[cfg(not(feature = "server"))]
    Mode::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_args_defaults_to_server() {
        let args = vec!["linkpulse".to_string()];
        assert_eq!(detect_mode(&args), Mode::Server);
    }

    #[test]
    fn any_argument_selects_cli() {
        let args = vec!["linkpulse".to_string(), "config".to_string()];
        assert_eq!(detect_mode(&args), Mode::Cli);
    }
}
