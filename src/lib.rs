//! Linkpulse - Click tracking and analytics for link-in-bio pages
//!
//! This library provides the core functionality for the Linkpulse service,
//! including click ingestion, storage backends, analytics queries, and the
//! HTTP API surface.
//!
//! # Features
//! - **server**: HTTP server mode (default)
//! - **cli**: Command-line interface
//!
//! # Architecture
//! - `tracking`: Session fingerprinting, bot classification and ingestion admission
//! - `storage`: Storage backends and data access
//! - `services`: Analytics aggregation and GeoIP resolution
//! - `api`: HTTP services and route definitions
//! - `cli`: Command-line interface
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: Logging and system utilities

pub mod api;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod tracking;
pub mod utils;
