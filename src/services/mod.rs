//! Service layer for business logic
//!
//! This module provides unified business logic that can be shared between
//! different interfaces (HTTP API, CLI).

mod analytics_service;
pub mod geoip;

pub use analytics_service::*;
pub use geoip::{GeoIpLookup, GeoIpProvider};
