//! # API Shared
//!
//! Shared definitions for the VDD HTTP surface.
//!
//! Contains:
//! - Wire types (`wire` module) with serde and OpenAPI schemas
//! - Shared services like `HealthService`
//!
//! Used by `vdd-core` (conversions from domain types) and `api-rest`.

pub mod health;
pub mod wire;

pub use health::HealthService;
pub use wire::*;
