//! Domain layer for Argus upgrade orchestration
//!
//! This module contains core business logic and domain models.

pub mod error;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use error::UpgradeError;
