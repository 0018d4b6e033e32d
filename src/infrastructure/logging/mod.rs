//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - Pretty or JSON stdout formatting
//! - Optional daily-rotated JSON file output

pub mod logger;

pub use logger::{init, LogGuard};
