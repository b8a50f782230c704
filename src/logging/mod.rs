//! Logging for the dataset health checker
//!
//! This module provides:
//! - Custom log formatting with bracketed output
//! - Stderr logging with an optional file copy

mod formatter;
mod setup;

pub use formatter::BracketedFormatter;
pub use setup::{default_level, setup_logging};
