use std::fs;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::formatter::BracketedFormatter;
use crate::error::{HealthError, Result};

/// Map `-q` / `-v` counts to a default filter directive.
pub fn default_level(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber.
///
/// Logs always go to stderr so the report on stdout stays clean. When
/// `log_file` is given, an ANSI-free copy is written there as well.
/// `RUST_LOG` overrides the level derived from the CLI flags.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Some(
                fmt::layer()
                    .event_format(BracketedFormatter)
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    let stderr_layer = fmt::layer()
        .event_format(BracketedFormatter)
        .with_writer(std::io::stderr);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbosity, quiet)));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| HealthError::Io(format!("failed to install logger: {e}")))?;

    if let Some(path) = log_file {
        info!("Log file: {:?}", path);
    }
    Ok(())
}
