//! # Logging Bootstrap
//!
//! Installs the global `tracing` subscriber from the `[log]` config section.
//! `RUST_LOG` takes priority over the configured level. Output goes to
//! stderr so command output on stdout stays machine-readable.

use crate::config::{LogConfig, LogFormat};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tangle_core::TangleError;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directive used when `RUST_LOG` is not set.
pub fn default_directive(level: &str) -> String {
    format!("tangle={level},tangle_core={level},tower_http=debug")
}

/// Initialize tracing. Call once, before any other output.
pub fn init(log: &LogConfig) -> Result<(), TangleError> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(&log.level).into());

    let writer = match &log.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    TangleError::IoError(format!(
                        "Cannot open log file '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let ansi = log.file.is_none();

    match log.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(ansi)
                        .with_writer(writer),
                )
                .init();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_covers_both_crates() {
        let directive = default_directive("debug");
        assert!(directive.contains("tangle=debug"));
        assert!(directive.contains("tangle_core=debug"));
        assert!(directive.parse::<tracing_subscriber::EnvFilter>().is_ok());
    }
}
