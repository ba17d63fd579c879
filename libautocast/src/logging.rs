//! Logging setup shared by the Autocast binaries
//!
//! Records go to stderr so `autocast-run --format json` keeps stdout for the
//! cycle summary. `AUTOCAST_LOG_FORMAT` picks text, json or pretty output and
//! `AUTOCAST_LOG_LEVEL` the default filter; a `RUST_LOG` directive wins over both.
//!
//! ```no_run
//! use libautocast::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig {
//!     format: LogFormat::Json,
//!     directive: "libautocast=debug,info".to_string(),
//! }
//! .init();
//! ```

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

use crate::error::AutocastError;

const FORMAT_VAR: &str = "AUTOCAST_LOG_FORMAT";
const LEVEL_VAR: &str = "AUTOCAST_LOG_LEVEL";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    /// One flattened JSON object per event
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = AutocastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(AutocastError::InvalidInput(format!(
                "Unknown log format '{}' (expected text, json or pretty)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub directive: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            directive: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Settings from the environment; `verbose` overrides the level with `debug`
    pub fn from_env(verbose: bool) -> Self {
        let format = match std::env::var(FORMAT_VAR) {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                eprintln!("Ignoring {}: {}", FORMAT_VAR, e);
                LogFormat::Text
            }),
            Err(_) => LogFormat::Text,
        };

        let directive = if verbose {
            "debug".to_string()
        } else {
            std::env::var(LEVEL_VAR)
                .ok()
                .filter(|level| !level.trim().is_empty())
                .unwrap_or_else(|| "info".to_string())
        };

        Self { format, directive }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.directive))
    }

    /// Install the global subscriber. Later calls leave the first one in place.
    pub fn init(&self) {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_writer(std::io::stderr);

        let outcome = match self.format {
            LogFormat::Text => builder.with_target(false).with_ansi(false).try_init(),
            LogFormat::Json => builder.json().flatten_event(true).try_init(),
            LogFormat::Pretty => builder.pretty().with_line_number(true).try_init(),
        };

        if outcome.is_err() {
            tracing::debug!("Subscriber already set, keeping it");
        }
    }
}
