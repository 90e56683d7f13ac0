//! Diagnostic logging setup for Skypost binaries
//!
//! Diagnostics go to stderr through `tracing`; they are separate from the
//! operator-facing activity log in [`crate::activity_log`]. Format and level
//! come from `SKYPOST_LOG_FORMAT` (text, json, pretty) and
//! `SKYPOST_LOG_LEVEL`, with `RUST_LOG` taking precedence for filtering.
//!
//! ```no_run
//! use libskypost::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::from_env(false).init();
//! // or explicitly
//! LoggingConfig::new(LogFormat::Json, "debug").init();
//! ```

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain lines without colors, for cron jobs and hooks
    #[default]
    Text,
    /// One JSON object per line
    Json,
    /// Multi-line colored output for development
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                other
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        })
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: &str) -> Self {
        Self {
            format,
            level: level.to_string(),
        }
    }

    /// Read format and level from the environment.
    ///
    /// `verbose` forces the `debug` level regardless of `SKYPOST_LOG_LEVEL`.
    pub fn from_env(verbose: bool) -> Self {
        let format = std::env::var("SKYPOST_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        let level = if verbose {
            "debug".to_string()
        } else {
            std::env::var("SKYPOST_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string())
        };

        Self { format, level }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }

    /// Install the global subscriber.
    ///
    /// Returns `false` if a subscriber was already installed.
    pub fn init(&self) -> bool {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_writer(std::io::stderr);

        let result = match self.format {
            LogFormat::Json => builder
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => builder
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .try_init(),
            LogFormat::Text => builder.with_target(false).with_ansi(false).try_init(),
        };

        result.is_ok()
    }
}
