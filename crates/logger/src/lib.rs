use std::env::var;

use serde::{Deserialize, Serialize};
use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Logging section of the service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default directive, overridden by `RUST_LOG`
    pub level: String,
    /// Output format, overridden by `RUST_LOG_FORMAT`
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".into(), format: LogFormat::Compact }
    }
}

impl LogConfig {
    fn level_filter(&self) -> LevelFilter {
        self.level.parse().unwrap_or_else(|_| {
            eprintln!("Unknown log level '{}', using info", self.level);
            LevelFilter::INFO
        })
    }

    /// `RUST_LOG_FORMAT` wins over the configured format
    fn effective_format(&self) -> LogFormat {
        match var("RUST_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok(_) => LogFormat::Compact,
            Err(_) => self.format,
        }
    }
}

pub fn init() {
    init_with(&LogConfig::default());
}

/// Initialize the global tracing subscriber
///
/// Does nothing except warn when a subscriber is already installed.
pub fn init_with(config: &LogConfig) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.level_filter().into())
        .from_env_lossy();


    let log_layer = match config.effective_format() {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
    };

    if let Err(error) = tracing_subscriber::registry().with(log_layer).try_init() {
        warn!("Tracing already initialized: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        let config = LogConfig { level: "debug".into(), ..LogConfig::default() };
        assert_eq!(config.level_filter(), LevelFilter::DEBUG);

        let config = LogConfig { level: "chatty".into(), ..LogConfig::default() };
        assert_eq!(config.level_filter(), LevelFilter::INFO);
    }
}
