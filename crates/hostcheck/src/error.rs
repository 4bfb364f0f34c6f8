//! Error types of the check engine.

use std::path::PathBuf;
use thiserror::Error;

use crate::collaborators::TimeperiodError;

/// Failure raised by a check function while producing its result stream
#[derive(Debug, Error)]
pub enum CheckError {
    /// No verdict this run; the service keeps its previous state
    #[error("{0}")]
    IgnoreResults(String),

    /// The run exceeded its time budget; never recovered per service
    #[error("Check timed out")]
    Timeout,

    #[error("{0}")]
    Crashed(String),

    /// The plugin produced something that is not a valid check result
    #[error("Invalid check output: {0}")]
    InvalidOutput(String),
}

impl CheckError {
    pub fn ignore(message: impl Into<String>) -> Self {
        CheckError::IgnoreResults(message.into())
    }

    pub fn crashed(message: impl Into<String>) -> Self {
        CheckError::Crashed(message.into())
    }
}

impl From<anyhow::Error> for CheckError {
    fn from(err: anyhow::Error) -> Self {
        CheckError::Crashed(format!("{err:#}"))
    }
}

/// Failure while resolving parameters
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error(transparent)]
    Timeperiod(#[from] TimeperiodError),

    #[error("Unknown constant '{0}' in parameter expression")]
    UnknownConstant(String),

    #[error("Invalid parameter literal at position {position}: {message}")]
    Literal { position: usize, message: String },
}

/// Failure loading or persisting the counter store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access counter store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt counter store {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure that aborts a whole host run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Check run timed out")]
    Timeout,

    /// Only raised in debug mode; otherwise crashes become UNKNOWN outcomes
    #[error("Check of service '{service}' crashed: {message}")]
    PluginCrash { service: String, message: String },

    /// Only raised in debug mode
    #[error("Failed to resolve parameters of service '{service}': {source}")]
    Parameters {
        service: String,
        #[source]
        source: ParameterError,
    },

    #[error("Failed to submit check results: {0:#}")]
    Submission(anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Check worker failed: {0}")]
    Worker(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anyhow_becomes_crash() {
        let err: CheckError = anyhow::anyhow!("boom").context("parsing section").into();
        assert!(matches!(&err, CheckError::Crashed(msg) if msg == "parsing section: boom"));
    }

    #[test]
    fn test_ignore_message_is_verbatim() {
        assert_eq!(CheckError::ignore("Counter initialized").to_string(), "Counter initialized");
    }
}
