use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Output collected from one build invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BuildOutput {
    /// Process exit code; absent when terminated by a signal or replayed.
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Captured standard output.
    #[serde(default)]
    pub stdout: String,
    /// Captured standard error.
    #[serde(default)]
    pub stderr: String,
    /// `stdout` and `stderr` joined by a newline; this is what gets parsed.
    #[serde(default)]
    pub combined_log: String,
    /// Where the combined log was persisted, if anywhere.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl BuildOutput {
    /// Assemble output from the two captured streams.
    #[must_use]
    pub fn from_streams(exit_code: Option<i32>, stdout: String, stderr: String) -> Self {
        let combined_log = format!("{stdout}\n{stderr}");
        Self {
            exit_code,
            stdout,
            stderr,
            combined_log,
            log_file: None,
        }
    }

    /// Whether the build tool reported success.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Errors surfaced by build runners.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The project directory does not exist.
    #[error("project path does not exist: {path}")]
    MissingProject {
        /// Path that was requested.
        path: PathBuf,
    },
    /// The build tool could not be started.
    #[error("failed to launch {program}: {source}")]
    Launch {
        /// Program that failed to start.
        program: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },
    /// The build did not finish within the configured timeout.
    #[error("build timed out after {}s", timeout.as_secs())]
    TimedOut {
        /// Timeout that elapsed.
        timeout: Duration,
    },
    /// Waiting on the child process failed.
    #[error("failed waiting on build process: {source}")]
    Wait {
        /// Underlying wait error.
        #[source]
        source: std::io::Error,
    },
    /// Filesystem interaction failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Source I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Generic runner failure.
    #[error("{message}")]
    Failure {
        /// Human-readable error message.
        message: String,
    },
}

impl RunnerError {
    /// Helper to construct a failure from any displayable message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }
}

/// Convenience result alias for runner operations.
pub type RunnerResult<T> = std::result::Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_log_joins_streams_with_newline() {
        let output = BuildOutput::from_streams(Some(1), "out".into(), "err".into());
        assert_eq!(output.combined_log, "out\nerr");
        assert!(!output.succeeded());
    }

    #[test]
    fn timeout_message_reports_seconds() {
        let err = RunnerError::TimedOut {
            timeout: Duration::from_secs(300),
        };
        assert_eq!(err.to_string(), "build timed out after 300s");
    }

    #[test]
    fn output_defaults_on_deserialize() {
        let output: BuildOutput = serde_json::from_str("{}").expect("deserialize output");
        assert!(output.exit_code.is_none());
        assert!(output.combined_log.is_empty());
        assert!(output.log_file.is_none());
    }
}
