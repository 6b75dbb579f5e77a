//! Core library for shapler's build-error capture workflow.
//!
//! The crate is layered around three primary responsibilities:
//! - extracting diagnostics from raw build logs
//! - capturing and hashing source files before and after a fix attempt
//! - correlating the two captures into a per-error ledger with diffs

#![warn(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::pedantic,
    missing_docs
)]
#![cfg_attr(
    not(test),
    deny(
        clippy::dbg_macro,
        clippy::expect_used,
        clippy::panic,
        clippy::print_stderr,
        clippy::print_stdout,
        clippy::todo,
        clippy::unwrap_used
    )
)]

use std::path::PathBuf;

/// Diagnostic message classification.
pub mod classify;
/// Explicit configuration shared by all components.
pub mod config;
/// Unified diff generation and application.
pub mod diff;
/// Normalized digests and git blob identities.
pub mod hash;
/// Persistent ledger storage.
pub mod ledger;
/// Multi-format build log parsing.
pub mod parser;
/// Run and finalize orchestration.
pub mod pipeline;
/// Mapping raw log paths into the project source tree.
pub mod resolve;
/// Before/after file captures.
pub mod snapshot;
/// Source file reading with explicit outcomes.
pub mod source;
/// Tracing subscriber setup for binaries.
pub mod telemetry;

pub use shapler_api::{
    Capture, CaptureTag, Details, DiffResult, ErrorEntry, ErrorRecord, ErrorType, FileState,
    Ledger, Location,
};
pub use shapler_runner_api::{BuildOutput, BuildRunner, RunnerError};

pub use classify::classify;
pub use config::Config;
pub use diff::{apply_unified, DiffEngine, PatchError};
pub use hash::{ContentHasher, FileDigest};
pub use ledger::{FsLedgerStore, LedgerId, LedgerStore};
pub use parser::{LogParser, ParsedLog};
pub use pipeline::{dedupe, FinalizeOutcome, Pipeline, RunOutcome};
pub use resolve::{Resolution, SourceTree};
pub use snapshot::Snapshotter;

/// Common result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the core library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Filesystem interaction failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Filesystem path involved in the failed operation.
        path: String,
        /// Source I/O error returned by the standard library.
        #[source]
        source: std::io::Error,
    },
    /// A persisted ledger could not be encoded or decoded.
    #[error("malformed ledger at {path}: {source}")]
    LedgerFormat {
        /// Ledger file involved.
        path: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
    /// The build runner failed to produce output.
    #[error("build failed: {source}")]
    Build {
        /// Error reported by the runner.
        #[from]
        source: RunnerError,
    },
    /// Finalize was requested but no ledger has been created.
    #[error("no snapshot found in {location}")]
    NoLedger {
        /// Where the ledger store looked.
        location: String,
    },
    /// Underlying git operation failed.
    #[error("git error: {source}")]
    Git {
        /// Original libgit2 error.
        #[from]
        source: git2::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: display_path(&path.into()),
            source,
        }
    }
}

pub(crate) fn display_path(path: &std::path::Path) -> String {
    path.to_path_buf()
        .into_os_string()
        .to_string_lossy()
        .into_owned()
}
