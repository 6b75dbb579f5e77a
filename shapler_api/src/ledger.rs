use serde::{Deserialize, Serialize};

use super::capture::{Capture, DiffResult};
use super::record::{ErrorRecord, ErrorType};

/// Where an error was reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Absolute source file path.
    pub path: String,
    /// 1-based line number.
    pub line: u32,
}

/// What was reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Details {
    /// Classification tag.
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    /// Full diagnostic text.
    pub message: String,
    /// Source line text as read during parsing.
    #[serde(default)]
    pub error_code: Option<String>,
}

/// Ledger unit tracking one error from observation to fix attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Identity of the error.
    pub location: Location,
    /// Diagnostic details.
    pub details: Details,
    /// Capture taken when the error was observed.
    pub before: Capture,
    /// Capture taken at finalize time.
    #[serde(default)]
    pub after: Option<Capture>,
    /// Diff between the two captures.
    #[serde(default)]
    pub diff: Option<DiffResult>,
}

impl ErrorEntry {
    /// Open a new entry from a parsed record and its before capture.
    #[must_use]
    pub fn open(record: ErrorRecord, before: Capture) -> Self {
        Self {
            location: Location {
                path: record.path,
                line: record.line,
            },
            details: Details {
                error_type: record.error_type,
                message: record.error_message,
                error_code: record.error_code,
            },
            before,
            after: None,
            diff: None,
        }
    }

    /// Fill in the after side of the entry.
    pub fn close(&mut self, after: Capture, diff: Option<DiffResult>) {
        self.after = Some(after);
        self.diff = diff;
    }

    /// Returns true once an after capture has been recorded.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.after.is_some()
    }
}

/// Per-run record of all errors captured between run and finalize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    /// Project directory the build ran in.
    pub project: String,
    /// Build task that was invoked.
    pub task: String,
    /// Entries in discovery order.
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

impl Ledger {
    /// Create an empty ledger for a project/task pair.
    #[must_use]
    pub fn new(project: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            task: task.into(),
            errors: Vec::new(),
        }
    }

    /// Returns true when every entry carries an after capture.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.errors.is_empty() && self.errors.iter().all(ErrorEntry::is_closed)
    }
}
