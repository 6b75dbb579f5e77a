use serde::{Deserialize, Serialize};

/// Point in time a capture was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureTag {
    /// Taken when the error was first observed.
    Before,
    /// Taken after the fix attempt.
    After,
}

/// Normalized file contents plus the two digests identifying them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileState {
    /// Absolute path of the captured file.
    pub path: String,
    /// Comment-stripped file text.
    pub content: String,
    /// Hex SHA-256 of `content`.
    pub sha256_clean: String,
    /// Git blob id of the raw bytes, or a SHA-256 fallback.
    pub git_hash: String,
}

/// Immutable snapshot of a file and one line of interest.
///
/// Exactly one of `error_code` and `fixed_code` is populated, depending on
/// `tag`. Use [`Capture::before`] and [`Capture::after`] to keep it that way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    /// Absolute path of the captured file.
    pub path: String,
    /// Whether this is the before or after capture.
    pub tag: CaptureTag,
    /// Hex SHA-256 of `content`.
    pub sha256_clean: String,
    /// Git blob id of the raw bytes, or a SHA-256 fallback.
    pub git_hash: String,
    /// Line the error was reported on; only recorded on before captures.
    #[serde(default)]
    pub error_line: Option<u32>,
    /// Line text when the error was observed.
    #[serde(default)]
    pub error_code: Option<String>,
    /// Line text after the fix attempt.
    #[serde(default)]
    pub fixed_code: Option<String>,
    /// Comment-stripped file text.
    pub content: String,
}

impl Capture {
    /// Build a before capture carrying the erroneous line.
    #[must_use]
    pub fn before(state: FileState, line: Option<u32>, error_code: String) -> Self {
        Self {
            path: state.path,
            tag: CaptureTag::Before,
            sha256_clean: state.sha256_clean,
            git_hash: state.git_hash,
            error_line: line,
            error_code: Some(error_code),
            fixed_code: None,
            content: state.content,
        }
    }

    /// Build an after capture carrying the line as it reads after the fix.
    #[must_use]
    pub fn after(state: FileState, fixed_code: String) -> Self {
        Self {
            path: state.path,
            tag: CaptureTag::After,
            sha256_clean: state.sha256_clean,
            git_hash: state.git_hash,
            error_line: None,
            error_code: None,
            fixed_code: Some(fixed_code),
            content: state.content,
        }
    }
}

/// Unified diff between the before and after content of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiffResult {
    /// Unified diff text; empty when the contents are identical.
    pub unified: String,
}

impl DiffResult {
    /// Returns true when the diff carries no hunks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unified.is_empty()
    }
}
