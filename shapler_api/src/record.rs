use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification tag attached to every detected diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// `cannot find symbol`.
    SymbolNotFound,
    /// `';' expected`.
    MissingSemicolon,
    /// `unclosed string literal`.
    UnclosedString,
    /// `incompatible types`.
    TypeMismatch,
    /// `not a statement`.
    InvalidStatement,
    /// `missing return statement`.
    MissingReturn,
    /// `variable might not have been initialized`.
    UninitializedVariable,
    /// Any other message mentioning an error.
    CompileError,
    /// Any other message mentioning an exception.
    RuntimeException,
    /// Nothing recognisable in the message.
    Unknown,
    /// File referenced from a stack trace rather than reported directly.
    StacktraceReference,
}

impl ErrorType {
    /// Stable snake_case tag, identical to the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SymbolNotFound => "symbol_not_found",
            Self::MissingSemicolon => "missing_semicolon",
            Self::UnclosedString => "unclosed_string",
            Self::TypeMismatch => "type_mismatch",
            Self::InvalidStatement => "invalid_statement",
            Self::MissingReturn => "missing_return",
            Self::UninitializedVariable => "uninitialized_variable",
            Self::CompileError => "compile_error",
            Self::RuntimeException => "runtime_exception",
            Self::Unknown => "unknown",
            Self::StacktraceReference => "stacktrace_reference",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One diagnostic extracted from a build log.
///
/// `(path, line)` is the identity used for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Absolute, validated source file path.
    pub path: String,
    /// 1-based line number.
    pub line: u32,
    /// Classification tag.
    pub error_type: ErrorType,
    /// Full diagnostic text, possibly spanning several lines.
    pub error_message: String,
    /// Trimmed source line at `line`, when it could be read.
    #[serde(default)]
    pub error_code: Option<String>,
}

impl ErrorRecord {
    /// Identity key of the record.
    #[must_use]
    pub fn key(&self) -> (&str, u32) {
        (self.path.as_str(), self.line)
    }
}
