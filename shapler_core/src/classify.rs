//! Message classification by prioritized substring table.

use shapler_api::ErrorType;

/// Checked in order; the first matching needle wins.
const RULES: [(&str, ErrorType); 9] = [
    ("cannot find symbol", ErrorType::SymbolNotFound),
    ("';' expected", ErrorType::MissingSemicolon),
    ("unclosed string literal", ErrorType::UnclosedString),
    ("incompatible types", ErrorType::TypeMismatch),
    ("not a statement", ErrorType::InvalidStatement),
    ("missing return statement", ErrorType::MissingReturn),
    (
        "variable might not have been initialized",
        ErrorType::UninitializedVariable,
    ),
    ("error", ErrorType::CompileError),
    ("exception", ErrorType::RuntimeException),
];

/// Classify a diagnostic message, case-insensitively.
#[must_use]
pub fn classify(message: &str) -> ErrorType {
    let lower = message.to_lowercase();
    RULES
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map_or(ErrorType::Unknown, |(_, kind)| *kind)
}
