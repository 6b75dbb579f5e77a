//! Unified diff generation and application.

use git2::{DiffLineType, DiffOptions, Patch};
use shapler_api::DiffResult;

use crate::Result;

const DEFAULT_CONTEXT_LINES: u32 = 3;
const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file\n";

/// Entry point for diff generation.
#[derive(Debug, Clone, Copy)]
pub struct DiffEngine {
    context_lines: u32,
}

impl DiffEngine {
    /// Construct a diff engine with three lines of context.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_context(DEFAULT_CONTEXT_LINES)
    }

    /// Construct a diff engine with a custom amount of context.
    #[must_use]
    pub const fn with_context(context_lines: u32) -> Self {
        Self { context_lines }
    }

    /// Generate a unified diff between two versions of `path`.
    ///
    /// Identical inputs produce an empty diff. Headers read
    /// `<path> (before)` and `<path> (after)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Git`] if libgit2 cannot build the patch.
    pub fn diff(&self, before: &str, after: &str, path: &str) -> Result<DiffResult> {
        if before == after {
            return Ok(DiffResult::default());
        }

        let mut opts = DiffOptions::new();
        opts.context_lines(self.context_lines).force_text(true);
        let patch = Patch::from_buffers(
            before.as_bytes(),
            None,
            after.as_bytes(),
            None,
            Some(&mut opts),
        )?;

        if patch.num_hunks() == 0 {
            return Ok(DiffResult::default());
        }

        let mut unified = format!("--- {path} (before)\n+++ {path} (after)\n");
        for hunk_idx in 0..patch.num_hunks() {
            let (hunk, line_count) = patch.hunk(hunk_idx)?;
            unified.push_str(&format!(
                "@@ -{} +{} @@\n",
                hunk_range(hunk.old_start(), hunk.old_lines()),
                hunk_range(hunk.new_start(), hunk.new_lines()),
            ));

            for line_idx in 0..line_count {
                let line = patch.line_in_hunk(hunk_idx, line_idx)?;
                let marker = match line.origin_value() {
                    DiffLineType::Context => ' ',
                    DiffLineType::Addition => '+',
                    DiffLineType::Deletion => '-',
                    _ => continue,
                };
                let text = String::from_utf8_lossy(line.content());
                unified.push(marker);
                unified.push_str(&text);
                if !text.ends_with('\n') {
                    unified.push('\n');
                    unified.push_str(NO_NEWLINE_MARKER);
                }
            }
        }

        Ok(DiffResult { unified })
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn hunk_range(start: u32, lines: u32) -> String {
    if lines == 1 {
        start.to_string()
    } else {
        format!("{start},{lines}")
    }
}

/// Errors raised while applying a unified diff.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// A hunk header could not be parsed.
    #[error("malformed hunk header: {header}")]
    MalformedHunk {
        /// Offending header line.
        header: String,
    },
    /// A body line carried an unknown marker.
    #[error("malformed diff line: {line}")]
    MalformedLine {
        /// Offending line.
        line: String,
    },
    /// A hunk starts before the previous one ended or past the end of input.
    #[error("hunk starting at line {start} is out of range")]
    HunkOutOfRange {
        /// 1-based start line of the hunk on the original side.
        start: usize,
    },
    /// Context or deleted lines do not match the original text.
    #[error("diff does not match original text at line {line}")]
    ContextMismatch {
        /// 1-based line on the original side.
        line: usize,
    },
}

/// Apply a unified diff produced by [`DiffEngine::diff`] to `original`.
///
/// # Errors
///
/// Returns a [`PatchError`] when the diff is malformed or does not match
/// `original`.
pub fn apply_unified(original: &str, unified: &str) -> std::result::Result<String, PatchError> {
    let source: Vec<&str> = original.split_inclusive('\n').collect();
    let mut output = String::with_capacity(original.len());
    let mut cursor = 0;
    let mut in_hunk = false;
    let mut previous = None;

    for line in unified.split_inclusive('\n') {
        if let Some(header) = line.strip_prefix("@@ ") {
            let (start, count) = parse_old_range(header).ok_or_else(|| PatchError::MalformedHunk {
                header: line.trim_end().to_owned(),
            })?;
            let target = if count == 0 { start } else { start.saturating_sub(1) };
            if target < cursor || target > source.len() {
                return Err(PatchError::HunkOutOfRange { start });
            }
            source[cursor..target]
                .iter()
                .for_each(|kept| output.push_str(kept));
            cursor = target;
            in_hunk = true;
            previous = None;
            continue;
        }

        if !in_hunk {
            continue;
        }

        let mut chars = line.chars();
        let marker = chars.next();
        let text = chars.as_str();
        match marker {
            Some(marker @ (' ' | '-')) => {
                let expected = source
                    .get(cursor)
                    .ok_or(PatchError::ContextMismatch { line: cursor + 1 })?;
                if expected.trim_end_matches('\n') != text.trim_end_matches('\n') {
                    return Err(PatchError::ContextMismatch { line: cursor + 1 });
                }
                if marker == ' ' {
                    output.push_str(expected);
                }
                cursor += 1;
                previous = Some(marker);
            }
            Some('+') => {
                output.push_str(text);
                previous = Some('+');
            }
            Some('\\') => {
                if previous == Some('+') && output.ends_with('\n') {
                    output.pop();
                }
            }
            _ => {
                return Err(PatchError::MalformedLine {
                    line: line.trim_end().to_owned(),
                })
            }
        }
    }

    source[cursor..]
        .iter()
        .for_each(|kept| output.push_str(kept));
    Ok(output)
}

fn parse_old_range(header: &str) -> Option<(usize, usize)> {
    let range = header.split_whitespace().next()?.strip_prefix('-')?;
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}
