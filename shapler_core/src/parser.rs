//! Multi-format build log parsing.
//!
//! Three independent recognizers run over the full log:
//! - javac-style headers `<file>:<line>: error: <message>` with block extraction
//! - kotlinc-style `e: <file>: (<line>,<col>): <message>`
//! - stack-trace frames `at <name>(<file>:<line>)`, reported as related files

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::{Regex, RegexSet};
use shapler_api::{ErrorRecord, ErrorType};
use tracing::debug;

use crate::classify::classify;
use crate::display_path;
use crate::resolve::SourceTree;
use crate::source;

const STACKTRACE_MESSAGE: &str = "Referenced in stacktrace";

static DIAGNOSTIC_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?P<file>[^\s:]+?\.(?:java|kt|scala)):(?P<line>\d+):[ \t]*(?:error|warning):[ \t]*(?P<msg>[^\n]*)",
    )
});

static ALTERNATE_DIAGNOSTIC: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"e:[ \t]*(?P<file>[^:\n]+):[ \t]*\((?P<line>\d+),(?P<col>\d+)\):[ \t]*(?P<msg>[^\n]+)",
    )
});

static STACKTRACE_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"at[ \t]+[A-Za-z0-9_.$]+\((?P<file>[^():\n]+\.(?:java|kt|scala)):(?P<line>\d+)\)")
});

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern compiles")
}

/// Records extracted from one build log, before deduplication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLog {
    /// Directly reported diagnostics: javac headers first, then kotlinc lines.
    pub primary_errors: Vec<ErrorRecord>,
    /// Files referenced from stack traces.
    pub related_files: Vec<ErrorRecord>,
}

impl ParsedLog {
    /// Primary errors followed by related files.
    #[must_use]
    pub fn into_records(self) -> Vec<ErrorRecord> {
        let mut records = self.primary_errors;
        records.extend(self.related_files);
        records
    }
}

/// Parses build logs against a project's source tree.
#[derive(Debug, Clone, Copy)]
pub struct LogParser<'a> {
    tree: &'a SourceTree,
}

impl<'a> LogParser<'a> {
    /// Construct a parser that resolves paths through `tree`.
    #[must_use]
    pub const fn new(tree: &'a SourceTree) -> Self {
        Self { tree }
    }

    /// Run every recognizer over `log`.
    #[must_use]
    pub fn parse(&self, log: &str) -> ParsedLog {
        let lines = LogLines::new(log);
        let needles: HashSet<String> = DIAGNOSTIC_HEADER
            .captures_iter(log)
            .map(|caps| block_needle(&caps["file"], &caps["line"]))
            .collect();
        let first_lines = first_lines_containing(&lines.lines, needles);
        let mut blocks: HashMap<String, String> = HashMap::new();
        let mut primary_errors = Vec::new();

        for caps in DIAGNOSTIC_HEADER.captures_iter(log) {
            let (raw, line_text, message) = (&caps["file"], &caps["line"], caps["msg"].trim());
            let offset = caps.get(0).map_or(0, |found| found.start());
            let Some(line) = parse_line(line_text) else {
                continue;
            };
            let Some(path) = self.tree.resolve_path(raw) else {
                continue;
            };

            let needle = block_needle(raw, line_text);
            let start = first_lines
                .get(&needle)
                .copied()
                .unwrap_or_else(|| lines.index_of(offset));
            let block = blocks
                .entry(needle)
                .or_insert_with(|| extract_block(&lines.lines, start));
            let full_message = if block.is_empty() {
                message.to_owned()
            } else {
                block.clone()
            };

            primary_errors.push(ErrorRecord {
                error_code: source::read_line(&path, line),
                path: display_path(&path),
                line,
                error_type: classify(&full_message),
                error_message: full_message,
            });
        }

        for caps in ALTERNATE_DIAGNOSTIC.captures_iter(log) {
            let Some(line) = parse_line(&caps["line"]) else {
                continue;
            };
            let Some(path) = self.tree.resolve_path(caps["file"].trim()) else {
                continue;
            };
            let message = caps["msg"].trim().to_owned();

            primary_errors.push(ErrorRecord {
                error_code: source::read_line(&path, line),
                path: display_path(&path),
                line,
                error_type: classify(&message),
                error_message: message,
            });
        }

        let related_files = STACKTRACE_FRAME
            .captures_iter(log)
            .filter_map(|caps| {
                let line = parse_line(&caps["line"])?;
                let path = self.tree.resolve_path(&caps["file"])?;
                Some(related_record(&path, line))
            })
            .collect();

        let parsed = ParsedLog {
            primary_errors,
            related_files,
        };
        debug!(
            primary = parsed.primary_errors.len(),
            related = parsed.related_files.len(),
            "parsed build log"
        );
        parsed
    }
}

fn related_record(path: &Path, line: u32) -> ErrorRecord {
    ErrorRecord {
        path: display_path(path),
        line,
        error_type: ErrorType::StacktraceReference,
        error_message: STACKTRACE_MESSAGE.to_owned(),
        error_code: source::read_line(path, line),
    }
}

fn parse_line(text: &str) -> Option<u32> {
    text.parse().ok()
}

fn starts_header(line: &str) -> bool {
    DIAGNOSTIC_HEADER
        .find(line)
        .is_some_and(|found| found.start() == 0)
}

/// Lines of a log together with the byte offset each one starts at.
struct LogLines<'a> {
    starts: Vec<usize>,
    lines: Vec<&'a str>,
}

impl<'a> LogLines<'a> {
    fn new(log: &'a str) -> Self {
        let mut starts = Vec::new();
        let mut lines = Vec::new();
        let mut offset = 0;
        for raw in log.split_inclusive('\n') {
            starts.push(offset);
            offset += raw.len();
            let line = raw.strip_suffix('\n').unwrap_or(raw);
            lines.push(line.strip_suffix('\r').unwrap_or(line));
        }
        Self { starts, lines }
    }

    /// Index of the line containing byte `offset`.
    fn index_of(&self, offset: usize) -> usize {
        self.starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }
}

fn block_needle(file: &str, line: &str) -> String {
    format!("{file}:{line}:")
}

/// Index of the first line containing each needle, found in a single pass.
///
/// Needles missing from the map fall back to the header's own line.
fn first_lines_containing(lines: &[&str], needles: HashSet<String>) -> HashMap<String, usize> {
    let needles: Vec<String> = needles.into_iter().collect();
    if needles.is_empty() {
        return HashMap::new();
    }
    let set = match RegexSet::new(needles.iter().map(|needle| regex::escape(needle))) {
        Ok(set) => set,
        Err(err) => {
            debug!(error = %err, "needle set too large; blocks start at their header");
            return HashMap::new();
        }
    };

    let mut first = HashMap::with_capacity(needles.len());
    for (index, line) in lines.iter().enumerate() {
        for needle in set.matches(line).into_iter().filter_map(|matched| needles.get(matched)) {
            first.entry(needle.clone()).or_insert(index);
        }
        if first.len() == needles.len() {
            break;
        }
    }
    first
}

/// Collect the diagnostic block starting at line `start`.
///
/// The block ends before a blank line or before the next diagnostic header.
fn extract_block(lines: &[&str], start: usize) -> String {
    let Some((header, rest)) = lines.get(start..).and_then(<[&str]>::split_first) else {
        return String::new();
    };

    let mut collected = vec![header.trim_end()];
    collected.extend(
        rest.iter()
            .take_while(|line| !line.trim().is_empty() && !starts_header(line))
            .map(|line| line.trim_end()),
    );
    collected.join("\n").trim().to_owned()
}
