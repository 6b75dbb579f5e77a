//! Source file reading with explicit outcomes.

use std::fs;
use std::io;
use std::path::Path;

/// Outcome of reading a source file.
#[derive(Debug)]
pub enum SourceRead {
    /// File was read; undecodable bytes were replaced.
    Loaded(SourceFile),
    /// File does not exist.
    Missing,
    /// File exists but could not be read.
    Failed(io::Error),
}

impl SourceRead {
    /// Read `path` from disk.
    pub fn read(path: &Path) -> Self {
        match fs::read(path) {
            Ok(raw) => Self::Loaded(SourceFile::from_bytes(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Self::Missing,
            Err(err) => Self::Failed(err),
        }
    }

    /// The loaded file, discarding the reason it might be unavailable.
    #[must_use]
    pub fn loaded(self) -> Option<SourceFile> {
        match self {
            Self::Loaded(file) => Some(file),
            Self::Missing | Self::Failed(_) => None,
        }
    }
}

/// Raw bytes of a file plus their lossy UTF-8 decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    raw: Vec<u8>,
    text: String,
}

impl SourceFile {
    /// Wrap raw bytes, decoding them with replacement characters.
    #[must_use]
    pub fn from_bytes(raw: Vec<u8>) -> Self {
        let text = String::from_utf8_lossy(&raw).into_owned();
        Self { raw, text }
    }

    /// Bytes exactly as stored on disk.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Decoded text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The 1-based `line`, without its terminator.
    #[must_use]
    pub fn line(&self, line: u32) -> Option<&str> {
        let index = usize::try_from(line).ok()?.checked_sub(1)?;
        self.text.lines().nth(index)
    }
}

/// Read the trimmed text of `line` in `path`, if the file and line exist.
pub fn read_line(path: &Path, line: u32) -> Option<String> {
    let file = SourceRead::read(path).loaded()?;
    file.line(line).map(|text| text.trim().to_owned())
}
