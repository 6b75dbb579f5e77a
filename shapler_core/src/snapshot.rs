//! Before/after captures of a single file.

use std::path::Path;

use shapler_api::{Capture, CaptureTag, FileState};
use tracing::warn;

use crate::display_path;
use crate::hash::{strip_comments, ContentHasher};
use crate::source::{SourceFile, SourceRead};

/// Produces immutable captures of source files.
#[derive(Debug, Default, Clone, Copy)]
pub struct Snapshotter {
    hasher: ContentHasher,
}

impl Snapshotter {
    /// Construct a snapshotter with the default hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hasher: ContentHasher::new(),
        }
    }

    /// Capture `path`, recording the text of `line` on the side given by `tag`.
    ///
    /// An unreadable file yields empty content and an empty line rather than
    /// an error. The file is never modified.
    #[must_use]
    pub fn capture(&self, path: &Path, tag: CaptureTag, line: Option<u32>) -> Capture {
        let file = match SourceRead::read(path) {
            SourceRead::Loaded(file) => file,
            SourceRead::Missing => {
                warn!(path = %path.display(), ?tag, "captured file is missing");
                SourceFile::from_bytes(Vec::new())
            }
            SourceRead::Failed(err) => {
                warn!(path = %path.display(), ?tag, error = %err, "captured file is unreadable");
                SourceFile::from_bytes(Vec::new())
            }
        };

        let content = strip_comments(file.text());
        let digest = self.hasher.digest(path, &file, &content);
        let code = line
            .and_then(|line| file.line(line))
            .map(|text| text.trim_end().to_owned())
            .unwrap_or_default();

        let state = FileState {
            path: display_path(path),
            content,
            sha256_clean: digest.sha256_clean,
            git_hash: digest.git_hash,
        };

        match tag {
            CaptureTag::Before => Capture::before(state, line, code),
            CaptureTag::After => Capture::after(state, code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256_hex;
    use tempfile::TempDir;

    fn source(temp: &TempDir) -> std::path::PathBuf {
        let path = temp.path().join("App.java");
        std::fs::write(&path, "class App {\n    int x = ;   \n} // end\n").expect("write source");
        path
    }

    #[test]
    fn before_capture_records_error_line() {
        let temp = TempDir::new().expect("tempdir");
        let path = source(&temp);

        let capture = Snapshotter::new().capture(&path, CaptureTag::Before, Some(2));

        assert_eq!(capture.tag, CaptureTag::Before);
        assert_eq!(capture.error_code.as_deref(), Some("    int x = ;"));
        assert_eq!(capture.error_line, Some(2));
        assert!(capture.fixed_code.is_none());
        assert_eq!(capture.content, "class App {\n    int x = ;   \n} \n");
        assert_eq!(capture.sha256_clean, sha256_hex(&capture.content));
    }

    #[test]
    fn after_capture_records_fixed_line() {
        let temp = TempDir::new().expect("tempdir");
        let path = source(&temp);

        let capture = Snapshotter::new().capture(&path, CaptureTag::After, Some(1));

        assert_eq!(capture.fixed_code.as_deref(), Some("class App {"));
        assert!(capture.error_code.is_none());
        assert!(capture.error_line.is_none());
    }

    #[test]
    fn out_of_range_or_absent_line_is_empty() {
        let temp = TempDir::new().expect("tempdir");
        let path = source(&temp);
        let snapshotter = Snapshotter::new();

        let far = snapshotter.capture(&path, CaptureTag::Before, Some(40));
        assert_eq!(far.error_code.as_deref(), Some(""));

        let none = snapshotter.capture(&path, CaptureTag::After, None);
        assert_eq!(none.fixed_code.as_deref(), Some(""));
    }

    #[test]
    fn missing_file_yields_empty_capture() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("Gone.java");

        let capture = Snapshotter::new().capture(&path, CaptureTag::Before, Some(1));

        assert!(capture.content.is_empty());
        assert_eq!(capture.error_code.as_deref(), Some(""));
        assert_eq!(capture.sha256_clean, sha256_hex(""));
    }

    #[test]
    fn capture_does_not_modify_file() {
        let temp = TempDir::new().expect("tempdir");
        let path = source(&temp);
        let before = std::fs::read(&path).expect("read");

        let _ = Snapshotter::new().capture(&path, CaptureTag::Before, Some(2));

        assert_eq!(std::fs::read(&path).expect("read"), before);
    }
}
