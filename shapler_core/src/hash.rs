//! Normalized content digests and git blob identities.

use std::path::Path;
use std::sync::LazyLock;

use git2::{ErrorClass, ErrorCode, ObjectType, Oid, Repository};
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::source::{SourceFile, SourceRead};

static LINE_COMMENT: LazyLock<Regex> = LazyLock::new(|| compile(r"//[^\n]*"));
static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| compile(r"(?s)/\*.*?\*/"));

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern compiles")
}

/// Remove `//` line comments, then `/* */` block comments.
///
/// Purely textual: comment markers inside string literals are stripped too.
#[must_use]
pub fn strip_comments(text: &str) -> String {
    let without_lines = LINE_COMMENT.replace_all(text, "");
    BLOCK_COMMENT.replace_all(&without_lines, "").into_owned()
}

/// Hex SHA-256 of the UTF-8 bytes of `text`.
#[must_use]
pub fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Outcome of looking up a file's git blob identity.
#[derive(Debug)]
pub enum BlobLookup {
    /// File lives in a git work tree; carries its blob id.
    InWorkTree(Oid),
    /// No work tree contains the file.
    OutsideWorkTree,
    /// libgit2 failed while discovering or hashing.
    Failed(git2::Error),
}

/// Compute the git blob id of `raw` when `path` lives inside a work tree.
#[must_use]
pub fn blob_identity(path: &Path, raw: &[u8]) -> BlobLookup {
    let Some(parent) = path.parent() else {
        return BlobLookup::OutsideWorkTree;
    };

    let repo = match Repository::discover(parent) {
        Ok(repo) => repo,
        Err(err)
            if err.class() == ErrorClass::Repository && err.code() == ErrorCode::NotFound =>
        {
            return BlobLookup::OutsideWorkTree
        }
        Err(err) => return BlobLookup::Failed(err),
    };

    let inside = repo.workdir().is_some_and(|workdir| {
        let workdir = workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf());
        let target = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        target.starts_with(workdir)
    });
    if !inside {
        return BlobLookup::OutsideWorkTree;
    }

    match Oid::hash_object(ObjectType::Blob, raw) {
        Ok(oid) => BlobLookup::InWorkTree(oid),
        Err(err) => BlobLookup::Failed(err),
    }
}

/// The two digests recorded for a captured file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    /// Hex SHA-256 of the comment-stripped text.
    pub sha256_clean: String,
    /// Git blob id of the raw bytes, or hex SHA-256 of the raw text.
    pub git_hash: String,
}

/// Computes normalized digests and blob identities.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentHasher;

impl ContentHasher {
    /// Construct a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Read `path` and digest it. Unreadable files digest as empty.
    #[must_use]
    pub fn hash(&self, path: &Path) -> FileDigest {
        let file = SourceRead::read(path)
            .loaded()
            .unwrap_or_else(|| SourceFile::from_bytes(Vec::new()));
        let clean = strip_comments(file.text());
        self.digest(path, &file, &clean)
    }

    /// Digest already-loaded contents whose normalized form is `clean`.
    #[must_use]
    pub fn digest(&self, path: &Path, file: &SourceFile, clean: &str) -> FileDigest {
        let git_hash = match blob_identity(path, file.raw()) {
            BlobLookup::InWorkTree(oid) => oid.to_string(),
            BlobLookup::OutsideWorkTree => sha256_hex(file.text()),
            BlobLookup::Failed(err) => {
                debug!(path = %path.display(), error = %err, "blob lookup failed; using sha256");
                sha256_hex(file.text())
            }
        };

        FileDigest {
            sha256_clean: sha256_hex(clean),
            git_hash,
        }
    }
}
