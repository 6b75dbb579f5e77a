//! Resolution of raw log paths into the project's source tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Outcome of resolving a raw path taken from a build log.
#[derive(Debug)]
pub enum Resolution {
    /// Canonical path inside the source tree.
    Resolved(PathBuf),
    /// Nothing exists at the candidate path.
    NotFound,
    /// Candidate exists but lies outside the source tree.
    OutsideSourceTree(PathBuf),
    /// Canonicalization failed for another reason.
    Failed(io::Error),
    /// The project has no source tree to resolve against.
    NoSourceTree,
}

impl Resolution {
    /// The resolved path, if any.
    #[must_use]
    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            Self::Resolved(path) => Some(path),
            _ => None,
        }
    }
}

/// A project's root together with its canonical source directory.
#[derive(Debug, Clone)]
pub struct SourceTree {
    root: PathBuf,
    source_root: Option<PathBuf>,
}

impl SourceTree {
    /// Bind to `project_root`, accepting only files under `source_subdir`.
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>, source_subdir: impl AsRef<Path>) -> Self {
        let root = project_root.into();
        let source_root = match fs::canonicalize(root.join(source_subdir.as_ref())) {
            Ok(path) => Some(path),
            Err(err) => {
                debug!(
                    root = %root.display(),
                    error = %err,
                    "project has no source tree; every path will be rejected"
                );
                None
            }
        };
        Self { root, source_root }
    }

    /// Canonical source directory, when it exists.
    #[must_use]
    pub fn source_root(&self) -> Option<&Path> {
        self.source_root.as_deref()
    }

    /// Resolve `raw` relative to the project root.
    ///
    /// An absolute `raw` replaces the root. Symlinks and `..` segments are
    /// resolved before the containment check, so traversal out of the source
    /// tree is rejected even when the target exists.
    #[must_use]
    pub fn resolve(&self, raw: &str) -> Resolution {
        let Some(source_root) = &self.source_root else {
            return Resolution::NoSourceTree;
        };

        let candidate = self.root.join(raw);
        let resolved = match fs::canonicalize(&candidate) {
            Ok(path) => path,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Resolution::NotFound,
            Err(err) => return Resolution::Failed(err),
        };

        if resolved.starts_with(source_root) {
            Resolution::Resolved(resolved)
        } else {
            Resolution::OutsideSourceTree(resolved)
        }
    }

    /// Resolve `raw`, logging and discarding anything that does not resolve.
    #[must_use]
    pub fn resolve_path(&self, raw: &str) -> Option<PathBuf> {
        match self.resolve(raw) {
            Resolution::Resolved(path) => Some(path),
            other => {
                debug!(raw, outcome = ?other, "dropping unresolved path");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let temp = TempDir::new().expect("tempdir");
        let java = temp.path().join("app/src/main/java");
        fs::create_dir_all(&java).expect("create source tree");
        fs::write(java.join("App.java"), "class App {}\n").expect("write source");
        fs::write(temp.path().join("build.gradle.kts"), "").expect("write build file");
        temp
    }

    #[test]
    fn resolves_relative_path_inside_source_tree() {
        let temp = project();
        let tree = SourceTree::new(temp.path(), "app/src");

        let resolved = tree
            .resolve("app/src/main/java/App.java")
            .into_path()
            .expect("resolved");
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("app/src/main/java/App.java"));
    }

    #[test]
    fn accepts_absolute_path_inside_source_tree() {
        let temp = project();
        let tree = SourceTree::new(temp.path(), "app/src");
        let absolute = temp.path().join("app/src/main/java/App.java");

        assert!(matches!(
            tree.resolve(&absolute.to_string_lossy()),
            Resolution::Resolved(_)
        ));
    }

    #[test]
    fn rejects_files_outside_source_tree() {
        let temp = project();
        let tree = SourceTree::new(temp.path(), "app/src");

        assert!(matches!(
            tree.resolve("build.gradle.kts"),
            Resolution::OutsideSourceTree(_)
        ));
        assert!(matches!(
            tree.resolve("app/src/../../build.gradle.kts"),
            Resolution::OutsideSourceTree(_)
        ));
    }

    #[test]
    fn rejects_traversal_to_existing_system_file() {
        let temp = project();
        let tree = SourceTree::new(temp.path(), "app/src");
        let depth = temp.path().components().count();
        let escape = format!("{}etc/passwd", "../".repeat(depth + 2));

        assert!(tree.resolve(&escape).into_path().is_none());
        assert!(tree.resolve("../../etc/passwd").into_path().is_none());
    }

    #[test]
    fn sibling_directory_with_shared_prefix_is_rejected() {
        let temp = project();
        let sibling = temp.path().join("app/src2");
        fs::create_dir_all(&sibling).expect("create sibling");
        fs::write(sibling.join("Gen.java"), "").expect("write generated");
        let tree = SourceTree::new(temp.path(), "app/src");

        assert!(matches!(
            tree.resolve("app/src2/Gen.java"),
            Resolution::OutsideSourceTree(_)
        ));
    }

    #[test]
    fn missing_file_is_not_found() {
        let temp = project();
        let tree = SourceTree::new(temp.path(), "app/src");
        assert!(matches!(
            tree.resolve("app/src/main/java/Nope.java"),
            Resolution::NotFound
        ));
    }

    #[test]
    fn project_without_source_tree_rejects_everything() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(temp.path().join("App.java"), "").expect("write source");
        let tree = SourceTree::new(temp.path(), "app/src");

        assert!(tree.source_root().is_none());
        assert!(matches!(tree.resolve("App.java"), Resolution::NoSourceTree));
    }
}
