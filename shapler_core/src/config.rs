//! Explicit configuration passed to every component at construction.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

const DEFAULT_SOURCE_SUBDIR: &str = "app/src";
const DEFAULT_CONTEXT_LINES: u32 = 3;

const WORK_DIR_ENV: &str = "SHAPLER_WORK_DIR";
const SOURCE_SUBDIR_ENV: &str = "SHAPLER_SOURCE_SUBDIR";
const TIMEOUT_ENV: &str = "SHAPLER_BUILD_TIMEOUT_SECS";

/// Directories and limits used by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root under which snapshots and logs are kept.
    pub work_dir: PathBuf,
    /// Project-relative directory that diagnostics must point into.
    pub source_subdir: PathBuf,
    /// Maximum wall time for one build invocation.
    pub build_timeout: Duration,
    /// Context lines around each diff hunk.
    pub context_lines: u32,
}

impl Config {
    /// Configuration rooted at `work_dir` with default limits.
    #[must_use]
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            source_subdir: PathBuf::from(DEFAULT_SOURCE_SUBDIR),
            build_timeout: shapler_runners::DEFAULT_TIMEOUT,
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }

    /// Build a configuration from `SHAPLER_*` environment variables.
    ///
    /// Unset or unparsable values fall back to the defaults; the work
    /// directory defaults to the current directory.
    #[must_use]
    pub fn from_env() -> Self {
        let work_dir = env::var_os(WORK_DIR_ENV)
            .map(PathBuf::from)
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let mut config = Self::new(work_dir);

        if let Some(subdir) = env::var_os(SOURCE_SUBDIR_ENV).filter(|value| !value.is_empty()) {
            config.source_subdir = PathBuf::from(subdir);
        }
        if let Some(secs) = env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
        {
            config.build_timeout = Duration::from_secs(secs);
        }

        config
    }

    /// Directory holding ledger files.
    #[must_use]
    pub fn snapshot_dir(&self) -> PathBuf {
        self.work_dir.join("tmp").join("snapshots")
    }

    /// Directory reserved for exported diffs.
    #[must_use]
    pub fn diff_dir(&self) -> PathBuf {
        self.work_dir.join("tmp").join("diffs")
    }

    /// Directory receiving persisted build logs.
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.work_dir.join("logs")
    }

    /// Create every working directory; safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when a directory cannot be created.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.snapshot_dir(), self.diff_dir(), self.log_dir()] {
            fs::create_dir_all(&dir).map_err(|source| Error::io(&dir, source))?;
        }
        Ok(())
    }

    /// Source tree root for a given project.
    #[must_use]
    pub fn source_root(&self, project: &Path) -> PathBuf {
        project.join(&self.source_subdir)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn directories_hang_off_work_dir() {
        let config = Config::new("/work");
        assert_eq!(config.snapshot_dir(), PathBuf::from("/work/tmp/snapshots"));
        assert_eq!(config.diff_dir(), PathBuf::from("/work/tmp/diffs"));
        assert_eq!(config.log_dir(), PathBuf::from("/work/logs"));
        assert_eq!(
            config.source_root(Path::new("/proj")),
            PathBuf::from("/proj/app/src")
        );
        assert_eq!(config.build_timeout, Duration::from_secs(300));
        assert_eq!(config.context_lines, 3);
    }

    #[test]
    fn ensure_dirs_is_idempotent() -> Result<()> {
        let temp = TempDir::new().expect("tempdir");
        let config = Config::new(temp.path());

        config.ensure_dirs()?;
        config.ensure_dirs()?;

        assert!(config.snapshot_dir().is_dir());
        assert!(config.diff_dir().is_dir());
        assert!(config.log_dir().is_dir());
        Ok(())
    }
}
