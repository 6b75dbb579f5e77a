use std::fs;
use std::path::{Path, PathBuf};

use shapler_runner_api::{BuildOutput, BuildRunner, RunnerError, RunnerResult};
use tracing::debug;

/// Replays a previously captured build log instead of invoking a build tool.
#[derive(Debug, Clone)]
pub struct LogFileRunner {
    path: PathBuf,
}

impl LogFileRunner {
    /// Construct a runner that replays the log stored at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BuildRunner for LogFileRunner {
    fn id(&self) -> &'static str {
        "log-file"
    }

    fn run(&self, project: &Path, task: &str) -> RunnerResult<BuildOutput> {
        debug!(
            log = %self.path.display(),
            project = %project.display(),
            task,
            "replaying build log"
        );
        let bytes = fs::read(&self.path).map_err(|source| RunnerError::Io {
            path: self.path.clone(),
            source,
        })?;
        let stdout = String::from_utf8_lossy(&bytes).into_owned();
        let mut output = BuildOutput::from_streams(None, stdout, String::new());
        output.log_file = Some(self.path.clone());
        Ok(output)
    }
}
