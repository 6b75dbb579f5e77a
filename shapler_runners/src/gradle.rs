use std::ffi::OsString;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use shapler_runner_api::{BuildOutput, BuildRunner, RunnerError, RunnerResult};
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// How long a build may run before it is killed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const GRADLE_FLAGS: [&str; 2] = ["--no-daemon", "--stacktrace"];

#[cfg(windows)]
const WRAPPER_NAME: &str = "gradlew.bat";
#[cfg(not(windows))]
const WRAPPER_NAME: &str = "gradlew";

/// Runs a Gradle task through the project wrapper, or `gradle` from `PATH`.
#[derive(Debug, Clone)]
pub struct GradleRunner {
    timeout: Duration,
    log_dir: Option<PathBuf>,
    program: Option<(OsString, Vec<OsString>)>,
}

impl GradleRunner {
    /// Construct a runner with the default timeout and no log persistence.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            log_dir: None,
            program: None,
        }
    }

    /// Override the build timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Persist every combined log under `dir` as `build_<timestamp>.log`.
    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Replace wrapper detection with an explicit program and leading arguments.
    ///
    /// The task and Gradle flags are still appended after `leading`.
    #[must_use]
    pub fn with_program<I, S>(mut self, program: impl Into<OsString>, leading: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.program = Some((program.into(), leading.into_iter().map(Into::into).collect()));
        self
    }

    /// The program and leading arguments used for `project`.
    #[must_use]
    pub fn command_for(&self, project: &Path) -> (OsString, Vec<OsString>) {
        if let Some((program, leading)) = &self.program {
            return (program.clone(), leading.clone());
        }

        let wrapper = project.join(WRAPPER_NAME);
        if wrapper.exists() {
            (wrapper.into_os_string(), Vec::new())
        } else {
            (OsString::from("gradle"), Vec::new())
        }
    }

    fn persist_log(&self, combined: &str) -> Option<PathBuf> {
        let dir = self.log_dir.as_ref()?;
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("build_{stamp}.log"));
        let written = fs::create_dir_all(dir).and_then(|()| fs::write(&path, combined));
        match written {
            Ok(()) => {
                info!(path = %path.display(), "saved build log");
                Some(path)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to save build log");
                None
            }
        }
    }
}

impl Default for GradleRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildRunner for GradleRunner {
    fn id(&self) -> &'static str {
        "gradle"
    }

    fn run(&self, project: &Path, task: &str) -> RunnerResult<BuildOutput> {
        if !project.exists() {
            return Err(RunnerError::MissingProject {
                path: project.to_path_buf(),
            });
        }

        let (program, leading) = self.command_for(project);
        let mut command = Command::new(&program);
        command.args(&leading);
        command.arg(task);
        command.args(GRADLE_FLAGS);
        command.current_dir(project);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        debug!(
            program = %program.to_string_lossy(),
            task,
            project = %project.display(),
            "running build"
        );

        let mut child = command.spawn().map_err(|source| RunnerError::Launch {
            program: program.to_string_lossy().into_owned(),
            source,
        })?;

        let stdout_handle = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || -> io::Result<Vec<u8>> {
                let mut buffer = Vec::new();
                stdout.read_to_end(&mut buffer)?;
                Ok(buffer)
            })
        });

        let stderr_handle = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || -> io::Result<Vec<u8>> {
                let mut buffer = Vec::new();
                stderr.read_to_end(&mut buffer)?;
                Ok(buffer)
            })
        });

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunnerError::TimedOut {
                    timeout: self.timeout,
                });
            }
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunnerError::Wait { source });
            }
        };

        let stdout = join_reader(stdout_handle, "stdout")?;
        let stderr = join_reader(stderr_handle, "stderr")?;

        if !status.success() {
            debug!(code = ?status.code(), "build exited unsuccessfully");
        }

        let mut output = BuildOutput::from_streams(status.code(), stdout, stderr);
        output.log_file = self.persist_log(&output.combined_log);
        Ok(output)
    }
}

fn join_reader(
    handle: Option<thread::JoinHandle<io::Result<Vec<u8>>>>,
    stream: &str,
) -> RunnerResult<String> {
    match handle {
        Some(handle) => {
            let bytes = handle
                .join()
                .map_err(|_| RunnerError::message(format!("failed to join build {stream} reader")))?
                .map_err(|err| {
                    RunnerError::message(format!("failed to read build {stream}: {err}"))
                })?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        None => Ok(String::new()),
    }
}
