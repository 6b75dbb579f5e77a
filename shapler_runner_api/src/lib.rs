use std::path::Path;

mod types;

pub use types::{BuildOutput, RunnerError, RunnerResult};

/// Trait implemented by build tool integrations (e.g., Gradle).
pub trait BuildRunner: Send + Sync {
    /// Stable identifier used for logging.
    fn id(&self) -> &'static str;

    /// Run `task` in `project` and collect its output.
    ///
    /// A non-zero exit status is reported through [`BuildOutput::exit_code`]
    /// and is not an error.
    ///
    /// # Errors
    ///
    /// Implementors surface launch failures, timeouts and I/O failures.
    fn run(&self, project: &Path, task: &str) -> RunnerResult<BuildOutput>;
}

impl<R: BuildRunner + ?Sized> BuildRunner for Box<R> {
    fn id(&self) -> &'static str {
        (**self).id()
    }

    fn run(&self, project: &Path, task: &str) -> RunnerResult<BuildOutput> {
        (**self).run(project, task)
    }
}
