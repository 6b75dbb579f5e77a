//! Run and finalize orchestration.
//!
//! A ledger moves through three states: absent, open (created by
//! [`Pipeline::run`] with only before captures) and closed (every entry
//! carries an after capture and a diff, written by [`Pipeline::finalize`]).

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use shapler_api::{CaptureTag, ErrorEntry, ErrorRecord, Ledger};
use shapler_runner_api::BuildRunner;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::diff::DiffEngine;
use crate::ledger::{LedgerId, LedgerStore};
use crate::parser::LogParser;
use crate::resolve::SourceTree;
use crate::snapshot::Snapshotter;
use crate::{display_path, Error, Result};

/// Result of [`Pipeline::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The build log carried no resolvable diagnostics; no ledger was written.
    NoErrors,
    /// A new ledger was created.
    SnapshotCreated {
        /// Identity of the new ledger.
        ledger: LedgerId,
        /// Number of entries recorded.
        count: usize,
    },
}

/// Result of [`Pipeline::finalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeOutcome {
    /// Ledger that was closed.
    pub ledger: LedgerId,
    /// Number of entries in the ledger.
    pub error_count: usize,
}

/// Drop records repeating an earlier `(path, line)`; the first one wins.
#[must_use]
pub fn dedupe(records: Vec<ErrorRecord>) -> Vec<ErrorRecord> {
    let keep: Vec<bool> = {
        let mut seen = HashSet::new();
        records.iter().map(|record| seen.insert(record.key())).collect()
    };
    records
        .into_iter()
        .zip(keep)
        .filter_map(|(record, keep)| keep.then_some(record))
        .collect()
}

/// Drives a build runner and a ledger store through run and finalize.
#[derive(Debug)]
pub struct Pipeline<R, S> {
    config: Config,
    runner: R,
    store: S,
    snapshotter: Snapshotter,
    diff: DiffEngine,
}

impl<R: BuildRunner, S: LedgerStore> Pipeline<R, S> {
    /// Wire a pipeline from its parts.
    #[must_use]
    pub fn new(config: Config, runner: R, store: S) -> Self {
        let diff = DiffEngine::with_context(config.context_lines);
        Self {
            config,
            runner,
            store,
            snapshotter: Snapshotter::new(),
            diff,
        }
    }

    /// Ledger store in use.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Build `project`, parse the log and open a ledger of before captures.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Build`] when the runner fails, or an I/O or ledger
    /// error when the ledger cannot be persisted.
    pub fn run(&self, project: &Path, task: &str) -> Result<RunOutcome> {
        self.config.ensure_dirs()?;
        info!(runner = self.runner.id(), project = %project.display(), task, "running build");
        let output = self.runner.run(project, task)?;
        debug!(
            exit_code = ?output.exit_code,
            succeeded = output.succeeded(),
            bytes = output.combined_log.len(),
            "build finished"
        );

        let tree = SourceTree::new(project, &self.config.source_subdir);
        let parsed = LogParser::new(&tree).parse(&output.combined_log);
        let records = dedupe(parsed.into_records());
        if records.is_empty() {
            info!("no errors detected");
            return Ok(RunOutcome::NoErrors);
        }

        let mut ledger = Ledger::new(display_path(project), task);
        for record in records {
            let before = self.snapshotter.capture(
                Path::new(&record.path),
                CaptureTag::Before,
                Some(record.line),
            );
            ledger.errors.push(ErrorEntry::open(record, before));
        }

        let count = ledger.errors.len();
        let id = self.store.create(&ledger)?;
        info!(ledger = %id, count, "snapshot created");
        Ok(RunOutcome::SnapshotCreated { ledger: id, count })
    }

    /// Rebuild `project` and close the most recent ledger with after captures.
    ///
    /// The rebuild's output is not parsed. Closing an already closed ledger
    /// re-captures every entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoLedger`] when no ledger exists, [`Error::Build`]
    /// when the runner fails, or a storage error.
    pub fn finalize(&self, project: &Path, task: &str) -> Result<FinalizeOutcome> {
        let Some(id) = self.store.most_recent()? else {
            return Err(Error::NoLedger {
                location: self.store.location(),
            });
        };
        let mut ledger = self.store.read(&id)?;
        if ledger.is_closed() {
            info!(ledger = %id, "re-finalizing closed ledger");
        }

        self.config.ensure_dirs()?;
        info!(runner = self.runner.id(), project = %project.display(), task, "running verification build");
        let output = self.runner.run(project, task)?;
        debug!(
            exit_code = ?output.exit_code,
            succeeded = output.succeeded(),
            "verification build finished"
        );

        for entry in &mut ledger.errors {
            let path = PathBuf::from(&entry.location.path);
            let after = self
                .snapshotter
                .capture(&path, CaptureTag::After, Some(entry.location.line));
            let diff = match self
                .diff
                .diff(&entry.before.content, &after.content, &entry.location.path)
            {
                Ok(diff) => Some(diff),
                Err(err) => {
                    warn!(path = %entry.location.path, error = %err, "diff failed");
                    None
                }
            };
            entry.close(after, diff);
        }

        self.store.write(&id, &ledger)?;
        self.export_diffs(&id, &ledger);

        let error_count = ledger.errors.len();
        info!(ledger = %id, error_count, "finalize complete");
        Ok(FinalizeOutcome {
            ledger: id,
            error_count,
        })
    }

    /// Write each non-empty diff to its own patch file under the diff dir.
    fn export_diffs(&self, id: &LedgerId, ledger: &Ledger) {
        let dir = self.config.diff_dir().join(id.to_string());
        match fs::remove_dir_all(&dir) {
            Ok(()) => debug!(dir = %dir.display(), "cleared previous diff export"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(dir = %dir.display(), error = %err, "could not clear diff export"),
        }

        for (index, entry) in ledger.errors.iter().enumerate() {
            let Some(diff) = entry.diff.as_ref().filter(|diff| !diff.is_empty()) else {
                continue;
            };
            let name = Path::new(&entry.location.path)
                .file_name()
                .map_or_else(|| "source".to_owned(), |name| name.to_string_lossy().into_owned());
            let path = dir.join(format!("{index:03}_{name}.diff"));

            if let Err(err) = fs::create_dir_all(&dir).and_then(|()| fs::write(&path, &diff.unified)) {
                warn!(path = %path.display(), error = %err, "could not export diff");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FsLedgerStore;
    use shapler_api::ErrorType;
    use shapler_runner_api::{BuildOutput, RunnerError, RunnerResult};
    use tempfile::TempDir;

    struct CannedRunner {
        log: Option<String>,
    }

    impl BuildRunner for CannedRunner {
        fn id(&self) -> &'static str {
            "canned"
        }

        fn run(&self, _project: &Path, _task: &str) -> RunnerResult<BuildOutput> {
            self.log.as_ref().map_or_else(
                || Err(RunnerError::message("build tool exploded")),
                |log| Ok(BuildOutput::from_streams(Some(1), log.clone(), String::new())),
            )
        }
    }

    struct Fixture {
        _work: TempDir,
        project: TempDir,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            let work = TempDir::new().expect("work dir");
            let project = TempDir::new().expect("project dir");
            let java = project.path().join("app/src/main/java");
            fs::create_dir_all(&java).expect("source tree");
            fs::write(
                java.join("App.java"),
                "class App {\n    int x = 1\n    int y = 2;\n}\n",
            )
            .expect("write source");
            let config = Config::new(work.path());
            Self {
                _work: work,
                project,
                config,
            }
        }

        fn source(&self) -> PathBuf {
            self.project.path().join("app/src/main/java/App.java")
        }

        fn pipeline(&self, log: Option<&str>) -> Pipeline<CannedRunner, FsLedgerStore> {
            Pipeline::new(
                self.config.clone(),
                CannedRunner {
                    log: log.map(str::to_owned),
                },
                FsLedgerStore::new(self.config.snapshot_dir()),
            )
        }
    }

    fn record(path: &str, line: u32, message: &str) -> ErrorRecord {
        ErrorRecord {
            path: path.into(),
            line,
            error_type: ErrorType::Unknown,
            error_message: message.into(),
            error_code: None,
        }
    }

    const LOG: &str = "app/src/main/java/App.java:2: error: ';' expected\n    int x = 1\n             ^\n";

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let records = vec![
            record("/a", 1, "first"),
            record("/b", 1, "other file"),
            record("/a", 1, "second"),
            record("/a", 2, "other line"),
        ];

        let kept = dedupe(records);

        let messages: Vec<_> = kept.iter().map(|r| r.error_message.as_str()).collect();
        assert_eq!(messages, ["first", "other file", "other line"]);
    }

    #[test]
    fn run_without_diagnostics_writes_no_ledger() -> Result<()> {
        let fixture = Fixture::new();
        let pipeline = fixture.pipeline(Some("BUILD SUCCESSFUL in 1s\n"));

        let outcome = pipeline.run(fixture.project.path(), "build")?;

        assert_eq!(outcome, RunOutcome::NoErrors);
        assert_eq!(pipeline.store().most_recent()?, None);
        assert!(fixture.config.snapshot_dir().is_dir());
        Ok(())
    }

    #[test]
    fn run_opens_ledger_with_before_captures() -> Result<()> {
        let fixture = Fixture::new();
        let pipeline = fixture.pipeline(Some(LOG));

        let RunOutcome::SnapshotCreated { ledger, count } =
            pipeline.run(fixture.project.path(), "build")?
        else {
            panic!("expected a snapshot");
        };

        assert_eq!(count, 1);
        let stored = pipeline.store().read(&ledger)?;
        let entry = &stored.errors[0];
        assert_eq!(stored.task, "build");
        assert_eq!(entry.location.line, 2);
        assert_eq!(entry.details.error_type, ErrorType::MissingSemicolon);
        assert_eq!(entry.before.error_code.as_deref(), Some("    int x = 1"));
        assert!(!entry.is_closed());
        Ok(())
    }

    #[test]
    fn finalize_without_ledger_fails() {
        let fixture = Fixture::new();
        let pipeline = fixture.pipeline(Some(LOG));

        let err = pipeline
            .finalize(fixture.project.path(), "build")
            .expect_err("no ledger");

        assert!(matches!(err, Error::NoLedger { .. }));
    }

    #[test]
    fn finalize_closes_ledger_and_exports_diff() -> Result<()> {
        let fixture = Fixture::new();
        let pipeline = fixture.pipeline(Some(LOG));
        pipeline.run(fixture.project.path(), "build")?;

        fs::write(
            fixture.source(),
            "class App {\n    int x = 1;\n    int y = 2;\n}\n",
        )
        .expect("apply fix");
        let outcome = pipeline.finalize(fixture.project.path(), "build")?;

        assert_eq!(outcome.error_count, 1);
        let stored = pipeline.store().read(&outcome.ledger)?;
        assert!(stored.is_closed());
        let entry = &stored.errors[0];
        let after = entry.after.as_ref().expect("after capture");
        assert_eq!(after.fixed_code.as_deref(), Some("    int x = 1;"));
        let diff = entry.diff.as_ref().expect("diff");
        assert!(diff.unified.contains("-    int x = 1\n+    int x = 1;\n"));

        let exported = fixture
            .config
            .diff_dir()
            .join(outcome.ledger.to_string())
            .join("000_App.java.diff");
        assert_eq!(fs::read_to_string(exported).expect("exported diff"), diff.unified);
        Ok(())
    }

    #[test]
    fn refinalize_recaptures_same_ledger() -> Result<()> {
        let fixture = Fixture::new();
        let pipeline = fixture.pipeline(Some(LOG));
        pipeline.run(fixture.project.path(), "build")?;

        let first = pipeline.finalize(fixture.project.path(), "build")?;
        let second = pipeline.finalize(fixture.project.path(), "build")?;

        assert_eq!(first.ledger, second.ledger);
        let stored = pipeline.store().read(&second.ledger)?;
        assert!(stored.errors[0].diff.as_ref().is_some_and(|d| d.is_empty()));
        assert!(!fixture
            .config
            .diff_dir()
            .join(second.ledger.to_string())
            .exists());
        Ok(())
    }

    #[test]
    fn runner_failure_is_fatal() {
        let fixture = Fixture::new();
        let pipeline = fixture.pipeline(None);

        let err = pipeline
            .run(fixture.project.path(), "build")
            .expect_err("runner failure");

        assert!(matches!(err, Error::Build { .. }));
    }
}
