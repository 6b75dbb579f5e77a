//! Ledger persistence.
//!
//! Ledgers live as pretty-printed JSON files named
//! `latest_error_<sequence>_<nonce>.json`. The sequence is zero-padded to
//! twenty digits and increases by one per created ledger, so the most recent
//! ledger is found by comparing parsed sequences rather than timestamps or
//! directory listing order.

use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use shapler_api::Ledger;
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

use crate::{display_path, Error, Result};

const FILE_PREFIX: &str = "latest_error_";
const FILE_SUFFIX: &str = ".json";

/// Identity of a persisted ledger.
///
/// Ordering follows the creation sequence, then the nonce.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LedgerId {
    sequence: u64,
    nonce: String,
}

impl LedgerId {
    /// Build an identifier from its parts.
    #[must_use]
    pub fn new(sequence: u64, nonce: impl Into<String>) -> Self {
        Self {
            sequence,
            nonce: nonce.into(),
        }
    }

    /// Creation sequence number.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// File name used on disk.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{self}{FILE_SUFFIX}")
    }

    /// Parse a canonical ledger file name. Anything else is `None`.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
        let (sequence, nonce) = stem.split_once('_')?;
        if sequence.is_empty()
            || !sequence.bytes().all(|b| b.is_ascii_digit())
            || nonce.is_empty()
            || !nonce.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return None;
        }

        let id = Self::new(sequence.parse().ok()?, nonce);
        (id.file_name() == name).then_some(id)
    }
}

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{FILE_PREFIX}{:020}_{}", self.sequence, self.nonce)
    }
}

/// Storage backend for ledgers.
pub trait LedgerStore {
    /// Persist a new ledger and return its identity.
    ///
    /// # Errors
    ///
    /// Returns an error when the ledger cannot be encoded or written.
    fn create(&self, ledger: &Ledger) -> Result<LedgerId>;

    /// Identity of the most recently created ledger, if any.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be listed.
    fn most_recent(&self) -> Result<Option<LedgerId>>;

    /// Load a ledger.
    ///
    /// # Errors
    ///
    /// Returns an error when the ledger is missing or malformed.
    fn read(&self, id: &LedgerId) -> Result<Ledger>;

    /// Replace the contents of an existing ledger.
    ///
    /// # Errors
    ///
    /// Returns an error when the ledger cannot be encoded or written.
    fn write(&self, id: &LedgerId, ledger: &Ledger) -> Result<()>;

    /// Human-readable description of where ledgers are kept.
    fn location(&self) -> String;
}

impl<T: LedgerStore + ?Sized> LedgerStore for &T {
    fn create(&self, ledger: &Ledger) -> Result<LedgerId> {
        (**self).create(ledger)
    }

    fn most_recent(&self) -> Result<Option<LedgerId>> {
        (**self).most_recent()
    }

    fn read(&self, id: &LedgerId) -> Result<Ledger> {
        (**self).read(id)
    }

    fn write(&self, id: &LedgerId, ledger: &Ledger) -> Result<()> {
        (**self).write(id, ledger)
    }

    fn location(&self) -> String {
        (**self).location()
    }
}

/// Ledger store backed by a directory of JSON files.
#[derive(Debug, Clone)]
pub struct FsLedgerStore {
    dir: PathBuf,
}

impl FsLedgerStore {
    /// Store ledgers under `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the ledger files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `id`.
    #[must_use]
    pub fn path_of(&self, id: &LedgerId) -> PathBuf {
        self.dir.join(id.file_name())
    }

    fn ids(&self) -> Result<Vec<LedgerId>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Error::io(&self.dir, err)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::io(&self.dir, source))?;
            let name = entry.file_name();
            match name.to_str().and_then(LedgerId::from_file_name) {
                Some(id) => ids.push(id),
                None => debug!(file = %name.to_string_lossy(), "ignoring foreign file in ledger dir"),
            }
        }
        Ok(ids)
    }
}

impl LedgerStore for FsLedgerStore {
    fn create(&self, ledger: &Ledger) -> Result<LedgerId> {
        let sequence = self
            .most_recent()?
            .map_or(1, |latest| latest.sequence.saturating_add(1));
        let id = LedgerId::new(sequence, Uuid::new_v4().simple().to_string());
        self.write(&id, ledger)?;
        debug!(ledger = %id, "created ledger");
        Ok(id)
    }

    fn most_recent(&self) -> Result<Option<LedgerId>> {
        Ok(self.ids()?.into_iter().max())
    }

    fn read(&self, id: &LedgerId) -> Result<Ledger> {
        let path = self.path_of(id);
        let text = fs::read_to_string(&path).map_err(|source| Error::io(&path, source))?;
        serde_json::from_str(&text).map_err(|source| Error::LedgerFormat {
            path: display_path(&path),
            source,
        })
    }

    fn write(&self, id: &LedgerId, ledger: &Ledger) -> Result<()> {
        let path = self.path_of(id);
        let mut json = serde_json::to_string_pretty(ledger).map_err(|source| Error::LedgerFormat {
            path: display_path(&path),
            source,
        })?;
        json.push('\n');

        fs::create_dir_all(&self.dir).map_err(|source| Error::io(&self.dir, source))?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|source| Error::io(&self.dir, source))?;
        tmp.write_all(json.as_bytes())
            .map_err(|source| Error::io(tmp.path(), source))?;
        tmp.persist(&path)
            .map_err(|err| Error::io(&path, err.error))?;
        Ok(())
    }

    fn location(&self) -> String {
        display_path(&self.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsLedgerStore) {
        let temp = TempDir::new().expect("tempdir");
        let store = FsLedgerStore::new(temp.path().join("snapshots"));
        (temp, store)
    }

    #[test]
    fn empty_store_has_no_ledger() -> Result<()> {
        let (_temp, store) = store();
        assert_eq!(store.most_recent()?, None);
        Ok(())
    }

    #[test]
    fn created_ledgers_read_back() -> Result<()> {
        let (_temp, store) = store();
        let ledger = Ledger::new("/work", "build");

        let id = store.create(&ledger)?;

        assert_eq!(id.sequence(), 1);
        assert_eq!(store.read(&id)?, ledger);
        assert!(store.path_of(&id).is_file());
        Ok(())
    }

    #[test]
    fn ledger_files_are_pretty_printed() -> Result<()> {
        let (_temp, store) = store();
        let id = store.create(&Ledger::new("/work", "build"))?;

        let text = fs::read_to_string(store.path_of(&id)).expect("read ledger");
        assert!(text.starts_with("{\n  \"project\": \"/work\""));
        Ok(())
    }

    #[test]
    fn sequence_increases_per_creation() -> Result<()> {
        let (_temp, store) = store();
        let first = store.create(&Ledger::new("/work", "build"))?;
        let second = store.create(&Ledger::new("/work", "assemble"))?;

        assert_eq!(second.sequence(), first.sequence() + 1);
        assert_eq!(store.most_recent()?, Some(second.clone()));
        assert_eq!(store.read(&second)?.task, "assemble");
        Ok(())
    }

    #[test]
    fn most_recent_follows_sequence_not_nonce() -> Result<()> {
        let (_temp, store) = store();
        let older = LedgerId::new(1, "ffffffffffffffffffffffffffffffff");
        let newer = LedgerId::new(2, "00000000000000000000000000000000");
        store.write(&older, &Ledger::new("/work", "old"))?;
        store.write(&newer, &Ledger::new("/work", "new"))?;

        assert_eq!(store.most_recent()?, Some(newer));
        Ok(())
    }

    #[test]
    fn foreign_files_are_ignored() -> Result<()> {
        let (_temp, store) = store();
        let id = store.create(&Ledger::new("/work", "build"))?;
        for name in [
            "notes.txt",
            "latest_error_abc.json",
            "latest_error_99_x.json",
            "latest_error_00000000000000000099_x.json.tmp",
        ] {
            fs::write(store.dir().join(name), "{}").expect("write foreign file");
        }

        assert_eq!(store.most_recent()?, Some(id));
        Ok(())
    }

    #[test]
    fn write_replaces_existing_ledger() -> Result<()> {
        let (_temp, store) = store();
        let id = store.create(&Ledger::new("/work", "build"))?;

        store.write(&id, &Ledger::new("/work", "rebuilt"))?;

        assert_eq!(store.read(&id)?.task, "rebuilt");
        assert_eq!(store.most_recent()?, Some(id));
        Ok(())
    }

    #[test]
    fn malformed_ledger_is_reported() -> Result<()> {
        let (_temp, store) = store();
        let id = store.create(&Ledger::new("/work", "build"))?;
        fs::write(store.path_of(&id), "not json").expect("corrupt ledger");

        let err = store.read(&id).expect_err("malformed");
        assert!(matches!(err, Error::LedgerFormat { .. }));
        Ok(())
    }

    #[test]
    fn file_names_round_trip_and_reject_non_canonical() {
        let id = LedgerId::new(7, "abc123");
        assert_eq!(id.to_string(), "latest_error_00000000000000000007_abc123");
        assert_eq!(LedgerId::from_file_name(&id.file_name()), Some(id));
        assert_eq!(LedgerId::from_file_name("latest_error_7_abc123.json"), None);
        assert_eq!(
            LedgerId::from_file_name("latest_error_00000000000000000007_a-b.json"),
            None
        );
    }
}
