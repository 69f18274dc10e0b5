//! Key-value persistence backends.
//!
//! The journal only ever needs two named blobs: the brew history and the
//! learning model.  Anything that can read and write a string per slot can
//! back it; three backends ship here.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Named storage slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    History,
    LearningModel,
}

impl Slot {
    pub fn key(self) -> &'static str {
        match self {
            Slot::History => "history",
            Slot::LearningModel => "learning-model",
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Abstraction over the durable blob store.
pub trait KvBackend: Send {
    /// `Ok(None)` if the slot has never been written.
    fn read(&self, slot: Slot) -> Result<Option<String>>;
    fn write(&mut self, slot: Slot, value: &str) -> Result<()>;
    /// Short label for logs.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

/// Non-durable backend; useful for tests and `--backend memory` dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    slots: HashMap<Slot, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a slot.
    pub fn with_slot(mut self, slot: Slot, value: impl Into<String>) -> Self {
        self.slots.insert(slot, value.into());
        self
    }
}

impl KvBackend for MemoryBackend {
    fn read(&self, slot: Slot) -> Result<Option<String>> {
        Ok(self.slots.get(&slot).cloned())
    }

    fn write(&mut self, slot: Slot, value: &str) -> Result<()> {
        self.slots.insert(slot, value.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// ---------------------------------------------------------------------------
// FileBackend
// ---------------------------------------------------------------------------

/// One JSON file per slot inside a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn slot_path(&self, slot: Slot) -> PathBuf {
        self.dir.join(format!("{}.json", slot.key()))
    }
}

impl KvBackend for FileBackend {
    fn read(&self, slot: Slot) -> Result<Option<String>> {
        let path = self.slot_path(slot);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn write(&mut self, slot: Slot, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.slot_path(slot);
        // Write-then-rename so a crash never leaves a half-written slot.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

// ---------------------------------------------------------------------------
// SqliteBackend
// ---------------------------------------------------------------------------

/// Single-table SQLite store: `kv(slot TEXT PRIMARY KEY, value TEXT)`.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                slot  TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )?;
        Ok(Self { conn })
    }
}

impl KvBackend for SqliteBackend {
    fn read(&self, slot: Slot) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE slot = ?1", params![slot.key()], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn write(&mut self, slot: Slot, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (slot, value) VALUES (?1, ?2)
             ON CONFLICT(slot) DO UPDATE SET value = excluded.value",
            params![slot.key(), value],
        )?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    File,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::File,
            data_dir: PathBuf::from(".brew-coach"),
        }
    }
}

/// File name of the SQLite database inside `data_dir`.
pub const SQLITE_FILE: &str = "brew-coach.db";

/// Suffix given to a database file that could not be opened.
pub const CORRUPT_SUFFIX: &str = "corrupt";

/// Build the backend described by `cfg`.
pub fn open_backend(cfg: &StorageConfig) -> Result<Box<dyn KvBackend>> {
    Ok(match cfg.backend {
        BackendKind::File => Box::new(FileBackend::new(&cfg.data_dir)),
        BackendKind::Sqlite => open_sqlite_or_recover(&cfg.data_dir.join(SQLITE_FILE)),
        BackendKind::Memory => Box::new(MemoryBackend::new()),
    })
}

/// Open the database at `path`.  An unopenable file is renamed to
/// `<path>.corrupt` and a fresh database created in its place; if even that
/// fails the session runs on an empty [`MemoryBackend`].
fn open_sqlite_or_recover(path: &Path) -> Box<dyn KvBackend> {
    let err = match SqliteBackend::open(path) {
        Ok(b) => return Box::new(b),
        Err(e) => e,
    };
    tracing::warn!(target: "brew_coach::journal", path = %path.display(), error = %err, "database unreadable; starting empty");

    if path.exists() {
        let mut aside = path.as_os_str().to_owned();
        aside.push(format!(".{}", CORRUPT_SUFFIX));
        let aside = PathBuf::from(aside);
        match fs::rename(path, &aside) {
            Ok(()) => match SqliteBackend::open(path) {
                Ok(b) => {
                    tracing::warn!(target: "brew_coach::journal", moved_to = %aside.display(), "unreadable database moved aside");
                    return Box::new(b);
                }
                Err(e) => {
                    tracing::warn!(target: "brew_coach::journal", error = %e, "could not recreate database");
                }
            },
            Err(e) => {
                tracing::warn!(target: "brew_coach::journal", error = %e, "could not move unreadable database aside");
            }
        }
    }

    tracing::warn!(target: "brew_coach::journal", "falling back to in-memory storage; nothing will be saved");
    Box::new(MemoryBackend::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_keys() {
        assert_eq!(Slot::History.key(), "history");
        assert_eq!(Slot::LearningModel.key(), "learning-model");
    }

    #[test]
    fn test_memory_backend_roundtrip() {
        let mut b = MemoryBackend::new();
        assert_eq!(b.read(Slot::History).unwrap(), None);
        b.write(Slot::History, "[]").unwrap();
        assert_eq!(b.read(Slot::History).unwrap().as_deref(), Some("[]"));
        assert_eq!(b.read(Slot::LearningModel).unwrap(), None);
    }

    #[test]
    fn test_file_backend_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = FileBackend::new(dir.path().join("nested"));
        assert_eq!(b.read(Slot::LearningModel).unwrap(), None);
        b.write(Slot::LearningModel, "{}").unwrap();
        assert!(b.slot_path(Slot::LearningModel).ends_with("learning-model.json"));
        assert_eq!(b.read(Slot::LearningModel).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_sqlite_backend_upsert() {
        let mut b = SqliteBackend::open_in_memory().unwrap();
        b.write(Slot::History, "[1]").unwrap();
        b.write(Slot::History, "[2]").unwrap();
        assert_eq!(b.read(Slot::History).unwrap().as_deref(), Some("[2]"));
        assert_eq!(b.read(Slot::LearningModel).unwrap(), None);
    }

    #[test]
    fn test_sqlite_backend_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");
        {
            let mut b = SqliteBackend::open(&path).unwrap();
            b.write(Slot::LearningModel, "{\"ek43\":{}}").unwrap();
        }
        let b = SqliteBackend::open(&path).unwrap();
        assert_eq!(b.read(Slot::LearningModel).unwrap().as_deref(), Some("{\"ek43\":{}}"));
    }

    #[test]
    fn test_open_backend_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        for kind in [BackendKind::File, BackendKind::Sqlite, BackendKind::Memory] {
            let cfg = StorageConfig { backend: kind, data_dir: dir.path().to_path_buf() };
            let b = open_backend(&cfg).unwrap();
            assert_eq!(
                b.name(),
                match kind {
                    BackendKind::File => "file",
                    BackendKind::Sqlite => "sqlite",
                    BackendKind::Memory => "memory",
                }
            );
        }
    }

    #[test]
    fn test_corrupt_database_moved_aside_and_recreated() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join(SQLITE_FILE);
        fs::write(&db, b"definitely not sqlite, just some bytes that go on for a while").unwrap();

        let cfg = StorageConfig { backend: BackendKind::Sqlite, data_dir: dir.path().to_path_buf() };
        let mut b = open_backend(&cfg).unwrap();
        assert_eq!(b.name(), "sqlite");
        assert_eq!(b.read(Slot::History).unwrap(), None);
        b.write(Slot::History, "[]").unwrap();
        assert!(dir.path().join("brew-coach.db.corrupt").exists());
    }

    #[test]
    fn test_unusable_data_dir_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "x").unwrap();

        let cfg = StorageConfig { backend: BackendKind::Sqlite, data_dir: blocker.join("data") };
        let b = open_backend(&cfg).unwrap();
        assert_eq!(b.name(), "memory");
    }
}
