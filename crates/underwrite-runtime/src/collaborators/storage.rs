//! Persistence for extracted check sets.
//!
//! [`JsonFileStore`] keeps one JSON file per saved policy under
//! `<root>/policies/` plus an `index.json` listing them. Every write goes
//! through a temp file in the same directory and an atomic rename.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use underwrite_core::Check;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid policy id: {0}")]
    InvalidId(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub id: String,
    pub name: String,
    pub saved_at: DateTime<Utc>,
    pub check_count: usize,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

pub trait CheckStore: Send + Sync {
    /// Persist `checks` under a new id derived from `name`.
    fn save(
        &self,
        name: &str,
        checks: &[Check],
        metadata: BTreeMap<String, String>,
    ) -> Result<PolicyRecord, StorageError>;

    fn load(&self, id: &str) -> Result<Option<Vec<Check>>, StorageError>;

    /// Saved policies, newest first.
    fn list(&self) -> Result<Vec<PolicyRecord>, StorageError>;

    /// Returns whether anything was removed.
    fn delete(&self, id: &str) -> Result<bool, StorageError>;
}

#[derive(Serialize, Deserialize)]
struct StoredPolicy {
    record: PolicyRecord,
    checks: Vec<Check>,
}

#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    index_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(root.join("policies"))?;
        Ok(Self {
            root,
            index_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    fn policy_path(&self, id: &str) -> Result<PathBuf, StorageError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(StorageError::InvalidId(id.to_string()));
        }
        Ok(self.root.join("policies").join(format!("{id}.json")))
    }

    fn read_index(&self) -> Result<Vec<PolicyRecord>, StorageError> {
        match std::fs::read(self.index_path()) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_index(&self, records: &[PolicyRecord]) -> Result<(), StorageError> {
        write_atomic(&self.root, &self.index_path(), &serde_json::to_vec_pretty(records)?)
    }

    fn new_id(&self, name: &str, now: DateTime<Utc>) -> Result<String, StorageError> {
        let base = format!("{}_{}", sanitize(name), now.format("%Y%m%d%H%M%S"));
        let mut id = base.clone();
        let mut n = 2;
        while self.policy_path(&id)?.exists() {
            id = format!("{base}_{n}");
            n += 1;
        }
        Ok(id)
    }
}

impl CheckStore for JsonFileStore {
    fn save(
        &self,
        name: &str,
        checks: &[Check],
        metadata: BTreeMap<String, String>,
    ) -> Result<PolicyRecord, StorageError> {
        let _guard = self.index_lock.lock();
        let saved_at = Utc::now();
        let id = self.new_id(name, saved_at)?;
        let record = PolicyRecord {
            id: id.clone(),
            name: name.to_string(),
            saved_at,
            check_count: checks.len(),
            metadata,
        };

        let stored = StoredPolicy {
            record: record.clone(),
            checks: checks.to_vec(),
        };
        let path = self.policy_path(&id)?;
        write_atomic(
            &self.root.join("policies"),
            &path,
            &serde_json::to_vec_pretty(&stored)?,
        )?;

        let mut index = self.read_index()?;
        index.push(record.clone());
        self.write_index(&index)?;

        tracing::info!(policy_id = %id, checks = checks.len(), "Saved policy checks");
        Ok(record)
    }

    fn load(&self, id: &str) -> Result<Option<Vec<Check>>, StorageError> {
        let path = match self.policy_path(id) {
            Ok(path) => path,
            Err(_) => return Ok(None),
        };
        match std::fs::read(&path) {
            Ok(bytes) => {
                let stored: StoredPolicy = serde_json::from_slice(&bytes)?;
                Ok(Some(stored.checks))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<PolicyRecord>, StorageError> {
        let mut records = self.read_index()?;
        records.sort_by(|a, b| b.saved_at.cmp(&a.saved_at).then_with(|| b.id.cmp(&a.id)));
        Ok(records)
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let path = match self.policy_path(id) {
            Ok(path) => path,
            Err(_) => return Ok(false),
        };
        let _guard = self.index_lock.lock();

        let removed_file = match std::fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        let mut index = self.read_index()?;
        let before = index.len();
        index.retain(|r| r.id != id);
        let removed_entry = index.len() != before;
        if removed_entry {
            self.write_index(&index)?;
        }

        Ok(removed_file || removed_entry)
    }
}

fn write_atomic(dir: &Path, path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "policy".to_string()
    } else {
        cleaned.to_string()
    }
}
