//! Persisted target records
//!
//! One small JSON file per target, shared by every invocation on the
//! machine. Reads and writes are not locked.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::common::{paths, Error, Result};

/// A running target as last recorded by `start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRecord {
    pub pid: u32,
    pub port: u16,
    pub base_url: String,
}

/// Directory of `<target>.json` records and `<target>.log` server logs
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, target: &str) -> PathBuf {
        self.dir.join(format!("{}.json", paths::sanitize(target)))
    }

    pub fn log_path(&self, target: &str) -> PathBuf {
        self.dir.join(format!("{}.log", paths::sanitize(target)))
    }

    /// The stored record; unreadable or corrupt files count as absent
    pub fn read(&self, target: &str) -> Option<TargetRecord> {
        let path = self.record_path(target);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read target record");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt target record");
                None
            }
        }
    }

    pub fn write(&self, target: &str, record: &TargetRecord) -> Result<()> {
        paths::ensure_dir(&self.dir)?;
        let path = self.record_path(target);
        let content = serde_json::to_string_pretty(record)?;
        std::fs::write(&path, content).map_err(|e| {
            Error::Internal(format!(
                "Failed to write target record '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Delete the record; a missing record is fine
    pub fn remove(&self, target: &str) -> Result<()> {
        match std::fs::remove_file(self.record_path(target)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("servers"));
        let record = TargetRecord {
            pid: 4242,
            port: 8081,
            base_url: "http://127.0.0.1:8081".into(),
        };
        store.write("shop", &record).unwrap();

        let raw = std::fs::read_to_string(store.record_path("shop")).unwrap();
        assert!(raw.contains("\"baseUrl\""));
        assert_eq!(store.read("shop"), Some(record));

        store.remove("shop").unwrap();
        assert_eq!(store.read("shop"), None);
        store.remove("shop").unwrap();
    }

    #[test]
    fn test_corrupt_record_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        std::fs::write(store.record_path("shop"), "{not json").unwrap();
        assert_eq!(store.read("shop"), None);
    }

    #[test]
    fn test_names_are_sanitized() {
        let store = RecordStore::new("/tmp/servers");
        assert_eq!(
            store.record_path("my shop/v2"),
            PathBuf::from("/tmp/servers/my_shop_v2.json")
        );
    }
}
