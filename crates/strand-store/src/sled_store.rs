use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};

use strand_core::{Record, StrandError};

use crate::store::RecordStore;

/// Durable single-node record store backed by sled (pure-Rust, no C deps).
///
/// One tree, keyed by the canonical URI bytes, holding JSON-encoded records.
pub struct SledStore {
    db: sled::Db,
    records: sled::Tree,
}

fn storage_err(e: impl std::fmt::Display) -> StrandError {
    StrandError::Storage(e.to_string())
}

impl SledStore {
    /// Open or create the record database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StrandError> {
        let db = sled::open(path).map_err(storage_err)?;
        let records = db.open_tree("records").map_err(storage_err)?;
        Ok(Self { db, records })
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), StrandError> {
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SledStore {
    async fn get(&self, uri: &str) -> Result<Option<Record>, StrandError> {
        match self.records.get(uri.as_bytes()).map_err(storage_err)? {
            Some(bytes) => {
                let rec = serde_json::from_slice(&bytes)
                    .map_err(|e| StrandError::Serialization(e.to_string()))?;
                Ok(Some(rec))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, uri: &str, record: &Record) -> Result<(), StrandError> {
        let bytes =
            serde_json::to_vec(record).map_err(|e| StrandError::Serialization(e.to_string()))?;
        self.records.insert(uri.as_bytes(), bytes).map_err(storage_err)?;
        Ok(())
    }

    async fn remove(&self, uri: &str) -> Result<bool, StrandError> {
        Ok(self.records.remove(uri.as_bytes()).map_err(storage_err)?.is_some())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<(String, i64)>, StrandError> {
        let mut out = Vec::new();
        for item in self.records.scan_prefix(prefix.as_bytes()) {
            let (key, bytes) = item.map_err(storage_err)?;
            let uri = String::from_utf8(key.to_vec())
                .map_err(|_| StrandError::Storage("non-utf8 key in record tree".into()))?;
            let rec: Record = serde_json::from_slice(&bytes)
                .map_err(|e| StrandError::Serialization(e.to_string()))?;
            out.push((uri, rec.ts));
        }
        Ok(out)
    }

    async fn ping(&self) -> Result<Value, StrandError> {
        Ok(json!({ "records": self.records.len() }))
    }

    async fn clear(&self) -> Result<(), StrandError> {
        self.records.clear().map_err(storage_err)?;
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store(tag: &str) -> (SledStore, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("strand_sled_{tag}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        (SledStore::open(&dir).unwrap(), dir)
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let (store, dir) = temp_store("reopen");
        let rec = Record { ts: 7, data: json!({"kept": true}) };
        store.put("mutable://open/persisted", &rec).await.unwrap();
        store.flush().unwrap();
        drop(store);

        let store = SledStore::open(&dir).unwrap();
        assert_eq!(store.get("mutable://open/persisted").await.unwrap(), Some(rec));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn prefix_scan_matches_memory_semantics() {
        let (store, dir) = temp_store("scan");
        for (uri, ts) in [("a://b/1", 1), ("a://b/2", 2), ("a://c/3", 3)] {
            store.put(uri, &Record { ts, data: json!(null) }).await.unwrap();
        }
        let keys = store.keys_with_prefix("a://b/").await.unwrap();
        assert_eq!(keys, vec![("a://b/1".to_string(), 1), ("a://b/2".to_string(), 2)]);

        std::fs::remove_dir_all(&dir).ok();
    }
}
