use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use strand_core::{Record, StrandError};

use crate::store::RecordStore;

/// In-memory record store: one URI-keyed map behind a single mutex.
///
/// The lock is never held across an await point: every operation completes
/// synchronously under the lock, which keeps concurrent calls safe without
/// any further coordination.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Record>>, StrandError> {
        self.records
            .lock()
            .map_err(|_| StrandError::Storage("record map lock poisoned".into()))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, uri: &str) -> Result<Option<Record>, StrandError> {
        Ok(self.lock()?.get(uri).cloned())
    }

    async fn put(&self, uri: &str, record: &Record) -> Result<(), StrandError> {
        self.lock()?.insert(uri.to_string(), record.clone());
        Ok(())
    }

    async fn remove(&self, uri: &str) -> Result<bool, StrandError> {
        Ok(self.lock()?.remove(uri).is_some())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<(String, i64)>, StrandError> {
        let map = self.lock()?;
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(uri, _)| uri.starts_with(prefix))
            .map(|(uri, rec)| (uri.clone(), rec.ts))
            .collect())
    }

    async fn ping(&self) -> Result<Value, StrandError> {
        Ok(json!({ "records": self.lock()?.len() }))
    }

    async fn clear(&self) -> Result<(), StrandError> {
        self.lock()?.clear();
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
