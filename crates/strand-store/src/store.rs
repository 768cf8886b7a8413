use async_trait::async_trait;
use serde_json::Value;

use strand_core::{Record, StrandError};

/// Raw persistence hook beneath the transaction pipeline.
///
/// A `RecordStore` knows nothing about schemas, validation or compound
/// transactions; it is a keyed record map with prefix scanning. The
/// [`crate::DataNode`] engine layers the receive algorithm on top, so every
/// store variant shares one pipeline.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the record at `uri`, in its stored (JSON-encoded) form.
    async fn get(&self, uri: &str) -> Result<Option<Record>, StrandError>;

    /// Batched fetch, preserving input order. The default iterates [`Self::get`];
    /// stores with a native batch path override it.
    async fn get_many(
        &self,
        uris: &[String],
    ) -> Result<Vec<(String, Option<Record>)>, StrandError> {
        let mut out = Vec::with_capacity(uris.len());
        for uri in uris {
            out.push((uri.clone(), self.get(uri).await?));
        }
        Ok(out)
    }

    /// Atomically upsert the record at `uri`.
    async fn put(&self, uri: &str, record: &Record) -> Result<(), StrandError>;

    /// Remove the record at `uri`. Returns whether a record existed.
    async fn remove(&self, uri: &str) -> Result<bool, StrandError>;

    /// All stored URIs starting with `prefix` (plain string prefix), paired
    /// with their record timestamps. Directory semantics are applied by the
    /// caller.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<(String, i64)>, StrandError>;

    /// Liveness probe. Returns backend-specific diagnostics on success.
    async fn ping(&self) -> Result<Value, StrandError>;

    /// Drop every stored record.
    async fn clear(&self) -> Result<(), StrandError>;

    /// Short variant name for health reporting ("memory", "sled", ...).
    fn kind(&self) -> &'static str;
}
