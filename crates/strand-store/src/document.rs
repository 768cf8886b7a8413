//! Document-store record store, specified against a collection hook.
//!
//! Mirrors [`crate::sql`]: the concrete driver (e.g. a MongoDB collection)
//! stays outside and plugs in through [`DocumentCollection`]. Documents carry
//! the shape `{"uri": ..., "ts": ..., "data": ...}`.

use async_trait::async_trait;
use serde_json::{json, Value};

use strand_core::{Record, StrandError};

use crate::store::RecordStore;

/// Driver hook exposed by a concrete document-store integration.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Fetch the document whose `uri` field equals `uri`.
    async fn find_one(&self, uri: &str) -> Result<Option<Value>, StrandError>;

    /// Insert or replace the document whose `uri` field equals `uri`.
    async fn upsert(&self, uri: &str, document: Value) -> Result<(), StrandError>;

    /// Delete the document at `uri`. Returns whether one existed.
    async fn delete_one(&self, uri: &str) -> Result<bool, StrandError>;

    /// All documents whose `uri` field starts with `prefix`.
    async fn find_prefix(&self, prefix: &str) -> Result<Vec<Value>, StrandError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<(), StrandError>;

    /// Remove every document.
    async fn drop_all(&self) -> Result<(), StrandError>;
}

pub struct DocumentStore<C: DocumentCollection> {
    collection: C,
}

impl<C: DocumentCollection> DocumentStore<C> {
    pub fn new(collection: C) -> Self {
        Self { collection }
    }
}

fn doc_to_record(doc: &Value) -> Result<Record, StrandError> {
    let data = doc
        .get("data")
        .cloned()
        .ok_or_else(|| StrandError::Storage("document missing data field".into()))?;
    let ts = doc
        .get("ts")
        .and_then(Value::as_i64)
        .ok_or_else(|| StrandError::Storage("document missing ts field".into()))?;
    Ok(Record { ts, data })
}

#[async_trait]
impl<C: DocumentCollection> RecordStore for DocumentStore<C> {
    async fn get(&self, uri: &str) -> Result<Option<Record>, StrandError> {
        self.collection.find_one(uri).await?.as_ref().map(doc_to_record).transpose()
    }

    async fn put(&self, uri: &str, record: &Record) -> Result<(), StrandError> {
        let doc = json!({ "uri": uri, "ts": record.ts, "data": record.data });
        self.collection.upsert(uri, doc).await
    }

    async fn remove(&self, uri: &str) -> Result<bool, StrandError> {
        self.collection.delete_one(uri).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<(String, i64)>, StrandError> {
        let docs = self.collection.find_prefix(prefix).await?;
        docs.iter()
            .map(|doc| {
                let uri = doc
                    .get("uri")
                    .and_then(Value::as_str)
                    .ok_or_else(|| StrandError::Storage("document missing uri field".into()))?
                    .to_string();
                let ts = doc
                    .get("ts")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| StrandError::Storage("document missing ts field".into()))?;
                Ok((uri, ts))
            })
            .collect()
    }

    async fn ping(&self) -> Result<Value, StrandError> {
        self.collection.ping().await?;
        Ok(json!({}))
    }

    async fn clear(&self) -> Result<(), StrandError> {
        self.collection.drop_all().await
    }

    fn kind(&self) -> &'static str {
        "document"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeCollection {
        docs: Mutex<BTreeMap<String, Value>>,
    }

    #[async_trait]
    impl DocumentCollection for FakeCollection {
        async fn find_one(&self, uri: &str) -> Result<Option<Value>, StrandError> {
            Ok(self.docs.lock().unwrap().get(uri).cloned())
        }

        async fn upsert(&self, uri: &str, document: Value) -> Result<(), StrandError> {
            self.docs.lock().unwrap().insert(uri.to_string(), document);
            Ok(())
        }

        async fn delete_one(&self, uri: &str) -> Result<bool, StrandError> {
            Ok(self.docs.lock().unwrap().remove(uri).is_some())
        }

        async fn find_prefix(&self, prefix: &str) -> Result<Vec<Value>, StrandError> {
            Ok(self
                .docs
                .lock()
                .unwrap()
                .iter()
                .filter(|(uri, _)| uri.starts_with(prefix))
                .map(|(_, doc)| doc.clone())
                .collect())
        }

        async fn ping(&self) -> Result<(), StrandError> {
            Ok(())
        }

        async fn drop_all(&self) -> Result<(), StrandError> {
            self.docs.lock().unwrap().clear();
            Ok(())
        }
    }

    #[tokio::test]
    async fn document_round_trip() {
        let store = DocumentStore::new(FakeCollection::default());
        let rec = Record { ts: 5, data: json!({"doc": true}) };

        store.put("m://a/x", &rec).await.unwrap();
        assert_eq!(store.get("m://a/x").await.unwrap(), Some(rec));

        assert_eq!(store.keys_with_prefix("m://a/").await.unwrap(), vec![("m://a/x".to_string(), 5)]);
        assert!(store.remove("m://a/x").await.unwrap());
        assert_eq!(store.get("m://a/x").await.unwrap(), None);
    }
}
