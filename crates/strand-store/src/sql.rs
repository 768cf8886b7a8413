//! SQL-table record store, specified against a driver hook.
//!
//! Concrete database drivers stay outside this crate; they plug in through
//! [`SqlExecutor`], a two-method hook (execute / query) over positional
//! `$n` parameters. The store keeps the wide-table shape: one row per URI
//! with the JSON-encoded record and its timestamp.

use async_trait::async_trait;
use serde_json::{json, Value};

use strand_core::{Record, StrandError};

use crate::store::RecordStore;

/// Driver hook exposed by a concrete SQL integration (e.g. a Postgres pool).
/// Parameters bind positionally to `$1..$n`; rows come back as JSON objects
/// keyed by column name.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute a statement, returning the number of affected rows.
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, StrandError>;

    /// Execute a query, returning its rows.
    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Value>, StrandError>;
}

/// Record store over a single wide table:
/// `(uri PRIMARY KEY, data JSONB, timestamp BIGINT, updated_at TIMESTAMP)`.
pub struct SqlStore<E: SqlExecutor> {
    executor: E,
    table: String,
}

impl<E: SqlExecutor> SqlStore<E> {
    /// `table_prefix` namespaces the table (`{prefix}records`), letting
    /// several stores share one database.
    pub fn new(executor: E, table_prefix: &str) -> Self {
        Self { executor, table: format!("{table_prefix}records") }
    }

    /// Create the backing table if it does not exist yet.
    pub async fn ensure_table(&self) -> Result<(), StrandError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {t} (
                uri TEXT PRIMARY KEY,
                data JSONB NOT NULL,
                timestamp BIGINT NOT NULL,
                updated_at TIMESTAMP NOT NULL DEFAULT NOW()
            )",
            t = self.table
        );
        self.executor.execute(&ddl, Vec::new()).await?;
        Ok(())
    }
}

fn row_to_record(row: &Value) -> Result<Record, StrandError> {
    let data = row
        .get("data")
        .cloned()
        .ok_or_else(|| StrandError::Storage("row missing data column".into()))?;
    let ts = row
        .get("timestamp")
        .and_then(Value::as_i64)
        .ok_or_else(|| StrandError::Storage("row missing timestamp column".into()))?;
    Ok(Record { ts, data })
}

#[async_trait]
impl<E: SqlExecutor> RecordStore for SqlStore<E> {
    async fn get(&self, uri: &str) -> Result<Option<Record>, StrandError> {
        let sql = format!("SELECT data, timestamp FROM {} WHERE uri = $1", self.table);
        let rows = self.executor.query(&sql, vec![json!(uri)]).await?;
        rows.first().map(row_to_record).transpose()
    }

    async fn put(&self, uri: &str, record: &Record) -> Result<(), StrandError> {
        let sql = format!(
            "INSERT INTO {t} (uri, data, timestamp, updated_at) VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (uri) DO UPDATE SET data = EXCLUDED.data, \
             timestamp = EXCLUDED.timestamp, updated_at = NOW()",
            t = self.table
        );
        self.executor
            .execute(&sql, vec![json!(uri), record.data.clone(), json!(record.ts)])
            .await?;
        Ok(())
    }

    async fn get_many(
        &self,
        uris: &[String],
    ) -> Result<Vec<(String, Option<Record>)>, StrandError> {
        let sql = format!(
            "SELECT uri, data, timestamp FROM {} WHERE uri = ANY($1)",
            self.table
        );
        let rows = self.executor.query(&sql, vec![json!(uris)]).await?;

        let mut found = std::collections::HashMap::with_capacity(rows.len());
        for row in &rows {
            let uri = row
                .get("uri")
                .and_then(Value::as_str)
                .ok_or_else(|| StrandError::Storage("row missing uri column".into()))?;
            found.insert(uri.to_string(), row_to_record(row)?);
        }
        Ok(uris.iter().map(|uri| (uri.clone(), found.remove(uri))).collect())
    }

    async fn remove(&self, uri: &str) -> Result<bool, StrandError> {
        let sql = format!("DELETE FROM {} WHERE uri = $1", self.table);
        Ok(self.executor.execute(&sql, vec![json!(uri)]).await? > 0)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<(String, i64)>, StrandError> {
        // The listing filter set is not pushed down; only the prefix narrows
        // the projection.
        let sql = format!("SELECT uri, timestamp FROM {} WHERE uri LIKE $1 || '%'", self.table);
        let rows = self.executor.query(&sql, vec![json!(prefix)]).await?;
        rows.iter()
            .map(|row| {
                let uri = row
                    .get("uri")
                    .and_then(Value::as_str)
                    .ok_or_else(|| StrandError::Storage("row missing uri column".into()))?
                    .to_string();
                let ts = row
                    .get("timestamp")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| StrandError::Storage("row missing timestamp column".into()))?;
                Ok((uri, ts))
            })
            .collect()
    }

    async fn ping(&self) -> Result<Value, StrandError> {
        self.executor.query("SELECT 1 AS ok", Vec::new()).await?;
        Ok(json!({ "table": self.table }))
    }

    async fn clear(&self) -> Result<(), StrandError> {
        let sql = format!("DELETE FROM {}", self.table);
        self.executor.execute(&sql, Vec::new()).await?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "sql"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Minimal executor double: stores rows in a map and answers exactly the
    /// statement shapes `SqlStore` emits.
    #[derive(Default)]
    struct FakeExecutor {
        rows: Mutex<BTreeMap<String, (Value, i64)>>,
    }

    #[async_trait]
    impl SqlExecutor for FakeExecutor {
        async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, StrandError> {
            let mut rows = self.rows.lock().unwrap();
            if sql.starts_with("CREATE TABLE") {
                return Ok(0);
            }
            if sql.starts_with("INSERT INTO") {
                let uri = params[0].as_str().unwrap().to_string();
                let ts = params[2].as_i64().unwrap();
                rows.insert(uri, (params[1].clone(), ts));
                return Ok(1);
            }
            if sql.contains("WHERE uri = $1") && sql.starts_with("DELETE") {
                let uri = params[0].as_str().unwrap();
                return Ok(u64::from(rows.remove(uri).is_some()));
            }
            if sql.starts_with("DELETE FROM") {
                rows.clear();
                return Ok(0);
            }
            Err(StrandError::Storage(format!("unexpected statement: {sql}")))
        }

        async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Value>, StrandError> {
            let rows = self.rows.lock().unwrap();
            if sql.starts_with("SELECT 1") {
                return Ok(vec![json!({"ok": 1})]);
            }
            if sql.starts_with("SELECT data") {
                let uri = params[0].as_str().unwrap();
                return Ok(rows
                    .get(uri)
                    .map(|(data, ts)| json!({"data": data, "timestamp": ts}))
                    .into_iter()
                    .collect());
            }
            if sql.contains("ANY($1)") {
                let uris: Vec<String> =
                    serde_json::from_value(params[0].clone()).unwrap();
                return Ok(uris
                    .iter()
                    .filter_map(|uri| {
                        rows.get(uri).map(|(data, ts)| {
                            json!({"uri": uri, "data": data, "timestamp": ts})
                        })
                    })
                    .collect());
            }
            if sql.starts_with("SELECT uri") {
                let prefix = params[0].as_str().unwrap();
                return Ok(rows
                    .iter()
                    .filter(|(uri, _)| uri.starts_with(prefix))
                    .map(|(uri, (_, ts))| json!({"uri": uri, "timestamp": ts}))
                    .collect());
            }
            Err(StrandError::Storage(format!("unexpected query: {sql}")))
        }
    }

    #[tokio::test]
    async fn upsert_read_delete_through_the_hook() {
        let store = SqlStore::new(FakeExecutor::default(), "strand_");
        store.ensure_table().await.unwrap();

        let rec = Record { ts: 10, data: json!({"v": 1}) };
        store.put("mutable://open/x", &rec).await.unwrap();
        assert_eq!(store.get("mutable://open/x").await.unwrap(), Some(rec));

        // Upsert replaces in place.
        let newer = Record { ts: 20, data: json!({"v": 2}) };
        store.put("mutable://open/x", &newer).await.unwrap();
        assert_eq!(store.get("mutable://open/x").await.unwrap(), Some(newer));

        assert!(store.remove("mutable://open/x").await.unwrap());
        assert!(!store.remove("mutable://open/x").await.unwrap());
        assert_eq!(store.get("mutable://open/x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn batched_fetch_preserves_order_and_misses() {
        let store = SqlStore::new(FakeExecutor::default(), "strand_");
        for (uri, ts) in [("m://a/1", 1), ("m://a/2", 2)] {
            store.put(uri, &Record { ts, data: json!(ts) }).await.unwrap();
        }

        let uris = vec!["m://a/2".to_string(), "m://a/missing".to_string(), "m://a/1".to_string()];
        let fetched = store.get_many(&uris).await.unwrap();
        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched[0].0, "m://a/2");
        assert_eq!(fetched[0].1.as_ref().unwrap().ts, 2);
        assert!(fetched[1].1.is_none());
        assert_eq!(fetched[2].1.as_ref().unwrap().ts, 1);
    }

    #[tokio::test]
    async fn prefix_projection() {
        let store = SqlStore::new(FakeExecutor::default(), "strand_");
        for (uri, ts) in [("m://a/1", 1), ("m://a/2", 2), ("m://b/3", 3)] {
            store.put(uri, &Record { ts, data: json!(null) }).await.unwrap();
        }
        let keys = store.keys_with_prefix("m://a/").await.unwrap();
        assert_eq!(keys, vec![("m://a/1".to_string(), 1), ("m://a/2".to_string(), 2)]);

        store.clear().await.unwrap();
        assert!(store.keys_with_prefix("m://").await.unwrap().is_empty());
    }
}
