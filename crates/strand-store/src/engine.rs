//! The transaction pipeline (receive → validate → materialise → persist).
//!
//! `DataNode` composes one immutable schema registry with one record store
//! and implements the full [`Backend`] contract over it. `receive` is the
//! only mutating entry point; everything else passes through to the store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, warn};

use strand_core::{
    codec, DeleteResult, HealthResult, HealthStatus, ListEntry, ListEntryKind, ListOptions,
    ListResult, Pagination, ReadMultiEntry, ReadMultiResult, ReadResult, ReceiveResult, Record,
    StrandError, Transaction, Uri, READ_MULTI_MAX,
};
use strand_schema::{RecordReader, Schema};

use crate::backend::Backend;
use crate::store::RecordStore;

pub struct DataNode<S: RecordStore> {
    schema: Arc<Schema>,
    store: S,
}

/// Read adapter handed to validators: decodes stored values so cross-URI
/// checks see the same shape `read` returns.
struct StoreReader<'a, S: RecordStore> {
    store: &'a S,
}

#[async_trait]
impl<'a, S: RecordStore> RecordReader for StoreReader<'a, S> {
    async fn read_record(&self, uri: &str) -> Result<Option<Record>, StrandError> {
        match self.store.get(uri).await? {
            Some(rec) => Ok(Some(Record { ts: rec.ts, data: codec::decode_from_json(&rec.data)? })),
            None => Ok(None),
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl<S: RecordStore> DataNode<S> {
    pub fn new(schema: Arc<Schema>, store: S) -> Self {
        Self { schema, store }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The normative receive algorithm. Returns the persisted outer record.
    ///
    /// Compound outputs are received sequentially in declaration order and
    /// abort on the first failure. Earlier outputs stay persisted; there is
    /// no rollback.
    fn receive_record<'a>(
        &'a self,
        tx: &'a Transaction,
    ) -> BoxFuture<'a, Result<Record, StrandError>> {
        Box::pin(async move {
            // 1. URI must parse.
            let uri = Uri::parse(&tx.uri)?;
            let canonical = uri.canonical();

            // 2. The program key must be registered.
            let program = uri.program_key();
            let validator = self
                .schema
                .validator(&program)
                .ok_or_else(|| StrandError::UnknownProgram(program.clone()))?;

            // 3. The program's validator must accept the value.
            let reader = StoreReader { store: &self.store };
            let outcome = validator.validate(&uri, &tx.value, &reader).await;
            if !outcome.valid {
                return Err(outcome
                    .error
                    .unwrap_or_else(|| StrandError::ValidationFailed("rejected by validator".into())));
            }

            // Compound structure must be well-formed before any effect.
            let outputs = tx.outputs()?;

            // 4–5. Materialise and atomically upsert.
            let encoded = codec::encode_for_json(&tx.value)?;
            let record = Record { ts: now_millis(), data: encoded };
            self.store.put(&canonical, &record).await?;
            debug!(uri = %canonical, program = %program, "record persisted");

            // 6. Fan out compound outputs, aborting on the first failure.
            if let Some(outputs) = outputs {
                for output in outputs {
                    self.receive_record(&output).await.map_err(|e| {
                        warn!(uri = %canonical, output = %output.uri, error = %e,
                              "compound output rejected; earlier outputs are kept");
                        e
                    })?;
                }
            }

            Ok(record)
        })
    }

    async fn read_decoded(&self, uri: &str) -> Result<Option<Record>, StrandError> {
        match self.store.get(uri).await? {
            Some(rec) => Ok(Some(Record { ts: rec.ts, data: codec::decode_from_json(&rec.data)? })),
            None => Ok(None),
        }
    }
}

/// Classify and aggregate stored URIs under a directory prefix.
///
/// A stored URI is a *file* entry when it sits directly under the prefix (or
/// equals it); deeper URIs surface as their first-level *directory*, carrying
/// the newest timestamp among their children.
fn collect_entries(
    prefix: &str,
    keys: Vec<(String, i64)>,
) -> BTreeMap<String, (ListEntryKind, i64)> {
    let dir_prefix = format!("{}/", prefix.trim_end_matches('/'));
    let mut entries: BTreeMap<String, (ListEntryKind, i64)> = BTreeMap::new();

    for (uri, ts) in keys {
        if uri == prefix {
            entries.insert(uri, (ListEntryKind::File, ts));
            continue;
        }
        let Some(rest) = uri.strip_prefix(&dir_prefix) else {
            // Coarse store-level prefix match ("…/a" matching "…/ab").
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        match rest.split_once('/') {
            None => {
                entries.insert(uri, (ListEntryKind::File, ts));
            }
            Some((child, _)) => {
                let dir_uri = format!("{dir_prefix}{child}");
                entries
                    .entry(dir_uri)
                    .and_modify(|(_, newest)| *newest = (*newest).max(ts))
                    .or_insert((ListEntryKind::Directory, ts));
            }
        }
    }
    entries
}

#[async_trait]
impl<S: RecordStore> Backend for DataNode<S> {
    async fn receive(&self, tx: Transaction) -> ReceiveResult {
        match self.receive_record(&tx).await {
            Ok(record) => ReceiveResult::accepted(record),
            Err(e) => {
                debug!(uri = %tx.uri, error = %e, "receive rejected");
                ReceiveResult::rejected(&e)
            }
        }
    }

    async fn read(&self, uri: &str) -> ReadResult {
        match self.read_decoded(uri).await {
            Ok(Some(record)) => ReadResult::found(record),
            Ok(None) => ReadResult::failed(&StrandError::NotFound(uri.to_string())),
            Err(e) => ReadResult::failed(&e),
        }
    }

    async fn read_multi(&self, uris: &[String]) -> ReadMultiResult {
        if uris.len() > READ_MULTI_MAX {
            let err = StrandError::ValidationFailed(format!(
                "readMulti is bounded to {READ_MULTI_MAX} URIs, got {}",
                uris.len()
            ));
            return ReadMultiResult { success: false, results: Vec::new(), error: Some(err.to_string()) };
        }
        let fetched = match self.store.get_many(uris).await {
            Ok(fetched) => fetched,
            Err(e) => {
                return ReadMultiResult {
                    success: false,
                    results: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        };
        let mut results = Vec::with_capacity(fetched.len());
        for (uri, rec) in fetched {
            let result = match rec {
                Some(rec) => match codec::decode_from_json(&rec.data) {
                    Ok(data) => ReadResult::found(Record { ts: rec.ts, data }),
                    Err(e) => ReadResult::failed(&e),
                },
                None => ReadResult::failed(&StrandError::NotFound(uri.clone())),
            };
            results.push(ReadMultiEntry { uri, result });
        }
        let success = results.iter().all(|r| r.result.success);
        ReadMultiResult { success, results, error: None }
    }

    async fn list(&self, prefix: &str, opts: ListOptions) -> ListResult {
        let keys = match self.store.keys_with_prefix(prefix).await {
            Ok(keys) => keys,
            Err(e) => return ListResult::failed(&e, &opts),
        };

        let mut entries: Vec<(String, ListEntryKind, i64)> = collect_entries(prefix, keys)
            .into_iter()
            .map(|(uri, (kind, ts))| (uri, kind, ts))
            .collect();

        // Pattern filtering happens before sorting and pagination; `total`
        // reflects the post-filter count.
        if let Some(pattern) = &opts.pattern {
            entries.retain(|(uri, _, _)| uri.contains(pattern.as_str()));
        }

        match opts.sort_by {
            strand_core::SortBy::Name => entries.sort_by(|a, b| a.0.cmp(&b.0)),
            strand_core::SortBy::Timestamp => {
                entries.sort_by(|a, b| a.2.cmp(&b.2).then_with(|| a.0.cmp(&b.0)))
            }
        }
        if opts.sort_order == strand_core::SortOrder::Desc {
            entries.reverse();
        }

        let total = entries.len();
        let page = opts.page.max(1);
        let total_pages = if opts.limit == 0 { 0 } else { total.div_ceil(opts.limit) };
        let data: Vec<ListEntry> = entries
            .into_iter()
            .skip((page - 1).saturating_mul(opts.limit))
            .take(opts.limit)
            .map(|(uri, kind, _)| ListEntry { uri, kind })
            .collect();

        ListResult {
            success: true,
            data,
            pagination: Pagination { page, limit: opts.limit, total, total_pages },
            error: None,
            code: None,
        }
    }

    async fn delete(&self, uri: &str) -> DeleteResult {
        match self.store.remove(uri).await {
            Ok(true) => DeleteResult::ok(),
            Ok(false) => DeleteResult::failed(&StrandError::NotFound(uri.to_string())),
            Err(e) => DeleteResult::failed(&e),
        }
    }

    async fn health(&self) -> HealthResult {
        match self.store.ping().await {
            Ok(details) => HealthResult {
                status: HealthStatus::Ok,
                message: None,
                details: Some(json!({ "backend": self.store.kind(), "store": details })),
            },
            Err(e) => HealthResult {
                status: HealthStatus::Unavailable,
                message: Some(e.to_string()),
                details: Some(json!({ "backend": self.store.kind() })),
            },
        }
    }

    async fn program_keys(&self) -> Vec<String> {
        self.schema.program_keys()
    }

    async fn cleanup(&self) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "cleanup failed");
        }
    }
}
