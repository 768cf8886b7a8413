use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StrandError;

/// Default page size for `list` when the caller does not specify one.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Hard cap on the number of URIs a single `readMulti` call may carry.
pub const READ_MULTI_MAX: usize = 50;

/// A stored record: write-acceptance timestamp plus the JSON-encoded value.
///
/// `ts` is assigned at persistence time (milliseconds since epoch) and
/// reflects when the write was accepted, not any client-supplied time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub ts: i64,
    pub data: Value,
}

// ── Transaction ──────────────────────────────────────────────────────────────

/// The sole state-changing primitive: a `(uri, value)` pair, serialized on the
/// wire as a two-element array `[uri, value]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub uri: String,
    pub value: Value,
}

impl Transaction {
    pub fn new(uri: impl Into<String>, value: Value) -> Self {
        Self { uri: uri.into(), value }
    }

    /// Sub-transactions of a compound transaction, in declaration order.
    ///
    /// Returns `Ok(None)` when the value carries no `outputs` field, and
    /// `ValidationFailed` when `outputs` is present but not a list of
    /// `[uri, value]` pairs.
    pub fn outputs(&self) -> Result<Option<Vec<Transaction>>, StrandError> {
        let Some(outputs) = self.value.get("outputs") else {
            return Ok(None);
        };
        let Some(items) = outputs.as_array() else {
            return Err(StrandError::ValidationFailed(
                "outputs must be an array of [uri, value] pairs".into(),
            ));
        };
        let mut txs = Vec::with_capacity(items.len());
        for item in items {
            let tx: Transaction = serde_json::from_value(item.clone()).map_err(|_| {
                StrandError::ValidationFailed(
                    "outputs must be an array of [uri, value] pairs".into(),
                )
            })?;
            txs.push(tx);
        }
        Ok(Some(txs))
    }
}

impl Serialize for Transaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.uri)?;
        tup.serialize_element(&self.value)?;
        tup.end()
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TxVisitor;

        impl<'de> Visitor<'de> for TxVisitor {
            type Value = Transaction;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a [uri, value] pair")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Transaction, A::Error> {
                let uri: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let value: Value = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                if seq.next_element::<Value>()?.is_some() {
                    return Err(de::Error::invalid_length(3, &self));
                }
                Ok(Transaction { uri, value })
            }
        }

        deserializer.deserialize_seq(TxVisitor)
    }
}

// ── Operation envelopes ──────────────────────────────────────────────────────

/// Outcome of a `receive`. `record` carries the persisted outer record on
/// acceptance so callers do not need a follow-up read. `code` is the stable
/// taxonomy code of the rejection, used for HTTP status mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveResult {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Record>,
}

impl ReceiveResult {
    pub fn accepted(record: Record) -> Self {
        Self { accepted: true, error: None, code: None, record: Some(record) }
    }

    pub fn rejected(err: &StrandError) -> Self {
        Self {
            accepted: false,
            error: Some(err.to_string()),
            code: Some(err.code().to_string()),
            record: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ReadResult {
    pub fn found(record: Record) -> Self {
        Self { success: true, record: Some(record), error: None, code: None }
    }

    pub fn failed(err: &StrandError) -> Self {
        Self {
            success: false,
            record: None,
            error: Some(err.to_string()),
            code: Some(err.code().to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        !self.success && self.code.as_deref() == Some("NotFound")
    }
}

/// Per-URI entry inside a `readMulti` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadMultiEntry {
    pub uri: String,
    #[serde(flatten)]
    pub result: ReadResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadMultiResult {
    pub success: bool,
    pub results: Vec<ReadMultiEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ── Listing ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListEntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    pub uri: String,
    #[serde(rename = "type")]
    pub kind: ListEntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Name,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListOptions {
    pub page: usize,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIST_LIMIT,
            pattern: None,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
        }
    }
}

/// Pagination summary. `total` reflects the post-filter entry count, not the
/// page size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResult {
    pub success: bool,
    pub data: Vec<ListEntry>,
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ListResult {
    pub fn failed(err: &StrandError, opts: &ListOptions) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            pagination: Pagination {
                page: opts.page,
                limit: opts.limit,
                total: 0,
                total_pages: 0,
            },
            error: Some(err.to_string()),
            code: Some(err.code().to_string()),
        }
    }
}

// ── Delete / health ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl DeleteResult {
    pub fn ok() -> Self {
        Self { success: true, error: None, code: None }
    }

    pub fn failed(err: &StrandError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            code: Some(err.code().to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        !self.success && self.code.as_deref() == Some("NotFound")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResult {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl HealthResult {
    pub fn ok() -> Self {
        Self { status: HealthStatus::Ok, message: None, details: None }
    }
}
