use async_trait::async_trait;

use strand_core::{
    DeleteResult, HealthResult, ListOptions, ListResult, ReadMultiResult, ReadResult,
    ReceiveResult, Transaction,
};

/// The storage backend interface (C5). All operations are total: failures are
/// reported inside the result envelope, never as panics, and the contract is
/// identical for every variant: local pipeline, remote client or
/// composition.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Validate and persist one transaction (and, recursively, its compound
    /// outputs). The sole state-changing entry point.
    async fn receive(&self, tx: Transaction) -> ReceiveResult;

    /// Read the record at `uri`.
    async fn read(&self, uri: &str) -> ReadResult;

    /// Read up to [`strand_core::READ_MULTI_MAX`] records in one call.
    async fn read_multi(&self, uris: &[String]) -> ReadMultiResult;

    /// List records and sub-directories under a URI prefix.
    async fn list(&self, prefix: &str, opts: ListOptions) -> ListResult;

    /// Delete the record at `uri`.
    async fn delete(&self, uri: &str) -> DeleteResult;

    /// Backend liveness and diagnostics.
    async fn health(&self) -> HealthResult;

    /// Program keys this backend accepts writes for.
    async fn program_keys(&self) -> Vec<String>;

    /// Drop all stored records. Test and teardown hook.
    async fn cleanup(&self);
}
