//! Backend composition algebra.
//!
//! Both combinators implement [`Backend`] themselves, so compositions nest:
//! a broadcast of sequences, a sequence ending in a remote client, and so on.
//! There is no shared mutable state between composed backends.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;

use strand_core::{
    DeleteResult, HealthResult, HealthStatus, ListOptions, ListResult, ReadMultiResult,
    ReadResult, ReceiveResult, StrandError, Transaction,
};

use crate::backend::Backend;

fn no_backends() -> StrandError {
    StrandError::BackendUnavailable("no backends configured".into())
}

// ── Parallel broadcast ───────────────────────────────────────────────────────

/// Fans every `receive` out to all members concurrently and accepts iff all
/// of them accept. On failure the first member's error (in declaration order)
/// wins; the other fan-outs still complete but their results are discarded.
/// There is no rollback. Reads are served by the first member.
pub struct ParallelBroadcast {
    backends: Vec<Arc<dyn Backend>>,
}

impl ParallelBroadcast {
    pub fn new(backends: Vec<Arc<dyn Backend>>) -> Self {
        Self { backends }
    }
}

#[async_trait]
impl Backend for ParallelBroadcast {
    async fn receive(&self, tx: Transaction) -> ReceiveResult {
        if self.backends.is_empty() {
            return ReceiveResult::rejected(&no_backends());
        }
        let results =
            join_all(self.backends.iter().map(|b| b.receive(tx.clone()))).await;
        match results.iter().find(|r| !r.accepted) {
            Some(first_failure) => first_failure.clone(),
            None => results.into_iter().next().expect("at least one backend"),
        }
    }

    async fn read(&self, uri: &str) -> ReadResult {
        match self.backends.first() {
            Some(b) => b.read(uri).await,
            None => ReadResult::failed(&no_backends()),
        }
    }

    async fn read_multi(&self, uris: &[String]) -> ReadMultiResult {
        match self.backends.first() {
            Some(b) => b.read_multi(uris).await,
            None => ReadMultiResult {
                success: false,
                results: Vec::new(),
                error: Some(no_backends().to_string()),
            },
        }
    }

    async fn list(&self, prefix: &str, opts: ListOptions) -> ListResult {
        match self.backends.first() {
            Some(b) => b.list(prefix, opts).await,
            None => ListResult::failed(&no_backends(), &opts),
        }
    }

    async fn delete(&self, uri: &str) -> DeleteResult {
        if self.backends.is_empty() {
            return DeleteResult::failed(&no_backends());
        }
        // Mirrors receive: every member must drop the record.
        let results = join_all(self.backends.iter().map(|b| b.delete(uri))).await;
        match results.iter().find(|r| !r.success) {
            Some(first_failure) => first_failure.clone(),
            None => DeleteResult::ok(),
        }
    }

    async fn health(&self) -> HealthResult {
        if self.backends.is_empty() {
            return HealthResult {
                status: HealthStatus::Unavailable,
                message: Some(no_backends().to_string()),
                details: None,
            };
        }
        let members = join_all(self.backends.iter().map(|b| b.health())).await;
        let healthy = members.iter().filter(|h| h.status == HealthStatus::Ok).count();
        let status = if healthy == members.len() {
            HealthStatus::Ok
        } else if healthy == 0 {
            HealthStatus::Unavailable
        } else {
            HealthStatus::Degraded
        };
        HealthResult {
            status,
            message: None,
            details: Some(json!({
                "composition": "parallelBroadcast",
                "members": members.len(),
                "healthy": healthy,
            })),
        }
    }

    async fn program_keys(&self) -> Vec<String> {
        match self.backends.first() {
            Some(b) => b.program_keys().await,
            None => Vec::new(),
        }
    }

    async fn cleanup(&self) {
        join_all(self.backends.iter().map(|b| b.cleanup())).await;
    }
}

// ── First-match sequence ─────────────────────────────────────────────────────

/// Tries members in order and returns the first success; when every member
/// fails, only the last member's error is surfaced. A `receive` accepted by
/// one member never reaches the members after it.
pub struct FirstMatchSequence {
    backends: Vec<Arc<dyn Backend>>,
}

impl FirstMatchSequence {
    pub fn new(backends: Vec<Arc<dyn Backend>>) -> Self {
        Self { backends }
    }
}

#[async_trait]
impl Backend for FirstMatchSequence {
    async fn receive(&self, tx: Transaction) -> ReceiveResult {
        let mut last = ReceiveResult::rejected(&no_backends());
        for backend in &self.backends {
            last = backend.receive(tx.clone()).await;
            if last.accepted {
                return last;
            }
        }
        last
    }

    async fn read(&self, uri: &str) -> ReadResult {
        let mut last = ReadResult::failed(&no_backends());
        for backend in &self.backends {
            last = backend.read(uri).await;
            if last.success {
                return last;
            }
        }
        last
    }

    async fn read_multi(&self, uris: &[String]) -> ReadMultiResult {
        let mut last = ReadMultiResult {
            success: false,
            results: Vec::new(),
            error: Some(no_backends().to_string()),
        };
        for backend in &self.backends {
            last = backend.read_multi(uris).await;
            if last.success {
                return last;
            }
        }
        last
    }

    async fn list(&self, prefix: &str, opts: ListOptions) -> ListResult {
        let mut last = ListResult::failed(&no_backends(), &opts);
        for backend in &self.backends {
            last = backend.list(prefix, opts.clone()).await;
            if last.success {
                return last;
            }
        }
        last
    }

    async fn delete(&self, uri: &str) -> DeleteResult {
        let mut last = DeleteResult::failed(&no_backends());
        for backend in &self.backends {
            last = backend.delete(uri).await;
            if last.success {
                return last;
            }
        }
        last
    }

    async fn health(&self) -> HealthResult {
        let mut last = HealthResult {
            status: HealthStatus::Unavailable,
            message: Some(no_backends().to_string()),
            details: None,
        };
        for backend in &self.backends {
            last = backend.health().await;
            if last.status == HealthStatus::Ok {
                return last;
            }
        }
        last
    }

    async fn program_keys(&self) -> Vec<String> {
        match self.backends.first() {
            Some(b) => b.program_keys().await,
            None => Vec::new(),
        }
    }

    async fn cleanup(&self) {
        join_all(self.backends.iter().map(|b| b.cleanup())).await;
    }
}
