use std::sync::Arc;

use strand_core::{ListOptions, ListResult, ReadResult};

use crate::backend::Backend;

/// Read-only facade over a backend: the contract record viewers consume.
/// Mutating operations are simply not on the surface.
#[derive(Clone)]
pub struct ExplorerBridge {
    backend: Arc<dyn Backend>,
}

impl ExplorerBridge {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub async fn read(&self, uri: &str) -> ReadResult {
        self.backend.read(uri).await
    }

    pub async fn list(&self, prefix: &str, opts: ListOptions) -> ListResult {
        self.backend.list(prefix, opts).await
    }
}
