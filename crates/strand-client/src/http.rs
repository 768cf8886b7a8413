//! HTTP client for a remote node, implementing the same [`Backend`] contract
//! as a local pipeline so callers cannot tell the difference.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use strand_core::{
    DeleteResult, HealthResult, HealthStatus, ListOptions, ListResult, ReadMultiEntry,
    ReadMultiResult, ReadResult, ReceiveResult, Record, SortBy, SortOrder, StrandError,
    Transaction, Uri, READ_MULTI_MAX,
};
use strand_store::Backend;

pub struct HttpClient {
    base: String,
    client: reqwest::Client,
}

fn unavailable(e: impl std::fmt::Display) -> StrandError {
    StrandError::BackendUnavailable(e.to_string())
}

impl HttpClient {
    /// `base_url` is the node root, e.g. `http://127.0.0.1:4000`.
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Route path for a URI-addressed operation:
    /// `{base}/api/v1/{op}/{protocol}/{domain}/{path...}`.
    fn route(&self, op: &str, uri: &str) -> Result<String, StrandError> {
        let parsed = Uri::parse(uri)?;
        let mut route = format!("{}/api/v1/{op}/{}/{}", self.base, parsed.protocol, parsed.domain);
        if !parsed.path.is_empty() {
            route.push('/');
            route.push_str(&parsed.path.join("/"));
        }
        Ok(route)
    }
}

#[async_trait]
impl Backend for HttpClient {
    async fn receive(&self, tx: Transaction) -> ReceiveResult {
        let url = format!("{}/api/v1/receive", self.base);
        let resp = match self.client.post(&url).json(&json!({ "tx": tx })).send().await {
            Ok(resp) => resp,
            Err(e) => return ReceiveResult::rejected(&unavailable(e)),
        };
        match resp.json::<ReceiveResult>().await {
            Ok(result) => result,
            Err(e) => ReceiveResult::rejected(&unavailable(e)),
        }
    }

    async fn read(&self, uri: &str) -> ReadResult {
        let url = match self.route("read", uri) {
            Ok(url) => url,
            Err(e) => return ReadResult::failed(&e),
        };
        let resp = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => return ReadResult::failed(&unavailable(e)),
        };
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return ReadResult::failed(&StrandError::NotFound(uri.to_string()));
        }
        if !resp.status().is_success() {
            return ReadResult::failed(&unavailable(format!("read returned {}", resp.status())));
        }
        match resp.json::<Record>().await {
            Ok(record) => ReadResult::found(record),
            Err(e) => ReadResult::failed(&unavailable(e)),
        }
    }

    async fn read_multi(&self, uris: &[String]) -> ReadMultiResult {
        // No dedicated HTTP route; the client iterates its own bounded reads.
        if uris.len() > READ_MULTI_MAX {
            let err = StrandError::ValidationFailed(format!(
                "readMulti is bounded to {READ_MULTI_MAX} URIs, got {}",
                uris.len()
            ));
            return ReadMultiResult { success: false, results: Vec::new(), error: Some(err.to_string()) };
        }
        let mut results = Vec::with_capacity(uris.len());
        for uri in uris {
            results.push(ReadMultiEntry { uri: uri.clone(), result: self.read(uri).await });
        }
        let success = results.iter().all(|r| r.result.success);
        ReadMultiResult { success, results, error: None }
    }

    async fn list(&self, prefix: &str, opts: ListOptions) -> ListResult {
        let url = match self.route("list", prefix) {
            Ok(url) => url,
            Err(e) => return ListResult::failed(&e, &opts),
        };
        let sort_by = match opts.sort_by {
            SortBy::Name => "name",
            SortBy::Timestamp => "timestamp",
        };
        let sort_order = match opts.sort_order {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        };
        let mut req = self.client.get(&url).query(&[
            ("page", opts.page.to_string()),
            ("limit", opts.limit.to_string()),
            ("sortBy", sort_by.to_string()),
            ("sortOrder", sort_order.to_string()),
        ]);
        if let Some(pattern) = &opts.pattern {
            req = req.query(&[("pattern", pattern)]);
        }
        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => return ListResult::failed(&unavailable(e), &opts),
        };
        match resp.json::<ListResult>().await {
            Ok(result) => result,
            Err(e) => ListResult::failed(&unavailable(e), &opts),
        }
    }

    async fn delete(&self, uri: &str) -> DeleteResult {
        let url = match self.route("delete", uri) {
            Ok(url) => url,
            Err(e) => return DeleteResult::failed(&e),
        };
        let resp = match self.client.delete(&url).send().await {
            Ok(resp) => resp,
            Err(e) => return DeleteResult::failed(&unavailable(e)),
        };
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return DeleteResult::failed(&StrandError::NotFound(uri.to_string()));
        }
        match resp.json::<DeleteResult>().await {
            Ok(result) => result,
            Err(e) => DeleteResult::failed(&unavailable(e)),
        }
    }

    async fn health(&self) -> HealthResult {
        let url = format!("{}/api/v1/health", self.base);
        let resp = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                return HealthResult {
                    status: HealthStatus::Unavailable,
                    message: Some(e.to_string()),
                    details: None,
                }
            }
        };
        match resp.json::<HealthResult>().await {
            Ok(result) => result,
            Err(e) => HealthResult {
                status: HealthStatus::Unavailable,
                message: Some(e.to_string()),
                details: None,
            },
        }
    }

    async fn program_keys(&self) -> Vec<String> {
        let url = format!("{}/api/v1/schema", self.base);
        let Ok(resp) = self.client.get(&url).send().await else {
            return Vec::new();
        };
        #[derive(serde::Deserialize)]
        struct SchemaBody {
            schema: Vec<String>,
        }
        resp.json::<SchemaBody>().await.map(|b| b.schema).unwrap_or_default()
    }

    async fn cleanup(&self) {
        // Cleanup is not on the remote HTTP surface; a remote node owns its
        // own data lifecycle.
        debug!(base = %self.base, "cleanup ignored on HTTP client");
    }
}
