//! Program-key validator registry.
//!
//! A schema maps program keys (`protocol://domain`) to validators. The
//! registry is built once at boot and never mutated afterwards; writes to a
//! program key with no validator are rejected upstream with `UnknownProgram`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use strand_core::{Record, StrandError, Uri};

use crate::programs::{AccountBound, AlwaysValid, BlobOpen, ImmutableOpen, LinkAccounts, LinkOpen};

/// Read handle handed to validators for cross-URI checks (e.g. immutability).
/// An explicit context object rather than a back-pointer into the node.
#[async_trait]
pub trait RecordReader: Send + Sync {
    async fn read_record(&self, uri: &str) -> Result<Option<Record>, StrandError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<StrandError>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { valid: true, error: None }
    }

    /// Generic validation failure with the validator's own message.
    pub fn fail(error: impl Into<String>) -> Self {
        Self::fail_with(StrandError::ValidationFailed(error.into()))
    }

    /// Failure with a specific taxonomy entry (`AlreadyExists`,
    /// `SignatureInvalid`, ...).
    pub fn fail_with(error: StrandError) -> Self {
        Self { valid: false, error: Some(error) }
    }
}

#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(
        &self,
        uri: &Uri,
        value: &Value,
        read: &dyn RecordReader,
    ) -> ValidationResult;
}

/// Immutable program-key → validator mapping.
pub struct Schema {
    programs: BTreeMap<String, Arc<dyn Validator>>,
}

impl Schema {
    /// An empty registry. Every receive against it fails with
    /// `UnknownProgram`.
    pub fn empty() -> Self {
        Self { programs: BTreeMap::new() }
    }

    /// The built-in programs.
    pub fn builtin() -> Self {
        Self::empty()
            .with_program("mutable://open", Arc::new(AlwaysValid))
            .with_program("mutable://inbox", Arc::new(AlwaysValid))
            .with_program("immutable://inbox", Arc::new(AlwaysValid))
            .with_program("mutable://accounts", Arc::new(AccountBound::mutable()))
            .with_program("immutable://open", Arc::new(ImmutableOpen))
            .with_program("immutable://accounts", Arc::new(AccountBound::immutable()))
            .with_program("blob://open", Arc::new(BlobOpen))
            .with_program("link://accounts", Arc::new(LinkAccounts))
            .with_program("link://open", Arc::new(LinkOpen))
    }

    pub fn with_program(mut self, key: impl Into<String>, validator: Arc<dyn Validator>) -> Self {
        self.programs.insert(key.into(), validator);
        self
    }

    /// Resolve the validator for a program key.
    pub fn validator(&self, program_key: &str) -> Option<Arc<dyn Validator>> {
        self.programs.get(program_key).cloned()
    }

    /// Registered program keys, sorted.
    pub fn program_keys(&self) -> Vec<String> {
        self.programs.keys().cloned().collect()
    }

    /// Load a schema definition file and merge it over the built-ins.
    ///
    /// The file is a JSON object mapping program keys to built-in validator
    /// kinds: `open`, `immutable`, `accounts`, `immutable-accounts`, `blob`,
    /// `link`, `link-accounts`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StrandError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StrandError::Config(format!("reading schema file {}: {e}", path.display()))
        })?;
        let entries: BTreeMap<String, String> = serde_json::from_str(&raw).map_err(|e| {
            StrandError::Config(format!("parsing schema file {}: {e}", path.display()))
        })?;

        let mut schema = Self::builtin();
        for (key, kind) in entries {
            Uri::parse(&key)
                .map_err(|_| StrandError::Config(format!("invalid program key in schema file: {key}")))?;
            let validator: Arc<dyn Validator> = match kind.as_str() {
                "open" => Arc::new(AlwaysValid),
                "immutable" => Arc::new(ImmutableOpen),
                "accounts" => Arc::new(AccountBound::mutable()),
                "immutable-accounts" => Arc::new(AccountBound::immutable()),
                "blob" => Arc::new(BlobOpen),
                "link" => Arc::new(LinkOpen),
                "link-accounts" => Arc::new(LinkAccounts),
                other => {
                    return Err(StrandError::Config(format!(
                        "unknown validator kind '{other}' for program {key}"
                    )))
                }
            };
            schema.programs.insert(key, validator);
        }
        Ok(schema)
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("programs", &self.program_keys())
            .finish()
    }
}
