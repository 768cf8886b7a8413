use std::env;
use std::path::PathBuf;

use strand_core::StrandError;

/// Which record store backs this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Sled { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreKind,
    /// Optional schema definition file merged over the built-in programs.
    pub schema_module: Option<PathBuf>,
    /// CORS origins; `*` allows everything.
    pub allowed_origins: Vec<String>,
}

impl NodeConfig {
    pub fn from_env() -> Result<Self, StrandError> {
        let port: u16 = require_env("PORT")?
            .parse()
            .map_err(|_| StrandError::Config("PORT must be a valid port number".into()))?;

        let store = match env::var("STORE_BACKEND").unwrap_or_else(|_| "memory".into()).as_str() {
            "memory" => StoreKind::Memory,
            "sled" => StoreKind::Sled { path: PathBuf::from(require_env("SLED_PATH")?) },
            other => {
                return Err(StrandError::Config(format!(
                    "STORE_BACKEND must be 'memory' or 'sled', got '{other}'"
                )))
            }
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            store,
            schema_module: env::var("SCHEMA_MODULE").ok().filter(|s| !s.is_empty()).map(PathBuf::from),
            allowed_origins: split_origins(env::var("ALLOWED_ORIGINS").unwrap_or_default()),
        })
    }
}

pub(crate) fn require_env(name: &str) -> Result<String, StrandError> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(StrandError::Config(format!("missing required env var: {name}"))),
    }
}

pub(crate) fn split_origins(raw: String) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
