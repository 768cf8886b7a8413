use std::env;

use strand_core::StrandError;
use strand_crypto::{EncryptionKeypair, SigningKeypair};

/// Boot-time app-backend configuration.
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_node_url: String,
    pub identity: SigningKeypair,
    pub encryption: EncryptionKeypair,
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, StrandError> {
        let port: u16 = require_env("APP_PORT")?
            .parse()
            .map_err(|_| StrandError::Config("APP_PORT must be a valid port number".into()))?;

        let identity = SigningKeypair::from_pem_checked(
            &require_pem("SERVER_IDENTITY_PRIVATE_KEY_PEM")?,
            &require_public_hex("SERVER_IDENTITY_PUBLIC_KEY_HEX")?,
        )
        .map_err(|e| StrandError::Config(format!("server identity key: {e}")))?;

        let encryption = EncryptionKeypair::from_pem_checked(
            &require_pem("SERVER_ENCRYPTION_PRIVATE_KEY_PEM")?,
            &require_public_hex("SERVER_ENCRYPTION_PUBLIC_KEY_HEX")?,
        )
        .map_err(|e| StrandError::Config(format!("server encryption key: {e}")))?;

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            data_node_url: require_env("DATA_NODE_URL")?,
            identity,
            encryption,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }
}

fn require_env(name: &str) -> Result<String, StrandError> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(StrandError::Config(format!("missing required env var: {name}"))),
    }
}

fn require_pem(name: &str) -> Result<String, StrandError> {
    let pem = require_env(name)?;
    if !pem.contains("BEGIN") || !pem.contains("END") {
        return Err(StrandError::Config(format!("{name} must be a PEM with BEGIN/END markers")));
    }
    Ok(pem)
}

fn require_public_hex(name: &str) -> Result<String, StrandError> {
    let hex_str = require_env(name)?;
    if hex_str.len() != 64 || !hex_str.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(StrandError::Config(format!(
            "{name} must be exactly 64 hex characters (32 bytes)"
        )));
    }
    Ok(hex_str.to_lowercase())
}
