use std::env;

use strand_core::StrandError;
use strand_crypto::{EncryptionKeypair, SigningKeypair};

pub const DEFAULT_JWT_EXPIRATION_SECONDS: i64 = 86_400;
pub const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 3_600;
const JWT_SECRET_MIN_LEN: usize = 32;

/// Boot-time wallet configuration. Server keys and the JWT secret are read
/// once here and stay immutable for the process lifetime.
pub struct WalletConfig {
    pub host: String,
    pub port: u16,
    pub credential_node_url: String,
    pub proxy_node_url: String,
    pub identity: SigningKeypair,
    pub encryption: EncryptionKeypair,
    pub jwt_secret: String,
    pub jwt_expiration_seconds: i64,
    pub reset_token_ttl_seconds: i64,
    pub allowed_origins: Vec<String>,
}

impl WalletConfig {
    pub fn from_env() -> Result<Self, StrandError> {
        let port: u16 = require_env("PORT")?
            .parse()
            .map_err(|_| StrandError::Config("PORT must be a valid port number".into()))?;

        let identity = load_signing_key(
            "SERVER_IDENTITY_PRIVATE_KEY_PEM",
            "SERVER_IDENTITY_PUBLIC_KEY_HEX",
        )?;
        let encryption = load_encryption_key(
            "SERVER_ENCRYPTION_PRIVATE_KEY_PEM",
            "SERVER_ENCRYPTION_PUBLIC_KEY_HEX",
        )?;

        let jwt_secret = require_env("JWT_SECRET")?;
        if jwt_secret.len() < JWT_SECRET_MIN_LEN {
            return Err(StrandError::Config(format!(
                "JWT_SECRET must be at least {JWT_SECRET_MIN_LEN} bytes"
            )));
        }

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            credential_node_url: require_env("CREDENTIAL_NODE_URL")?,
            proxy_node_url: require_env("PROXY_NODE_URL")?,
            identity,
            encryption,
            jwt_secret,
            jwt_expiration_seconds: parse_env_or("JWT_EXPIRATION_SECONDS", DEFAULT_JWT_EXPIRATION_SECONDS)?,
            reset_token_ttl_seconds: parse_env_or(
                "PASSWORD_RESET_TOKEN_TTL_SECONDS",
                DEFAULT_RESET_TOKEN_TTL_SECONDS,
            )?,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }
}

fn load_signing_key(pem_var: &str, hex_var: &str) -> Result<SigningKeypair, StrandError> {
    let pem = require_pem(pem_var)?;
    let expected_hex = require_public_hex(hex_var)?;
    SigningKeypair::from_pem_checked(&pem, &expected_hex)
        .map_err(|e| StrandError::Config(format!("{pem_var}/{hex_var}: {e}")))
}

fn load_encryption_key(pem_var: &str, hex_var: &str) -> Result<EncryptionKeypair, StrandError> {
    let pem = require_pem(pem_var)?;
    let expected_hex = require_public_hex(hex_var)?;
    EncryptionKeypair::from_pem_checked(&pem, &expected_hex)
        .map_err(|e| StrandError::Config(format!("{pem_var}/{hex_var}: {e}")))
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

fn require_env(name: &str) -> Result<String, StrandError> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(StrandError::Config(format!("missing required env var: {name}"))),
    }
}

fn parse_env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, StrandError> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => v
            .parse()
            .map_err(|_| StrandError::Config(format!("could not parse env var {name}"))),
        _ => Ok(default),
    }
}
