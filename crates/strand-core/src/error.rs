use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StrandError {
    // ── Transaction errors ───────────────────────────────────────────────────
    #[error("invalid uri: {0}")]
    InvalidUri(String),

    #[error("unknown program: {0}")]
    UnknownProgram(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("record already exists at {0}")]
    AlreadyExists(String),

    // ── Crypto errors ────────────────────────────────────────────────────────
    #[error("invalid signature")]
    SignatureInvalid,

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    // ── Auth errors ──────────────────────────────────────────────────────────
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("origin not allowed: {0}")]
    OriginNotAllowed(String),

    // ── Backend errors ───────────────────────────────────────────────────────
    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("request timed out")]
    RequestTimeout,

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    // ── Boot-time configuration ──────────────────────────────────────────────
    #[error("configuration error: {0}")]
    Config(String),
}

/// Canonical HTTP status for a taxonomy code. Lives here as a bare u16 (this
/// crate carries no HTTP types) so every transport maps identically, whether
/// it holds a live error or a code string from a remote envelope.
pub fn http_status_for_code(code: &str) -> u16 {
    match code {
        "InvalidURI" | "UnknownProgram" | "ValidationFailed" | "AlreadyExists"
        | "SignatureInvalid" | "DecryptionFailed" | "SerializationError" => 400,
        "Unauthorized" => 401,
        "OriginNotAllowed" => 403,
        "NotFound" => 404,
        _ => 500,
    }
}

impl StrandError {
    /// Canonical HTTP status for this error.
    pub fn http_status_code(&self) -> u16 {
        http_status_for_code(self.code())
    }

    /// Short machine-readable code, stable across message changes. Used by the
    /// HTTP layer for status mapping and by clients for branching.
    pub fn code(&self) -> &'static str {
        match self {
            StrandError::InvalidUri(_) => "InvalidURI",
            StrandError::UnknownProgram(_) => "UnknownProgram",
            StrandError::ValidationFailed(_) => "ValidationFailed",
            StrandError::AlreadyExists(_) => "AlreadyExists",
            StrandError::SignatureInvalid => "SignatureInvalid",
            StrandError::DecryptionFailed(_) => "DecryptionFailed",
            StrandError::Unauthorized(_) => "Unauthorized",
            StrandError::OriginNotAllowed(_) => "OriginNotAllowed",
            StrandError::NotFound(_) => "NotFound",
            StrandError::BackendUnavailable(_) => "BackendUnavailable",
            StrandError::RequestTimeout => "RequestTimeout",
            StrandError::Serialization(_) => "SerializationError",
            StrandError::Storage(_) => "StorageError",
            StrandError::Config(_) => "ConfigError",
        }
    }
}
