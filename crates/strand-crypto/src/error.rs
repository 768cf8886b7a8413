use thiserror::Error;

use strand_core::StrandError;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid signature encoding")]
    InvalidSignature,

    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    #[error("PEM error: {0}")]
    Pem(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<CryptoError> for StrandError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidSignature => StrandError::SignatureInvalid,
            CryptoError::InvalidCiphertext(m) => StrandError::DecryptionFailed(m),
            CryptoError::InvalidKey(m) => StrandError::ValidationFailed(format!("invalid key: {m}")),
            CryptoError::Pem(m) => StrandError::Config(m),
            CryptoError::Serialization(m) => StrandError::Serialization(m),
        }
    }
}
