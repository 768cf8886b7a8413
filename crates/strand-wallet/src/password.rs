//! PBKDF2-SHA256 password hashing with per-user random salt.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use strand_core::StrandError;

pub const PBKDF2_ITERATIONS: u32 = 100_000;
pub const PBKDF2_ALGO: &str = "PBKDF2-SHA256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// The durable password record stored per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordRecord {
    pub hash: String,
    pub salt: String,
    pub iterations: u32,
    pub algo: String,
}

/// Hash a password under a fresh random salt.
pub fn hash_password(password: &str) -> PasswordRecord {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut hash);

    PasswordRecord {
        hash: hex::encode(hash),
        salt: hex::encode(salt),
        iterations: PBKDF2_ITERATIONS,
        algo: PBKDF2_ALGO.to_string(),
    }
}

/// Check a password against a stored record in constant time.
pub fn verify_password(password: &str, record: &PasswordRecord) -> Result<bool, StrandError> {
    if record.algo != PBKDF2_ALGO {
        return Err(StrandError::Config(format!("unsupported password algo: {}", record.algo)));
    }
    let salt = hex::decode(&record.salt)
        .map_err(|_| StrandError::Serialization("password salt is not valid hex".into()))?;
    let stored = hex::decode(&record.hash)
        .map_err(|_| StrandError::Serialization("password hash is not valid hex".into()))?;

    let mut computed = vec![0u8; stored.len().max(1)];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, record.iterations, &mut computed);
    Ok(computed.ct_eq(&stored).into())
}
