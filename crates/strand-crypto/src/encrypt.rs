//! X25519 + AES-256-GCM hybrid encryption.
//!
//! The sender generates an ephemeral X25519 keypair, derives a shared secret
//! against the recipient's static public key, and uses the 32-byte secret
//! directly as the AES-256-GCM key. Each payload gets a fresh 96-bit nonce.

use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, KeyInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey};

use crate::error::CryptoError;
use crate::keys::{decode_public_hex, EncryptionKeypair};

/// Hybrid ciphertext envelope: AES-256-GCM ciphertext and nonce in base64,
/// the sender's ephemeral X25519 public key in hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    pub data: String,
    pub nonce: String,
    pub ephemeral_public_key: String,
}

/// Encrypt the canonical JSON of `value` to `recipient_public_hex`.
pub fn encrypt(value: &Value, recipient_public_hex: &str) -> Result<EncryptedPayload, CryptoError> {
    let recipient = X25519PublicKey::from(decode_public_hex(recipient_public_hex)?);

    let ephemeral = EphemeralSecret::random_from_rng(rand::rngs::OsRng);
    let ephemeral_public = X25519PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&recipient);

    let cipher = Aes256Gcm::new_from_slice(shared.as_bytes())
        .map_err(|_| CryptoError::InvalidKey("bad AES key length".into()))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let plaintext =
        serde_json::to_vec(value).map_err(|e| CryptoError::Serialization(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_ref())
        .map_err(|_| CryptoError::InvalidCiphertext("AES-GCM encryption failed".into()))?;

    Ok(EncryptedPayload {
        data: BASE64.encode(ciphertext),
        nonce: BASE64.encode(nonce),
        ephemeral_public_key: hex::encode(ephemeral_public.to_bytes()),
    })
}

/// Decrypt an [`EncryptedPayload`] with the recipient's X25519 private key.
///
/// Any bit flipped in the ciphertext, nonce or ephemeral key makes the GCM
/// tag check fail, surfacing as `InvalidCiphertext`.
pub fn decrypt(
    payload: &EncryptedPayload,
    recipient: &EncryptionKeypair,
) -> Result<Value, CryptoError> {
    let ephemeral_public = X25519PublicKey::from(decode_public_hex(&payload.ephemeral_public_key)?);
    let shared = recipient.secret().diffie_hellman(&ephemeral_public);

    let cipher = Aes256Gcm::new_from_slice(shared.as_bytes())
        .map_err(|_| CryptoError::InvalidKey("bad AES key length".into()))?;

    let nonce_bytes = BASE64
        .decode(&payload.nonce)
        .map_err(|_| CryptoError::InvalidCiphertext("nonce is not valid base64".into()))?;
    if nonce_bytes.len() != 12 {
        return Err(CryptoError::InvalidCiphertext("nonce must be 12 bytes".into()));
    }

    let ciphertext = BASE64
        .decode(&payload.data)
        .map_err(|_| CryptoError::InvalidCiphertext("ciphertext is not valid base64".into()))?;

    let plaintext = cipher
        .decrypt(aes_gcm::Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| {
            CryptoError::InvalidCiphertext("decryption failed (wrong key or tampered data)".into())
        })?;

    serde_json::from_slice(&plaintext).map_err(|e| CryptoError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let recipient = EncryptionKeypair::generate();
        let value = json!({"secret": "records", "n": 7, "list": [1, 2, 3]});

        let payload = encrypt(&value, recipient.public_hex()).unwrap();
        assert_eq!(payload.ephemeral_public_key.len(), 64);
        assert_eq!(BASE64.decode(&payload.nonce).unwrap().len(), 12);

        let out = decrypt(&payload, &recipient).unwrap();
        assert_eq!(out, value);
    }

    #[test]
    fn fresh_ephemeral_and_nonce_per_call() {
        let recipient = EncryptionKeypair::generate();
        let value = json!("same plaintext");
        let a = encrypt(&value, recipient.public_hex()).unwrap();
        let b = encrypt(&value, recipient.public_hex()).unwrap();
        assert_ne!(a.ephemeral_public_key, b.ephemeral_public_key);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn wrong_recipient_cannot_decrypt() {
        let recipient = EncryptionKeypair::generate();
        let eavesdropper = EncryptionKeypair::generate();
        let payload = encrypt(&json!("for your eyes only"), recipient.public_hex()).unwrap();
        assert!(decrypt(&payload, &eavesdropper).is_err());
    }

    #[test]
    fn any_mutation_breaks_decryption() {
        let recipient = EncryptionKeypair::generate();
        let payload = encrypt(&json!({"v": 1}), recipient.public_hex()).unwrap();

        let mut data_flip = payload.clone();
        let mut ct = BASE64.decode(&data_flip.data).unwrap();
        ct[0] ^= 0x01;
        data_flip.data = BASE64.encode(ct);
        assert!(decrypt(&data_flip, &recipient).is_err());

        let mut nonce_flip = payload.clone();
        let mut nb = BASE64.decode(&nonce_flip.nonce).unwrap();
        nb[0] ^= 0x01;
        nonce_flip.nonce = BASE64.encode(nb);
        assert!(decrypt(&nonce_flip, &recipient).is_err());

        let mut epk_flip = payload.clone();
        let mut ek = hex::decode(&epk_flip.ephemeral_public_key).unwrap();
        ek[0] ^= 0x01;
        epk_flip.ephemeral_public_key = hex::encode(ek);
        assert!(decrypt(&epk_flip, &recipient).is_err());

        let mut truncated = payload;
        truncated.data.truncate(truncated.data.len() / 2);
        assert!(decrypt(&truncated, &recipient).is_err());
    }

    #[test]
    fn malformed_recipient_key_is_fatal() {
        assert!(encrypt(&json!(1), "nothex").is_err());
        assert!(encrypt(&json!(1), &"ab".repeat(16)).is_err());
    }
}
