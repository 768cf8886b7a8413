//! Composite message formats flowing through the transaction pipeline.
//!
//! An `AuthenticatedMessage` carries one signature per signer over the
//! canonical JSON of its payload. A `SignedEncryptedMessage` signs the
//! encrypted payload object itself (field order `data`, `nonce`,
//! `ephemeralPublicKey`), so custody of signatures never requires custody of
//! plaintext.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::encrypt::{decrypt, encrypt, EncryptedPayload};
use crate::error::CryptoError;
use crate::keys::{EncryptionKeypair, SigningKeypair};
use crate::sign::{sign_value, verify_value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEntry {
    pub pubkey: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedMessage {
    pub auth: Vec<AuthEntry>,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEncryptedMessage {
    pub auth: Vec<AuthEntry>,
    pub payload: EncryptedPayload,
}

/// Decryption outcome: the plaintext plus signature verdicts. `verified` is
/// true iff every auth entry verified; callers decide whether partial
/// verification is acceptable.
#[derive(Debug, Clone)]
pub struct VerifiedPlaintext {
    pub value: Value,
    pub verified: bool,
    pub verified_signers: Vec<String>,
}

fn verified_signers_over(auth: &[AuthEntry], signed: &Value) -> Vec<String> {
    auth.iter()
        .filter(|entry| {
            verify_value(&entry.pubkey, &entry.signature, signed).unwrap_or(false)
        })
        .map(|entry| entry.pubkey.clone())
        .collect()
}

impl AuthenticatedMessage {
    /// Pubkeys of the auth entries whose signature verifies over the payload.
    /// Malformed entries count as unverified rather than aborting the scan.
    pub fn verified_signers(&self) -> Vec<String> {
        verified_signers_over(&self.auth, &self.payload)
    }

    /// True iff every auth entry verifies.
    pub fn fully_verified(&self) -> bool {
        !self.auth.is_empty() && self.verified_signers().len() == self.auth.len()
    }
}

impl SignedEncryptedMessage {
    fn signed_value(&self) -> Result<Value, CryptoError> {
        serde_json::to_value(&self.payload).map_err(|e| CryptoError::Serialization(e.to_string()))
    }

    /// Pubkeys of the auth entries whose signature verifies over the
    /// encrypted payload object.
    pub fn verified_signers(&self) -> Result<Vec<String>, CryptoError> {
        Ok(verified_signers_over(&self.auth, &self.signed_value()?))
    }
}

/// Sign `value` with each of `signers` in order.
pub fn create_authenticated_message(
    value: &Value,
    signers: &[&SigningKeypair],
) -> Result<AuthenticatedMessage, CryptoError> {
    let mut auth = Vec::with_capacity(signers.len());
    for signer in signers {
        auth.push(AuthEntry {
            pubkey: signer.public_hex().to_string(),
            signature: sign_value(signer, value)?,
        });
    }
    Ok(AuthenticatedMessage { auth, payload: value.clone() })
}

/// Encrypt `value` to `recipient_public_hex`, then sign the resulting
/// encrypted payload with each of `signers`.
pub fn create_signed_encrypted_message(
    value: &Value,
    signers: &[&SigningKeypair],
    recipient_public_hex: &str,
) -> Result<SignedEncryptedMessage, CryptoError> {
    let payload = encrypt(value, recipient_public_hex)?;
    let signed = serde_json::to_value(&payload)
        .map_err(|e| CryptoError::Serialization(e.to_string()))?;

    let mut auth = Vec::with_capacity(signers.len());
    for signer in signers {
        auth.push(AuthEntry {
            pubkey: signer.public_hex().to_string(),
            signature: sign_value(signer, &signed)?,
        });
    }
    Ok(SignedEncryptedMessage { auth, payload })
}

/// Verify every signature against the encrypted payload, then decrypt.
///
/// A signature mismatch does not abort: the plaintext is still returned with
/// `verified = false`. Only parameter errors (bad recipient key, tampered
/// ciphertext) are fatal.
pub fn verify_and_decrypt(
    msg: &SignedEncryptedMessage,
    recipient: &EncryptionKeypair,
) -> Result<VerifiedPlaintext, CryptoError> {
    let verified_signers = msg.verified_signers()?;
    let verified = !msg.auth.is_empty() && verified_signers.len() == msg.auth.len();
    let value = decrypt(&msg.payload, recipient)?;
    Ok(VerifiedPlaintext { value, verified, verified_signers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn authenticated_message_verifies_all_signers() {
        let a = SigningKeypair::generate();
        let b = SigningKeypair::generate();
        let value = json!({"v": 1});

        let msg = create_authenticated_message(&value, &[&a, &b]).unwrap();
        assert_eq!(msg.auth.len(), 2);
        assert!(msg.fully_verified());
        assert_eq!(
            msg.verified_signers(),
            vec![a.public_hex().to_string(), b.public_hex().to_string()]
        );
    }

    #[test]
    fn tampered_payload_unverifies_every_signer() {
        let a = SigningKeypair::generate();
        let mut msg = create_authenticated_message(&json!({"v": 1}), &[&a]).unwrap();
        msg.payload = json!({"v": 2});
        assert!(!msg.fully_verified());
        assert!(msg.verified_signers().is_empty());
    }

    #[test]
    fn one_bad_entry_breaks_full_verification() {
        let a = SigningKeypair::generate();
        let b = SigningKeypair::generate();
        let value = json!("payload");
        let mut msg = create_authenticated_message(&value, &[&a, &b]).unwrap();

        // Replace b's signature with a's (valid hex, wrong key).
        msg.auth[1].signature = msg.auth[0].signature.clone();
        assert!(!msg.fully_verified());
        assert_eq!(msg.verified_signers(), vec![a.public_hex().to_string()]);
    }

    #[test]
    fn signed_encrypted_round_trip() {
        let signer = SigningKeypair::generate();
        let recipient = EncryptionKeypair::generate();
        let value = json!({"balance": 100});

        let msg =
            create_signed_encrypted_message(&value, &[&signer], recipient.public_hex()).unwrap();
        let out = verify_and_decrypt(&msg, &recipient).unwrap();

        assert!(out.verified);
        assert_eq!(out.verified_signers, vec![signer.public_hex().to_string()]);
        assert_eq!(out.value, value);
    }

    #[test]
    fn signature_mismatch_still_decrypts() {
        let signer = SigningKeypair::generate();
        let recipient = EncryptionKeypair::generate();
        let value = json!("plaintext survives");

        let mut msg =
            create_signed_encrypted_message(&value, &[&signer], recipient.public_hex()).unwrap();
        let other = SigningKeypair::generate();
        msg.auth[0].pubkey = other.public_hex().to_string();

        let out = verify_and_decrypt(&msg, &recipient).unwrap();
        assert!(!out.verified);
        assert!(out.verified_signers.is_empty());
        assert_eq!(out.value, value);
    }

    #[test]
    fn wire_round_trip_preserves_verification() {
        let signer = SigningKeypair::generate();
        let recipient = EncryptionKeypair::generate();
        let msg = create_signed_encrypted_message(&json!({"k": true}), &[&signer], recipient.public_hex())
            .unwrap();

        let wire = serde_json::to_string(&msg).unwrap();
        let back: SignedEncryptedMessage = serde_json::from_str(&wire).unwrap();
        let out = verify_and_decrypt(&back, &recipient).unwrap();
        assert!(out.verified);
    }
}
