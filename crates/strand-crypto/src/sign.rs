//! Signing over canonical JSON.
//!
//! Signer and verifier must agree on the byte encoding of the value. Here the
//! canonical encoding is `serde_json::to_vec` over a `Value` parsed with key
//! order preserved, so a message verified on this side of the wire hashes the
//! same bytes its producer signed.

use ed25519_dalek::{Signature, Signer, Verifier};
use serde_json::Value;

use crate::error::CryptoError;
use crate::keys::{verifying_key_from_hex, SigningKeypair};

/// Canonical byte encoding of a value for signing purposes.
pub fn canonical_json_bytes(value: &Value) -> Result<Vec<u8>, CryptoError> {
    serde_json::to_vec(value).map_err(|e| CryptoError::Serialization(e.to_string()))
}

/// Sign the canonical JSON of `value`. Returns the signature as 128 lowercase
/// hex characters.
pub fn sign_value(keypair: &SigningKeypair, value: &Value) -> Result<String, CryptoError> {
    let bytes = canonical_json_bytes(value)?;
    let sig = keypair.signing_key().sign(&bytes);
    Ok(hex::encode(sig.to_bytes()))
}

/// Verify a hex signature over the canonical JSON of `value`.
///
/// A malformed key or signature encoding is an error; a well-formed signature
/// that does not match simply returns `false`.
pub fn verify_value(
    public_hex: &str,
    signature_hex: &str,
    value: &Value,
) -> Result<bool, CryptoError> {
    let key = verifying_key_from_hex(public_hex)?;
    let sig_bytes = hex::decode(signature_hex).map_err(|_| CryptoError::InvalidSignature)?;
    let sig = Signature::from_slice(&sig_bytes).map_err(|_| CryptoError::InvalidSignature)?;
    let bytes = canonical_json_bytes(value)?;
    Ok(key.verify(&bytes, &sig).is_ok())
}
