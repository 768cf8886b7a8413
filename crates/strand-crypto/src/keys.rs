//! Keypair generation and PKCS#8 PEM handling.
//!
//! Identity keys are Ed25519, encryption keys are X25519. Public keys travel
//! as 64 lowercase hex characters; private keys persist as PKCS#8 PEM
//! (`BEGIN PRIVATE KEY` envelopes, RFC 8410 for X25519).

use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use ed25519_dalek::{SigningKey, VerifyingKey};
use pkcs8::der::pem::PemLabel;
use pkcs8::der::{Decode, SecretDocument};
use pkcs8::{AlgorithmIdentifierRef, LineEnding, ObjectIdentifier, PrivateKeyInfo};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// RFC 8410 algorithm identifier for X25519.
const X25519_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.110");

/// Decode a 32-byte public key from lowercase hex.
pub fn decode_public_hex(public_hex: &str) -> Result<[u8; 32], CryptoError> {
    let bytes = hex::decode(public_hex)
        .map_err(|_| CryptoError::InvalidKey("public key is not valid hex".into()))?;
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("public key must be 32 bytes (64 hex chars)".into()))
}

// ── Signing (Ed25519) ────────────────────────────────────────────────────────

/// An Ed25519 keypair with its public key cached in hex form.
pub struct SigningKeypair {
    public_hex: String,
    signing_key: SigningKey,
}

impl SigningKeypair {
    /// Generate a fresh Ed25519 keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(signing_key)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_hex = hex::encode(signing_key.verifying_key().to_bytes());
        Self { public_hex, signing_key }
    }

    /// Load from a PKCS#8 PEM private key.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_pkcs8_pem(pem).map_err(|e| CryptoError::Pem(e.to_string()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Load from PEM and require the derived public key to match
    /// `expected_hex` (case-insensitive).
    pub fn from_pem_checked(pem: &str, expected_hex: &str) -> Result<Self, CryptoError> {
        let keypair = Self::from_pem(pem)?;
        if !keypair.public_hex().eq_ignore_ascii_case(expected_hex) {
            return Err(CryptoError::InvalidKey(
                "public key hex does not match the private key".into(),
            ));
        }
        Ok(keypair)
    }

    /// The public key as 64 lowercase hex characters.
    pub fn public_hex(&self) -> &str {
        &self.public_hex
    }

    /// Export the private key as PKCS#8 PEM. The returned buffer zeroizes on
    /// drop.
    pub fn private_key_pem(&self) -> Result<Zeroizing<String>, CryptoError> {
        self.signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::Pem(e.to_string()))
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl std::fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKeypair({})", &self.public_hex[..16.min(self.public_hex.len())])
    }
}

/// Parse a verifying key from its hex form.
pub fn verifying_key_from_hex(public_hex: &str) -> Result<VerifyingKey, CryptoError> {
    let bytes = decode_public_hex(public_hex)?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|_| CryptoError::InvalidKey("not a valid Ed25519 public key".into()))
}

// ── Encryption (X25519) ──────────────────────────────────────────────────────

/// An X25519 keypair with its public key cached in hex form.
pub struct EncryptionKeypair {
    public_hex: String,
    secret: StaticSecret,
}

impl EncryptionKeypair {
    /// Generate a fresh X25519 keypair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        Self::from_secret(secret)
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public_hex = hex::encode(X25519PublicKey::from(&secret).to_bytes());
        Self { public_hex, secret }
    }

    /// Load from a PKCS#8 PEM private key (RFC 8410 X25519 envelope).
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let (label, doc) =
            SecretDocument::from_pem(pem).map_err(|e| CryptoError::Pem(e.to_string()))?;
        PrivateKeyInfo::validate_pem_label(label).map_err(|e| CryptoError::Pem(e.to_string()))?;

        let info = PrivateKeyInfo::from_der(doc.as_bytes())
            .map_err(|e| CryptoError::Pem(e.to_string()))?;
        if info.algorithm.oid != X25519_OID {
            return Err(CryptoError::Pem(format!(
                "expected X25519 key (OID {X25519_OID}), got {}",
                info.algorithm.oid
            )));
        }
        // RFC 8410: the private key field is CurvePrivateKey, an OCTET STRING
        // wrapping the 32 raw bytes.
        let raw = info.private_key;
        if raw.len() != 34 || raw[0] != 0x04 || raw[1] != 0x20 {
            return Err(CryptoError::Pem("malformed X25519 CurvePrivateKey".into()));
        }
        let seed: [u8; 32] = raw[2..]
            .try_into()
            .map_err(|_| CryptoError::Pem("malformed X25519 CurvePrivateKey".into()))?;
        Ok(Self::from_secret(StaticSecret::from(seed)))
    }

    /// Load from PEM and require the derived public key to match
    /// `expected_hex` (case-insensitive).
    pub fn from_pem_checked(pem: &str, expected_hex: &str) -> Result<Self, CryptoError> {
        let keypair = Self::from_pem(pem)?;
        if !keypair.public_hex().eq_ignore_ascii_case(expected_hex) {
            return Err(CryptoError::InvalidKey(
                "public key hex does not match the private key".into(),
            ));
        }
        Ok(keypair)
    }

    /// The public key as 64 lowercase hex characters.
    pub fn public_hex(&self) -> &str {
        &self.public_hex
    }

    /// Export the private key as PKCS#8 PEM (RFC 8410). The returned buffer
    /// zeroizes on drop.
    pub fn private_key_pem(&self) -> Result<Zeroizing<String>, CryptoError> {
        let mut curve_private_key = Zeroizing::new(Vec::with_capacity(34));
        curve_private_key.push(0x04);
        curve_private_key.push(0x20);
        curve_private_key.extend_from_slice(&self.secret.to_bytes());

        let info = PrivateKeyInfo {
            algorithm: AlgorithmIdentifierRef { oid: X25519_OID, parameters: None },
            private_key: curve_private_key.as_slice(),
            public_key: None,
        };
        let doc = SecretDocument::encode_msg(&info).map_err(|e| CryptoError::Pem(e.to_string()))?;
        doc.to_pem(PrivateKeyInfo::PEM_LABEL, LineEnding::LF)
            .map_err(|e| CryptoError::Pem(e.to_string()))
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

impl std::fmt::Debug for EncryptionKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionKeypair({})", &self.public_hex[..16.min(self.public_hex.len())])
    }
}
