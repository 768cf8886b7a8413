//! Built-in program validators.

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

use strand_core::{value_bytes, StrandError, Uri};
use strand_crypto::AuthenticatedMessage;

use crate::registry::{RecordReader, ValidationResult, Validator};

/// `mutable://open`, `mutable://inbox`, `immutable://inbox`: every value is
/// acceptable.
pub struct AlwaysValid;

#[async_trait]
impl Validator for AlwaysValid {
    async fn validate(&self, _uri: &Uri, _value: &Value, _read: &dyn RecordReader) -> ValidationResult {
        ValidationResult::ok()
    }
}

// ── Account-bound programs ───────────────────────────────────────────────────

/// `mutable://accounts` and `immutable://accounts`: the value must be an
/// `AuthenticatedMessage`, and a verified signer must own the account segment
/// of the URI (the first path segment after `accounts/`).
pub struct AccountBound {
    immutable: bool,
}

impl AccountBound {
    pub fn mutable() -> Self {
        Self { immutable: false }
    }

    pub fn immutable() -> Self {
        Self { immutable: true }
    }
}

/// Parse an `AuthenticatedMessage` and check that the URI's account segment
/// is among its verified signers. Returns the parsed message on success so
/// callers can inspect the payload.
fn check_account_signature(uri: &Uri, value: &Value) -> Result<AuthenticatedMessage, StrandError> {
    let msg: AuthenticatedMessage = serde_json::from_value(value.clone()).map_err(|_| {
        StrandError::ValidationFailed("value must be an AuthenticatedMessage".into())
    })?;
    let Some(account) = uri.path.first() else {
        return Err(StrandError::ValidationFailed(
            "accounts URI must carry an account segment".into(),
        ));
    };
    if msg.auth.is_empty() {
        return Err(StrandError::SignatureInvalid);
    }
    let verified = msg.verified_signers();
    if !verified.iter().any(|pk| pk.eq_ignore_ascii_case(account)) {
        return Err(StrandError::SignatureInvalid);
    }
    Ok(msg)
}

#[async_trait]
impl Validator for AccountBound {
    async fn validate(&self, uri: &Uri, value: &Value, read: &dyn RecordReader) -> ValidationResult {
        if let Err(e) = check_account_signature(uri, value) {
            return ValidationResult::fail_with(e);
        }
        if self.immutable {
            match read.read_record(&uri.canonical()).await {
                Ok(Some(_)) => {
                    return ValidationResult::fail_with(StrandError::AlreadyExists(uri.canonical()))
                }
                Ok(None) => {}
                Err(e) => return ValidationResult::fail_with(e),
            }
        }
        ValidationResult::ok()
    }
}

// ── Immutable open ───────────────────────────────────────────────────────────

/// `immutable://open`: any value, but only while no record exists at the URI.
pub struct ImmutableOpen;

#[async_trait]
impl Validator for ImmutableOpen {
    async fn validate(&self, uri: &Uri, _value: &Value, read: &dyn RecordReader) -> ValidationResult {
        match read.read_record(&uri.canonical()).await {
            Ok(Some(_)) => ValidationResult::fail_with(StrandError::AlreadyExists(uri.canonical())),
            Ok(None) => ValidationResult::ok(),
            Err(e) => ValidationResult::fail_with(e),
        }
    }
}

// ── Content-addressed blobs ──────────────────────────────────────────────────

/// `blob://open/{algo}:{digest}`: the value's bytes must hash to `digest`
/// under `algo`. Only `sha256` is recognised.
pub struct BlobOpen;

#[async_trait]
impl Validator for BlobOpen {
    async fn validate(&self, uri: &Uri, value: &Value, _read: &dyn RecordReader) -> ValidationResult {
        let [addr] = uri.path.as_slice() else {
            return ValidationResult::fail("blob URI must be blob://open/{algo}:{digest}");
        };
        let Some((algo, digest)) = addr.split_once(':') else {
            return ValidationResult::fail("blob URI must be blob://open/{algo}:{digest}");
        };
        if algo != "sha256" {
            return ValidationResult::fail(format!("unknown digest algorithm: {algo}"));
        }

        let actual = hex::encode(Sha256::digest(value_bytes(value)));
        if !actual.eq_ignore_ascii_case(digest) {
            return ValidationResult::fail(format!(
                "content digest mismatch: expected {digest}, got {actual}"
            ));
        }
        ValidationResult::ok()
    }
}

// ── Links ────────────────────────────────────────────────────────────────────

fn check_link_target(value: &Value) -> Result<(), StrandError> {
    let Some(target) = value.as_str() else {
        return Err(StrandError::ValidationFailed("link value must be a URI string".into()));
    };
    Uri::parse(target)
        .map(|_| ())
        .map_err(|_| StrandError::ValidationFailed(format!("link target is not a valid URI: {target}")))
}

/// `link://open`: the value must be a syntactically valid URI string.
pub struct LinkOpen;

#[async_trait]
impl Validator for LinkOpen {
    async fn validate(&self, _uri: &Uri, value: &Value, _read: &dyn RecordReader) -> ValidationResult {
        match check_link_target(value) {
            Ok(()) => ValidationResult::ok(),
            Err(e) => ValidationResult::fail_with(e),
        }
    }
}

/// `link://accounts`: account-signed like `mutable://accounts`, and the inner
/// payload must itself be a valid URI string.
pub struct LinkAccounts;

#[async_trait]
impl Validator for LinkAccounts {
    async fn validate(&self, uri: &Uri, value: &Value, _read: &dyn RecordReader) -> ValidationResult {
        let msg = match check_account_signature(uri, value) {
            Ok(msg) => msg,
            Err(e) => return ValidationResult::fail_with(e),
        };
        match check_link_target(&msg.payload) {
            Ok(()) => ValidationResult::ok(),
            Err(e) => ValidationResult::fail_with(e),
        }
    }
}
