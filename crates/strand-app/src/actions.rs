//! The action router: tenant config custody, origin policy, payload
//! validation and deterministic URI rewriting.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;

use strand_core::{substitute, ReceiveResult, StrandError, Transaction};
use strand_crypto::{
    canonical_json_bytes, create_signed_encrypted_message, verify_and_decrypt,
    AuthenticatedMessage, EncryptionKeypair, SignedEncryptedMessage, SigningKeypair,
};
use strand_store::Backend;

use crate::tenant::StoredAppConfig;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r".+@.+\..+").expect("email regex parses"));

/// How many hex characters of the payload digest feed the `:signature`
/// placeholder.
const SIGNATURE_HEX_LEN: usize = 32;

/// Outcome of an action invocation or session registration: the rewritten
/// URI and the downstream node's verdict.
#[derive(Debug, serde::Serialize)]
pub struct ActionOutcome {
    pub uri: String,
    pub result: ReceiveResult,
}

pub struct AppBackend {
    identity: SigningKeypair,
    encryption: EncryptionKeypair,
    data: Arc<dyn Backend>,
}

impl AppBackend {
    pub fn new(identity: SigningKeypair, encryption: EncryptionKeypair, data: Arc<dyn Backend>) -> Self {
        Self { identity, encryption, data }
    }

    pub fn server_public_hex(&self) -> &str {
        self.identity.public_hex()
    }

    fn config_uri(&self, app_key: &str) -> String {
        format!("mutable://accounts/{}/apps/{app_key}", self.identity.public_hex())
    }

    // ── Tenant config custody ────────────────────────────────────────────────

    pub async fn load_config(&self, app_key: &str) -> Result<Option<StoredAppConfig>, StrandError> {
        let read = self.data.read(&self.config_uri(app_key)).await;
        let Some(record) = read.record else {
            return if read.is_not_found() {
                Ok(None)
            } else if let Some(error) = read.error {
                Err(StrandError::BackendUnavailable(error))
            } else {
                Ok(None)
            };
        };
        let msg: SignedEncryptedMessage = serde_json::from_value(record.data)
            .map_err(|e| StrandError::Serialization(format!("corrupt app config: {e}")))?;
        let plain = verify_and_decrypt(&msg, &self.encryption)?;
        if !plain.verified_signers.iter().any(|pk| pk == self.identity.public_hex()) {
            return Err(StrandError::SignatureInvalid);
        }
        let config = serde_json::from_value(plain.value)
            .map_err(|e| StrandError::Serialization(format!("corrupt app config: {e}")))?;
        Ok(Some(config))
    }

    async fn save_config(&self, config: &StoredAppConfig) -> Result<(), StrandError> {
        let payload =
            serde_json::to_value(config).map_err(|e| StrandError::Serialization(e.to_string()))?;
        let sealed = create_signed_encrypted_message(
            &payload,
            &[&self.identity],
            self.encryption.public_hex(),
        )?;
        let value =
            serde_json::to_value(&sealed).map_err(|e| StrandError::Serialization(e.to_string()))?;
        let res = self
            .data
            .receive(Transaction::new(self.config_uri(&config.app_key), value))
            .await;
        if !res.accepted {
            return Err(StrandError::BackendUnavailable(format!(
                "config write rejected: {}",
                res.error.unwrap_or_default()
            )));
        }
        Ok(())
    }

    /// Apply an appKey-signed partial update and persist the merged config.
    pub async fn update_config(
        &self,
        app_key: &str,
        msg: &AuthenticatedMessage,
    ) -> Result<StoredAppConfig, StrandError> {
        require_single_signer(msg, app_key)?;
        let base = self
            .load_config(app_key)
            .await?
            .unwrap_or_else(|| StoredAppConfig::empty(app_key));
        let merged = base.merged_with(&msg.payload)?;
        self.save_config(&merged).await?;
        info!(app_key, actions = merged.actions.len(), "tenant config updated");
        Ok(merged)
    }

    // ── Action invocation ────────────────────────────────────────────────────

    pub async fn invoke_action(
        &self,
        app_key: &str,
        action_name: &str,
        origin: Option<&str>,
        msg: &AuthenticatedMessage,
        raw_body: Value,
    ) -> Result<ActionOutcome, StrandError> {
        require_single_signer(msg, app_key)?;

        let config = self
            .load_config(app_key)
            .await?
            .ok_or_else(|| StrandError::NotFound(format!("no app config for {app_key}")))?;
        check_origin(origin, &config.allowed_origins)?;

        let action = config
            .action(action_name)
            .ok_or_else(|| StrandError::NotFound(format!("action {action_name}")))?;
        let (template, encrypted) = action.write.resolve()?;

        // String-format validation applies to plain writes only; an encrypted
        // action's payload may already be an EncryptedPayload.
        if !encrypted {
            if let Some("email") = action
                .validation
                .as_ref()
                .and_then(|v| v.string_value.as_ref())
                .and_then(|s| s.format.as_deref())
            {
                let Some(text) = msg.payload.as_str() else {
                    return Err(StrandError::ValidationFailed(
                        "payload must be a string for email validation".into(),
                    ));
                };
                if !EMAIL_RE.is_match(text) {
                    return Err(StrandError::ValidationFailed(format!(
                        "payload is not a valid email: {text}"
                    )));
                }
            }
        }

        // Deterministic rewrite: :key → appKey, :signature → payload digest.
        let digest = hex::encode(Sha256::digest(canonical_json_bytes(&msg.payload)?));
        let uri = substitute(template, app_key, Some(&digest[..SIGNATURE_HEX_LEN]));

        let result = self.data.receive(Transaction::new(uri.clone(), raw_body)).await;
        Ok(ActionOutcome { uri, result })
    }

    // ── Session registration ─────────────────────────────────────────────────

    /// Store the appKey-signed approval at the session URI. Presence of the
    /// record is the approval; revocation deletes it.
    pub async fn register_session(
        &self,
        app_key: &str,
        origin: Option<&str>,
        msg: &AuthenticatedMessage,
        raw_body: Value,
    ) -> Result<ActionOutcome, StrandError> {
        require_single_signer(msg, app_key)?;

        let config = self
            .load_config(app_key)
            .await?
            .ok_or_else(|| StrandError::NotFound(format!("no app config for {app_key}")))?;
        check_origin(origin, &config.allowed_origins)?;

        let session_pubkey = msg
            .payload
            .get("sessionPubkey")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StrandError::ValidationFailed("session payload must carry sessionPubkey".into())
            })?;
        if session_pubkey.is_empty() || session_pubkey.contains('/') {
            return Err(StrandError::ValidationFailed("malformed sessionPubkey".into()));
        }

        let uri = format!("mutable://accounts/{app_key}/sessions/{session_pubkey}");
        let result = self.data.receive(Transaction::new(uri.clone(), raw_body)).await;
        info!(app_key, session_pubkey, accepted = result.accepted, "session registration");
        Ok(ActionOutcome { uri, result })
    }

    pub async fn health(&self) -> Value {
        serde_json::json!({ "data": self.data.health().await })
    }
}

/// Update and invocation bodies must carry exactly one signer, it must be
/// the tenant key, and its signature must verify.
fn require_single_signer(msg: &AuthenticatedMessage, app_key: &str) -> Result<(), StrandError> {
    if msg.auth.len() != 1 {
        return Err(StrandError::SignatureInvalid);
    }
    if !msg.auth[0].pubkey.eq_ignore_ascii_case(app_key) {
        return Err(StrandError::SignatureInvalid);
    }
    if !msg.fully_verified() {
        return Err(StrandError::SignatureInvalid);
    }
    Ok(())
}

/// Origin policy: `*` admits everything, otherwise the request origin must
/// start with one of the configured entries.
fn check_origin(origin: Option<&str>, allowed: &[String]) -> Result<(), StrandError> {
    if allowed.iter().any(|entry| entry == "*") {
        return Ok(());
    }
    let origin = origin
        .ok_or_else(|| StrandError::OriginNotAllowed("request carries no Origin header".into()))?;
    if allowed.iter().any(|entry| origin.starts_with(entry.as_str())) {
        return Ok(());
    }
    Err(StrandError::OriginNotAllowed(origin.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_rules() {
        let allowed = vec!["https://app.example.com".to_string()];
        assert!(check_origin(Some("https://app.example.com"), &allowed).is_ok());
        assert!(check_origin(Some("https://app.example.com/page"), &allowed).is_ok());
        assert!(check_origin(Some("https://evil.example.com"), &allowed).is_err());
        assert!(check_origin(None, &allowed).is_err());

        let wildcard = vec!["*".to_string()];
        assert!(check_origin(None, &wildcard).is_ok());
        assert!(check_origin(Some("anything"), &wildcard).is_ok());

        // No configured origins and no wildcard: everything is rejected.
        assert!(check_origin(Some("https://app.example.com"), &[]).is_err());
    }

    #[test]
    fn email_regex_shape() {
        assert!(EMAIL_RE.is_match("x@y.z"));
        assert!(EMAIL_RE.is_match("first.last@mail.example.com"));
        assert!(!EMAIL_RE.is_match("no-at-sign"));
        assert!(!EMAIL_RE.is_match("missing@dot"));
    }
}
