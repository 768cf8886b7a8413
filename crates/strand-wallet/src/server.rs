//! The wallet server state machine.
//!
//! Durable state lives as records on the credential node, every one wrapped
//! in a server-signed envelope so it passes the `mutable://accounts`
//! validator under the wallet's own account:
//!
//!   users/{username}            profile (server-signed)
//!   users/{username}/password   PBKDF2 record (server-signed)
//!   users/{username}/account-key     user Ed25519 keys, sealed to the server
//!   users/{username}/encryption-key  user X25519 keys, sealed to the server
//!   reset-tokens/{token}        `{username, expiresAt}` (server-signed)
//!
//! Proxy writes load the user's sealed keys, substitute `:key` in the target
//! URI and forward a user-signed message to the proxy node.

use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use strand_core::{substitute, ReceiveResult, StrandError, Transaction};
use strand_crypto::{
    create_authenticated_message, create_signed_encrypted_message, verify_and_decrypt,
    AuthenticatedMessage, EncryptionKeypair, SignedEncryptedMessage, SigningKeypair,
};
use strand_store::Backend;

use crate::config::WalletConfig;
use crate::google::GoogleVerifier;
use crate::jwt::{self, Claims};
use crate::password::{hash_password, verify_password, PasswordRecord};

const RESET_TOKEN_BYTES: usize = 32;
const MIN_PASSWORD_LEN: usize = 8;

// ── Request / response shapes ────────────────────────────────────────────────

/// Credential material for signup, dispatched by `type`. Adding a credential
/// kind is a compile-time change.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CredentialRequest {
    Password { username: String, password: String },
    Google {
        #[serde(rename = "idToken")]
        id_token: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LoginRequest {
    Password {
        username: String,
        password: String,
        #[serde(rename = "sessionPubkey")]
        session_pubkey: String,
    },
    Google {
        #[serde(rename = "idToken")]
        id_token: String,
        #[serde(rename = "sessionPubkey")]
        session_pubkey: String,
    },
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct ProxyWriteRequest {
    pub uri: String,
    pub value: Value,
    #[serde(default)]
    pub encrypt: bool,
}

#[derive(Debug, Serialize)]
pub struct ProxyWriteResponse {
    pub uri: String,
    pub result: ReceiveResult,
}

#[derive(Debug, Serialize)]
pub struct ResetTokenResponse {
    pub token: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

// ── Server ───────────────────────────────────────────────────────────────────

pub struct WalletServer {
    identity: SigningKeypair,
    encryption: EncryptionKeypair,
    jwt_secret: String,
    jwt_ttl_seconds: i64,
    reset_ttl_seconds: i64,
    credential: Arc<dyn Backend>,
    proxy: Arc<dyn Backend>,
    google: GoogleVerifier,
}

impl WalletServer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: SigningKeypair,
        encryption: EncryptionKeypair,
        jwt_secret: String,
        jwt_ttl_seconds: i64,
        reset_ttl_seconds: i64,
        credential: Arc<dyn Backend>,
        proxy: Arc<dyn Backend>,
        google: GoogleVerifier,
    ) -> Self {
        Self {
            identity,
            encryption,
            jwt_secret,
            jwt_ttl_seconds,
            reset_ttl_seconds,
            credential,
            proxy,
            google,
        }
    }

    /// Wire the config to HTTP clients for both upstream nodes.
    pub fn from_config(
        config: WalletConfig,
        credential: Arc<dyn Backend>,
        proxy: Arc<dyn Backend>,
    ) -> Self {
        Self::new(
            config.identity,
            config.encryption,
            config.jwt_secret,
            config.jwt_expiration_seconds,
            config.reset_token_ttl_seconds,
            credential,
            proxy,
            GoogleVerifier::new(),
        )
    }

    pub fn server_public_hex(&self) -> &str {
        self.identity.public_hex()
    }

    /// Verify a bearer token into its claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims, StrandError> {
        jwt::verify(&self.jwt_secret, token)
    }

    // ── URIs ─────────────────────────────────────────────────────────────────

    fn server_root(&self) -> String {
        format!("mutable://accounts/{}", self.identity.public_hex())
    }

    fn user_uri(&self, username: &str, suffix: &str) -> String {
        format!("{}/users/{username}{suffix}", self.server_root())
    }

    fn reset_token_uri(&self, token: &str) -> String {
        format!("{}/reset-tokens/{token}", self.server_root())
    }

    fn app_config_uri(&self, app_key: &str) -> String {
        format!("{}/apps/{app_key}", self.server_root())
    }

    fn session_uri(app_key: &str, session_pubkey: &str) -> String {
        format!("mutable://accounts/{app_key}/sessions/{session_pubkey}")
    }

    // ── Durable record helpers ───────────────────────────────────────────────

    async fn put_signed(&self, uri: &str, payload: &Value) -> Result<(), StrandError> {
        let msg = create_authenticated_message(payload, &[&self.identity])?;
        let value =
            serde_json::to_value(&msg).map_err(|e| StrandError::Serialization(e.to_string()))?;
        let res = self.credential.receive(Transaction::new(uri, value)).await;
        if !res.accepted {
            return Err(StrandError::BackendUnavailable(format!(
                "credential write to {uri} rejected: {}",
                res.error.unwrap_or_default()
            )));
        }
        Ok(())
    }

    async fn put_sealed(&self, uri: &str, payload: &Value) -> Result<(), StrandError> {
        let msg = create_signed_encrypted_message(
            payload,
            &[&self.identity],
            self.encryption.public_hex(),
        )?;
        let value =
            serde_json::to_value(&msg).map_err(|e| StrandError::Serialization(e.to_string()))?;
        let res = self.credential.receive(Transaction::new(uri, value)).await;
        if !res.accepted {
            return Err(StrandError::BackendUnavailable(format!(
                "credential write to {uri} rejected: {}",
                res.error.unwrap_or_default()
            )));
        }
        Ok(())
    }

    async fn read_signed_payload(&self, uri: &str) -> Result<Option<Value>, StrandError> {
        let read = self.credential.read(uri).await;
        let Some(record) = read.record else {
            return if read.is_not_found() {
                Ok(None)
            } else if let Some(error) = read.error {
                Err(StrandError::BackendUnavailable(error))
            } else {
                Ok(None)
            };
        };
        let msg: AuthenticatedMessage = serde_json::from_value(record.data)
            .map_err(|e| StrandError::Serialization(format!("corrupt record at {uri}: {e}")))?;
        Ok(Some(msg.payload))
    }

    async fn read_sealed_payload(&self, uri: &str) -> Result<Option<Value>, StrandError> {
        let read = self.credential.read(uri).await;
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
            .map_err(|e| StrandError::Serialization(format!("corrupt record at {uri}: {e}")))?;
        let plain = verify_and_decrypt(&msg, &self.encryption)?;
        if !plain.verified_signers.iter().any(|pk| pk == self.identity.public_hex()) {
            return Err(StrandError::SignatureInvalid);
        }
        Ok(Some(plain.value))
    }

    async fn delete_record(&self, uri: &str) -> Result<(), StrandError> {
        let res = self.credential.delete(uri).await;
        if !res.success && !res.is_not_found() {
            return Err(StrandError::BackendUnavailable(format!(
                "delete of {uri} failed: {}",
                res.error.unwrap_or_default()
            )));
        }
        Ok(())
    }

    async fn user_exists(&self, username: &str) -> Result<bool, StrandError> {
        Ok(self.read_signed_payload(&self.user_uri(username, "")).await?.is_some())
    }

    async fn password_record(&self, username: &str) -> Result<Option<PasswordRecord>, StrandError> {
        let Some(payload) = self.read_signed_payload(&self.user_uri(username, "/password")).await?
        else {
            return Ok(None);
        };
        let record = serde_json::from_value(payload)
            .map_err(|e| StrandError::Serialization(format!("corrupt password record: {e}")))?;
        Ok(Some(record))
    }

    fn tokens(&self, username: &str) -> Result<AuthResponse, StrandError> {
        Ok(AuthResponse {
            token: jwt::issue(&self.jwt_secret, username, self.jwt_ttl_seconds)?,
            username: username.to_string(),
        })
    }

    /// Generate user key material and persist profile plus sealed keys.
    async fn create_user(&self, username: &str, signup_type: &str) -> Result<(), StrandError> {
        let signing = SigningKeypair::generate();
        let encryption = EncryptionKeypair::generate();

        self.put_signed(
            &self.user_uri(username, ""),
            &json!({
                "username": username,
                "createdAt": chrono::Utc::now().timestamp_millis(),
                "signupType": signup_type,
            }),
        )
        .await?;

        let signing_pem = signing.private_key_pem()?;
        self.put_sealed(
            &self.user_uri(username, "/account-key"),
            &json!({
                "publicKeyHex": signing.public_hex(),
                "privateKeyPem": signing_pem.as_str(),
            }),
        )
        .await?;

        let encryption_pem = encryption.private_key_pem()?;
        self.put_sealed(
            &self.user_uri(username, "/encryption-key"),
            &json!({
                "publicKeyHex": encryption.public_hex(),
                "privateKeyPem": encryption_pem.as_str(),
            }),
        )
        .await?;

        info!(username, signup_type, "user created");
        Ok(())
    }

    // ── Operations ───────────────────────────────────────────────────────────

    pub async fn signup(
        &self,
        app_key: &str,
        req: CredentialRequest,
    ) -> Result<AuthResponse, StrandError> {
        match req {
            CredentialRequest::Password { username, password } => {
                validate_username(&username)?;
                validate_password(&password)?;
                if self.user_exists(&username).await? {
                    return Err(StrandError::ValidationFailed(format!(
                        "user {username} already exists"
                    )));
                }
                self.create_user(&username, "password").await?;
                let record = hash_password(&password);
                self.put_signed(
                    &self.user_uri(&username, "/password"),
                    &serde_json::to_value(record)
                        .map_err(|e| StrandError::Serialization(e.to_string()))?,
                )
                .await?;
                self.tokens(&username)
            }
            CredentialRequest::Google { id_token } => {
                let client_id = self.google_client_id(app_key).await?;
                let identity = self.google.verify(&id_token, &client_id).await?;
                let username = google_username(&identity.subject);
                if !self.user_exists(&username).await? {
                    self.create_user(&username, "google").await?;
                }
                self.tokens(&username)
            }
        }
    }

    pub async fn login(&self, app_key: &str, req: LoginRequest) -> Result<AuthResponse, StrandError> {
        match req {
            LoginRequest::Password { username, password, session_pubkey } => {
                self.require_session(app_key, &session_pubkey).await?;
                let Some(record) = self.password_record(&username).await? else {
                    return Err(StrandError::Unauthorized("unknown user or wrong password".into()));
                };
                if !verify_password(&password, &record)? {
                    warn!(username, "failed login attempt");
                    return Err(StrandError::Unauthorized("unknown user or wrong password".into()));
                }
                self.tokens(&username)
            }
            LoginRequest::Google { id_token, session_pubkey } => {
                self.require_session(app_key, &session_pubkey).await?;
                let client_id = self.google_client_id(app_key).await?;
                let identity = self.google.verify(&id_token, &client_id).await?;
                let username = google_username(&identity.subject);
                if !self.user_exists(&username).await? {
                    return Err(StrandError::Unauthorized(
                        "no account for this Google identity".into(),
                    ));
                }
                self.tokens(&username)
            }
        }
    }

    pub async fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), StrandError> {
        validate_password(new_password)?;
        let Some(record) = self.password_record(username).await? else {
            return Err(StrandError::Unauthorized("no password on this account".into()));
        };
        if !verify_password(old_password, &record)? {
            return Err(StrandError::Unauthorized("wrong password".into()));
        }
        let new_record = hash_password(new_password);
        self.put_signed(
            &self.user_uri(username, "/password"),
            &serde_json::to_value(new_record)
                .map_err(|e| StrandError::Serialization(e.to_string()))?,
        )
        .await
    }

    /// Mint a reset token with a bounded lifetime. Delivery of the token to
    /// the user (mail, SMS) is outside this service.
    pub async fn request_reset(&self, username: &str) -> Result<ResetTokenResponse, StrandError> {
        if !self.user_exists(username).await? {
            return Err(StrandError::NotFound(format!("user {username}")));
        }
        let mut bytes = [0u8; RESET_TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        let expires_at = chrono::Utc::now().timestamp() + self.reset_ttl_seconds;

        self.put_signed(
            &self.reset_token_uri(&token),
            &json!({ "username": username, "expiresAt": expires_at }),
        )
        .await?;
        Ok(ResetTokenResponse { token, expires_at })
    }

    pub async fn reset_with_token(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<AuthResponse, StrandError> {
        validate_password(new_password)?;
        let uri = self.reset_token_uri(token);
        let Some(payload) = self.read_signed_payload(&uri).await? else {
            return Err(StrandError::Unauthorized("invalid or expired reset token".into()));
        };
        let username = payload
            .get("username")
            .and_then(Value::as_str)
            .ok_or_else(|| StrandError::Serialization("corrupt reset token record".into()))?
            .to_string();
        let expires_at = payload.get("expiresAt").and_then(Value::as_i64).unwrap_or(0);
        if chrono::Utc::now().timestamp() >= expires_at {
            self.delete_record(&uri).await?;
            return Err(StrandError::Unauthorized("invalid or expired reset token".into()));
        }

        let record = hash_password(new_password);
        self.put_signed(
            &self.user_uri(&username, "/password"),
            &serde_json::to_value(record)
                .map_err(|e| StrandError::Serialization(e.to_string()))?,
        )
        .await?;
        self.delete_record(&uri).await?;
        self.tokens(&username)
    }

    /// Sign (and optionally encrypt) a value with the user's custodied keys
    /// and forward it to the proxy node.
    pub async fn proxy_write(
        &self,
        username: &str,
        req: ProxyWriteRequest,
    ) -> Result<ProxyWriteResponse, StrandError> {
        let Some(account) =
            self.read_sealed_payload(&self.user_uri(username, "/account-key")).await?
        else {
            return Err(StrandError::Unauthorized("no key material for this user".into()));
        };
        let signing_pem = account
            .get("privateKeyPem")
            .and_then(Value::as_str)
            .ok_or_else(|| StrandError::Serialization("corrupt account-key record".into()))?;
        let signing = SigningKeypair::from_pem(signing_pem)?;

        let uri = substitute(&req.uri, signing.public_hex(), None);

        let value = if req.encrypt {
            let Some(enc) =
                self.read_sealed_payload(&self.user_uri(username, "/encryption-key")).await?
            else {
                return Err(StrandError::Unauthorized("no encryption key for this user".into()));
            };
            let recipient_hex = enc
                .get("publicKeyHex")
                .and_then(Value::as_str)
                .ok_or_else(|| StrandError::Serialization("corrupt encryption-key record".into()))?;
            let msg = create_signed_encrypted_message(&req.value, &[&signing], recipient_hex)?;
            serde_json::to_value(&msg).map_err(|e| StrandError::Serialization(e.to_string()))?
        } else {
            let msg = create_authenticated_message(&req.value, &[&signing])?;
            serde_json::to_value(&msg).map_err(|e| StrandError::Serialization(e.to_string()))?
        };

        let result = self.proxy.receive(Transaction::new(uri.clone(), value)).await;
        Ok(ProxyWriteResponse { uri, result })
    }

    // ── Tenant / session lookups ─────────────────────────────────────────────

    /// The tenant's Google client id, from its stored app config on the
    /// proxy node (sealed to the shared server identity).
    async fn google_client_id(&self, app_key: &str) -> Result<String, StrandError> {
        let uri = self.app_config_uri(app_key);
        let read = self.proxy.read(&uri).await;
        let Some(record) = read.record else {
            return Err(StrandError::ValidationFailed(format!(
                "no app config for tenant {app_key}"
            )));
        };
        let msg: SignedEncryptedMessage = serde_json::from_value(record.data)
            .map_err(|e| StrandError::Serialization(format!("corrupt app config: {e}")))?;
        let plain = verify_and_decrypt(&msg, &self.encryption)?;
        plain
            .value
            .get("googleClientId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                StrandError::ValidationFailed(format!(
                    "tenant {app_key} has no googleClientId configured"
                ))
            })
    }

    /// A login requires an approved session record for the app.
    async fn require_session(&self, app_key: &str, session_pubkey: &str) -> Result<(), StrandError> {
        let read = self.proxy.read(&Self::session_uri(app_key, session_pubkey)).await;
        let approved = read.record.map(|r| session_approved(&r.data)).unwrap_or(false);
        if !approved {
            return Err(StrandError::Unauthorized("no approved session for this app".into()));
        }
        Ok(())
    }

    pub async fn health(&self) -> Value {
        let credential = self.credential.health().await;
        let proxy = self.proxy.health().await;
        json!({
            "credential": credential,
            "proxy": proxy,
        })
    }
}

/// A session record approves unless its value is an explicit negative
/// (`0`, `"0"`, `false`, `null`). Registration forwards the appKey-signed
/// message itself, so presence is the signal.
fn session_approved(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::Number(n) => n.as_i64() != Some(0),
        Value::String(s) => s != "0",
        _ => true,
    }
}

fn google_username(subject: &str) -> String {
    format!("google-{subject}")
}

/// Usernames become URI path segments; keep them to a safe charset.
fn validate_username(username: &str) -> Result<(), StrandError> {
    let ok_len = (3..=64).contains(&username.len());
    let ok_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !ok_len || !ok_chars {
        return Err(StrandError::ValidationFailed(
            "username must be 3-64 chars of [a-zA-Z0-9._-]".into(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), StrandError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(StrandError::ValidationFailed(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
