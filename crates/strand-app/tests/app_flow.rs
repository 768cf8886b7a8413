//! App backend flows against an in-process data node.

use std::sync::Arc;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use strand_app::actions::AppBackend;
use strand_core::StrandError;
use strand_crypto::{
    create_authenticated_message, AuthenticatedMessage, EncryptionKeypair, SigningKeypair,
};
use strand_schema::Schema;
use strand_store::{Backend, DataNode, MemoryStore};

struct Harness {
    backend: AppBackend,
    data: Arc<dyn Backend>,
    app_key: SigningKeypair,
}

fn harness() -> Harness {
    let data: Arc<dyn Backend> =
        Arc::new(DataNode::new(Arc::new(Schema::builtin()), MemoryStore::new()));
    let backend = AppBackend::new(
        SigningKeypair::generate(),
        EncryptionKeypair::generate(),
        Arc::clone(&data),
    );
    Harness { backend, data, app_key: SigningKeypair::generate() }
}

impl Harness {
    fn app_key_hex(&self) -> String {
        self.app_key.public_hex().to_string()
    }

    fn signed(&self, payload: Value) -> (AuthenticatedMessage, Value) {
        let msg = create_authenticated_message(&payload, &[&self.app_key]).unwrap();
        let raw = serde_json::to_value(&msg).unwrap();
        (msg, raw)
    }

    async fn configure(&self, update: Value) {
        let (msg, _) = self.signed(update);
        self.backend.update_config(&self.app_key_hex(), &msg).await.unwrap();
    }

    async fn configure_subscribe(&self) {
        self.configure(json!({
            "allowedOrigins": ["*"],
            "actions": [{
                "action": "subscribe",
                "validation": { "stringValue": { "format": "email" } },
                "write": { "plain": "mutable://accounts/:key/subscribers/:signature" }
            }]
        }))
        .await;
    }
}

#[tokio::test]
async fn config_update_round_trips_through_sealed_storage() {
    let h = harness();
    h.configure_subscribe().await;

    let config = h.backend.load_config(&h.app_key_hex()).await.unwrap().unwrap();
    assert_eq!(config.app_key, h.app_key_hex());
    assert_eq!(config.actions.len(), 1);
    assert_eq!(config.actions[0].action, "subscribe");

    // On the data node the config is ciphertext, not plaintext.
    let uri = format!(
        "mutable://accounts/{}/apps/{}",
        h.backend.server_public_hex(),
        h.app_key_hex()
    );
    let stored = h.data.read(&uri).await.record.unwrap();
    assert!(stored.data.get("auth").is_some());
    assert!(!serde_json::to_string(&stored.data).unwrap().contains("subscribe"));
}

#[tokio::test]
async fn config_update_requires_the_tenant_signature() {
    let h = harness();

    // Signed by some other key.
    let intruder = SigningKeypair::generate();
    let msg = create_authenticated_message(&json!({"allowedOrigins": ["*"]}), &[&intruder]).unwrap();
    let err = h.backend.update_config(&h.app_key_hex(), &msg).await.unwrap_err();
    assert_eq!(err, StrandError::SignatureInvalid);

    // Signed by the tenant but tampered afterwards.
    let (mut msg, _) = h.signed(json!({"allowedOrigins": ["*"]}));
    msg.payload = json!({"allowedOrigins": ["https://evil.example.com"]});
    let err = h.backend.update_config(&h.app_key_hex(), &msg).await.unwrap_err();
    assert_eq!(err, StrandError::SignatureInvalid);
}

#[tokio::test]
async fn action_invocation_rewrites_the_uri_deterministically() {
    let h = harness();
    h.configure_subscribe().await;

    let (msg, raw) = h.signed(json!("x@y.z"));
    let outcome = h
        .backend
        .invoke_action(&h.app_key_hex(), "subscribe", Some("https://any.origin"), &msg, raw)
        .await
        .unwrap();

    // :signature is the 32-hex prefix of SHA-256 of the canonical payload
    // (the JSON text `"x@y.z"`, quotes included).
    let digest = hex::encode(Sha256::digest(b"\"x@y.z\""));
    let expected = format!(
        "mutable://accounts/{}/subscribers/{}",
        h.app_key_hex(),
        &digest[..32]
    );
    assert_eq!(outcome.uri, expected);
    assert!(outcome.result.accepted, "{:?}", outcome.result.error);

    // The forwarded signed body landed at the rewritten URI.
    let record = h.data.read(&expected).await.record.unwrap();
    let stored: AuthenticatedMessage = serde_json::from_value(record.data).unwrap();
    assert_eq!(stored.payload, json!("x@y.z"));
}

#[tokio::test]
async fn email_validation_applies_to_plain_writes() {
    let h = harness();
    h.configure_subscribe().await;

    let (msg, raw) = h.signed(json!("not-an-email"));
    let err = h
        .backend
        .invoke_action(&h.app_key_hex(), "subscribe", None, &msg, raw)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ValidationFailed");

    let (msg, raw) = h.signed(json!(42));
    let err = h
        .backend
        .invoke_action(&h.app_key_hex(), "subscribe", None, &msg, raw)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ValidationFailed");
}

#[tokio::test]
async fn encrypted_actions_skip_string_validation() {
    let h = harness();
    h.configure(json!({
        "allowedOrigins": ["*"],
        "encryptionPublicKeyHex": EncryptionKeypair::generate().public_hex(),
        "actions": [{
            "action": "drop",
            "validation": { "stringValue": { "format": "email" } },
            "write": { "encrypted": "mutable://inbox/:key/:signature" }
        }]
    }))
    .await;

    // Payload is an opaque object, nothing like an email; still accepted.
    let (msg, raw) = h.signed(json!({"data": "abc", "nonce": "123", "ephemeralPublicKey": "ff"}));
    let outcome = h
        .backend
        .invoke_action(&h.app_key_hex(), "drop", None, &msg, raw)
        .await
        .unwrap();
    assert!(outcome.result.accepted, "{:?}", outcome.result.error);
    assert!(outcome.uri.starts_with("mutable://inbox/"));
}

#[tokio::test]
async fn unknown_action_is_not_found() {
    let h = harness();
    h.configure_subscribe().await;

    let (msg, raw) = h.signed(json!("x@y.z"));
    let err = h
        .backend
        .invoke_action(&h.app_key_hex(), "unsubscribe", None, &msg, raw)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NotFound");
}

#[tokio::test]
async fn unconfigured_tenant_is_not_found() {
    let h = harness();
    let (msg, raw) = h.signed(json!("x@y.z"));
    let err = h
        .backend
        .invoke_action(&h.app_key_hex(), "subscribe", None, &msg, raw)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NotFound");
}

#[tokio::test]
async fn origin_policy_gates_invocations() {
    let h = harness();
    h.configure(json!({
        "allowedOrigins": ["https://app.example.com"],
        "actions": [{
            "action": "subscribe",
            "write": { "plain": "mutable://accounts/:key/subscribers/:signature" }
        }]
    }))
    .await;

    let (msg, raw) = h.signed(json!("x@y.z"));
    let err = h
        .backend
        .invoke_action(&h.app_key_hex(), "subscribe", Some("https://evil.example.com"), &msg, raw)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "OriginNotAllowed");

    let (msg, raw) = h.signed(json!("x@y.z"));
    let ok = h
        .backend
        .invoke_action(&h.app_key_hex(), "subscribe", Some("https://app.example.com"), &msg, raw)
        .await
        .unwrap();
    assert!(ok.result.accepted);
}

#[tokio::test]
async fn session_registration_persists_the_approval() {
    let h = harness();
    h.configure(json!({ "allowedOrigins": ["*"] })).await;

    let (msg, raw) = h.signed(json!({ "sessionPubkey": "session-abc" }));
    let outcome = h
        .backend
        .register_session(&h.app_key_hex(), None, &msg, raw)
        .await
        .unwrap();
    assert!(outcome.result.accepted, "{:?}", outcome.result.error);
    assert_eq!(
        outcome.uri,
        format!("mutable://accounts/{}/sessions/session-abc", h.app_key_hex())
    );

    // The stored approval is the tenant-signed message itself.
    let record = h.data.read(&outcome.uri).await.record.unwrap();
    let stored: AuthenticatedMessage = serde_json::from_value(record.data).unwrap();
    assert!(stored.fully_verified());

    // Revocation is an explicit delete.
    assert!(h.data.delete(&outcome.uri).await.success);
    assert!(!h.data.read(&outcome.uri).await.success);
}

#[tokio::test]
async fn session_registration_requires_session_pubkey() {
    let h = harness();
    h.configure(json!({ "allowedOrigins": ["*"] })).await;

    let (msg, raw) = h.signed(json!({ "wrong": true }));
    let err = h
        .backend
        .register_session(&h.app_key_hex(), None, &msg, raw)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ValidationFailed");
}
