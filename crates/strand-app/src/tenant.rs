//! Per-tenant configuration: shape, validation and merge rules.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use strand_core::StrandError;

/// Durable tenant configuration, persisted as a server-sealed message at
/// `mutable://accounts/{serverPubkey}/apps/{appKey}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAppConfig {
    pub app_key: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_public_key_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_client_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDef {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ActionValidation>,
    pub write: WriteTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<StringValidation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Write destination template. `encrypted` and `plain` are mutually
/// exclusive; [`WriteTarget::validate`] enforces exactly one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain: Option<String>,
}

impl WriteTarget {
    pub fn plain(template: impl Into<String>) -> Self {
        Self { encrypted: None, plain: Some(template.into()) }
    }

    pub fn encrypted(template: impl Into<String>) -> Self {
        Self { encrypted: Some(template.into()), plain: None }
    }

    /// `(template, is_encrypted)` after exclusivity validation.
    pub fn resolve(&self) -> Result<(&str, bool), StrandError> {
        match (&self.encrypted, &self.plain) {
            (Some(tmpl), None) => Ok((tmpl, true)),
            (None, Some(tmpl)) => Ok((tmpl, false)),
            _ => Err(StrandError::ValidationFailed(
                "action write must set exactly one of encrypted/plain".into(),
            )),
        }
    }
}

impl StoredAppConfig {
    pub fn empty(app_key: &str) -> Self {
        Self {
            app_key: app_key.to_string(),
            allowed_origins: Vec::new(),
            actions: Vec::new(),
            encryption_public_key_hex: None,
            google_client_id: None,
        }
    }

    pub fn action(&self, name: &str) -> Option<&ActionDef> {
        self.actions.iter().find(|a| a.action == name)
    }

    /// Configuration-time validation: write-target exclusivity, known string
    /// formats, and the rule that an encrypted action needs a tenant
    /// encryption key.
    pub fn validate(&self) -> Result<(), StrandError> {
        for def in &self.actions {
            let (_, encrypted) = def.write.resolve()?;
            if encrypted && self.encryption_public_key_hex.is_none() {
                return Err(StrandError::ValidationFailed(format!(
                    "action {} writes encrypted but the tenant has no encryptionPublicKeyHex",
                    def.action
                )));
            }
            if let Some(format) = def
                .validation
                .as_ref()
                .and_then(|v| v.string_value.as_ref())
                .and_then(|s| s.format.as_deref())
            {
                if format != "email" {
                    return Err(StrandError::ValidationFailed(format!(
                        "action {}: unknown string format {format}",
                        def.action
                    )));
                }
            }
        }
        Ok(())
    }

    /// Merge a partial update (top-level key overwrite) over this config and
    /// validate the result. `appKey` cannot be reassigned.
    pub fn merged_with(&self, update: &Value) -> Result<StoredAppConfig, StrandError> {
        let Some(update) = update.as_object() else {
            return Err(StrandError::ValidationFailed("config update must be an object".into()));
        };
        let mut base = serde_json::to_value(self)
            .map_err(|e| StrandError::Serialization(e.to_string()))?;
        let merged = base
            .as_object_mut()
            .expect("config serializes to an object");
        for (key, value) in update {
            merged.insert(key.clone(), value.clone());
        }

        let mut config: StoredAppConfig = serde_json::from_value(base)
            .map_err(|e| StrandError::ValidationFailed(format!("malformed config update: {e}")))?;
        config.app_key = self.app_key.clone();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subscribe_action() -> Value {
        json!({
            "action": "subscribe",
            "validation": { "stringValue": { "format": "email" } },
            "write": { "plain": "mutable://accounts/:key/subscribers/:signature" }
        })
    }

    #[test]
    fn merge_overwrites_top_level_keys() {
        let base = StoredAppConfig::empty("abcd");
        let merged = base
            .merged_with(&json!({
                "allowedOrigins": ["https://app.example.com"],
                "actions": [subscribe_action()],
            }))
            .unwrap();
        assert_eq!(merged.app_key, "abcd");
        assert_eq!(merged.allowed_origins, vec!["https://app.example.com"]);
        assert_eq!(merged.actions.len(), 1);

        // A later partial update keeps the untouched keys.
        let merged2 = merged.merged_with(&json!({ "googleClientId": "client-1" })).unwrap();
        assert_eq!(merged2.actions.len(), 1);
        assert_eq!(merged2.google_client_id.as_deref(), Some("client-1"));
    }

    #[test]
    fn app_key_cannot_be_reassigned() {
        let base = StoredAppConfig::empty("abcd");
        let merged = base.merged_with(&json!({ "appKey": "attacker" })).unwrap();
        assert_eq!(merged.app_key, "abcd");
    }

    #[test]
    fn encrypted_action_requires_tenant_encryption_key() {
        let base = StoredAppConfig::empty("abcd");
        let err = base
            .merged_with(&json!({
                "actions": [{
                    "action": "drop",
                    "write": { "encrypted": "mutable://inbox/:key/:signature" }
                }]
            }))
            .unwrap_err();
        assert!(err.to_string().contains("encryptionPublicKeyHex"));

        // With a key configured the same update is fine.
        base.merged_with(&json!({
            "encryptionPublicKeyHex": "ab".repeat(32),
            "actions": [{
                "action": "drop",
                "write": { "encrypted": "mutable://inbox/:key/:signature" }
            }]
        }))
        .unwrap();
    }

    #[test]
    fn write_target_exclusivity() {
        assert!(WriteTarget { encrypted: Some("a".into()), plain: Some("b".into()) }
            .resolve()
            .is_err());
        assert!(WriteTarget { encrypted: None, plain: None }.resolve().is_err());
        assert_eq!(WriteTarget::plain("x").resolve().unwrap(), ("x", false));
        assert_eq!(WriteTarget::encrypted("y").resolve().unwrap(), ("y", true));
    }

    #[test]
    fn unknown_string_format_is_rejected() {
        let base = StoredAppConfig::empty("abcd");
        let err = base
            .merged_with(&json!({
                "actions": [{
                    "action": "subscribe",
                    "validation": { "stringValue": { "format": "phone" } },
                    "write": { "plain": "mutable://open/x" }
                }]
            }))
            .unwrap_err();
        assert!(err.to_string().contains("unknown string format"));
    }
}
