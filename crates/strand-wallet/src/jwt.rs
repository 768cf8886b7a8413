//! Access-token issuance and verification (HMAC-SHA256 JWTs).

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use strand_core::StrandError;

pub const TOKEN_TYPE_ACCESS: &str = "access";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: String,
}

/// Issue an access token for `username`, valid for `ttl_seconds`.
pub fn issue(secret: &str, username: &str, ttl_seconds: i64) -> Result<String, StrandError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        username: username.to_string(),
        iat: now,
        exp: now + ttl_seconds,
        token_type: TOKEN_TYPE_ACCESS.to_string(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| StrandError::Config(format!("JWT encoding failed: {e}")))
}

/// Verify a token's signature, expiry and type. An expired or malformed
/// token is `Unauthorized` before any backend is contacted.
pub fn verify(secret: &str, token: &str) -> Result<Claims, StrandError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| StrandError::Unauthorized(format!("invalid token: {e}")))?;
    if data.claims.token_type != TOKEN_TYPE_ACCESS {
        return Err(StrandError::Unauthorized("not an access token".into()));
    }
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn issue_and_verify() {
        let token = issue(SECRET, "alice", 3600).unwrap();
        let claims = verify(SECRET, &token).unwrap();
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.token_type, TOKEN_TYPE_ACCESS);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = issue(SECRET, "alice", 3600).unwrap();
        assert!(matches!(
            verify("another-secret-another-secret!!!", &token),
            Err(StrandError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let token = issue(SECRET, "alice", -120).unwrap();
        assert!(matches!(verify(SECRET, &token), Err(StrandError::Unauthorized(_))));
    }

    #[test]
    fn tampered_token_is_unauthorized() {
        let token = issue(SECRET, "alice", 3600).unwrap();
        let tampered = format!("{}x", token);
        assert!(verify(SECRET, &tampered).is_err());
    }
}
