//! Google ID-token verification against the tokeninfo endpoint.

use serde::Deserialize;

use strand_core::StrandError;

const TOKEN_INFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, Clone)]
pub struct GoogleIdentity {
    pub subject: String,
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct GoogleVerifier {
    url: String,
    client: reqwest::Client,
}

impl Default for GoogleVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl GoogleVerifier {
    pub fn new() -> Self {
        Self { url: TOKEN_INFO_URL.to_string(), client: reqwest::Client::new() }
    }

    /// Point at a different tokeninfo endpoint (tests use a local stub).
    pub fn with_url(url: &str) -> Self {
        Self { url: url.to_string(), client: reqwest::Client::new() }
    }

    /// Exchange an ID token and require its audience to match the tenant's
    /// configured client id.
    pub async fn verify(
        &self,
        id_token: &str,
        expected_audience: &str,
    ) -> Result<GoogleIdentity, StrandError> {
        #[derive(Deserialize)]
        struct TokenInfo {
            aud: String,
            sub: String,
            email: Option<String>,
        }

        let resp = self
            .client
            .get(&self.url)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| StrandError::BackendUnavailable(format!("token verifier: {e}")))?;

        if !resp.status().is_success() {
            return Err(StrandError::Unauthorized("Google rejected the id token".into()));
        }
        let info: TokenInfo = resp
            .json()
            .await
            .map_err(|e| StrandError::Unauthorized(format!("malformed token info: {e}")))?;

        if info.aud != expected_audience {
            return Err(StrandError::Unauthorized("id token audience mismatch".into()));
        }
        Ok(GoogleIdentity { subject: info.sub, email: info.email })
    }
}
