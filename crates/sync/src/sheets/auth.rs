//! Google service-account authentication.
//!
//! Signs an RS256 JWT with the service account's private key and exchanges it
//! at the OAuth token endpoint for a short-lived bearer token.

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::SheetsError;
use crate::config::SheetsConfig;

/// OAuth scope granting read/write access to spreadsheets.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for the signed assertion, in seconds.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Access token obtained from the token endpoint.
#[derive(Debug, Clone)]
pub struct ServiceAccountToken {
    pub access_token: SecretString,
    /// Unix timestamp when the access token expires.
    pub expires_at: i64,
}

impl ServiceAccountToken {
    /// Check if the access token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        // Consider expired if less than 60 seconds remaining
        now >= self.expires_at - 60
    }
}

/// JWT claim set for the service-account assertion.
#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Token lifetime in seconds.
    expires_in: i64,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Sign the assertion for `config` issued at `now`.
fn sign_assertion(config: &SheetsConfig, now: i64) -> Result<String, SheetsError> {
    let claims = Claims {
        iss: &config.client_email,
        scope: SPREADSHEETS_SCOPE,
        aud: &config.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };

    let key = EncodingKey::from_rsa_pem(config.private_key.expose_secret().as_bytes())
        .map_err(|e| SheetsError::Auth(format!("Invalid service account key: {e}")))?;

    encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| SheetsError::Auth(format!("Failed to sign assertion: {e}")))
}

/// Exchange a freshly signed assertion for an access token.
///
/// # Errors
///
/// Returns `SheetsError::Auth` if the key cannot sign or the token endpoint
/// rejects the assertion, and `SheetsError::Http` on transport failure.
#[instrument(skip(client, config), fields(client_email = %config.client_email))]
pub async fn fetch_access_token(
    client: &reqwest::Client,
    config: &SheetsConfig,
) -> Result<ServiceAccountToken, SheetsError> {
    let now = chrono::Utc::now().timestamp();
    let assertion = sign_assertion(config, now)?;

    let response = client
        .post(&config.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
        .send()
        .await?;

    let status = response.status();

    if status.is_success() {
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SheetsError::Parse(format!("Invalid token response: {e}")))?;

        return Ok(ServiceAccountToken {
            access_token: SecretString::from(token.access_token),
            expires_at: now + token.expires_in,
        });
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let message = serde_json::from_str::<TokenErrorResponse>(&body)
        .ok()
        .and_then(|e| e.error_description.or(e.error))
        .unwrap_or(body);

    Err(SheetsError::Auth(format!("HTTP {status}: {message}")))
}
