//! Vertex AI service-account auth: sign a JWT assertion with the
//! credential's private key and exchange it for a short-lived Google OAuth2
//! access token (RFC 7523 JWT-bearer grant).
//!
//! A Vertex [`gateway_core::Credential`] stores the service account's client
//! email in `client_id` and its PEM private key in `client_secret` — the
//! flat credential row has no per-vendor variant, so these fields do double
//! duty rather than gaining a Vertex-only struct.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::errors::AuthError;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const AUD: &str = "https://oauth2.googleapis.com/token";
const SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const ASSERTION_LIFETIME_SECONDS: i64 = 3600;

#[derive(Serialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Sign a JWT-bearer assertion for the given service account.
pub fn sign_assertion(client_email: &str, private_key_pem: &str) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        iss: client_email.to_string(),
        scope: SCOPE.to_string(),
        aud: AUD.to_string(),
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECONDS,
    };
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())?;
    let token = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)?;
    Ok(token)
}

/// Exchange a signed JWT assertion for a Google OAuth2 access token.
#[tracing::instrument(skip_all)]
pub async fn exchange_assertion(
    client: &reqwest::Client,
    client_email: &str,
    private_key_pem: &str,
) -> Result<(String, DateTime<Utc>), AuthError> {
    exchange_assertion_at(client, TOKEN_URL, client_email, private_key_pem).await
}

async fn exchange_assertion_at(
    client: &reqwest::Client,
    token_url: &str,
    client_email: &str,
    private_key_pem: &str,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let assertion = sign_assertion(client_email, private_key_pem)?;
    let resp = client
        .post(token_url)
        .form(&[
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", &assertion),
        ])
        .send()
        .await?;

    let status = resp.status().as_u16();
    if status != 200 {
        let text = resp.text().await.unwrap_or_default();
        return Err(AuthError::OAuth { status, message: text });
    }

    let data: TokenResponse = resp.json().await?;
    let expires_at = Utc::now() + chrono::Duration::seconds(data.expires_in);
    Ok((data.access_token, expires_at))
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}
