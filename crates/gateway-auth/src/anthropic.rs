//! Anthropic PKCE OAuth: authorization URL construction, code exchange, and
//! refresh-token exchange against `console.anthropic.com`.
//!
//! Unlike the CLI flow this was adapted from, the gateway never persists
//! tokens to a local file — [`refresher::TokenRefresher`] writes the
//! refreshed access token straight back to the credential row via
//! `gateway-store`.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::AuthError;

/// Fixed OAuth client ID Anthropic issues to the Claude Code client.
pub const CLIENT_ID: &str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";
const AUTH_URL: &str = "https://console.anthropic.com/oauth/authorize";
const TOKEN_URL: &str = "https://console.anthropic.com/v1/oauth/token";
const REDIRECT_URI: &str = "https://console.anthropic.com/oauth/code/callback";
const SCOPES: &str = "org:create_api_key user:profile user:inference";

/// Tokens returned by a successful exchange or refresh.
#[derive(Clone, Debug, PartialEq)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Build the authorization URL an operator visits to grant the gateway
/// access during credential import.
#[must_use]
pub fn authorization_url(challenge: &str) -> String {
    format!(
        "{AUTH_URL}?response_type=code&client_id={}&redirect_uri={}&scope={}&code_challenge={challenge}&code_challenge_method=S256",
        urlencode(CLIENT_ID),
        urlencode(REDIRECT_URI),
        urlencode(SCOPES),
    )
}

/// Exchange an authorization code (plus its PKCE verifier) for tokens.
#[tracing::instrument(skip_all)]
pub async fn exchange_code(
    client: &reqwest::Client,
    code: &str,
    verifier: &str,
) -> Result<RefreshedTokens, AuthError> {
    let body = serde_json::json!({
        "grant_type": "authorization_code",
        "client_id": CLIENT_ID,
        "code": code,
        "redirect_uri": REDIRECT_URI,
        "code_verifier": verifier,
    });
    request_tokens(client, TOKEN_URL, &body).await
}

/// Exchange a refresh token for a new access token.
#[tracing::instrument(skip_all)]
pub async fn refresh(client: &reqwest::Client, refresh_token: &str) -> Result<RefreshedTokens, AuthError> {
    refresh_at(client, TOKEN_URL, refresh_token).await
}

async fn refresh_at(client: &reqwest::Client, token_url: &str, refresh_token: &str) -> Result<RefreshedTokens, AuthError> {
    let body = serde_json::json!({
        "grant_type": "refresh_token",
        "client_id": CLIENT_ID,
        "refresh_token": refresh_token,
    });
    request_tokens(client, token_url, &body).await
}

async fn request_tokens(
    client: &reqwest::Client,
    token_url: &str,
    body: &serde_json::Value,
) -> Result<RefreshedTokens, AuthError> {
    let resp = client.post(token_url).json(body).send().await?;
    let status = resp.status().as_u16();
    if status != 200 {
        let text = resp.text().await.unwrap_or_default();
        return Err(AuthError::OAuth { status, message: text });
    }
    let data: TokenResponse = resp.json().await?;
    Ok(RefreshedTokens {
        access_token: data.access_token,
        refresh_token: data.refresh_token,
        expires_at: Utc::now() + chrono::Duration::seconds(data.expires_in),
    })
}

/// Whether a bearer token string looks like an Anthropic OAuth access token
/// rather than a raw API key — the Anthropic Adapter uses this to decide
/// whether to send `Authorization: Bearer` plus the OAuth beta header.
#[must_use]
pub fn is_oauth_token(token: &str) -> bool {
    token.starts_with("sk-ant-oat")
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

fn urlencode(s: &str) -> String {
    s.replace('%', "%25")
        .replace(' ', "%20")
        .replace('&', "%26")
        .replace('=', "%3D")
        .replace('+', "%2B")
        .replace('/', "%2F")
        .replace(':', "%3A")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn is_oauth_token_detects_prefix() {
        assert!(is_oauth_token("sk-ant-oat-abc123"));
        assert!(!is_oauth_token("sk-ant-api-abc123"));
    }

    #[test]
    fn authorization_url_contains_pkce_challenge() {
        let url = authorization_url("challenge123");
        assert!(url.contains("response_type=code"));
        assert!(url.contains("code_challenge=challenge123"));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[tokio::test]
    async fn refresh_parses_successful_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "sk-ant-oat-new",
                "refresh_token": "new-refresh",
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/v1/oauth/token", server.uri());
        let tokens = refresh_at(&client, &url, "old-refresh").await.unwrap();
        assert_eq!(tokens.access_token, "sk-ant-oat-new");
        assert_eq!(tokens.refresh_token, "new-refresh");
    }

    #[tokio::test]
    async fn refresh_surfaces_oauth_error_on_non_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/v1/oauth/token", server.uri());
        let err = refresh_at(&client, &url, "old-refresh").await.unwrap_err();
        assert!(matches!(err, AuthError::OAuth { status: 401, .. }));
    }
}
