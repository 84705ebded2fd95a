//! Warp credential auth: Firebase-style refresh-token exchange.
//!
//! A Warp [`gateway_core::Credential`] stores the Firebase refresh token in
//! `refresh_token` and the Firebase Web API key in `client_id` — the same
//! flat-row convention [`crate::vertex`] uses for its service-account
//! fields.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::AuthError;

const TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

/// Exchange a Firebase refresh token for a new ID token (used as the
/// bearer credential against Warp's backend) and a rotated refresh token.
#[tracing::instrument(skip_all)]
pub async fn refresh(
    client: &reqwest::Client,
    api_key: &str,
    refresh_token: &str,
) -> Result<(String, String, DateTime<Utc>), AuthError> {
    refresh_at(client, TOKEN_URL, api_key, refresh_token).await
}

async fn refresh_at(
    client: &reqwest::Client,
    token_url: &str,
    api_key: &str,
    refresh_token: &str,
) -> Result<(String, String, DateTime<Utc>), AuthError> {
    let resp = client
        .post(token_url)
        .query(&[("key", api_key)])
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await?;

    let status = resp.status().as_u16();
    if status != 200 {
        let text = resp.text().await.unwrap_or_default();
        return Err(AuthError::OAuth { status, message: text });
    }

    let data: FirebaseTokenResponse = resp.json().await?;
    let expires_in: i64 = data.expires_in.parse().unwrap_or(3600);
    let expires_at = Utc::now() + chrono::Duration::seconds(expires_in);
    Ok((data.id_token, data.refresh_token, expires_at))
}

#[derive(Deserialize)]
struct FirebaseTokenResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn refresh_parses_successful_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id_token": "warp-id-token",
                "refresh_token": "rotated-refresh",
                "expires_in": "3600",
                "token_type": "Bearer",
            })))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/v1/token", server.uri());
        let (id_token, refresh_token, expires_at) =
            refresh_at(&client, &url, "firebase-api-key", "old-refresh").await.unwrap();
        assert_eq!(id_token, "warp-id-token");
        assert_eq!(refresh_token, "rotated-refresh");
        assert!(expires_at > Utc::now());
    }

    #[tokio::test]
    async fn refresh_surfaces_error_on_revoked_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("TOKEN_EXPIRED"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/v1/token", server.uri());
        let err = refresh_at(&client, &url, "firebase-api-key", "old-refresh").await.unwrap_err();
        assert!(matches!(err, AuthError::OAuth { status: 400, .. }));
    }
}
