//! OAuth token refresh for Google APIs
use anyhow::{Error, Result};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
}

/// Exchange a stored refresh token for a short lived access token.
pub async fn refresh_access_token(
    oauth_hostname: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<OAuthToken, Error> {
    let url = format!("{}/token", oauth_hostname.trim_end_matches('/'));
    let res = Client::new()
        .post(url)
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await?;
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("Token refresh failed: {} ({})", status, text);
    }
    let token: OAuthToken = serde_json::from_str(&text)?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refresh_access_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::UrlEncoded(
                "grant_type".into(),
                "refresh_token".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.token","expires_in":3599,"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let token = refresh_access_token(&server.url(), "id", "secret", "refresh")
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(token.access_token, "ya29.token");
        assert_eq!(token.expires_in, Some(3599));
    }

    #[tokio::test]
    async fn test_refresh_access_token_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let result = refresh_access_token(&server.url(), "id", "secret", "revoked").await;
        assert!(result.is_err());
    }
}
