use serde::Deserialize;
use std::collections::HashMap;

use crate::config::Config;
use crate::services::oauth::{OAuthError, SocialUserInfo};
use crate::services::retry::RetryConfig;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Clone)]
pub struct GoogleOAuth {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: reqwest::Client,
    retry: RetryConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    email_verified: Option<bool>,
}

impl GoogleOAuth {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.google_redirect_uri.clone(),
            http,
            retry: RetryConfig::default(),
        }
    }

    /// Exchange an authorization code and resolve the account's profile.
    pub async fn exchange_code(&self, code: &str) -> Result<SocialUserInfo, OAuthError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(OAuthError::NotConfigured("Google"));
        }

        let mut params = HashMap::new();
        params.insert("code", code.to_string());
        params.insert("client_id", self.client_id.clone());
        params.insert("client_secret", self.client_secret.clone());
        params.insert("redirect_uri", self.redirect_uri.clone());
        params.insert("grant_type", "authorization_code".to_string());

        let token_resp = send_with_backoff(&self.retry, || {
            self.http.post(TOKEN_URL).form(&params)
        })
        .await
        .map_err(OAuthError::Exchange)?;

        if !token_resp.status().is_success() {
            return Err(OAuthError::Exchange(format!(
                "token request failed with status {}",
                token_resp.status()
            )));
        }

        let token: TokenResponse = token_resp
            .json()
            .await
            .map_err(|e| OAuthError::Exchange(e.to_string()))?;

        let user_resp = send_with_backoff(&self.retry, || {
            self.http.get(USERINFO_URL).bearer_auth(&token.access_token)
        })
        .await
        .map_err(OAuthError::UserInfo)?;

        if !user_resp.status().is_success() {
            return Err(OAuthError::UserInfo(format!(
                "userinfo request failed with status {}",
                user_resp.status()
            )));
        }

        let user: GoogleUserInfo = user_resp
            .json()
            .await
            .map_err(|e| OAuthError::UserInfo(e.to_string()))?;

        let email = user.email.ok_or(OAuthError::MissingEmail)?;

        Ok(SocialUserInfo {
            provider: "google",
            provider_user_id: user.sub,
            email,
            name: user.name,
            email_verified: user.email_verified.unwrap_or(false),
        })
    }
}

/// Retry transport-level failures with bounded backoff. HTTP error statuses
/// are returned to the caller untouched; only connect/timeout errors retry.
pub(super) async fn send_with_backoff<F>(
    retry: &RetryConfig,
    build: F,
) -> Result<reqwest::Response, String>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    loop {
        match build().timeout(retry.timeout()).send().await {
            Ok(resp) => return Ok(resp),
            Err(e) if retry.should_retry(attempt) => {
                tracing::warn!(attempt, error = %e, "provider request failed, retrying");
                tokio::time::sleep(retry.calculate_delay(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e.to_string()),
        }
    }
}
