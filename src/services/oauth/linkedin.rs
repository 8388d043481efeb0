use serde::Deserialize;
use std::collections::HashMap;

use crate::config::Config;
use crate::services::oauth::google::send_with_backoff;
use crate::services::oauth::{OAuthError, SocialUserInfo};
use crate::services::retry::RetryConfig;

const TOKEN_URL: &str = "https://www.linkedin.com/oauth/v2/accessToken";
const PROFILE_URL: &str = "https://api.linkedin.com/v2/me";
const EMAIL_URL: &str =
    "https://api.linkedin.com/v2/emailAddress?q=members&projection=(elements*(handle~))";

#[derive(Clone)]
pub struct LinkedInOAuth {
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
struct LinkedInProfile {
    id: String,
    #[serde(rename = "localizedFirstName")]
    first_name: Option<String>,
    #[serde(rename = "localizedLastName")]
    last_name: Option<String>,
}

impl LinkedInOAuth {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            client_id: config.linkedin_client_id.clone(),
            client_secret: config.linkedin_client_secret.clone(),
            redirect_uri: config.linkedin_redirect_uri.clone(),
            http,
            retry: RetryConfig::default(),
        }
    }

    pub async fn exchange_code(&self, code: &str) -> Result<SocialUserInfo, OAuthError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(OAuthError::NotConfigured("LinkedIn"));
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

        let profile_resp = send_with_backoff(&self.retry, || {
            self.http
                .get(PROFILE_URL)
                .bearer_auth(&token.access_token)
                .header("X-Restli-Protocol-Version", "2.0.0")
        })
        .await
        .map_err(OAuthError::UserInfo)?;

        if !profile_resp.status().is_success() {
            return Err(OAuthError::UserInfo(format!(
                "profile request failed with status {}",
                profile_resp.status()
            )));
        }

        let profile: LinkedInProfile = profile_resp
            .json()
            .await
            .map_err(|e| OAuthError::UserInfo(e.to_string()))?;

        let email_resp = send_with_backoff(&self.retry, || {
            self.http
                .get(EMAIL_URL)
                .bearer_auth(&token.access_token)
                .header("X-Restli-Protocol-Version", "2.0.0")
        })
        .await
        .map_err(OAuthError::UserInfo)?;

        if !email_resp.status().is_success() {
            return Err(OAuthError::UserInfo(format!(
                "email request failed with status {}",
                email_resp.status()
            )));
        }

        let email_data: serde_json::Value = email_resp
            .json()
            .await
            .map_err(|e| OAuthError::UserInfo(e.to_string()))?;

        let email = email_data["elements"][0]["handle~"]["emailAddress"]
            .as_str()
            .map(str::to_string)
            .ok_or(OAuthError::MissingEmail)?;

        let name = match (&profile.first_name, &profile.last_name) {
            (None, None) => None,
            (first, last) => Some(
                format!(
                    "{} {}",
                    first.as_deref().unwrap_or(""),
                    last.as_deref().unwrap_or("")
                )
                .trim()
                .to_string(),
            ),
        };

        Ok(SocialUserInfo {
            provider: "linkedin",
            provider_user_id: profile.id,
            email,
            name,
            // LinkedIn only returns confirmed addresses on this endpoint.
            email_verified: true,
        })
    }
}
