//! OAuth2 client-credentials flow for Camunda Cloud.
//!
//! The cluster only talks to authenticated clients: every API call carries a
//! bearer token obtained from the login service with the client id/secret
//! pair. Tokens are cached until shortly before expiry.

use anyhow::{Result, bail};
use tokio::sync::Mutex;

use crate::config::Settings;

/// What the client-credentials grant needs.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub audience: String,
}

impl From<&Settings> for Credentials {
    fn from(settings: &Settings) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            token_url: settings.token_url.clone(),
            audience: settings.audience.clone(),
        }
    }
}

/// A bearer token obtained from the login service.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    /// Expiration timestamp in milliseconds since epoch.
    pub expires: u64,
}

impl AccessToken {
    pub fn is_expired(&self) -> bool {
        now_ms() >= self.expires
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as u64
}

/// Fetches and caches access tokens for the broker client.
pub struct TokenProvider {
    http: reqwest::Client,
    credentials: Credentials,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            cached: Mutex::new(None),
        }
    }

    /// Return a valid bearer token, fetching a fresh one when the cached
    /// token is missing or about to expire.
    pub async fn bearer(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref()
            && !token.is_expired()
        {
            return Ok(token.token.clone());
        }

        let fresh = fetch_token(&self.http, &self.credentials).await?;
        let bearer = fresh.token.clone();
        *cached = Some(fresh);
        Ok(bearer)
    }
}

/// Exchange client credentials for an access token.
async fn fetch_token(http: &reqwest::Client, credentials: &Credentials) -> Result<AccessToken> {
    let form = [
        ("grant_type", "client_credentials"),
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
        ("audience", credentials.audience.as_str()),
    ];

    let resp = http.post(&credentials.token_url).form(&form).send().await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        bail!("token request failed ({}): {}", status, text);
    }

    let data: TokenResponse = resp.json().await?;

    // 5 minute buffer before expiry
    let expires = now_ms() + (data.expires_in * 1000).saturating_sub(5 * 60 * 1000);

    Ok(AccessToken {
        token: data.access_token,
        expires,
    })
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}
