//! Environment-sourced connection settings.
//!
//! Read once at startup and passed by value to whoever needs them — the
//! token provider and the broker client never reach into the environment
//! themselves.

use anyhow::{Result, bail};

use crate::consts::{DEFAULT_TOKEN_AUDIENCE, DEFAULT_TOKEN_URL, cluster_address};

/// Everything needed to reach a Camunda Cloud cluster.
#[derive(Debug, Clone)]
pub struct Settings {
    pub client_id: String,
    pub client_secret: String,
    /// Resolved broker base address (explicit override or cluster-derived).
    pub address: String,
    pub token_url: String,
    pub audience: String,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Tests pass a map here so they
    /// never mutate the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let Some(client_id) = get("ZEEBE_CLIENT_ID") else {
            bail!("ZEEBE_CLIENT_ID is not set");
        };
        let Some(client_secret) = get("ZEEBE_CLIENT_SECRET") else {
            bail!("ZEEBE_CLIENT_SECRET is not set");
        };

        let address = match get("ZEEBE_ADDRESS") {
            Some(address) => normalize_address(&address),
            None => {
                let Some(cluster_id) = get("CAMUNDA_CLUSTER_ID") else {
                    bail!("CAMUNDA_CLUSTER_ID is not set (and no ZEEBE_ADDRESS override)");
                };
                let Some(region) = get("CAMUNDA_REGION") else {
                    bail!("CAMUNDA_REGION is not set (and no ZEEBE_ADDRESS override)");
                };
                cluster_address(&cluster_id, &region)
            }
        };

        let token_url =
            get("ZEEBE_AUTHORIZATION_SERVER_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string());
        let audience =
            get("ZEEBE_TOKEN_AUDIENCE").unwrap_or_else(|| DEFAULT_TOKEN_AUDIENCE.to_string());

        Ok(Self {
            client_id,
            client_secret,
            address,
            token_url,
            audience,
        })
    }
}

/// Accept `host`, `host/`, or a full URL; always return a scheme-prefixed
/// address without a trailing slash.
fn normalize_address(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}
