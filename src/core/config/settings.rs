use std::time::Duration;

use super::data::{
    Config, DEFAULT_BACKEND_URL, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_REDIRECT_URI,
};
use crate::auth::oauth::DEFAULT_AUTHORIZE_URL;

pub const BACKEND_URL_ENV_VAR: &str = "RAPPORT_BACKEND_URL";

/// Effective settings for one run: command line over environment over the
/// config file over built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend_url: String,
    pub redirect_uri: String,
    pub google_client_id: Option<String>,
    pub authorize_url: String,
    pub poll_interval: Duration,
    pub memories: bool,
}

impl Settings {
    pub fn resolve(config: &Config, cli_backend_url: Option<&str>, env_backend_url: Option<&str>) -> Self {
        let non_blank = |value: &&str| !value.trim().is_empty();
        let backend_url = cli_backend_url
            .filter(non_blank)
            .or(env_backend_url.filter(non_blank))
            .or(config.backend_url.as_deref())
            .unwrap_or(DEFAULT_BACKEND_URL)
            .trim()
            .to_string();

        Self {
            backend_url,
            redirect_uri: config
                .redirect_uri
                .clone()
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            google_client_id: config.google_client_id.clone(),
            authorize_url: config
                .authorize_url
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTHORIZE_URL.to_string()),
            poll_interval: Duration::from_secs(
                config
                    .poll_interval_secs
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
                    .max(1),
            ),
            memories: config.memories.unwrap_or(true),
        }
    }

    pub fn backend_url_from_env() -> Option<String> {
        std::env::var(BACKEND_URL_ENV_VAR).ok()
    }
}
