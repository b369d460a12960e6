use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::io::ConfigError;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/oauth2callback";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the companion backend
    pub backend_url: Option<String>,
    /// Where the OAuth provider sends the browser back to
    pub redirect_uri: Option<String>,
    pub google_client_id: Option<String>,
    /// OAuth authorization endpoint
    pub authorize_url: Option<String>,
    /// Seconds between background chat list refreshes
    pub poll_interval_secs: Option<u64>,
    /// Show related memories under sent messages
    pub memories: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BackendUrl,
    RedirectUri,
    GoogleClientId,
    AuthorizeUrl,
    PollIntervalSecs,
    Memories,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 6] = [
        ConfigKey::BackendUrl,
        ConfigKey::RedirectUri,
        ConfigKey::GoogleClientId,
        ConfigKey::AuthorizeUrl,
        ConfigKey::PollIntervalSecs,
        ConfigKey::Memories,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::BackendUrl => "backend-url",
            ConfigKey::RedirectUri => "redirect-uri",
            ConfigKey::GoogleClientId => "google-client-id",
            ConfigKey::AuthorizeUrl => "authorize-url",
            ConfigKey::PollIntervalSecs => "poll-interval-secs",
            ConfigKey::Memories => "memories",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    /// Accepts both `backend-url` and `backend_url` spellings.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownKey(value.trim().to_string()))
    }
}

fn parse_http_url(key: ConfigKey, value: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue { key, reason };
    let url = Url::parse(value).map_err(|err| invalid(format!("'{value}' is not a URL: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("'{value}' must use http or https")));
    }
    Ok(value.to_string())
}

fn parse_switch(key: ConfigKey, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            reason: format!("'{value}' is not on or off"),
        }),
    }
}

impl Config {
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::InvalidValue {
                key,
                reason: "value is empty".to_string(),
            });
        }
        match key {
            ConfigKey::BackendUrl => {
                self.backend_url = Some(parse_http_url(key, value.trim_end_matches('/'))?)
            }
            ConfigKey::RedirectUri => self.redirect_uri = Some(parse_http_url(key, value)?),
            ConfigKey::AuthorizeUrl => self.authorize_url = Some(parse_http_url(key, value)?),
            ConfigKey::GoogleClientId => self.google_client_id = Some(value.to_string()),
            ConfigKey::PollIntervalSecs => {
                let secs = value
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs >= 1)
                    .ok_or_else(|| ConfigError::InvalidValue {
                        key,
                        reason: format!("'{value}' is not a whole number of seconds (at least 1)"),
                    })?;
                self.poll_interval_secs = Some(secs);
            }
            ConfigKey::Memories => self.memories = Some(parse_switch(key, value)?),
        }
        Ok(())
    }

    pub fn unset(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::BackendUrl => self.backend_url = None,
            ConfigKey::RedirectUri => self.redirect_uri = None,
            ConfigKey::GoogleClientId => self.google_client_id = None,
            ConfigKey::AuthorizeUrl => self.authorize_url = None,
            ConfigKey::PollIntervalSecs => self.poll_interval_secs = None,
            ConfigKey::Memories => self.memories = None,
        }
    }

    /// The stored value, as the user would type it.
    pub fn get(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::BackendUrl => self.backend_url.clone(),
            ConfigKey::RedirectUri => self.redirect_uri.clone(),
            ConfigKey::GoogleClientId => self.google_client_id.clone(),
            ConfigKey::AuthorizeUrl => self.authorize_url.clone(),
            ConfigKey::PollIntervalSecs => self.poll_interval_secs.map(|secs| secs.to_string()),
            ConfigKey::Memories => self
                .memories
                .map(|on| if on { "on" } else { "off" }.to_string()),
        }
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
