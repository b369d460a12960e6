//! URL construction for every backend route.
//!
//! Paths are appended segment by segment so chat ids and query text are
//! percent-encoded and a trailing slash on the configured base URL never
//! produces `//` in the final request.

use reqwest::Url;

use super::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base = Url::parse(base_url.trim()).map_err(|err| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ApiError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "expected an http:// or https:// URL".to_string(),
            });
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Scheme, host and port of the backend; tokens are stored per origin.
    pub fn origin(&self) -> String {
        self.base.origin().ascii_serialization()
    }

    fn route(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn oauth_callback(&self, code: &str, redirect_uri: &str) -> Url {
        let mut url = self.route(&["oauth2callback"]);
        url.query_pairs_mut()
            .append_pair("code", code)
            .append_pair("redirect_uri", redirect_uri);
        url
    }

    pub fn chats(&self) -> Url {
        self.route(&["api", "chats"])
    }

    pub fn new_chat(&self) -> Url {
        self.route(&["api", "chat", "new"])
    }

    pub fn chat(&self, chat_id: &str) -> Url {
        self.route(&["api", "chat", chat_id])
    }

    pub fn chat_message(&self, chat_id: &str) -> Url {
        self.route(&["api", "chat", chat_id, "message"])
    }

    pub fn memories(&self, query: &str) -> Url {
        let mut url = self.route(&["api", "memories"]);
        url.query_pairs_mut().append_pair("query", query);
        url
    }

    pub fn update_relationship(&self) -> Url {
        self.route(&["api", "update-relationship"])
    }
}
