use reqwest::StatusCode;
use std::error::Error as StdError;
use std::fmt;

/// Failures talking to the backend. None of these are retried.
#[derive(Debug)]
pub enum ApiError {
    /// The configured backend URL cannot carry API paths.
    InvalidBaseUrl { url: String, reason: String },
    /// The request never produced a response.
    Transport(reqwest::Error),
    /// The backend answered with a non-2xx status.
    Status { status: StatusCode, detail: String },
    /// A 2xx answer that does not look like what the endpoint promises.
    InvalidResponse(String),
}

impl ApiError {
    pub(crate) fn from_status(status: StatusCode, body: &str) -> Self {
        ApiError::Status {
            status,
            detail: detail_from_body(body),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidBaseUrl { url, reason } => {
                write!(f, "Invalid backend URL '{url}': {reason}")
            }
            ApiError::Transport(err) => write!(f, "Request failed: {err}"),
            ApiError::Status { status, detail } if detail.is_empty() => {
                write!(f, "Backend returned {status}")
            }
            ApiError::Status { status, detail } => {
                write!(f, "Backend returned {status}: {detail}")
            }
            ApiError::InvalidResponse(reason) => {
                write!(f, "Invalid response from server: {reason}")
            }
        }
    }
}

impl StdError for ApiError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ApiError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err)
    }
}

/// Pull a human-readable reason out of an error body. FastAPI-style bodies
/// carry a `detail` that is either a string or a list of validation errors.
pub(crate) fn detail_from_body(body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(detail) = value.get("detail") {
            return describe_detail(detail);
        }
        if let Some(message) = value.get("message").and_then(|v| v.as_str()) {
            return message.to_string();
        }
    }
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn describe_detail(detail: &serde_json::Value) -> String {
    match detail {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| {
                item.get("msg")
                    .and_then(|msg| msg.as_str())
                    .map(str::to_owned)
                    .unwrap_or_else(|| item.to_string())
            })
            .collect::<Vec<_>>()
            .join("; "),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
