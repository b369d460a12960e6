//! Wire types exchanged with the companion backend and the HTTP client that
//! speaks to it.

pub mod client;
pub mod endpoints;
pub mod error;

pub use client::{Backend, BackendClient, LoginExchange};
pub use endpoints::Endpoints;
pub use error::ApiError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How close the user has chosen to be with the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipStage {
    #[default]
    Acquaintance,
    Friend,
    Girlfriend,
}

impl RelationshipStage {
    pub const ALL: [RelationshipStage; 3] = [
        RelationshipStage::Acquaintance,
        RelationshipStage::Friend,
        RelationshipStage::Girlfriend,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipStage::Acquaintance => "acquaintance",
            RelationshipStage::Friend => "friend",
            RelationshipStage::Girlfriend => "girlfriend",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RelationshipStage::Acquaintance => "Acquaintance",
            RelationshipStage::Friend => "Friend",
            RelationshipStage::Girlfriend => "Girlfriend",
        }
    }
}

impl fmt::Display for RelationshipStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStage(pub String);

impl fmt::Display for UnknownStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let valid: Vec<&str> = RelationshipStage::ALL.iter().map(|s| s.as_str()).collect();
        write!(
            f,
            "unknown relationship stage '{}' (expected one of: {})",
            self.0,
            valid.join(", ")
        )
    }
}

impl std::error::Error for UnknownStage {}

impl FromStr for RelationshipStage {
    type Err = UnknownStage;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        RelationshipStage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownStage(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub picture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_stage: Option<RelationshipStage>,
}

impl User {
    pub fn stage(&self) -> RelationshipStage {
        self.relationship_stage.unwrap_or_default()
    }
}

/// Message author. The backend labels assistant replies `bot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "bot")]
    Assistant,
}

impl Role {
    pub fn is_user(self) -> bool {
        self == Role::User
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub dominant: String,
    pub confidence: f64,
}

impl Sentiment {
    /// Confidence as a whole percentage, rounded half away from zero.
    pub fn percent(&self) -> i64 {
        (self.confidence * 100.0).round() as i64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: None,
            sentiment: None,
        }
    }
}

pub const UNTITLED_CHAT: &str = "New Chat";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub chat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_title: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Chat {
    /// Listing title: the opening message, falling back to a placeholder.
    pub fn title(&self) -> &str {
        self.messages
            .first()
            .map(|message| message.text.as_str())
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(UNTITLED_CHAT)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl LoginResponse {
    pub fn detail_text(&self) -> Option<String> {
        self.detail.as_ref().map(error::describe_detail)
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatsResponse {
    #[serde(default)]
    pub chats: Option<Vec<Chat>>,
}

#[derive(Debug, Serialize)]
pub struct NewChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct NewChatResponse {
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub chat_title: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub message: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct MemoriesResponse {
    #[serde(default)]
    pub memories: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateRelationshipRequest {
    pub stage: RelationshipStage,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRelationshipResponse {
    #[serde(default)]
    pub user: Option<User>,
}
