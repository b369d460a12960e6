use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::{
    ApiError, Chat, ChatsResponse, Endpoints, LoginResponse, MemoriesResponse, Message,
    NewChatRequest, NewChatResponse, RelationshipStage, SendMessageRequest, SendMessageResponse,
    UpdateRelationshipRequest, UpdateRelationshipResponse, User,
};

const USER_AGENT: &str = concat!("rapport/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw result of the authorization-code exchange. The status is kept because
/// a failed exchange can still carry a usable user payload.
#[derive(Debug)]
pub struct LoginExchange {
    pub status: StatusCode,
    pub body: LoginResponse,
}

/// Every backend operation the client performs.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn exchange_code(&self, code: &str, redirect_uri: &str)
        -> Result<LoginExchange, ApiError>;

    async fn list_chats(&self, token: &str) -> Result<Vec<Chat>, ApiError>;

    async fn create_chat(&self, token: &str, message: Option<&str>) -> Result<Chat, ApiError>;

    async fn send_message(
        &self,
        token: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<Vec<Message>, ApiError>;

    async fn delete_chat(&self, token: &str, chat_id: &str) -> Result<(), ApiError>;

    async fn fetch_memories(&self, token: &str, query: &str) -> Result<Vec<String>, ApiError>;

    async fn update_relationship(
        &self,
        token: &str,
        stage: RelationshipStage,
    ) -> Result<Option<User>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let endpoints = Endpoints::new(base_url)?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { http, endpoints })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn authorized(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, "application/json")
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::from_status(status, &body));
    }
    serde_json::from_str(&body).map_err(|err| ApiError::InvalidResponse(err.to_string()))
}

async fn expect_success(response: Response) -> Result<(), ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_status(status, &body))
}

#[async_trait]
impl Backend for BackendClient {
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<LoginExchange, ApiError> {
        let url = self.endpoints.oauth_callback(code, redirect_uri);
        debug!(url = %self.endpoints.base(), "Exchanging authorization code");
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        let body = match serde_json::from_str::<LoginResponse>(&text) {
            Ok(body) => body,
            Err(_) if !status.is_success() => LoginResponse {
                detail: Some(serde_json::Value::String(super::error::detail_from_body(
                    &text,
                ))),
                ..LoginResponse::default()
            },
            Err(err) => return Err(ApiError::InvalidResponse(err.to_string())),
        };
        Ok(LoginExchange { status, body })
    }

    async fn list_chats(&self, token: &str) -> Result<Vec<Chat>, ApiError> {
        let request = self.authorized(self.http.get(self.endpoints.chats()), token);
        let response: ChatsResponse = read_json(request.send().await?).await?;
        Ok(response.chats.unwrap_or_default())
    }

    async fn create_chat(&self, token: &str, message: Option<&str>) -> Result<Chat, ApiError> {
        let request = self
            .authorized(self.http.post(self.endpoints.new_chat()), token)
            .json(&NewChatRequest { message });
        let response: NewChatResponse = read_json(request.send().await?).await?;
        let chat_id = response
            .chat_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("missing chat_id".to_string()))?;
        Ok(Chat {
            chat_id,
            chat_title: response.chat_title,
            messages: response.messages.unwrap_or_default(),
            created_at: response
                .created_at
                .or_else(|| Some(chrono::Utc::now().to_rfc3339())),
        })
    }

    async fn send_message(
        &self,
        token: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<Vec<Message>, ApiError> {
        let request = self
            .authorized(self.http.post(self.endpoints.chat_message(chat_id)), token)
            .json(&SendMessageRequest { message: text });
        let response: SendMessageResponse = read_json(request.send().await?).await?;
        Ok(response.messages)
    }

    async fn delete_chat(&self, token: &str, chat_id: &str) -> Result<(), ApiError> {
        let request = self.authorized(self.http.delete(self.endpoints.chat(chat_id)), token);
        expect_success(request.send().await?).await
    }

    async fn fetch_memories(&self, token: &str, query: &str) -> Result<Vec<String>, ApiError> {
        let request = self.authorized(self.http.get(self.endpoints.memories(query)), token);
        let response: MemoriesResponse = read_json(request.send().await?).await?;
        Ok(response.memories)
    }

    async fn update_relationship(
        &self,
        token: &str,
        stage: RelationshipStage,
    ) -> Result<Option<User>, ApiError> {
        let request = self
            .authorized(self.http.post(self.endpoints.update_relationship()), token)
            .json(&UpdateRelationshipRequest { stage });
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(None);
        }
        let parsed: UpdateRelationshipResponse =
            serde_json::from_str(&body).map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
        Ok(parsed.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Role;
    use crate::utils::test_utils::{MockResponse, MockServer};

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    #[tokio::test]
    async fn list_chats_sends_bearer_token() {
        let server = MockServer::start(vec![MockResponse::json(
            200,
            r#"{"chats":[{"chat_id":"c1","chat_title":"New Chat","messages":[{"role":"user","text":"hi","timestamp":"2024-01-01T00:00:00"}],"created_at":"2024-01-01T00:00:00"}]}"#,
        )])
        .await;
        let client = BackendClient::new(&server.base_url()).unwrap();

        let chats = client.list_chats("tok-123").await.unwrap();

        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].chat_id, "c1");
        assert_eq!(chats[0].title(), "hi");
        let requests = server.requests();
        assert_eq!(requests[0].request_line, "GET /api/chats HTTP/1.1");
        assert_eq!(
            header(&requests[0].headers, "authorization"),
            Some("Bearer tok-123")
        );
    }

    #[tokio::test]
    async fn list_chats_treats_missing_field_as_empty() {
        let server = MockServer::start(vec![MockResponse::json(200, "{}")]).await;
        let client = BackendClient::new(&server.base_url()).unwrap();
        assert!(client.list_chats("tok").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_chat_requires_chat_id() {
        let server = MockServer::start(vec![
            MockResponse::json(200, r#"{"chat_id":"c9","messages":[]}"#),
            MockResponse::json(200, r#"{"status":"ok"}"#),
        ])
        .await;
        let client = BackendClient::new(&server.base_url()).unwrap();

        let chat = client.create_chat("tok", None).await.unwrap();
        assert_eq!(chat.chat_id, "c9");
        assert!(chat.created_at.is_some());

        let err = client.create_chat("tok", Some("hello")).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));

        let requests = server.requests();
        assert_eq!(requests[0].request_line, "POST /api/chat/new HTTP/1.1");
        assert_eq!(requests[0].body_json(), serde_json::json!({}));
        assert_eq!(
            requests[1].body_json(),
            serde_json::json!({ "message": "hello" })
        );
    }

    #[tokio::test]
    async fn send_message_returns_appended_messages() {
        let server = MockServer::start(vec![MockResponse::json(
            200,
            r#"{"messages":[{"role":"user","text":"hey","timestamp":"a"},{"role":"bot","text":"hello!","timestamp":"b","sentiment":{"dominant":"joy","confidence":0.91}}]}"#,
        )])
        .await;
        let client = BackendClient::new(&server.base_url()).unwrap();

        let messages = client.send_message("tok", "c 1", "hey").await.unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].sentiment.as_ref().unwrap().dominant, "joy");
        let requests = server.requests();
        assert_eq!(
            requests[0].request_line,
            "POST /api/chat/c%201/message HTTP/1.1"
        );
        assert_eq!(requests[0].body_json(), serde_json::json!({ "message": "hey" }));
    }

    #[tokio::test]
    async fn delete_chat_surfaces_backend_detail() {
        let server = MockServer::start(vec![
            MockResponse::json(200, r#"{"status":"success"}"#),
            MockResponse::json(404, r#"{"detail":"Chat not found"}"#),
        ])
        .await;
        let client = BackendClient::new(&server.base_url()).unwrap();

        client.delete_chat("tok", "c1").await.unwrap();
        let err = client.delete_chat("tok", "c1").await.unwrap_err();

        assert!(matches!(
            err,
            ApiError::Status {
                status: StatusCode::NOT_FOUND,
                ..
            }
        ));
        assert!(err.to_string().ends_with("Chat not found"));
        assert_eq!(
            server.requests()[0].request_line,
            "DELETE /api/chat/c1 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn fetch_memories_encodes_query() {
        let server = MockServer::start(vec![MockResponse::json(
            200,
            r#"{"memories":["You like hiking","Your cat is called Miso"]}"#,
        )])
        .await;
        let client = BackendClient::new(&server.base_url()).unwrap();

        let memories = client.fetch_memories("tok", "my cat?").await.unwrap();

        assert_eq!(memories.len(), 2);
        assert_eq!(
            server.requests()[0].request_line,
            "GET /api/memories?query=my+cat%3F HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn exchange_code_keeps_failed_status_and_payload() {
        let server = MockServer::start(vec![
            MockResponse::json(
                400,
                r#"{"detail":"Authentication failed: Bad Request","user":{"email":"ada@example.com","name":"Ada","picture":""},"access_token":"jwt"}"#,
            ),
            MockResponse::text(502, "Bad gateway"),
        ])
        .await;
        let client = BackendClient::new(&server.base_url()).unwrap();

        let exchange = client
            .exchange_code("code-1", "http://localhost:3000/oauth2callback")
            .await
            .unwrap();
        assert_eq!(exchange.status, StatusCode::BAD_REQUEST);
        assert_eq!(exchange.body.user.unwrap().name, "Ada");

        let exchange = client
            .exchange_code("code-2", "http://localhost:3000/oauth2callback")
            .await
            .unwrap();
        assert_eq!(exchange.status, StatusCode::BAD_GATEWAY);
        assert_eq!(exchange.body.detail_text().as_deref(), Some("Bad gateway"));

        let line = &server.requests()[0].request_line;
        assert!(line.starts_with("GET /oauth2callback?code=code-1&redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Foauth2callback"));
    }

    #[tokio::test]
    async fn update_relationship_posts_stage() {
        let server = MockServer::start(vec![
            MockResponse::json(
                200,
                r#"{"user":{"email":"ada@example.com","name":"Ada","picture":"","relationship_stage":"friend"}}"#,
            ),
            MockResponse::json(200, ""),
        ])
        .await;
        let client = BackendClient::new(&server.base_url()).unwrap();

        let user = client
            .update_relationship("tok", RelationshipStage::Friend)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.stage(), RelationshipStage::Friend);
        assert!(client
            .update_relationship("tok", RelationshipStage::Girlfriend)
            .await
            .unwrap()
            .is_none());

        let requests = server.requests();
        assert_eq!(
            requests[0].request_line,
            "POST /api/update-relationship HTTP/1.1"
        );
        assert_eq!(
            requests[1].body_json(),
            serde_json::json!({ "stage": "girlfriend" })
        );
    }
}
