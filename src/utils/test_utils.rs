//! Shared fixtures for unit tests: an in-process HTTP responder and a
//! scriptable in-memory backend.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::api::{
    ApiError, Backend, Chat, LoginExchange, LoginResponse, Message, RelationshipStage, Role, User,
};
use crate::auth::Credentials;

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    content_type: &'static str,
    body: String,
}

impl MockResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.to_string(),
        }
    }
}

/// Answers one connection per scripted response, in order, and records
/// what each request looked like.
pub struct MockServer {
    addr: std::net::SocketAddr,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(responses: Vec<MockResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("local addr should resolve");
        let captured = Arc::new(Mutex::new(Vec::new()));
        let captured_for_server = Arc::clone(&captured);

        let task = tokio::spawn(async move {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let Ok(request) = read_http_request(&mut stream).await else {
                    return;
                };
                captured_for_server.lock().unwrap().push(request);
                let _ = write_http_response(&mut stream, &response).await;
            }
        });

        Self {
            addr,
            captured,
            task,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.captured.lock().unwrap().clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream.read(&mut chunk).await.map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.expect("header end should exist");
    let header_text =
        std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?
        .to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    for line in lines {
        let mut parts = line.splitn(2, ':');
        let Some(name) = parts.next() else {
            continue;
        };
        let value = parts.next().unwrap_or_default().trim().to_string();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
        headers.push((name.to_string(), value));
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length - body.len()];
        let read = stream.read(&mut chunk).await.map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP body".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    Ok(CapturedRequest {
        request_line,
        headers,
        body,
    })
}

async fn write_http_response(
    stream: &mut TcpStream,
    response: &MockResponse,
) -> std::io::Result<()> {
    let reason = reqwest::StatusCode::from_u16(response.status)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("Unknown");
    let payload = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        reason,
        response.content_type,
        response.body.len(),
        response.body
    );
    stream.write_all(payload.as_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await
}

/// A fixed bearer token.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(pub Option<String>);

impl Credentials for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

pub fn sample_user() -> User {
    User {
        user_id: Some("sub-1".to_string()),
        name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        picture: "https://example.com/ada.png".to_string(),
        relationship_stage: None,
    }
}

pub fn sample_chat(chat_id: &str, texts: &[&str]) -> Chat {
    Chat {
        chat_id: chat_id.to_string(),
        chat_title: Some("New Chat".to_string()),
        messages: texts
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let role = if index % 2 == 0 {
                    Role::User
                } else {
                    Role::Assistant
                };
                Message::new(role, *text)
            })
            .collect(),
        created_at: Some("2024-05-01T10:00:00".to_string()),
    }
}

/// In-memory backend with scripted answers and call counters.
#[derive(Default)]
pub struct FakeBackend {
    pub login: Mutex<Option<(u16, LoginResponse)>>,
    pub chat_lists: Mutex<VecDeque<Result<Vec<Chat>, ApiError>>>,
    pub created: Mutex<VecDeque<Chat>>,
    pub replies: Mutex<VecDeque<Vec<Message>>>,
    pub memories: Mutex<Vec<String>>,
    pub fail_memories: AtomicBool,
    pub memory_queries: Mutex<Vec<String>>,
    pub updated_user: Mutex<Option<User>>,
    pub list_calls: AtomicUsize,
    pub send_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub memory_calls: AtomicUsize,
    pub stage_calls: AtomicUsize,
    pub tokens_seen: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_chat_list(&self, chats: Vec<Chat>) {
        self.chat_lists.lock().unwrap().push_back(Ok(chats));
    }

    pub fn push_chat_list_error(&self, error: ApiError) {
        self.chat_lists.lock().unwrap().push_back(Err(error));
    }

    pub fn push_created(&self, chat: Chat) {
        self.created.lock().unwrap().push_back(chat);
    }

    pub fn push_reply(&self, messages: Vec<Message>) {
        self.replies.lock().unwrap().push_back(messages);
    }

    pub fn set_login(&self, status: u16, body: LoginResponse) {
        *self.login.lock().unwrap() = Some((status, body));
    }

    fn record_token(&self, token: &str) {
        self.tokens_seen.lock().unwrap().push(token.to_string());
    }
}

fn scripted_missing(what: &str) -> ApiError {
    ApiError::InvalidResponse(format!("no scripted {what}"))
}

#[async_trait]
impl Backend for FakeBackend {
    async fn exchange_code(
        &self,
        _code: &str,
        _redirect_uri: &str,
    ) -> Result<LoginExchange, ApiError> {
        let (status, body) = self
            .login
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| scripted_missing("login"))?;
        Ok(LoginExchange {
            status: reqwest::StatusCode::from_u16(status).expect("valid status"),
            body,
        })
    }

    async fn list_chats(&self, token: &str) -> Result<Vec<Chat>, ApiError> {
        self.record_token(token);
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut lists = self.chat_lists.lock().unwrap();
        // The last scripted list keeps answering.
        if lists.len() == 1 {
            if let Some(Ok(chats)) = lists.front() {
                return Ok(chats.clone());
            }
        }
        lists
            .pop_front()
            .unwrap_or_else(|| Err(scripted_missing("chat list")))
    }

    async fn create_chat(&self, token: &str, _message: Option<&str>) -> Result<Chat, ApiError> {
        self.record_token(token);
        self.created
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| scripted_missing("chat"))
    }

    async fn send_message(
        &self,
        token: &str,
        _chat_id: &str,
        _text: &str,
    ) -> Result<Vec<Message>, ApiError> {
        self.record_token(token);
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| scripted_missing("reply"))
    }

    async fn delete_chat(&self, token: &str, _chat_id: &str) -> Result<(), ApiError> {
        self.record_token(token);
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_memories(&self, token: &str, query: &str) -> Result<Vec<String>, ApiError> {
        self.record_token(token);
        self.memory_queries.lock().unwrap().push(query.to_string());
        self.memory_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_memories.load(Ordering::SeqCst) {
            return Err(ApiError::from_status(
                reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"detail":"memory store offline"}"#,
            ));
        }
        Ok(self.memories.lock().unwrap().clone())
    }

    async fn update_relationship(
        &self,
        token: &str,
        _stage: RelationshipStage,
    ) -> Result<Option<User>, ApiError> {
        self.record_token(token);
        self.stage_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.updated_user.lock().unwrap().clone())
    }
}
