//! Chat sessions: the in-memory list, the calls that change it, and the
//! background refresh.
//!
//! Every mutation goes through [`ChatService`], which owns the shared
//! [`ChatStore`]. User actions and the poller write the same store without
//! coordination beyond its mutex, so the last write wins.

pub mod poller;
pub mod store;

use futures_util::future::join_all;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, Backend, Chat, Message};
use crate::auth::Credentials;

pub use poller::{ChatPoller, PollEvent};
pub use store::{ChatLookupError, ChatStore};

#[derive(Debug)]
pub enum ChatError {
    NotAuthenticated,
    /// Another request for the chat list is still running.
    Busy,
    Api(ApiError),
    Lookup(ChatLookupError),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::NotAuthenticated => {
                f.write_str("Not logged in. Run `rapport login` first.")
            }
            ChatError::Busy => f.write_str("Still waiting on the previous request"),
            ChatError::Api(err) => write!(f, "{err}"),
            ChatError::Lookup(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ChatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ChatError::NotAuthenticated | ChatError::Busy => None,
            ChatError::Api(err) => Some(err),
            ChatError::Lookup(err) => Some(err),
        }
    }
}

impl From<ApiError> for ChatError {
    fn from(err: ApiError) -> Self {
        ChatError::Api(err)
    }
}

impl From<ChatLookupError> for ChatError {
    fn from(err: ChatLookupError) -> Self {
        ChatError::Lookup(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// No token, so no request was made.
    Skipped,
    Unchanged,
    Changed(usize),
    /// A silent fetch failed; the error was logged and dropped.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    NoChatSelected,
    Busy,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Empty => f.write_str("Nothing to send"),
            SkipReason::NoChatSelected => {
                f.write_str("No chat is open. Use /new or /open first.")
            }
            SkipReason::Busy => f.write_str("Still waiting on the previous reply"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Sent(Vec<Message>),
    Skipped(SkipReason),
}

/// Marks a request in flight until dropped.
struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LoadingGuard(flag))
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct ChatService {
    backend: Arc<dyn Backend>,
    credentials: Arc<dyn Credentials>,
    store: Arc<Mutex<ChatStore>>,
    loading: Arc<AtomicBool>,
}

impl ChatService {
    pub fn new(backend: Arc<dyn Backend>, credentials: Arc<dyn Credentials>) -> Self {
        Self {
            backend,
            credentials,
            store: Arc::new(Mutex::new(ChatStore::new())),
            loading: Arc::new(AtomicBool::new(false)),
        }
    }

    fn store(&self) -> MutexGuard<'_, ChatStore> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn token(&self) -> Result<String, ChatError> {
        self.credentials
            .bearer_token()
            .ok_or(ChatError::NotAuthenticated)
    }

    pub fn snapshot(&self) -> ChatStore {
        self.store().clone()
    }

    pub fn with_store<R>(&self, f: impl FnOnce(&mut ChatStore) -> R) -> R {
        f(&mut self.store())
    }

    /// Loads the chat list. Silent fetches (polling) swallow failures after
    /// logging them at debug level.
    pub async fn fetch_chats(&self, silent: bool) -> Result<FetchOutcome, ChatError> {
        let Some(token) = self.credentials.bearer_token() else {
            warn!("No access token available; not fetching chats");
            return Ok(FetchOutcome::Skipped);
        };

        match self.backend.list_chats(&token).await {
            Ok(chats) => {
                let count = chats.len();
                if self.store().replace_if_changed(chats) {
                    debug!(count, silent, "Chat list updated");
                    Ok(FetchOutcome::Changed(count))
                } else {
                    Ok(FetchOutcome::Unchanged)
                }
            }
            Err(err) if silent => {
                debug!(error = %err, "Background chat refresh failed");
                Ok(FetchOutcome::Failed)
            }
            Err(err) => {
                error!(error = %err, "Error fetching chats");
                Err(err.into())
            }
        }
    }

    pub async fn create_chat(&self, message: Option<&str>) -> Result<Chat, ChatError> {
        let token = self.token()?;
        let message = message.map(str::trim).filter(|text| !text.is_empty());
        let Some(_guard) = LoadingGuard::acquire(&self.loading) else {
            debug!("Create skipped; a request is already in flight");
            return Err(ChatError::Busy);
        };

        let chat = self.backend.create_chat(&token, message).await.map_err(|err| {
            error!(error = %err, "Error creating new chat");
            err
        })?;
        info!(chat_id = %chat.chat_id, "Created chat");
        self.store().insert_new(chat.clone());
        Ok(chat)
    }

    /// Sends `text` to the open chat. At most one send is in flight; the
    /// user message and the reply come back from the backend and are
    /// appended together.
    pub async fn send_message(&self, text: &str) -> Result<SendOutcome, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Skipped(SkipReason::Empty));
        }
        let Some(chat_id) = self.store().current_id().map(str::to_owned) else {
            return Ok(SendOutcome::Skipped(SkipReason::NoChatSelected));
        };
        let token = self.token()?;
        let Some(_guard) = LoadingGuard::acquire(&self.loading) else {
            debug!(chat_id = %chat_id, "Send skipped; a request is already in flight");
            return Ok(SendOutcome::Skipped(SkipReason::Busy));
        };

        let messages = self
            .backend
            .send_message(&token, &chat_id, text)
            .await
            .map_err(|err| {
                error!(chat_id = %chat_id, error = %err, "Error sending message");
                err
            })?;
        if !self.store().append_messages(&chat_id, &messages) {
            warn!(chat_id = %chat_id, "Reply arrived for a chat no longer listed");
        }
        Ok(SendOutcome::Sent(messages))
    }

    /// Deletes a chat on the backend and locally. Returns whether it was
    /// the open chat.
    pub async fn delete_chat(&self, chat_id: &str) -> Result<bool, ChatError> {
        let token = self.token()?;
        self.backend.delete_chat(&token, chat_id).await.map_err(|err| {
            error!(chat_id = %chat_id, error = %err, "Error deleting chat");
            err
        })?;
        info!(chat_id = %chat_id, "Deleted chat");
        Ok(self.store().remove(chat_id))
    }

    pub fn select(&self, reference: &str) -> Result<Chat, ChatError> {
        Ok(self.store().select(reference)?)
    }

    pub fn resolve(&self, reference: &str) -> Result<Chat, ChatError> {
        Ok(self.store().resolve(reference)?.clone())
    }

    /// One lookup per call; results are never cached.
    pub async fn memories_for(&self, text: &str) -> Result<Vec<String>, ChatError> {
        let token = self.token()?;
        self.backend
            .fetch_memories(&token, text)
            .await
            .map_err(|err| {
                error!(error = %err, "Error fetching memories");
                err.into()
            })
    }

    /// Runs the lookups for several messages concurrently, in order.
    pub async fn memories_for_all(&self, texts: &[&str]) -> Vec<Result<Vec<String>, ChatError>> {
        join_all(texts.iter().map(|text| self.memories_for(text))).await
    }
}
