use std::error::Error;
use std::fmt;

use crate::api::{Chat, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatLookupError {
    Empty,
    NoChats,
    IndexOutOfRange { index: usize, len: usize },
    NotFound(String),
    Ambiguous { reference: String, matches: usize },
}

impl fmt::Display for ChatLookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatLookupError::Empty => f.write_str("Specify a chat by number or id"),
            ChatLookupError::NoChats => f.write_str("No chats yet. Start one with `new`."),
            ChatLookupError::IndexOutOfRange { index, len } => {
                write!(f, "Chat #{index} does not exist (there are {len})")
            }
            ChatLookupError::NotFound(reference) => write!(f, "Chat '{reference}' not found"),
            ChatLookupError::Ambiguous { reference, matches } => write!(
                f,
                "'{reference}' matches {matches} chats; use more of the id"
            ),
        }
    }
}

impl Error for ChatLookupError {}

/// The client-side chat list plus the chat being viewed.
///
/// The current chat is held as its own copy, the way the list and the open
/// conversation are separate pieces of state. Refreshing the list refreshes
/// the copy when the same id is still listed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatStore {
    chats: Vec<Chat>,
    current: Option<Chat>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn current(&self) -> Option<&Chat> {
        self.current.as_ref()
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_ref().map(|chat| chat.chat_id.as_str())
    }

    /// Replaces the list when it differs from what is held. Returns whether
    /// anything changed.
    pub fn replace_if_changed(&mut self, chats: Vec<Chat>) -> bool {
        if self.chats == chats {
            return false;
        }
        if let Some(current) = self.current.as_mut() {
            // Never shrink the open conversation.
            if let Some(fresh) = chats.iter().find(|chat| chat.chat_id == current.chat_id) {
                if fresh.messages.len() >= current.messages.len() {
                    *current = fresh.clone();
                }
            }
        }
        self.chats = chats;
        true
    }

    /// Prepends a freshly created chat and opens it.
    pub fn insert_new(&mut self, chat: Chat) {
        self.chats.retain(|existing| existing.chat_id != chat.chat_id);
        self.current = Some(chat.clone());
        self.chats.insert(0, chat);
    }

    /// Appends to the listed chat and to the open one when it has the same
    /// id. Returns whether any chat took the messages.
    pub fn append_messages(&mut self, chat_id: &str, messages: &[Message]) -> bool {
        let mut found = false;
        if let Some(chat) = self.chats.iter_mut().find(|chat| chat.chat_id == chat_id) {
            chat.messages.extend_from_slice(messages);
            found = true;
        }
        if let Some(current) = self.current.as_mut().filter(|chat| chat.chat_id == chat_id) {
            current.messages.extend_from_slice(messages);
            found = true;
        }
        found
    }

    /// Drops a chat. Returns whether the open chat was the one removed.
    pub fn remove(&mut self, chat_id: &str) -> bool {
        self.chats.retain(|chat| chat.chat_id != chat_id);
        if self.current_id() == Some(chat_id) {
            self.current = None;
            return true;
        }
        false
    }

    /// Finds a chat by 1-based list position, exact id, or unique id prefix.
    pub fn resolve(&self, reference: &str) -> Result<&Chat, ChatLookupError> {
        let reference = reference.trim().trim_start_matches('#');
        if reference.is_empty() {
            return Err(ChatLookupError::Empty);
        }
        if self.chats.is_empty() {
            return Err(ChatLookupError::NoChats);
        }

        if let Ok(index) = reference.parse::<usize>() {
            if let Some(chat) = self.chats.iter().find(|chat| chat.chat_id == reference) {
                return Ok(chat);
            }
            return index
                .checked_sub(1)
                .and_then(|position| self.chats.get(position))
                .ok_or(ChatLookupError::IndexOutOfRange {
                    index,
                    len: self.chats.len(),
                });
        }

        if let Some(chat) = self.chats.iter().find(|chat| chat.chat_id == reference) {
            return Ok(chat);
        }
        let mut matches = self
            .chats
            .iter()
            .filter(|chat| chat.chat_id.starts_with(reference));
        match (matches.next(), matches.count()) {
            (Some(chat), 0) => Ok(chat),
            (Some(_), others) => Err(ChatLookupError::Ambiguous {
                reference: reference.to_string(),
                matches: others + 1,
            }),
            (None, _) => Err(ChatLookupError::NotFound(reference.to_string())),
        }
    }

    /// Opens the referenced chat and returns a copy of it.
    pub fn select(&mut self, reference: &str) -> Result<Chat, ChatLookupError> {
        let chat = self.resolve(reference)?.clone();
        self.current = Some(chat.clone());
        Ok(chat)
    }
}
