//! A conversation with the related memories of each user message.

use tracing::debug;

use crate::api::{Chat, Message, Role};
use crate::core::chat::ChatService;
use crate::ui::render;

/// Renders `chat`, following each user message with its memories. Lookups
/// run concurrently, one per user message; failed ones are logged and left
/// out.
pub async fn with_memories(chats: &ChatService, chat: &Chat) -> String {
    let queries: Vec<&str> = chat
        .messages
        .iter()
        .filter(|message| message.role == Role::User)
        .map(|message| message.text.as_str())
        .collect();
    let mut lookups = chats.memories_for_all(&queries).await.into_iter();

    let mut out = format!("── {} ──\n", render::truncate(chat.title(), render::TITLE_WIDTH));
    if chat.messages.is_empty() {
        out.push_str("(no messages yet)\n");
    }
    for message in &chat.messages {
        out.push_str(&render::message(message));
        if message.role != Role::User {
            continue;
        }
        match lookups.next() {
            Some(Ok(memories)) => out.push_str(&render::memories(&memories)),
            Some(Err(err)) => debug!(error = %err, "Memory lookup failed"),
            None => {}
        }
    }
    out
}

/// Memories for a message just sent, keyed on the user message the backend
/// echoed back (`typed` when it echoed none). A failed lookup is logged and
/// renders as nothing, since the send itself went through.
pub async fn memories_after_send(chats: &ChatService, sent: &[Message], typed: &str) -> String {
    let query = sent
        .iter()
        .find(|message| message.role == Role::User)
        .map_or(typed.trim(), |message| message.text.as_str());
    match chats.memories_for(query).await {
        Ok(memories) => render::memories(&memories),
        Err(err) => {
            debug!(error = %err, "Memory lookup failed");
            String::new()
        }
    }
}
