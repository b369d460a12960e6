//! Plain-text rendering of profiles, chat lists, conversations and the
//! related-memories block. Every function returns the text so callers
//! decide where it goes.

use chrono::{DateTime, Local, NaiveDateTime};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::api::{Chat, Message, Role, Sentiment, User};

pub const TITLE_WIDTH: usize = 48;
const USER_PREFIX: &str = "You: ";
const ASSISTANT_PREFIX: &str = "Companion: ";

/// Collapses whitespace to single spaces and cuts to `max_width` display
/// columns, ending in `…` when anything was dropped.
pub fn truncate(text: &str, max_width: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if UnicodeWidthStr::width(single_line.as_str()) <= max_width {
        return single_line;
    }

    let budget = max_width.saturating_sub(1);
    let mut out = String::new();
    let mut used = 0;
    for grapheme in single_line.graphemes(true) {
        let width = UnicodeWidthStr::width(grapheme);
        if used + width > budget {
            break;
        }
        used += width;
        out.push_str(grapheme);
    }
    out.truncate(out.trim_end().len());
    out.push('…');
    out
}

pub fn profile_header(user: &User) -> String {
    let name = if user.name.trim().is_empty() {
        user.email.as_str()
    } else {
        user.name.as_str()
    };
    if user.email.is_empty() || name == user.email {
        format!("{name} · Stage: {}", user.stage().label())
    } else {
        format!("{name} <{}> · Stage: {}", user.email, user.stage().label())
    }
}

/// Local time for RFC 3339 stamps, as-is for naive ones, raw otherwise.
pub fn timestamp(raw: &str) -> String {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

pub fn chat_list(chats: &[Chat], current_id: Option<&str>) -> String {
    if chats.is_empty() {
        return "No chats yet. Start one with /new.\n".to_string();
    }
    let index_width = chats.len().to_string().len();
    let mut out = String::new();
    for (index, chat) in chats.iter().enumerate() {
        let marker = if current_id == Some(chat.chat_id.as_str()) {
            '*'
        } else {
            ' '
        };
        let mut line = format!(
            "{marker} {:>index_width$}. {}",
            index + 1,
            truncate(chat.title(), TITLE_WIDTH)
        );
        let count = chat.messages.len();
        let noun = if count == 1 { "message" } else { "messages" };
        match chat.created_at.as_deref() {
            Some(created) => line.push_str(&format!("  ({count} {noun}, {})", timestamp(created))),
            None => line.push_str(&format!("  ({count} {noun})")),
        }
        out.push_str(&line);
        out.push('\n');
    }
    out
}

pub fn sentiment(sentiment: &Sentiment) -> String {
    format!("Mood: {} ({}%)", sentiment.dominant, sentiment.percent())
}

fn prefixed(prefix: &str, text: &str) -> String {
    let indent = " ".repeat(UnicodeWidthStr::width(prefix));
    let mut out = String::new();
    for (index, line) in text.lines().enumerate() {
        out.push_str(if index == 0 { prefix } else { &indent });
        out.push_str(line);
        out.push('\n');
    }
    if out.is_empty() {
        out.push_str(prefix.trim_end());
        out.push('\n');
    }
    out
}

pub fn message(message: &Message) -> String {
    let prefix = match message.role {
        Role::User => USER_PREFIX,
        Role::Assistant => ASSISTANT_PREFIX,
    };
    let mut out = prefixed(prefix, &message.text);
    if let Some(mood) = &message.sentiment {
        out.push_str("  ");
        out.push_str(&sentiment(mood));
        out.push('\n');
    }
    out
}

/// Empty when there is nothing to show.
pub fn memories(memories: &[String]) -> String {
    if memories.is_empty() {
        return String::new();
    }
    let mut out = String::from("Related Memories:\n");
    for memory in memories {
        out.push_str(&format!("  • {memory}\n"));
    }
    out
}

pub fn conversation(chat: &Chat) -> String {
    let mut out = format!("── {} ──\n", truncate(chat.title(), TITLE_WIDTH));
    if chat.messages.is_empty() {
        out.push_str("(no messages yet)\n");
    }
    for entry in &chat.messages {
        out.push_str(&message(entry));
    }
    out
}

pub fn welcome() -> &'static str {
    "Welcome! Open a chat with /open <n> or start one with /new.\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RelationshipStage;
    use crate::utils::test_utils::{sample_chat, sample_user};

    #[test]
    fn truncate_respects_display_width() {
        assert_eq!(truncate("short", 48), "short");
        assert_eq!(truncate("line one\n  line two", 48), "line one line two");

        let long = "a".repeat(60);
        let cut = truncate(&long, 48);
        assert_eq!(UnicodeWidthStr::width(cut.as_str()), 48);
        assert!(cut.ends_with('…'));

        // Wide characters count double.
        let cut = truncate("日本語のテキスト", 7);
        assert_eq!(cut, "日本語…");
    }

    #[test]
    fn profile_header_shows_stage() {
        let mut user = sample_user();
        assert_eq!(
            profile_header(&user),
            "Ada Lovelace <ada@example.com> · Stage: Acquaintance"
        );
        user.name.clear();
        user.relationship_stage = Some(RelationshipStage::Friend);
        assert_eq!(profile_header(&user), "ada@example.com · Stage: Friend");
    }

    #[test]
    fn chat_list_marks_current_and_counts_messages() {
        let mut first = sample_chat("a", &["What should I cook tonight?", "Pasta."]);
        first.created_at = Some("2024-05-01T10:00:00".to_string());
        let mut second = sample_chat("b", &[]);
        second.created_at = None;

        let text = chat_list(&[first, second], Some("b"));

        assert_eq!(
            text,
            "  1. What should I cook tonight?  (2 messages, 2024-05-01 10:00)\n\
             * 2. New Chat  (0 messages)\n"
        );
        assert_eq!(chat_list(&[], None), "No chats yet. Start one with /new.\n");
    }

    #[test]
    fn message_renders_prefix_and_mood() {
        let mut entry = Message::new(Role::User, "I had a great day\nreally");
        entry.sentiment = Some(Sentiment {
            dominant: "joy".to_string(),
            confidence: 0.912,
        });
        assert_eq!(
            message(&entry),
            "You: I had a great day\n     really\n  Mood: joy (91%)\n"
        );
        assert_eq!(
            message(&Message::new(Role::Assistant, "Glad to hear it!")),
            "Companion: Glad to hear it!\n"
        );
    }

    #[test]
    fn memories_block_is_empty_without_items() {
        assert_eq!(memories(&[]), "");
        assert_eq!(
            memories(&["Has a cat named Tom".to_string()]),
            "Related Memories:\n  • Has a cat named Tom\n"
        );
    }

    #[test]
    fn conversation_lists_every_message() {
        let text = conversation(&sample_chat("a", &["hi", "hello"]));
        assert_eq!(text, "── hi ──\nYou: hi\nCompanion: hello\n");
        assert!(conversation(&sample_chat("b", &[])).contains("(no messages yet)"));
    }

    #[test]
    fn unparseable_timestamps_pass_through() {
        assert_eq!(timestamp("yesterday"), "yesterday");
        assert_eq!(timestamp("2024-05-01T10:00:00.123456"), "2024-05-01 10:00");
    }
}
