//! Chat session domain model.

use serde::{Deserialize, Serialize};

use super::message::ChatMessage;

/// Fixed greeting shown at the start of every new chat.
pub const GREETING: &str = "Hai! Ada yang bisa Tanya bantu?";

/// Fixed apology appended when the backend cannot be reached.
pub const APOLOGY: &str =
    "Maaf, terjadi kesalahan saat menghubungi server. Silakan coba lagi nanti.";

/// One logical conversation as exposed to the presentational layer.
///
/// A session with no id is unsaved; the id is set the first time the backend
/// acknowledges a turn for a logged-in user, or when a persisted session is
/// continued from history. Exactly one session is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Backend-assigned identifier, unset until persisted.
    pub id: Option<String>,
    /// The visible transcript, in append order.
    pub messages: Vec<ChatMessage>,
}

impl ChatSession {
    /// A fresh unsaved session containing only the greeting.
    pub fn fresh() -> Self {
        Self {
            id: None,
            messages: vec![ChatMessage::bot(GREETING)],
        }
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::fresh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_session() {
        let session = ChatSession::fresh();
        assert!(session.id.is_none());
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].content, GREETING);
    }
}
