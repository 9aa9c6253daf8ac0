//! Transcript message types.
//!
//! This module contains types for representing messages in the visible
//! transcript, including roles and the pending-placeholder state.

use serde::{Deserialize, Serialize};

/// Represents the author of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    /// Message typed by the user.
    User,
    /// Message produced by the assistant (or a client-side stand-in for one).
    Bot,
}

/// A single message in the visible transcript.
///
/// The transcript is append-only while a session is active and replaced
/// wholesale when switching sessions. A pending bot message is a placeholder
/// with empty content that is removed once the backend resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The author of the message.
    pub role: MessageRole,
    /// The content of the message. Empty while `pending` is set.
    pub content: String,
    /// Display-formatted local time ("HH:MM") the message entered the
    /// transcript, or the server-side time for restored messages.
    pub timestamp: String,
    /// Placeholder flag for a bot reply that has not arrived yet.
    #[serde(default)]
    pub pending: bool,
}

impl ChatMessage {
    /// Creates a user message stamped with the current local time.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: display_time_now(),
            pending: false,
        }
    }

    /// Creates a resolved bot message stamped with the current local time.
    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Bot,
            content: content.into(),
            timestamp: display_time_now(),
            pending: false,
        }
    }

    /// Creates the placeholder shown while a bot reply is in flight.
    pub fn pending_bot() -> Self {
        Self {
            role: MessageRole::Bot,
            content: String::new(),
            timestamp: display_time_now(),
            pending: true,
        }
    }

    /// Creates a message restored from a persisted transcript, keeping the
    /// server-provided timestamp.
    pub fn restored(role: MessageRole, content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: timestamp.into(),
            pending: false,
        }
    }
}

/// Current local time in the transcript's display format.
pub fn display_time_now() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}
