//! Transient user notifications.
//!
//! A small leveled side channel for toast-style notices. Producers depend on
//! the [`Notifier`] trait; [`ChannelNotifier`] fans notices out over an
//! unbounded channel without ever blocking the producer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Severity of a transient notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One transient notice shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// How long the notice stays on screen. Errors linger longer.
    pub fn display_duration(&self) -> Duration {
        match self.level {
            NoticeLevel::Error => Duration::from_secs(5),
            _ => Duration::from_secs(3),
        }
    }
}

/// Sink for transient notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Forwards notices over an unbounded channel.
///
/// Non-blocking; if the receiver is gone the notice is dropped silently.
#[derive(Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        let _ = self.sender.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_notifier_delivers() {
        let (notifier, mut receiver) = ChannelNotifier::new();
        notifier.notify(Notice::success("Login berhasil! Selamat datang kembali."));

        let notice = receiver.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Success);
    }

    #[test]
    fn test_dropped_receiver_is_silent() {
        let (notifier, receiver) = ChannelNotifier::new();
        drop(receiver);
        // Must not panic or block
        notifier.notify(Notice::error("Login gagal. Periksa email dan password Anda."));
    }

    #[test]
    fn test_error_notices_linger_longer() {
        assert!(
            Notice::error("x").display_duration() > Notice::info("x").display_duration()
        );
    }
}
