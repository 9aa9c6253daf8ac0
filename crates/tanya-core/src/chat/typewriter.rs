//! Typewriter reveal of bot replies.
//!
//! A cooperative, single-flight animation: at most one message is revealing
//! at any time, one character per tick. Starting a new reveal cancels the
//! prior one at its current position. The reveal is display-only state; the
//! full content is always present in the transcript the moment it arrives.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// The reveal progress of one message.
#[derive(Debug, Clone)]
struct Reveal {
    /// Serial of the `start` call that owns this reveal.
    serial: u64,
    /// Index of the revealing message within the transcript.
    message_index: usize,
    /// Full content being revealed.
    content: String,
    /// Number of characters currently visible.
    shown: usize,
    /// Set once the full content is visible.
    complete: bool,
}

/// Display-facing view of the current reveal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealSnapshot {
    pub message_index: usize,
    pub visible: String,
    pub complete: bool,
}

/// Drives the reveal animation for the active conversation.
pub struct Typewriter {
    state: Arc<RwLock<Option<Reveal>>>,
    tick: Duration,
    serial: AtomicU64,
    task: Mutex<Option<CancellationToken>>,
}

impl Typewriter {
    pub fn new(tick: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(None)),
            // tokio::time::interval panics on a zero period
            tick: tick.max(Duration::from_millis(1)),
            serial: AtomicU64::new(0),
            task: Mutex::new(None),
        }
    }

    /// Begins revealing `content` for the message at `message_index`,
    /// cancelling any reveal still in progress.
    pub async fn start(&self, message_index: usize, content: impl Into<String>) {
        let content = content.into();
        let serial = self.serial.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        if let Some(prior) = self.task.lock().unwrap().replace(token.clone()) {
            prior.cancel();
        }

        let total = content.chars().count();
        {
            let mut state = self.state.write().await;
            *state = Some(Reveal {
                serial,
                message_index,
                content,
                shown: 0,
                complete: total == 0,
            });
        }
        if total == 0 {
            return;
        }

        let state = Arc::clone(&self.state);
        // Created here so the tick cadence is anchored to the start call,
        // not to whenever the task gets its first poll.
        let mut interval = tokio::time::interval(self.tick);
        // The first interval tick fires immediately; skip it so each
        // character takes one full tick to appear.
        interval.tick().await;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let mut guard = state.write().await;
                        let Some(reveal) = guard.as_mut() else { break };
                        if reveal.serial != serial {
                            break;
                        }
                        reveal.shown += 1;
                        if reveal.shown >= total {
                            reveal.shown = total;
                            reveal.complete = true;
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Cancels any active reveal and shows its content in full.
    pub async fn finish(&self) {
        if let Some(token) = self.task.lock().unwrap().take() {
            token.cancel();
        }
        let mut state = self.state.write().await;
        if let Some(reveal) = state.as_mut() {
            reveal.shown = reveal.content.chars().count();
            reveal.complete = true;
        }
    }

    /// The current reveal, if any.
    pub async fn snapshot(&self) -> Option<RevealSnapshot> {
        self.state.read().await.as_ref().map(|reveal| RevealSnapshot {
            message_index: reveal.message_index,
            visible: reveal.content.chars().take(reveal.shown).collect(),
            complete: reveal.complete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Duration, advance};

    const TICK: Duration = Duration::from_millis(5);

    /// Yields until spawned reveal tasks have processed pending ticks.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_advances_one_char_per_tick() {
        let typewriter = Typewriter::new(TICK);
        typewriter.start(1, "halo").await;

        let snapshot = typewriter.snapshot().await.unwrap();
        assert_eq!(snapshot.visible, "");
        assert!(!snapshot.complete);

        advance(TICK).await;
        settle().await;
        assert_eq!(typewriter.snapshot().await.unwrap().visible, "h");

        advance(TICK).await;
        settle().await;
        assert_eq!(typewriter.snapshot().await.unwrap().visible, "ha");

        advance(TICK * 2).await;
        settle().await;
        let snapshot = typewriter.snapshot().await.unwrap();
        assert_eq!(snapshot.visible, "halo");
        assert!(snapshot.complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_reveal_cancels_prior_mid_flight() {
        let typewriter = Typewriter::new(TICK);
        typewriter.start(1, "pertama").await;
        advance(TICK * 3).await;
        settle().await;
        assert_eq!(typewriter.snapshot().await.unwrap().visible, "per");

        typewriter.start(2, "kedua").await;
        let snapshot = typewriter.snapshot().await.unwrap();
        assert_eq!(snapshot.message_index, 2);
        assert_eq!(snapshot.visible, "");

        advance(TICK * 5).await;
        settle().await;
        let snapshot = typewriter.snapshot().await.unwrap();
        assert_eq!(snapshot.visible, "kedua");
        assert!(snapshot.complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_shows_full_content() {
        let typewriter = Typewriter::new(TICK);
        typewriter.start(0, "selamat datang").await;
        advance(TICK).await;
        settle().await;

        typewriter.finish().await;
        let snapshot = typewriter.snapshot().await.unwrap();
        assert_eq!(snapshot.visible, "selamat datang");
        assert!(snapshot.complete);

        // No further ticks mutate a finished reveal
        advance(TICK * 3).await;
        settle().await;
        assert_eq!(typewriter.snapshot().await.unwrap().visible, "selamat datang");
    }

    #[tokio::test]
    async fn test_empty_content_completes_immediately() {
        let typewriter = Typewriter::new(TICK);
        typewriter.start(0, "").await;
        let snapshot = typewriter.snapshot().await.unwrap();
        assert!(snapshot.complete);
        assert_eq!(snapshot.visible, "");
    }
}
