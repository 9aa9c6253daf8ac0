//! The conversation state machine.
//!
//! `Conversation` is the single authority over the visible transcript, the
//! pending backend call, and the reveal animation. It mediates between user
//! intent, the QA backend, and the history store.
//!
//! Send cycle per session: `Idle → Composing → {Resolved | Failed} → Idle`.
//! A send while not `Idle` is rejected without a transition. Every wholesale
//! session transition (new chat, continued chat, sign-out) bumps a generation
//! counter; in-flight work re-checks the generation before mutating the
//! transcript and discards itself on mismatch, so a stale response can never
//! append onto an unrelated session.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::message::ChatMessage;
use super::model::{APOLOGY, ChatSession, GREETING};
use super::typewriter::{RevealSnapshot, Typewriter};
use crate::auth::{AuthSession, AuthState};
use crate::backend::{AskRequest, ChatBackend};
use crate::history::HistoryStore;

/// Timing knobs for the send cycle and the reveal animation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTiming {
    /// Pause between the optimistic user message and the pending placeholder.
    pub composing_delay: Duration,
    /// Interval between reveal steps.
    pub reveal_tick: Duration,
    /// Delay before re-reading history after a successful turn. The backend
    /// persists turns asynchronously; reading back too early misses them.
    pub history_refresh_delay: Duration,
}

impl Default for ChatTiming {
    fn default() -> Self {
        Self {
            composing_delay: Duration::from_millis(500),
            reveal_tick: Duration::from_millis(5),
            history_refresh_delay: Duration::from_millis(1500),
        }
    }
}

/// Where the active session is in its send cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPhase {
    /// No send in flight; input is accepted.
    Idle,
    /// A user message was accepted and its bot reply has not resolved yet.
    Composing,
}

/// Result of a `send_message` call, reported for the shell and for tests.
/// Failures degrade to the apology message; they are not errors to the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The bot reply arrived and was appended.
    Delivered,
    /// The backend failed; the apology was appended instead.
    Failed,
    /// Empty input or a send already in flight; nothing changed.
    Ignored,
    /// The session was switched away while the send was in flight; the
    /// response was discarded.
    Superseded,
}

struct ConversationInner {
    chat_id: Option<String>,
    messages: Vec<ChatMessage>,
    phase: SendPhase,
    generation: u64,
}

/// Owns the live transcript and orchestrates backend calls.
pub struct Conversation {
    state: RwLock<ConversationInner>,
    backend: Arc<dyn ChatBackend>,
    history: Arc<HistoryStore>,
    auth: Arc<AuthSession>,
    typewriter: Typewriter,
    timing: ChatTiming,
    /// The single pending scheduled history refresh, replaced on each send.
    refresh_slot: Mutex<Option<CancellationToken>>,
    sidebar_open: AtomicBool,
    narrow_viewport: AtomicBool,
}

impl Conversation {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        history: Arc<HistoryStore>,
        auth: Arc<AuthSession>,
        timing: ChatTiming,
    ) -> Self {
        let initial = ChatSession::fresh();
        Self {
            state: RwLock::new(ConversationInner {
                chat_id: initial.id,
                messages: initial.messages,
                phase: SendPhase::Idle,
                generation: 0,
            }),
            backend,
            history,
            auth,
            typewriter: Typewriter::new(timing.reveal_tick),
            timing,
            refresh_slot: Mutex::new(None),
            sidebar_open: AtomicBool::new(false),
            narrow_viewport: AtomicBool::new(false),
        }
    }

    // ============================================================================
    // User intents
    // ============================================================================

    /// Submits one turn to the backend.
    ///
    /// No-op on empty input or while a send is already in flight. Appends the
    /// user message immediately, shows the pending placeholder after the
    /// composing delay, and resolves to exactly one bot message — the reply
    /// on success, the fixed apology on failure. Exactly one backend call is
    /// issued per accepted invocation.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return SendOutcome::Ignored;
        }
        let auth = self.auth.state();
        if auth.loading {
            return SendOutcome::Ignored;
        }
        let user_id = auth.user_id();

        let generation = {
            let mut state = self.state.write().await;
            if state.phase != SendPhase::Idle {
                tracing::debug!("send already in flight, ignoring");
                return SendOutcome::Ignored;
            }
            state.phase = SendPhase::Composing;
            state.messages.push(ChatMessage::user(trimmed));
            state.generation
        };
        tracing::debug!(chars = trimmed.chars().count(), "user message accepted");

        // Perceived-latency pause before the placeholder appears.
        tokio::time::sleep(self.timing.composing_delay).await;

        let chat_id = {
            let mut state = self.state.write().await;
            if state.generation != generation {
                tracing::debug!("session switched during composing delay, dropping send");
                return SendOutcome::Superseded;
            }
            state.messages.push(ChatMessage::pending_bot());
            state.chat_id.clone()
        };

        let request = AskRequest {
            user_message: trimmed.to_string(),
            user_id: user_id.clone(),
            chat_id: chat_id.filter(|_| user_id.is_some()),
        };
        let reply = self.backend.ask(&request).await;

        let mut state = self.state.write().await;
        if state.generation != generation {
            tracing::debug!("session switched mid-request, discarding reply");
            return SendOutcome::Superseded;
        }
        state.messages.retain(|message| !message.pending);

        let outcome = match reply {
            Ok(reply) => {
                if user_id.is_some()
                    && state.chat_id.is_none()
                    && let Some(new_id) = reply.chat_id
                {
                    tracing::info!(chat_id = %new_id, "new chat session created");
                    state.chat_id = Some(new_id);
                }
                state.messages.push(ChatMessage::bot(reply.text));
                SendOutcome::Delivered
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to get bot response");
                state.messages.push(ChatMessage::bot(APOLOGY));
                SendOutcome::Failed
            }
        };
        state.phase = SendPhase::Idle;
        let reveal_index = state.messages.len() - 1;
        let content = state.messages[reveal_index].content.clone();
        drop(state);

        self.typewriter.start(reveal_index, content).await;

        if outcome == SendOutcome::Delivered
            && let Some(user_id) = user_id
        {
            self.schedule_history_refresh(user_id);
        }
        outcome
    }

    /// Resets to a fresh unsaved session holding only the greeting.
    /// Does not contact the backend.
    pub async fn start_new_chat(&self) {
        {
            let mut state = self.state.write().await;
            state.generation += 1;
            state.phase = SendPhase::Idle;
            state.chat_id = None;
            state.messages = vec![ChatMessage::bot(GREETING)];
        }
        self.typewriter.start(0, GREETING).await;
        self.close_sidebar_if_narrow();
        tracing::debug!("new chat started");
    }

    /// Replaces the active session with a persisted one from history.
    ///
    /// No-op for guests, while a send is in flight, or when the fetch fails —
    /// the current transcript is left untouched and only diagnostics are
    /// recorded.
    pub async fn continue_chat(&self, chat_id: &str) {
        let auth = self.auth.state();
        let Some(user_id) = auth.user_id() else {
            tracing::debug!("cannot continue chat, user not logged in");
            return;
        };
        let generation = {
            let state = self.state.read().await;
            if state.phase != SendPhase::Idle {
                tracing::debug!(chat_id, "send in flight, ignoring continue request");
                return;
            }
            state.generation
        };

        tracing::debug!(chat_id, "loading messages for chat");
        match self.backend.transcript(chat_id, &user_id).await {
            Ok(messages) => {
                let mut state = self.state.write().await;
                if state.generation != generation {
                    tracing::debug!(chat_id, "session switched mid-load, discarding transcript");
                    return;
                }
                state.generation += 1;
                state.chat_id = Some(chat_id.to_string());
                let count = messages.len();
                state.messages = messages;
                drop(state);

                // Restored content is shown in full, not re-revealed.
                self.typewriter.finish().await;
                self.close_sidebar_if_narrow();
                tracing::debug!(chat_id, count, "chat messages loaded");
            }
            Err(err) => {
                tracing::error!(chat_id, error = %err, "failed to load chat messages");
            }
        }
    }

    /// Manually re-reads the history sidebar. No-op for guests.
    pub async fn refresh_history(&self) {
        let auth = self.auth.state();
        if auth.loading {
            return;
        }
        let Some(user_id) = auth.user_id() else {
            tracing::debug!("cannot refresh history, user not logged in");
            return;
        };
        // Failure keeps the previous buckets; diagnostics were recorded.
        let _ = self.history.refresh(&user_id).await;
    }

    // ============================================================================
    // Auth transitions
    // ============================================================================

    /// Applies an auth transition: load history on sign-in, drop all per-user
    /// state on sign-out. Does nothing while the initial resolution pends.
    pub async fn on_auth_change(&self, auth: &AuthState) {
        if auth.loading {
            return;
        }
        match &auth.identity {
            Some(identity) => {
                tracing::info!(user_id = %identity.id, "user logged in, loading history");
                let _ = self.history.refresh(&identity.id).await;
            }
            None => {
                tracing::debug!("guest user, clearing per-user chat state");
                self.cancel_scheduled_refresh();
                self.history.clear().await;
                let mut state = self.state.write().await;
                state.generation += 1;
                state.phase = SendPhase::Idle;
                state.chat_id = None;
            }
        }
    }

    /// Forwards auth transitions into [`Self::on_auth_change`] for the
    /// lifetime of the session.
    pub fn spawn_auth_listener(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let conversation = Arc::clone(self);
        let mut updates = conversation.auth.subscribe();
        tokio::spawn(async move {
            loop {
                let state = updates.borrow_and_update().clone();
                conversation.on_auth_change(&state).await;
                if updates.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    // ============================================================================
    // Exposed state
    // ============================================================================

    /// Cloned snapshot of the active session.
    pub async fn session(&self) -> ChatSession {
        let state = self.state.read().await;
        ChatSession {
            id: state.chat_id.clone(),
            messages: state.messages.clone(),
        }
    }

    /// Cloned snapshot of the transcript.
    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.state.read().await.messages.clone()
    }

    /// The persisted session id, if any.
    pub async fn chat_id(&self) -> Option<String> {
        self.state.read().await.chat_id.clone()
    }

    /// Current send phase.
    pub async fn phase(&self) -> SendPhase {
        self.state.read().await.phase
    }

    /// Current reveal state, if a message is (or just finished) revealing.
    pub async fn reveal(&self) -> Option<RevealSnapshot> {
        self.typewriter.snapshot().await
    }

    /// The history cache backing the sidebar.
    pub fn history_store(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn sidebar_open(&self) -> bool {
        self.sidebar_open.load(Ordering::SeqCst)
    }

    pub fn toggle_sidebar(&self) {
        self.sidebar_open.fetch_xor(true, Ordering::SeqCst);
    }

    /// Told by the shell when the viewport crosses the narrow threshold;
    /// session switches auto-close the sidebar on narrow viewports.
    pub fn set_narrow_viewport(&self, narrow: bool) {
        self.narrow_viewport.store(narrow, Ordering::SeqCst);
    }

    // ============================================================================
    // Internals
    // ============================================================================

    fn close_sidebar_if_narrow(&self) {
        if self.narrow_viewport.load(Ordering::SeqCst) {
            self.sidebar_open.store(false, Ordering::SeqCst);
        }
    }

    fn cancel_scheduled_refresh(&self) {
        if let Some(token) = self.refresh_slot.lock().unwrap().take() {
            token.cancel();
        }
    }

    /// Schedules one delayed history refresh, replacing any pending one.
    fn schedule_history_refresh(&self, user_id: String) {
        let token = CancellationToken::new();
        if let Some(prior) = self.refresh_slot.lock().unwrap().replace(token.clone()) {
            prior.cancel();
        }
        let history = Arc::clone(&self.history);
        // Deadline anchored here, not at the task's first poll.
        let delay = tokio::time::sleep(self.timing.history_refresh_delay);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = delay => {
                    tracing::debug!(user_id = %user_id, "refreshing chat history after bot response");
                    let _ = history.refresh(&user_id).await;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Identity, InMemoryIdentityProvider};
    use crate::backend::BotReply;
    use crate::chat::message::MessageRole;
    use crate::error::{Result, TanyaError};
    use crate::history::{Bucket, HistoryBuckets, HistoryEntry};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;
    use tokio::time::advance;

    /// Scripted backend for driving the state machine.
    #[derive(Default)]
    struct MockBackend {
        ask_replies: Mutex<Vec<Result<BotReply>>>,
        ask_calls: AtomicUsize,
        history_calls: AtomicUsize,
        transcripts: Mutex<HashMap<String, Vec<ChatMessage>>>,
        buckets: Mutex<HistoryBuckets>,
        /// When set, `ask` signals `entered` and waits for `release`.
        gate: Option<Arc<Gate>>,
    }

    #[derive(Default)]
    struct Gate {
        entered: Notify,
        release: Notify,
    }

    impl MockBackend {
        fn with_reply(self, text: &str, chat_id: Option<&str>) -> Self {
            self.ask_replies.lock().unwrap().push(Ok(BotReply {
                text: text.to_string(),
                chat_id: chat_id.map(str::to_string),
            }));
            self
        }

        fn with_failure(self) -> Self {
            self.ask_replies
                .lock()
                .unwrap()
                .push(Err(TanyaError::backend(502, "bad gateway")));
            self
        }

        fn with_transcript(self, chat_id: &str, messages: Vec<ChatMessage>) -> Self {
            self.transcripts
                .lock()
                .unwrap()
                .insert(chat_id.to_string(), messages);
            self
        }

        fn gated(mut self, gate: Arc<Gate>) -> Self {
            self.gate = Some(gate);
            self
        }
    }

    #[async_trait]
    impl ChatBackend for MockBackend {
        async fn ask(&self, _request: &AskRequest) -> Result<BotReply> {
            self.ask_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
            self.ask_replies.lock().unwrap().remove(0)
        }

        async fn history(&self, _user_id: &str) -> Result<HistoryBuckets> {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.buckets.lock().unwrap().clone())
        }

        async fn transcript(&self, chat_id: &str, _user_id: &str) -> Result<Vec<ChatMessage>> {
            self.transcripts
                .lock()
                .unwrap()
                .get(chat_id)
                .cloned()
                .ok_or_else(|| TanyaError::not_found("chat", chat_id))
        }
    }

    fn identity() -> Identity {
        Identity {
            id: "uid-1".to_string(),
            display_name: Some("Budi".to_string()),
            email: Some("budi@contoh.id".to_string()),
            avatar_url: None,
        }
    }

    async fn logged_in_auth() -> Arc<AuthSession> {
        let provider = InMemoryIdentityProvider::new().with_signed_in(identity());
        let auth = Arc::new(AuthSession::new(Arc::new(provider)));
        auth.resolve().await.unwrap();
        auth
    }

    async fn guest_auth() -> Arc<AuthSession> {
        let auth = Arc::new(AuthSession::new(Arc::new(InMemoryIdentityProvider::new())));
        auth.resolve().await.unwrap();
        auth
    }

    fn conversation(backend: &Arc<MockBackend>, auth: Arc<AuthSession>) -> Arc<Conversation> {
        let backend: Arc<dyn ChatBackend> = Arc::clone(backend) as Arc<dyn ChatBackend>;
        let history = Arc::new(HistoryStore::new(Arc::clone(&backend)));
        Arc::new(Conversation::new(
            backend,
            history,
            auth,
            ChatTiming::default(),
        ))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_success_appends_user_then_bot_and_adopts_chat_id() {
        let backend = Arc::new(MockBackend::default().with_reply(
            "Pedoman edukasi adalah panduan belajar terstruktur.",
            Some("abc123"),
        ));
        let chat = conversation(&backend, logged_in_auth().await);

        let outcome = chat.send_message("Apa itu pedoman edukasi?").await;
        assert_eq!(outcome, SendOutcome::Delivered);

        let session = chat.session().await;
        assert_eq!(session.id.as_deref(), Some("abc123"));
        // greeting + user + bot, no leftover placeholder
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[1].role, MessageRole::User);
        assert_eq!(session.messages[1].content, "Apa itu pedoman edukasi?");
        assert_eq!(session.messages[2].role, MessageRole::Bot);
        assert_eq!(
            session.messages[2].content,
            "Pedoman edukasi adalah panduan belajar terstruktur."
        );
        assert!(session.messages.iter().all(|message| !message.pending));

        // The reveal targets the newly appended bot message
        let reveal = chat.reveal().await.unwrap();
        assert_eq!(reveal.message_index, 2);
        assert_eq!(backend.ask_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_appends_apology_and_returns_normally() {
        let backend = Arc::new(MockBackend::default().with_failure());
        let chat = conversation(&backend, guest_auth().await);

        let outcome = chat.send_message("halo").await;
        assert_eq!(outcome, SendOutcome::Failed);

        let transcript = chat.transcript().await;
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[2].content, APOLOGY);
        assert!(chat.chat_id().await.is_none());
        assert_eq!(chat.phase().await, SendPhase::Idle);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let backend = Arc::new(MockBackend::default());
        let chat = conversation(&backend, guest_auth().await);
        let before = chat.transcript().await;

        assert_eq!(chat.send_message("   ").await, SendOutcome::Ignored);
        assert_eq!(chat.transcript().await, before);
        assert_eq!(backend.ask_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_rejected_while_one_is_in_flight() {
        let gate = Arc::new(Gate::default());
        let backend = Arc::new(
            MockBackend::default()
                .with_reply("Baik.", None)
                .gated(Arc::clone(&gate)),
        );
        let chat = conversation(&backend, guest_auth().await);

        let in_flight = {
            let chat = Arc::clone(&chat);
            tokio::spawn(async move { chat.send_message("pertama").await })
        };
        gate.entered.notified().await;

        // Second send while Composing: no transcript change, no second call
        let length_before = chat.transcript().await.len();
        assert_eq!(chat.send_message("kedua").await, SendOutcome::Ignored);
        assert_eq!(chat.transcript().await.len(), length_before);

        gate.release.notify_one();
        assert_eq!(in_flight.await.unwrap(), SendOutcome::Delivered);
        assert_eq!(backend.ask_calls.load(Ordering::SeqCst), 1);

        // greeting + one user + one bot
        let transcript = chat.transcript().await;
        assert_eq!(transcript.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_new_chat_resets_to_greeting() {
        let backend = Arc::new(MockBackend::default().with_reply("Jawaban.", Some("abc123")));
        let chat = conversation(&backend, logged_in_auth().await);

        chat.send_message("halo").await;
        assert!(chat.chat_id().await.is_some());

        chat.start_new_chat().await;
        let session = chat.session().await;
        assert!(session.id.is_none());
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].content, GREETING);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continue_chat_replaces_transcript_wholesale() {
        let restored = vec![
            ChatMessage::restored(MessageRole::User, "Apa kabar?", "08:00"),
            ChatMessage::restored(MessageRole::Bot, "Baik, terima kasih!", "08:01"),
        ];
        let backend = Arc::new(MockBackend::default().with_transcript("xyz", restored.clone()));
        let chat = conversation(&backend, logged_in_auth().await);

        chat.continue_chat("xyz").await;
        let session = chat.session().await;
        assert_eq!(session.id.as_deref(), Some("xyz"));
        assert_eq!(session.messages, restored);
    }

    #[tokio::test]
    async fn test_continue_chat_is_noop_for_guests() {
        let backend =
            Arc::new(MockBackend::default().with_transcript("xyz", vec![ChatMessage::bot("isi")]));
        let chat = conversation(&backend, guest_auth().await);
        let before = chat.session().await;

        chat.continue_chat("xyz").await;
        assert_eq!(chat.session().await, before);
    }

    #[tokio::test]
    async fn test_continue_chat_failure_leaves_transcript_untouched() {
        let backend = Arc::new(MockBackend::default());
        let chat = conversation(&backend, logged_in_auth().await);
        let before = chat.session().await;

        chat.continue_chat("missing").await;
        assert_eq!(chat.session().await, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_reply_discarded_after_session_switch() {
        let gate = Arc::new(Gate::default());
        let backend = Arc::new(
            MockBackend::default()
                .with_reply("Jawaban basi.", Some("stale-id"))
                .gated(Arc::clone(&gate)),
        );
        let chat = conversation(&backend, logged_in_auth().await);

        let in_flight = {
            let chat = Arc::clone(&chat);
            tokio::spawn(async move { chat.send_message("pertanyaan lama").await })
        };
        gate.entered.notified().await;

        // Switch sessions while the reply is still in flight
        chat.start_new_chat().await;
        gate.release.notify_one();
        assert_eq!(in_flight.await.unwrap(), SendOutcome::Superseded);

        // The stale reply must not leak into the fresh session
        let session = chat.session().await;
        assert!(session.id.is_none());
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].content, GREETING);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_refresh_scheduled_after_successful_send() {
        let backend = Arc::new(MockBackend::default().with_reply("Jawaban.", Some("abc123")));
        let chat = conversation(&backend, logged_in_auth().await);

        chat.send_message("halo").await;
        assert_eq!(backend.history_calls.load(Ordering::SeqCst), 0);

        advance(ChatTiming::default().history_refresh_delay).await;
        settle().await;
        assert_eq!(backend.history_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_refresh_for_guests_or_failures() {
        let backend = Arc::new(MockBackend::default().with_reply("Jawaban.", None));
        let chat = conversation(&backend, guest_auth().await);
        chat.send_message("halo").await;

        advance(ChatTiming::default().history_refresh_delay * 2).await;
        settle().await;
        assert_eq!(backend.history_calls.load(Ordering::SeqCst), 0);

        let backend = Arc::new(MockBackend::default().with_failure());
        let chat = conversation(&backend, logged_in_auth().await);
        chat.send_message("halo").await;

        advance(ChatTiming::default().history_refresh_delay * 2).await;
        settle().await;
        assert_eq!(backend.history_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_clears_history_and_chat_id() {
        let backend = Arc::new(MockBackend::default().with_reply("Jawaban.", Some("abc123")));
        {
            let mut buckets = backend.buckets.lock().unwrap();
            buckets.today.push(HistoryEntry {
                id: "abc123".to_string(),
                title: "Percakapan".to_string(),
                message_count: Some(2),
                bucket: Bucket::Today,
            });
        }
        let chat = conversation(&backend, logged_in_auth().await);

        chat.send_message("halo").await;
        chat.refresh_history().await;
        assert_eq!(chat.chat_id().await.as_deref(), Some("abc123"));
        assert!(!chat.history_store().snapshot().await.is_empty());

        chat.on_auth_change(&AuthState {
            loading: false,
            identity: None,
        })
        .await;

        assert!(chat.chat_id().await.is_none());
        assert!(chat.history_store().snapshot().await.is_empty());
        // The pending delayed refresh was cancelled with the sign-out
        advance(ChatTiming::default().history_refresh_delay * 2).await;
        settle().await;
        assert!(chat.history_store().snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_auth_loading_defers_everything() {
        let auth = Arc::new(AuthSession::new(Arc::new(
            InMemoryIdentityProvider::new().with_signed_in(identity()),
        )));
        // resolve() not called: still loading
        let backend = Arc::new(MockBackend::default());
        let chat = conversation(&backend, auth);

        assert_eq!(chat.send_message("halo").await, SendOutcome::Ignored);
        chat.refresh_history().await;
        chat.on_auth_change(&AuthState {
            loading: true,
            identity: None,
        })
        .await;
        assert_eq!(backend.ask_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.history_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sidebar_closes_on_narrow_session_switch() {
        let backend = Arc::new(MockBackend::default());
        let chat = conversation(&backend, guest_auth().await);
        chat.toggle_sidebar();
        assert!(chat.sidebar_open());

        // Wide viewport: switching sessions keeps the sidebar open
        chat.start_new_chat().await;
        assert!(chat.sidebar_open());

        chat.set_narrow_viewport(true);
        chat.start_new_chat().await;
        assert!(!chat.sidebar_open());
    }
}
