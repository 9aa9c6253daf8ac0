//! Backend port for the QA service.
//!
//! Defines the interface the conversation layer uses to talk to the remote
//! inference backend, decoupling the state machine from the HTTP transport.

use async_trait::async_trait;

use crate::chat::ChatMessage;
use crate::error::Result;
use crate::history::HistoryBuckets;

/// One turn submitted to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskRequest {
    /// The user's message, already trimmed.
    pub user_message: String,
    /// Present for logged-in users; guests ask anonymously.
    pub user_id: Option<String>,
    /// Present when continuing an already-persisted session.
    pub chat_id: Option<String>,
}

/// The backend's answer to one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotReply {
    /// The assistant's reply text.
    pub text: String,
    /// Set when the backend minted (or confirmed) a persisted session id.
    pub chat_id: Option<String>,
}

/// An abstract client for the remote QA backend.
///
/// Implementations are expected to be cheap to share (`Arc`) and to map
/// transport and status failures into [`crate::TanyaError`]. Callers own all
/// degradation policy; this trait only reports outcomes.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Submits a turn and returns the assistant's reply.
    async fn ask(&self, request: &AskRequest) -> Result<BotReply>;

    /// Fetches the bucketed chat history for a user.
    async fn history(&self, user_id: &str) -> Result<HistoryBuckets>;

    /// Fetches the full transcript of a persisted session, mapped to the
    /// transcript message shape in original order.
    async fn transcript(&self, chat_id: &str, user_id: &str) -> Result<Vec<ChatMessage>>;
}
