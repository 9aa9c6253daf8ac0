//! Chat domain module.
//!
//! - `message`: transcript message types (`MessageRole`, `ChatMessage`)
//! - `model`: the active session model (`ChatSession`) and fixed copy
//! - `conversation`: the conversation state machine (`Conversation`)
//! - `typewriter`: the display-only reveal animation

mod conversation;
mod message;
mod model;
mod typewriter;

// Re-export public API
pub use conversation::{ChatTiming, Conversation, SendOutcome, SendPhase};
pub use message::{ChatMessage, MessageRole, display_time_now};
pub use model::{APOLOGY, ChatSession, GREETING};
pub use typewriter::{RevealSnapshot, Typewriter};
