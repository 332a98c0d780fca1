//! Conversation transcript
//!
//! The transcript is the canonical, ordered record of the conversation.
//! Insertion order is display order; entries are append-only except for the
//! in-place mutation the typing presenter performs on the newest bot turn.

pub mod storage;
pub mod types;

pub use storage::Transcript;
pub use types::{Role, Span, Turn, TurnBody, VideoCard, WebResult, NO_WEB_RESULTS_TEXT};
