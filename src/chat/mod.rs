//! Chat widget controller.
//!
//! Owns the widget's visibility, the busy flag guarding the single in-flight
//! request, the capped message log with its durable user history, and the
//! keyword-driven quick-reply row.

pub mod history;
pub mod message;
pub mod quick_replies;
pub mod render;
pub mod session;

pub use history::{FileHistoryStore, HistoryStore, MemoryHistoryStore, MessageLog};
pub use message::{Message, MessageKind, Sender};
pub use session::{ChatSession, ChatView, PendingReply, Rejection, SessionState, SubmitOutcome};
