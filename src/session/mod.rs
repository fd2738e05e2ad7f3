//! Chat session management.
//!
//! This module holds the client-side conversation state: the list of chat
//! threads, which one is current, the unsent draft and whether a reply is
//! being awaited.
//!
//! # Architecture
//!
//! - [`ChatThread`]: a titled, append-only list of [`Message`]s
//! - [`ChatSession`]: owned state container with an explicit update interface
//! - [`SharedSession`]: lock-guarded handle for concurrent request handlers
//!
//! # Example
//!
//! ```rust
//! use policypal::session::ChatSession;
//!
//! let mut session = ChatSession::new();
//! let first = session.current_id();
//! let second = session.create_thread();
//!
//! session.delete_thread(second);
//! assert_eq!(session.current_id(), first);
//! assert_eq!(session.threads().len(), 1);
//! ```

mod manager;
mod shared;
mod thread;

pub use manager::{APOLOGY_MESSAGE, ChatSession, PendingReply, RequestIdentity, SendOutcome};
pub use shared::SharedSession;
pub use thread::{
    ChatThread, Message, MessageId, PLACEHOLDER_TITLE, Role, TITLE_CHARS, ThreadId, derive_title,
};
