//! PolicyPal chat session manager
//!
//! Client-side state for a chat assistant that answers questions about
//! government policies and schemes. A user keeps several conversation
//! threads, sends messages to a backend that generates replies, and may
//! attach a personal profile so replies can be personalised.
//!
//! # Architecture
//!
//! - **Session**: owned thread list, current thread, pending flag and draft
//! - **Client**: HTTP collaborator for reply generation and profile storage
//! - **Identity**: file-backed sign-up / sign-in store
//! - **Server**: local Axum API that a view layer renders from
//!
//! # Modules
//!
//! - [`session`]: Threads, messages and the session state machine
//! - [`client`]: Backend client and the [`client::ReplyGenerator`] seam
//! - [`profile`]: Account and policy profile models
//! - [`identity`]: Local accounts and the signed-in user
//! - [`server`]: HTTP routes over the shared session

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod profile;
pub mod server;
pub mod session;

use std::sync::Arc;

use client::ReplyGenerator;
use identity::IdentityStore;
use profile::ProfileStore;
use session::SharedSession;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The single chat session this process serves.
    pub session: SharedSession,
    /// Reply generation collaborator.
    pub replies: Arc<dyn ReplyGenerator>,
    /// Backend-held policy profiles.
    pub profiles: Arc<dyn ProfileStore>,
    /// Local accounts and the signed-in user.
    pub identity: Arc<IdentityStore>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("session", &self.session)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
