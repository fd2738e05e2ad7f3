//! The chat session state container.

use serde::Serialize;

use super::thread::{ChatThread, Role, ThreadId};
use crate::client::{ReplyGenerator, ReplyRequest};
use crate::error::Result;
use crate::profile::RequestProfile;

/// Assistant message appended when a reply cannot be obtained.
pub const APOLOGY_MESSAGE: &str =
    "I apologize, but I'm having trouble processing your request right now. Please try again later.";

/// Who is talking, attached to every outgoing reply request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub user_id: String,
    pub profile: Option<RequestProfile>,
}

/// How a send attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    /// Empty text or a reply already pending; nothing changed.
    Rejected,
    /// The collaborator's reply was appended.
    Replied,
    /// The collaborator failed; the apology was appended.
    Failed,
    /// The target thread was deleted before the reply arrived.
    Discarded,
}

/// A send that has been started but not yet resolved.
///
/// Produced by [`ChatSession::begin_send`] and consumed by
/// [`ChatSession::finish_send`].
#[derive(Debug)]
pub struct PendingReply {
    thread_id: ThreadId,
    request: ReplyRequest,
}

impl PendingReply {
    /// Thread the reply will be appended to.
    #[must_use]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Request to hand to the reply collaborator.
    #[must_use]
    pub fn request(&self) -> &ReplyRequest {
        &self.request
    }
}

/// All conversation state of one client.
///
/// Threads are kept newest first. There is always exactly one current
/// thread: deleting the last thread replaces it with a fresh one.
#[derive(Debug)]
pub struct ChatSession {
    threads: Vec<ChatThread>,
    current: ThreadId,
    pending: bool,
    draft: String,
    identity: Option<RequestIdentity>,
    next_thread_id: u64,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    /// Create a session holding one empty thread.
    #[must_use]
    pub fn new() -> Self {
        let first = ThreadId(1);
        Self {
            threads: vec![ChatThread::new(first)],
            current: first,
            pending: false,
            draft: String::new(),
            identity: None,
            next_thread_id: 2,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Thread management
    // ─────────────────────────────────────────────────────────────────────

    /// Create an empty thread, make it current and clear the draft.
    pub fn create_thread(&mut self) -> ThreadId {
        let id = ThreadId(self.next_thread_id);
        self.next_thread_id += 1;
        self.threads.insert(0, ChatThread::new(id));
        self.current = id;
        self.draft.clear();
        tracing::debug!(thread_id = %id, "Thread created");
        id
    }

    /// Make `id` current. Returns false (and changes nothing) if it does not exist.
    pub fn select_thread(&mut self, id: ThreadId) -> bool {
        if self.thread(id).is_none() {
            return false;
        }
        self.current = id;
        true
    }

    /// Retitle `id`. Returns false (and changes nothing) if it does not exist.
    pub fn rename_thread(&mut self, id: ThreadId, title: impl Into<String>) -> bool {
        match self.thread_mut(id) {
            Some(thread) => {
                thread.set_title(title);
                true
            }
            None => false,
        }
    }

    /// Remove `id`. If it was current, the newest remaining thread becomes
    /// current, or a fresh thread is created when none remain.
    pub fn delete_thread(&mut self, id: ThreadId) -> bool {
        let Some(index) = self.threads.iter().position(|t| t.id() == id) else {
            return false;
        };
        self.threads.remove(index);
        tracing::debug!(thread_id = %id, remaining = self.threads.len(), "Thread deleted");

        if self.current == id {
            match self.threads.first() {
                Some(newest) => self.current = newest.id(),
                None => {
                    self.create_thread();
                }
            }
        }
        true
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sending
    // ─────────────────────────────────────────────────────────────────────

    /// Send `text` on the current thread and wait for the reply.
    ///
    /// Failures of `generator` never escape: they become an apology message.
    /// The pending flag is cleared even if this future is dropped mid-flight.
    pub async fn send_message<G>(&mut self, text: &str, generator: &G) -> SendOutcome
    where
        G: ReplyGenerator + ?Sized,
    {
        let Some(pending) = self.begin_send(text) else {
            return SendOutcome::Rejected;
        };

        let guard = PendingGuard { session: self };
        let result = generator.generate_reply(pending.request()).await;
        guard.finish(pending, result)
    }

    /// First half of a send: validate, append the user message, mark pending.
    ///
    /// Returns `None` without touching state when `text` is blank or a reply
    /// is already pending.
    pub fn begin_send(&mut self, text: &str) -> Option<PendingReply> {
        if self.pending || text.trim().is_empty() {
            return None;
        }

        let thread_id = self.current;
        let thread = self.thread_mut(thread_id)?;
        thread.push(Role::User, text);

        self.pending = true;
        self.draft.clear();

        let (user_id, profile) = match &self.identity {
            Some(identity) => (Some(identity.user_id.clone()), identity.profile.clone()),
            None => (None, None),
        };
        tracing::debug!(thread_id = %thread_id, "Reply pending");

        Some(PendingReply {
            thread_id,
            request: ReplyRequest {
                message: text.to_string(),
                user_id,
                profile,
            },
        })
    }

    /// Second half of a send: append the reply (or the apology) and clear
    /// the pending flag.
    pub fn finish_send(&mut self, pending: PendingReply, result: Result<String>) -> SendOutcome {
        self.pending = false;

        let (content, outcome) = match result {
            Ok(reply) => (reply, SendOutcome::Replied),
            Err(e) => {
                tracing::warn!(
                    thread_id = %pending.thread_id,
                    error = %e,
                    "Reply generation failed"
                );
                (APOLOGY_MESSAGE.to_string(), SendOutcome::Failed)
            }
        };

        match self.thread_mut(pending.thread_id) {
            Some(thread) => {
                thread.push(Role::Assistant, content);
                outcome
            }
            None => {
                tracing::debug!(
                    thread_id = %pending.thread_id,
                    "Thread deleted before reply arrived"
                );
                SendOutcome::Discarded
            }
        }
    }

    /// Give up on an in-flight send without appending anything.
    pub fn abandon_send(&mut self) {
        self.pending = false;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Draft and identity
    // ─────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    #[must_use]
    pub fn identity(&self) -> Option<&RequestIdentity> {
        self.identity.as_ref()
    }

    /// Attach (or with `None`, detach) the user sent with reply requests.
    pub fn set_identity(&mut self, identity: Option<RequestIdentity>) {
        self.identity = identity;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// All threads, most recently created first.
    #[must_use]
    pub fn threads(&self) -> &[ChatThread] {
        &self.threads
    }

    #[must_use]
    pub fn thread(&self, id: ThreadId) -> Option<&ChatThread> {
        self.threads.iter().find(|t| t.id() == id)
    }

    #[must_use]
    pub fn current_id(&self) -> ThreadId {
        self.current
    }

    #[must_use]
    pub fn current_thread(&self) -> Option<&ChatThread> {
        self.thread(self.current)
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    fn thread_mut(&mut self, id: ThreadId) -> Option<&mut ChatThread> {
        self.threads.iter_mut().find(|t| t.id() == id)
    }
}

/// Clears the pending flag when dropped, so an abandoned send never leaves
/// the session waiting.
struct PendingGuard<'a> {
    session: &'a mut ChatSession,
}

impl PendingGuard<'_> {
    fn finish(self, pending: PendingReply, result: Result<String>) -> SendOutcome {
        self.session.finish_send(pending, result)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.session.abandon_send();
    }
}
