//! Cloneable, lock-guarded handle to a [`ChatSession`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::manager::{ChatSession, PendingReply, SendOutcome};
use super::thread::ThreadId;
use crate::client::ReplyGenerator;
use crate::error::Result;

/// Shared handle used by request handlers.
///
/// All mutations go through one mutex. A send holds the lock only to start
/// and to finish; while the reply is in flight the session stays available
/// for selecting, renaming and deleting threads or editing the draft.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<ChatSession>>,
}

impl SharedSession {
    #[must_use]
    pub fn new(session: ChatSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Run `f` against a read-only view of the session.
    pub fn read<R>(&self, f: impl FnOnce(&ChatSession) -> R) -> R {
        f(&self.lock())
    }

    /// Run `f` with exclusive access to the session.
    pub fn update<R>(&self, f: impl FnOnce(&mut ChatSession) -> R) -> R {
        f(&mut self.lock())
    }

    /// Send `text` on the current thread without holding the lock across
    /// the network call.
    ///
    /// Returns the thread the message targeted, which may no longer be
    /// current (or exist) once the reply has arrived.
    pub async fn send_message<G>(&self, text: &str, generator: &G) -> (ThreadId, SendOutcome)
    where
        G: ReplyGenerator + ?Sized,
    {
        let (target, pending) =
            self.update(|session| (session.current_id(), session.begin_send(text)));
        let Some(pending) = pending else {
            return (target, SendOutcome::Rejected);
        };

        let guard = SharedPendingGuard {
            session: self,
            armed: true,
        };
        let result = generator.generate_reply(pending.request()).await;
        (target, guard.finish(pending, result))
    }

    fn lock(&self) -> MutexGuard<'_, ChatSession> {
        // A panic while holding the lock cannot break the session's
        // invariants halfway, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct SharedPendingGuard<'a> {
    session: &'a SharedSession,
    armed: bool,
}

impl SharedPendingGuard<'_> {
    fn finish(mut self, pending: PendingReply, result: Result<String>) -> SendOutcome {
        self.armed = false;
        self.session
            .update(|session| session.finish_send(pending, result))
    }
}

impl Drop for SharedPendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("Send abandoned before reply, clearing pending flag");
            self.session.update(|session| session.abandon_send());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ReplyRequest;
    use crate::session::Role;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Collaborator that blocks until released.
    #[derive(Default)]
    struct GatedGenerator {
        gate: Notify,
    }

    #[async_trait]
    impl ReplyGenerator for GatedGenerator {
        async fn generate_reply(&self, request: &ReplyRequest) -> Result<String> {
            self.gate.notified().await;
            Ok(format!("re: {}", request.message))
        }
    }

    async fn wait_until_pending(session: &SharedSession) {
        for _ in 0..100 {
            if session.read(ChatSession::is_pending) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("send never became pending");
    }

    #[tokio::test]
    async fn test_session_usable_while_reply_pending() {
        let session = SharedSession::default();
        let generator = Arc::new(GatedGenerator::default());
        let origin = session.read(ChatSession::current_id);

        let task = {
            let session = session.clone();
            let generator = Arc::clone(&generator);
            tokio::spawn(async move { session.send_message("Hello", generator.as_ref()).await })
        };
        wait_until_pending(&session).await;

        // Other operations keep working; a second send is refused.
        let other = session.update(ChatSession::create_thread);
        assert!(session.update(|s| s.rename_thread(origin, "Renamed")));
        session.update(|s| s.set_draft("typing"));
        assert_eq!(
            session.send_message("again", generator.as_ref()).await,
            (other, SendOutcome::Rejected)
        );

        generator.gate.notify_one();
        // The reply is reported against the thread it was sent from.
        assert_eq!(task.await.unwrap(), (origin, SendOutcome::Replied));

        session.read(|s| {
            assert!(!s.is_pending());
            assert_eq!(s.current_id(), other);
            assert_eq!(s.draft(), "typing");
            let thread = s.thread(origin).unwrap();
            assert_eq!(thread.title(), "Renamed");
            assert_eq!(thread.messages().len(), 2);
            assert_eq!(thread.messages()[1].role, Role::Assistant);
            assert_eq!(thread.messages()[1].content, "re: Hello");
        });
    }

    #[tokio::test]
    async fn test_abandoned_send_clears_pending() {
        let session = SharedSession::default();
        let generator = Arc::new(GatedGenerator::default());

        let task = {
            let session = session.clone();
            let generator = Arc::clone(&generator);
            tokio::spawn(async move { session.send_message("Hello", generator.as_ref()).await })
        };
        wait_until_pending(&session).await;

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        session.read(|s| {
            assert!(!s.is_pending());
            // The user message stays; no assistant message was added.
            assert_eq!(s.current_thread().unwrap().messages().len(), 1);
        });
    }

    #[tokio::test]
    async fn test_reply_after_thread_deleted() {
        let session = SharedSession::default();
        let generator = Arc::new(GatedGenerator::default());
        let origin = session.read(ChatSession::current_id);

        let task = {
            let session = session.clone();
            let generator = Arc::clone(&generator);
            tokio::spawn(async move { session.send_message("Hello", generator.as_ref()).await })
        };
        wait_until_pending(&session).await;

        assert!(session.update(|s| s.delete_thread(origin)));
        generator.gate.notify_one();
        assert_eq!(task.await.unwrap(), (origin, SendOutcome::Discarded));

        session.read(|s| {
            assert!(!s.is_pending());
            assert!(s.thread(origin).is_none());
            assert_eq!(s.threads().len(), 1);
            assert_ne!(s.current_id(), ThreadId(0));
        });
    }
}
