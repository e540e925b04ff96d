//! Async driver pairing a [`MeetingSession`] with a request transport.
//!
//! ARCHITECTURE
//! ============
//! The session sits behind `Arc<Mutex<_>>` so push deliveries, clock ticks and
//! in-flight mutations can interleave on one event loop. A mutation takes the
//! lock only for its optimistic write, releases it, then awaits the transport;
//! the lock is taken again only to record a failure. Push ticks are therefore
//! never blocked by a slow request.

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::follow::FollowMode;
use crate::model::PushTick;
use crate::request::MeetingRequest;
use crate::session::{MeetingSession, Notification, SessionError, SessionView};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The server refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),
    /// The request could not be delivered.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

// =============================================================================
// TRANSPORT TRAIT
// =============================================================================

/// Issues authoritative requests. Retries, if any, belong to the transport.
#[async_trait::async_trait]
pub trait MeetingTransport: Send + Sync {
    /// Deliver one request to the server.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the server rejects the request or it
    /// cannot be delivered.
    async fn send(&self, request: MeetingRequest) -> Result<(), TransportError>;
}

pub struct SessionController<T> {
    session: Arc<Mutex<MeetingSession>>,
    transport: Arc<T>,
}

impl<T> Clone for SessionController<T> {
    fn clone(&self) -> Self {
        Self { session: Arc::clone(&self.session), transport: Arc::clone(&self.transport) }
    }
}

impl<T: MeetingTransport> SessionController<T> {
    #[must_use]
    pub fn new(session: MeetingSession, transport: T) -> Self {
        Self { session: Arc::new(Mutex::new(session)), transport: Arc::new(transport) }
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn lock(&self) -> MutexGuard<'_, MeetingSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn apply_tick(&self, tick: PushTick) {
        self.lock().apply_tick(tick);
    }

    pub fn tick(&self) {
        self.lock().tick();
    }

    #[must_use]
    pub fn view(&self) -> SessionView {
        self.lock().view()
    }

    #[must_use]
    pub fn follow_mode(&self) -> FollowMode {
        self.lock().follow_mode()
    }

    pub fn set_following_leader(&self, following: bool) {
        self.lock().set_following_leader(following);
    }

    pub fn take_notifications(&self) -> Vec<Notification> {
        self.lock().take_notifications()
    }

    /// # Errors
    ///
    /// Local validation errors from [`MeetingSession::start_meeting`].
    /// Transport failures are queued as notifications instead.
    pub async fn start_meeting(&self) -> Result<(), SessionError> {
        let request = self.lock().start_meeting()?;
        self.dispatch(request).await;
        Ok(())
    }

    /// # Errors
    ///
    /// Local validation errors from [`MeetingSession::set_current_page`].
    pub async fn set_current_page(&self, new_page_id: &str, current_page_id: Option<&str>) -> Result<(), SessionError> {
        let request = self.lock().set_current_page(new_page_id, current_page_id)?;
        if let Some(request) = request {
            self.dispatch(request).await;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Local validation errors from [`MeetingSession::change_leader`].
    pub async fn change_leader(&self, new_leader_id: &str) -> Result<(), SessionError> {
        let request = self.lock().change_leader(new_leader_id)?;
        if let Some(request) = request {
            self.dispatch(request).await;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Local validation errors from [`MeetingSession::conclude_meeting`].
    pub async fn conclude_meeting(&self) -> Result<(), SessionError> {
        let request = self.lock().conclude_meeting()?;
        self.dispatch(request).await;
        Ok(())
    }

    /// Build an agenda edit against the current session and send it.
    ///
    /// # Errors
    ///
    /// Whatever `edit` returns.
    pub async fn send_agenda_edit<F>(&self, edit: F) -> Result<(), SessionError>
    where
        F: FnOnce(&MeetingSession) -> Result<MeetingRequest, SessionError>,
    {
        let request = edit(&self.lock())?;
        self.dispatch(request).await;
        Ok(())
    }

    async fn dispatch(&self, request: MeetingRequest) {
        let syscall = request.syscall();
        match self.transport.send(request.clone()).await {
            Ok(()) => tracing::debug!(syscall, "meeting request accepted"),
            Err(e) => self.lock().request_failed(&request, e.to_string()),
        }
    }
}
