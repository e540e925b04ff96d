//! Meeting session state.
//!
//! SYSTEM CONTEXT
//! ==============
//! One `MeetingSession` per mounted meeting view. It owns the three optimistic
//! fields (meeting instance, current page id, page start time), the latest
//! agenda, and the leader/follower synchronizer, and is the only thing that
//! mutates them. Everything the presentation layer reads is derived from that
//! state on demand.
//!
//! DESIGN
//! ======
//! The session is sans-IO. A mutating operation writes its optimistic value
//! synchronously and returns the [`MeetingRequest`] the host must issue. Push
//! deliveries go through [`MeetingSession::apply_tick`], in arrival order.
//! Nothing captures request-time state, so a late response can never clobber a
//! newer optimistic write; the fields' policies and windows decide.
//!
//! A failed request is only reported ([`Notification::RequestFailed`]). The
//! optimistic value stays until the server contradicts it or its window
//! elapses, so transient failures retried by the transport do not flicker.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::agenda::{self, AgendaError};
use crate::clock::{Clock, Timestamp};
use crate::config::SyncConfig;
use crate::follow::{FollowMode, LeaderHandOff, Synchronizer};
use crate::model::{AgendaPage, CurrentUser, MeetingInstance, PageType, PushTick};
use crate::optimistic::{FieldPolicy, OptimisticField, Reconciliation};
use crate::request::MeetingRequest;
use crate::timer::{MeetingClock, PageClock};

// =============================================================================
// ERRORS AND NOTIFICATIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a meeting is already in progress")]
    MeetingAlreadyOngoing,
    #[error("no meeting in progress")]
    MeetingNotOngoing,
    #[error("page navigation disabled: {0}")]
    NavigationDisabled(NavigationBlock),
    #[error("unknown agenda page: {0}")]
    UnknownPage(String),
    #[error("current user may not change the meeting leader")]
    MissingLeaderPermission,
    #[error("meeting start not yet confirmed by the server")]
    AwaitingConfirmation,
    #[error(transparent)]
    Agenda(#[from] AgendaError),
}

/// User-facing events queued for the host to display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notification {
    /// Leadership moved to someone else within the running meeting.
    LeaderChanged(LeaderHandOff),
    /// The server contradicted an optimistic change.
    Rollback { field: &'static str },
    /// An authoritative request was rejected.
    RequestFailed { syscall: &'static str, message: String },
}

// =============================================================================
// NAVIGATION STATUS
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationBlock {
    /// Following the leader; unfollow to navigate independently.
    FollowingLeader,
    /// The meeting start has not been confirmed by the server yet.
    AwaitingConfirmation,
}

impl fmt::Display for NavigationBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FollowingLeader => f.write_str("unfollow the leader to navigate independently"),
            Self::AwaitingConfirmation => f.write_str("waiting for the meeting start to be confirmed"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NavigationStatus {
    Enabled,
    Disabled { reason: NavigationBlock },
}

impl NavigationStatus {
    #[must_use]
    pub fn is_disabled(self) -> bool {
        matches!(self, Self::Disabled { .. })
    }
}

/// Everything the presentation layer renders, derived at one instant.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub meeting_ongoing: bool,
    pub current_user_is_leader: bool,
    pub follow_mode: FollowMode,
    pub is_following_leader: bool,
    pub navigation: NavigationStatus,
    pub instance: Option<MeetingInstance>,
    pub page: Option<AgendaPage>,
    pub page_clock: Option<PageClock>,
    pub meeting_clock: Option<MeetingClock>,
}

// =============================================================================
// FIELD POLICIES
// =============================================================================

/// A running instance contradicts our override when it is not the one we
/// asserted: someone else won the start race, or a different instance exists.
fn instance_contradicted(persisted: &Option<MeetingInstance>, optimistic: &Option<MeetingInstance>) -> bool {
    let (Some(persisted), Some(optimistic)) = (persisted, optimistic) else {
        return false;
    };
    if optimistic.is_placeholder() {
        persisted.leader_id != optimistic.leader_id
    } else {
        persisted.id != optimistic.id
    }
}

/// Re-applies a confirmed instance's leader override on top of the latest
/// persisted instance, so the server's page, pause and alert state show through.
fn carry_leader_override(
    persisted: &Option<MeetingInstance>,
    optimistic: &Option<MeetingInstance>,
) -> Option<Option<MeetingInstance>> {
    let (Some(persisted), Some(optimistic)) = (persisted, optimistic) else {
        return None;
    };
    if optimistic.is_placeholder() || persisted.id != optimistic.id {
        return None;
    }
    let mut merged = persisted.clone();
    merged.leader_id.clone_from(&optimistic.leader_id);
    Some(Some(merged))
}

fn presence_changed<T>(previous: &Option<T>, next: &Option<T>) -> bool {
    previous.is_some() != next.is_some()
}

fn became_absent<T>(previous: &Option<T>, next: &Option<T>) -> bool {
    previous.is_some() && next.is_none()
}

// =============================================================================
// SESSION
// =============================================================================

pub struct MeetingSession {
    meeting_id: String,
    current_user: CurrentUser,
    pages: Vec<AgendaPage>,
    instance: OptimisticField<Option<MeetingInstance>>,
    page_id: OptimisticField<Option<String>>,
    page_start: OptimisticField<Option<Timestamp>>,
    sync: Synchronizer,
    clock: Arc<dyn Clock>,
    notifications: Vec<Notification>,
}

impl MeetingSession {
    #[must_use]
    pub fn new(meeting_id: impl Into<String>, current_user: CurrentUser, config: SyncConfig, clock: Arc<dyn Clock>) -> Self {
        let instance_policy = FieldPolicy { rollback: instance_contradicted, accept_immediately: presence_changed };
        let page_policy = FieldPolicy { accept_immediately: became_absent, ..FieldPolicy::never() };
        let page_start_policy = FieldPolicy { accept_immediately: became_absent, ..FieldPolicy::never() };
        Self {
            meeting_id: meeting_id.into(),
            current_user,
            pages: Vec::new(),
            instance: OptimisticField::new("meeting_instance", None, instance_policy, config.instance_rollback),
            page_id: OptimisticField::new("current_page_id", None, page_policy, config.page_rollback),
            page_start: OptimisticField::new("page_start_time", None, page_start_policy, config.page_start_rollback),
            sync: Synchronizer::new(),
            clock,
            notifications: Vec::new(),
        }
    }

    #[must_use]
    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    #[must_use]
    pub fn current_user(&self) -> &CurrentUser {
        &self.current_user
    }

    #[must_use]
    pub fn pages(&self) -> &[AgendaPage] {
        &self.pages
    }

    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Drain queued notifications.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    // -------------------------------------------------------------------------
    // push source
    // -------------------------------------------------------------------------

    pub fn apply_tick(&mut self, tick: PushTick) {
        let now = self.now();
        self.apply_tick_at(tick, now);
    }

    /// Apply one push delivery. Loading ticks are skipped.
    pub fn apply_tick_at(&mut self, tick: PushTick, now: Timestamp) {
        if tick.loading {
            tracing::trace!(meeting_id = %self.meeting_id, "skipping loading tick");
            self.refresh_at(now);
            return;
        }

        // Expire first so a stale override is not reported as contradicted.
        self.expire_at(now);

        let persisted_page_id = tick.meeting_instance.as_ref().and_then(|i| i.current_page_id.clone());
        let persisted_page_start = persisted_page_id
            .as_deref()
            .and_then(|id| tick.pages.iter().find(|p| p.id == id))
            .and_then(|p| p.timer.time_last_started);

        self.current_user = tick.current_user;
        self.pages = tick.pages;
        if let Err(e) = agenda::check_positions(&self.pages) {
            tracing::warn!(meeting_id = %self.meeting_id, error = %e, "agenda positions inconsistent");
        }

        let outcomes = [
            (self.instance.name(), self.instance.on_persisted_value_changed(tick.meeting_instance)),
            (self.page_id.name(), self.page_id.on_persisted_value_changed(persisted_page_id)),
            (self.page_start.name(), self.page_start.on_persisted_value_changed(persisted_page_start)),
        ];
        for (field, outcome) in outcomes {
            if outcome == Reconciliation::RolledBack {
                self.notifications.push(Notification::Rollback { field });
            }
        }
        self.instance.rebase(carry_leader_override);

        self.refresh_at(now);
    }

    pub fn tick(&mut self) {
        let now = self.now();
        self.tick_at(now);
    }

    /// Clock tick: expire stale overrides and re-derive leadership.
    pub fn tick_at(&mut self, now: Timestamp) {
        self.refresh_at(now);
    }

    fn expire_at(&mut self, now: Timestamp) {
        self.instance.expire_at(now);
        self.page_id.expire_at(now);
        self.page_start.expire_at(now);
    }

    fn refresh_at(&mut self, now: Timestamp) {
        self.expire_at(now);
        self.sync.observe(self.instance.get_at(now).as_ref(), &self.current_user.id);
        if let Some(handoff) = self.sync.observe_confirmed(self.instance.persisted().as_ref()) {
            self.notifications.push(Notification::LeaderChanged(handoff));
        }
    }

    // -------------------------------------------------------------------------
    // derived queries
    // -------------------------------------------------------------------------

    /// Instance as currently displayed (optimistic or persisted).
    #[must_use]
    pub fn instance_at(&self, now: Timestamp) -> Option<&MeetingInstance> {
        self.instance.get_at(now).as_ref()
    }

    #[must_use]
    pub fn is_meeting_ongoing(&self) -> bool {
        self.is_meeting_ongoing_at(self.now())
    }

    #[must_use]
    pub fn is_meeting_ongoing_at(&self, now: Timestamp) -> bool {
        self.instance_at(now).is_some()
    }

    #[must_use]
    pub fn current_user_is_leader(&self) -> bool {
        self.current_user_is_leader_at(self.now())
    }

    #[must_use]
    pub fn current_user_is_leader_at(&self, now: Timestamp) -> bool {
        self.instance_at(now).is_some_and(|i| i.leader_id == self.current_user.id)
    }

    #[must_use]
    pub fn follow_mode(&self) -> FollowMode {
        self.sync.mode()
    }

    #[must_use]
    pub fn is_following_leader(&self) -> bool {
        self.sync.is_following_leader()
    }

    #[must_use]
    pub fn page_navigation_status(&self) -> NavigationStatus {
        self.page_navigation_status_at(self.now())
    }

    #[must_use]
    pub fn page_navigation_status_at(&self, now: Timestamp) -> NavigationStatus {
        let Some(instance) = self.instance_at(now) else {
            return NavigationStatus::Enabled;
        };
        if !self.current_user_is_leader_at(now) && self.sync.is_following_leader() {
            return NavigationStatus::Disabled { reason: NavigationBlock::FollowingLeader };
        }
        if instance.is_placeholder() {
            return NavigationStatus::Disabled { reason: NavigationBlock::AwaitingConfirmation };
        }
        NavigationStatus::Enabled
    }

    /// Page id the leader/follower relation resolves to.
    #[must_use]
    pub fn effective_page_id_at(&self, now: Timestamp) -> Option<&str> {
        let broadcast = self.page_id.get_at(now).as_deref();
        self.sync.effective_page_id(broadcast, self.is_meeting_ongoing_at(now))
    }

    #[must_use]
    pub fn page_to_display(&self) -> Option<AgendaPage> {
        self.page_to_display_at(self.now())
    }

    /// The effective page if it is live, else the first live page.
    #[must_use]
    pub fn page_to_display_at(&self, now: Timestamp) -> Option<AgendaPage> {
        let page = self
            .effective_page_id_at(now)
            .and_then(|id| agenda::find_page(&self.pages, id))
            .or_else(|| agenda::first_page(&self.pages))?;
        Some(self.with_optimistic_start(page, now))
    }

    #[must_use]
    pub fn page_clock(&self, page_id: &str) -> Option<PageClock> {
        self.page_clock_at(page_id, self.now())
    }

    #[must_use]
    pub fn page_clock_at(&self, page_id: &str, now: Timestamp) -> Option<PageClock> {
        let page = agenda::find_page(&self.pages, page_id)?;
        Some(PageClock::at(&self.with_optimistic_start(page, now), now))
    }

    #[must_use]
    pub fn meeting_clock(&self) -> Option<MeetingClock> {
        self.meeting_clock_at(self.now())
    }

    #[must_use]
    pub fn meeting_clock_at(&self, now: Timestamp) -> Option<MeetingClock> {
        self.instance_at(now).map(|i| MeetingClock::at(i, &self.pages, now))
    }

    /// Copy of `page` whose start time reflects a just-issued page change.
    fn with_optimistic_start(&self, page: &AgendaPage, now: Timestamp) -> AgendaPage {
        let mut page = page.clone();
        if let Some(Some(started)) = self.page_start.optimistic_at(now)
            && self.page_id.get_at(now).as_deref() == Some(page.id.as_str())
        {
            page.timer.time_last_started = Some(*started);
        }
        page
    }

    pub fn view(&mut self) -> SessionView {
        let now = self.now();
        self.view_at(now)
    }

    /// Refresh, then derive every presentation query at `now`.
    pub fn view_at(&mut self, now: Timestamp) -> SessionView {
        self.refresh_at(now);
        let page = self.page_to_display_at(now);
        let page_clock = page.as_ref().map(|p| PageClock::at(p, now));
        SessionView {
            meeting_ongoing: self.is_meeting_ongoing_at(now),
            current_user_is_leader: self.current_user_is_leader_at(now),
            follow_mode: self.sync.mode(),
            is_following_leader: self.sync.is_following_leader(),
            navigation: self.page_navigation_status_at(now),
            instance: self.instance_at(now).cloned(),
            page,
            page_clock,
            meeting_clock: self.meeting_clock_at(now),
        }
    }

    // -------------------------------------------------------------------------
    // mutations
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// See [`Self::start_meeting_at`].
    pub fn start_meeting(&mut self) -> Result<MeetingRequest, SessionError> {
        let now = self.now();
        self.start_meeting_at(now)
    }

    /// Optimistically start the meeting with this user leading on the first
    /// page, under a placeholder instance id.
    ///
    /// # Errors
    ///
    /// [`SessionError::MeetingAlreadyOngoing`] if an instance is displayed.
    pub fn start_meeting_at(&mut self, now: Timestamp) -> Result<MeetingRequest, SessionError> {
        self.refresh_at(now);
        if self.is_meeting_ongoing_at(now) {
            return Err(SessionError::MeetingAlreadyOngoing);
        }

        let first_page_id = agenda::first_page(&self.pages).map(|p| p.id.clone());
        let placeholder =
            MeetingInstance::placeholder(&self.meeting_id, &self.current_user.id, first_page_id.clone(), now);
        tracing::info!(meeting_id = %self.meeting_id, instance_id = %placeholder.id, "starting meeting");

        self.instance.set_at(Some(placeholder), now);
        self.page_id.set_at(first_page_id.clone(), now);
        self.page_start.set_at(Some(now), now);
        if let Some(page_id) = first_page_id.as_deref() {
            self.sync.select_page(page_id);
        }
        self.refresh_at(now);

        Ok(MeetingRequest::StartMeeting { meeting_id: self.meeting_id.clone(), first_page_id })
    }

    /// # Errors
    ///
    /// See [`Self::set_current_page_at`].
    pub fn set_current_page(
        &mut self,
        new_page_id: &str,
        current_page_id: Option<&str>,
    ) -> Result<Option<MeetingRequest>, SessionError> {
        let now = self.now();
        self.set_current_page_at(new_page_id, current_page_id, now)
    }

    /// Navigate to `new_page_id`. A leader's change is optimistic and
    /// broadcast; anyone else's stays local.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownPage`] for pages that are missing or deleted,
    /// [`SessionError::NavigationDisabled`] while navigation is blocked.
    pub fn set_current_page_at(
        &mut self,
        new_page_id: &str,
        current_page_id: Option<&str>,
        now: Timestamp,
    ) -> Result<Option<MeetingRequest>, SessionError> {
        if current_page_id == Some(new_page_id) {
            return Ok(None);
        }
        self.refresh_at(now);
        if agenda::find_page(&self.pages, new_page_id).is_none() {
            return Err(SessionError::UnknownPage(new_page_id.to_owned()));
        }
        if let NavigationStatus::Disabled { reason } = self.page_navigation_status_at(now) {
            tracing::debug!(page_id = %new_page_id, %reason, "page navigation blocked");
            return Err(SessionError::NavigationDisabled(reason));
        }

        self.sync.select_page(new_page_id);
        if !(self.is_meeting_ongoing_at(now) && self.current_user_is_leader_at(now)) {
            return Ok(None);
        }

        tracing::debug!(meeting_id = %self.meeting_id, page_id = %new_page_id, "leader changing page");
        self.page_id.set_at(Some(new_page_id.to_owned()), now);
        self.page_start.set_at(Some(now), now);
        Ok(Some(MeetingRequest::SetCurrentPage {
            meeting_id: self.meeting_id.clone(),
            page_id: new_page_id.to_owned(),
            previous_page_id: current_page_id.map(str::to_owned),
        }))
    }

    /// # Errors
    ///
    /// See [`Self::change_leader_at`].
    pub fn change_leader(&mut self, new_leader_id: &str) -> Result<Option<MeetingRequest>, SessionError> {
        let now = self.now();
        self.change_leader_at(new_leader_id, now)
    }

    /// Hand leadership to `new_leader_id` (possibly this user).
    ///
    /// Only the leader id is overridden. Later pushes for the same instance
    /// keep their page, pause and alert state; the override re-applies the
    /// new leader on top until the server confirms it or the window elapses.
    ///
    /// # Errors
    ///
    /// [`SessionError::MeetingNotOngoing`] without a running meeting,
    /// [`SessionError::AwaitingConfirmation`] while the start is unconfirmed
    /// and [`SessionError::MissingLeaderPermission`] unless this user leads or
    /// holds leader permissions.
    pub fn change_leader_at(&mut self, new_leader_id: &str, now: Timestamp) -> Result<Option<MeetingRequest>, SessionError> {
        self.refresh_at(now);
        let Some(instance) = self.instance_at(now) else {
            return Err(SessionError::MeetingNotOngoing);
        };
        if instance.is_placeholder() {
            return Err(SessionError::AwaitingConfirmation);
        }
        if !(self.current_user.leader_permissions || self.current_user_is_leader_at(now)) {
            return Err(SessionError::MissingLeaderPermission);
        }
        if instance.leader_id == new_leader_id {
            return Ok(None);
        }

        let mut next = instance.clone();
        next.leader_id = new_leader_id.to_owned();
        tracing::info!(meeting_id = %self.meeting_id, leader_id = %new_leader_id, "changing meeting leader");
        self.instance.set_at(Some(next), now);
        self.refresh_at(now);

        Ok(Some(MeetingRequest::ChangeLeader {
            meeting_id: self.meeting_id.clone(),
            leader_id: new_leader_id.to_owned(),
        }))
    }

    /// # Errors
    ///
    /// See [`Self::conclude_meeting_at`].
    pub fn conclude_meeting(&mut self) -> Result<MeetingRequest, SessionError> {
        let now = self.now();
        self.conclude_meeting_at(now)
    }

    /// Optimistically end the meeting. The push source converges because a
    /// present-to-absent instance transition is accepted immediately.
    ///
    /// # Errors
    ///
    /// [`SessionError::MeetingNotOngoing`] without a running meeting.
    pub fn conclude_meeting_at(&mut self, now: Timestamp) -> Result<MeetingRequest, SessionError> {
        self.refresh_at(now);
        if !self.is_meeting_ongoing_at(now) {
            return Err(SessionError::MeetingNotOngoing);
        }
        tracing::info!(meeting_id = %self.meeting_id, "concluding meeting");
        self.instance.set_at(None, now);
        self.page_id.set_at(None, now);
        self.page_start.set_at(None, now);
        self.refresh_at(now);
        Ok(MeetingRequest::ConcludeMeeting { meeting_id: self.meeting_id.clone() })
    }

    pub fn set_following_leader(&mut self, following: bool) {
        let now = self.now();
        self.set_following_leader_at(following, now);
    }

    /// Stop or resume following the leader's page.
    pub fn set_following_leader_at(&mut self, following: bool, now: Timestamp) {
        self.refresh_at(now);
        let leader_page_id = self.page_id.get_at(now).clone();
        self.sync.set_following(following, leader_page_id.as_deref());
    }

    /// Report that the host's request was rejected. Optimistic state is left
    /// to its own rollback window.
    pub fn request_failed(&mut self, request: &MeetingRequest, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(syscall = request.syscall(), meeting_id = %self.meeting_id, %message, "meeting request failed");
        self.notifications.push(Notification::RequestFailed { syscall: request.syscall(), message });
    }

    // -------------------------------------------------------------------------
    // agenda edits
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// [`AgendaError`] for an invalid name.
    pub fn add_section(
        &self,
        name: &str,
        page_type: PageType,
        expected_duration_seconds: u32,
    ) -> Result<MeetingRequest, SessionError> {
        let name = agenda::validate_name(name)?;
        Ok(MeetingRequest::AddSection {
            meeting_id: self.meeting_id.clone(),
            name,
            page_type,
            expected_duration_seconds,
            position: agenda::next_position(&self.pages),
        })
    }

    /// # Errors
    ///
    /// [`AgendaError`] for an unknown page or an invalid name.
    pub fn rename_section(&self, page_id: &str, name: &str) -> Result<MeetingRequest, SessionError> {
        self.require_page(page_id)?;
        let name = agenda::validate_name(name)?;
        Ok(MeetingRequest::RenameSection { meeting_id: self.meeting_id.clone(), page_id: page_id.to_owned(), name })
    }

    /// # Errors
    ///
    /// [`AgendaError::UnknownPage`] for an unknown page.
    pub fn set_section_duration(
        &self,
        page_id: &str,
        expected_duration_seconds: u32,
    ) -> Result<MeetingRequest, SessionError> {
        self.require_page(page_id)?;
        Ok(MeetingRequest::SetSectionDuration {
            meeting_id: self.meeting_id.clone(),
            page_id: page_id.to_owned(),
            expected_duration_seconds,
        })
    }

    /// # Errors
    ///
    /// [`AgendaError`] for an unknown page or out-of-range position.
    pub fn reorder_section(&self, page_id: &str, new_position: u32) -> Result<MeetingRequest, SessionError> {
        let positions = agenda::reorder(&self.pages, page_id, new_position)?;
        Ok(MeetingRequest::ReorderSections { meeting_id: self.meeting_id.clone(), positions })
    }

    /// Soft-delete a section.
    ///
    /// # Errors
    ///
    /// [`AgendaError::UnknownPage`] for an unknown or already removed page.
    pub fn remove_section(&self, page_id: &str) -> Result<MeetingRequest, SessionError> {
        self.require_page(page_id)?;
        Ok(MeetingRequest::RemoveSection { meeting_id: self.meeting_id.clone(), page_id: page_id.to_owned() })
    }

    fn require_page(&self, page_id: &str) -> Result<(), AgendaError> {
        agenda::find_page(&self.pages, page_id)
            .map(|_| ())
            .ok_or_else(|| AgendaError::UnknownPage(page_id.to_owned()))
    }
}
