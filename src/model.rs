//! Session data model as delivered by the push source.
//!
//! SYSTEM CONTEXT
//! ==============
//! The subscription transport is a black box that hands the core one
//! [`PushTick`] at a time. Ticks arrive as JSON with camelCase keys, so every
//! type here derives serde and can be decoded with [`PushTick::from_value`].

#[cfg(test)]
#[path = "model_test.rs"]
mod model_test;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;

/// Prefix marking a meeting instance minted locally and not yet confirmed.
pub const PLACEHOLDER_PREFIX: &str = "OPTIMISTIC-";

/// Error returned by [`PushTick::from_value`].
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("malformed push payload: {0}")]
    Decode(#[from] serde_json::Error),
}

// =============================================================================
// MEETING INSTANCE
// =============================================================================

/// A currently running occurrence of a meeting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingInstance {
    pub id: String,
    pub leader_id: String,
    #[serde(default)]
    pub current_page_id: Option<String>,
    #[serde(default)]
    pub is_paused: bool,
    pub meeting_start_time: Timestamp,
    #[serde(default)]
    pub tangent_alert_time: Option<Timestamp>,
}

impl MeetingInstance {
    /// Locally minted instance for an optimistic meeting start.
    #[must_use]
    pub fn placeholder(meeting_id: &str, leader_id: &str, first_page_id: Option<String>, now: Timestamp) -> Self {
        Self {
            id: placeholder_id(meeting_id),
            leader_id: leader_id.to_owned(),
            current_page_id: first_page_id,
            is_paused: false,
            meeting_start_time: now,
            tangent_alert_time: None,
        }
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.id.starts_with(PLACEHOLDER_PREFIX)
    }
}

#[must_use]
pub fn placeholder_id(meeting_id: &str) -> String {
    format!("{PLACEHOLDER_PREFIX}{meeting_id}")
}

// =============================================================================
// AGENDA PAGE
// =============================================================================

/// Kind of agenda section. Unknown tags from newer servers decode as `Other`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageType {
    Segue,
    Scorecard,
    Goals,
    Headlines,
    TodoList,
    Issues,
    WrapUp,
    Notes,
    #[default]
    Custom,
    #[serde(other)]
    Other,
}

/// Per-page timer record. All timestamps are seconds since the epoch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageTimer {
    pub time_last_started: Option<Timestamp>,
    pub time_last_paused: Option<Timestamp>,
    pub time_previously_spent_seconds: f64,
    pub time_spent_paused_seconds: f64,
}

/// One section of a meeting agenda.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaPage {
    pub id: String,
    pub position: u32,
    pub name: String,
    #[serde(default)]
    pub page_type: PageType,
    pub expected_duration_seconds: u32,
    #[serde(default)]
    pub timer: PageTimer,
    /// Soft-delete marker. Deleted pages are kept but never navigable.
    #[serde(default)]
    pub deleted_at: Option<Timestamp>,
}

impl AgendaPage {
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

// =============================================================================
// PUSH TICK
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: String,
    #[serde(default)]
    pub leader_permissions: bool,
}

/// One delivery from the subscription feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushTick {
    #[serde(default)]
    pub meeting_instance: Option<MeetingInstance>,
    #[serde(default)]
    pub pages: Vec<AgendaPage>,
    pub current_user: CurrentUser,
    /// Loading ticks may carry stale or partial data and are not applied.
    #[serde(default)]
    pub loading: bool,
}

impl PushTick {
    /// Decode a tick from its JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Decode`] when required keys are missing or have
    /// the wrong shape.
    pub fn from_value(value: serde_json::Value) -> Result<Self, PushError> {
        Ok(serde_json::from_value(value)?)
    }
}
