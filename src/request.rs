//! Authoritative requests emitted by the session.
//!
//! The session never talks to the network. Each mutating operation returns
//! the request the host must issue; the host wraps it in whatever envelope its
//! transport uses, keyed by [`MeetingRequest::syscall`].

#[cfg(test)]
#[path = "request_test.rs"]
mod request_test;

use serde::{Deserialize, Serialize};

use crate::agenda::PagePosition;
use crate::model::PageType;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MeetingRequest {
    StartMeeting {
        meeting_id: String,
        first_page_id: Option<String>,
    },
    SetCurrentPage {
        meeting_id: String,
        page_id: String,
        previous_page_id: Option<String>,
    },
    ChangeLeader {
        meeting_id: String,
        leader_id: String,
    },
    ConcludeMeeting {
        meeting_id: String,
    },
    AddSection {
        meeting_id: String,
        name: String,
        page_type: PageType,
        expected_duration_seconds: u32,
        position: u32,
    },
    RenameSection {
        meeting_id: String,
        page_id: String,
        name: String,
    },
    SetSectionDuration {
        meeting_id: String,
        page_id: String,
        expected_duration_seconds: u32,
    },
    ReorderSections {
        meeting_id: String,
        positions: Vec<PagePosition>,
    },
    RemoveSection {
        meeting_id: String,
        page_id: String,
    },
}

impl MeetingRequest {
    /// Namespaced operation name, e.g. `"meeting:start"`.
    #[must_use]
    pub fn syscall(&self) -> &'static str {
        match self {
            Self::StartMeeting { .. } => "meeting:start",
            Self::SetCurrentPage { .. } => "meeting:page",
            Self::ChangeLeader { .. } => "meeting:leader",
            Self::ConcludeMeeting { .. } => "meeting:conclude",
            Self::AddSection { .. } => "agenda:add",
            Self::RenameSection { .. } => "agenda:rename",
            Self::SetSectionDuration { .. } => "agenda:duration",
            Self::ReorderSections { .. } => "agenda:reorder",
            Self::RemoveSection { .. } => "agenda:remove",
        }
    }

    #[must_use]
    pub fn meeting_id(&self) -> &str {
        match self {
            Self::StartMeeting { meeting_id, .. }
            | Self::SetCurrentPage { meeting_id, .. }
            | Self::ChangeLeader { meeting_id, .. }
            | Self::ConcludeMeeting { meeting_id }
            | Self::AddSection { meeting_id, .. }
            | Self::RenameSection { meeting_id, .. }
            | Self::SetSectionDuration { meeting_id, .. }
            | Self::ReorderSections { meeting_id, .. }
            | Self::RemoveSection { meeting_id, .. } => meeting_id,
        }
    }

    /// Payload as JSON, with the variant name under `"kind"`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
