//! Leader/follower synchronizer.
//!
//! DESIGN
//! ======
//! One attendee leads; their page is broadcast as the instance's
//! `current_page_id`. Everyone else follows by default and may stop following
//! to browse on their own. The mode is re-derived from the instance's leader
//! id: a new instance or a leader change puts every session back on the top
//! rule (leader if the instance names us, otherwise following).
//!
//! The mode follows the instance as displayed, so a local start or leader
//! change takes effect at once. Hand-offs are announced from the confirmed
//! (persisted) instance only, once per `(previous, new)` pair within one
//! instance id. An optimistic leader change, or its silent revert on timeout,
//! is therefore never announced; the server's confirmation is. A new instance
//! id is never announced.

#[cfg(test)]
#[path = "follow_test.rs"]
mod follow_test;

use std::collections::HashSet;

use serde::Serialize;

use crate::model::MeetingInstance;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FollowMode {
    /// This session's page selection is the broadcast page.
    Leader,
    /// Mirrors the leader's broadcast page.
    #[default]
    Following,
    /// Browsing independently; leader page changes are ignored.
    Independent,
}

/// A leader change within one running instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderHandOff {
    pub instance_id: String,
    pub previous_leader_id: String,
    pub new_leader_id: String,
}

#[derive(Clone, Debug, Default)]
pub struct Synchronizer {
    mode: FollowMode,
    /// Page chosen by this user for independent navigation.
    user_page_id: Option<String>,
    /// `(instance id, leader id)` as displayed.
    displayed: Option<(String, String)>,
    /// `(instance id, leader id)` as confirmed by the server.
    confirmed: Option<(String, String)>,
    /// Hand-offs already announced for the confirmed instance.
    announced: HashSet<(String, String)>,
}

impl Synchronizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn mode(&self) -> FollowMode {
        self.mode
    }

    #[must_use]
    pub fn is_following_leader(&self) -> bool {
        self.mode == FollowMode::Following
    }

    #[must_use]
    pub fn user_page_id(&self) -> Option<&str> {
        self.user_page_id.as_deref()
    }

    /// Re-derive the mode from the instance currently displayed.
    pub fn observe(&mut self, instance: Option<&MeetingInstance>, current_user_id: &str) {
        let Some(instance) = instance else {
            if self.displayed.take().is_some() && self.mode == FollowMode::Leader {
                self.mode = FollowMode::Following;
            }
            return;
        };

        let user_is_leader = instance.leader_id == current_user_id;
        let changed = match &self.displayed {
            Some((id, leader)) if *id == instance.id => *leader != instance.leader_id,
            _ => {
                tracing::debug!(instance_id = %instance.id, leader_id = %instance.leader_id, "observing new meeting instance");
                true
            }
        };
        self.displayed = Some((instance.id.clone(), instance.leader_id.clone()));

        if changed {
            self.mode = top_rule(user_is_leader);
        } else if user_is_leader {
            self.mode = FollowMode::Leader;
        } else if self.mode == FollowMode::Leader {
            self.mode = FollowMode::Following;
        }
    }

    /// Track the server-confirmed instance.
    ///
    /// Returns a hand-off the first time a given leader change is confirmed
    /// within a stable instance id.
    pub fn observe_confirmed(&mut self, instance: Option<&MeetingInstance>) -> Option<LeaderHandOff> {
        let Some(instance) = instance else {
            if self.confirmed.take().is_some() {
                self.announced.clear();
            }
            return None;
        };

        let next = (instance.id.clone(), instance.leader_id.clone());
        let (id, previous) = self.confirmed.replace(next)?;
        if id != instance.id {
            self.announced.clear();
            return None;
        }
        if previous == instance.leader_id || !self.announced.insert((previous.clone(), instance.leader_id.clone())) {
            return None;
        }

        tracing::info!(
            instance_id = %instance.id,
            previous_leader_id = %previous,
            new_leader_id = %instance.leader_id,
            "meeting leader changed"
        );
        Some(LeaderHandOff {
            instance_id: instance.id.clone(),
            previous_leader_id: previous,
            new_leader_id: instance.leader_id.clone(),
        })
    }

    /// Toggle following. Stopping freezes this user on `leader_page_id`;
    /// resuming snaps back to the live broadcast. Ignored while leading.
    pub fn set_following(&mut self, following: bool, leader_page_id: Option<&str>) {
        match (self.mode, following) {
            (FollowMode::Leader, _) => {
                tracing::debug!(following, "leader cannot toggle following");
            }
            (FollowMode::Following, false) => {
                if let Some(page_id) = leader_page_id {
                    self.user_page_id = Some(page_id.to_owned());
                }
                self.mode = FollowMode::Independent;
            }
            (FollowMode::Independent, true) => {
                self.mode = FollowMode::Following;
            }
            _ => {}
        }
    }

    /// Record this user's own page choice.
    pub fn select_page(&mut self, page_id: &str) {
        self.user_page_id = Some(page_id.to_owned());
    }

    /// Page this session should show, given the leader's broadcast page.
    #[must_use]
    pub fn effective_page_id<'a>(&'a self, broadcast_page_id: Option<&'a str>, ongoing: bool) -> Option<&'a str> {
        if !ongoing {
            return self.user_page_id();
        }
        match self.mode {
            FollowMode::Leader | FollowMode::Following => broadcast_page_id.or(self.user_page_id()),
            FollowMode::Independent => self.user_page_id(),
        }
    }
}

fn top_rule(user_is_leader: bool) -> FollowMode {
    if user_is_leader { FollowMode::Leader } else { FollowMode::Following }
}
