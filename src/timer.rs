//! Agenda timer model.
//!
//! DESIGN
//! ======
//! Durations are derived from timestamps on every read; nothing here counts
//! down. A suspended tab or a skipped tick therefore never loses or doubles an
//! interval. Client/server skew can put `now` before a start timestamp, so
//! elapsed time is clamped at zero.

#[cfg(test)]
#[path = "timer_test.rs"]
mod timer_test;

use std::fmt;

use serde::Serialize;

use crate::agenda;
use crate::clock::Timestamp;
use crate::model::{AgendaPage, MeetingInstance, PageTimer};

/// Overtime past this many minutes renders as a bare indicator.
pub const MAX_OVERTIME_DISPLAY_MINUTES: i64 = 99;

/// Whole minutes elapsed since `started`, plus time carried over from earlier
/// visits. Never negative.
#[must_use]
pub fn elapsed_minutes(now: Timestamp, started: Timestamp, previously_spent_seconds: f64) -> i64 {
    whole_minutes(now - started + previously_spent_seconds)
}

/// Seconds spent on a page, honoring pauses.
///
/// A paused page reads at the moment it was paused. Accumulated pause time is
/// not counted. A page that was never started only carries its previous time.
#[must_use]
pub fn page_elapsed_seconds(timer: &PageTimer, now: Timestamp) -> f64 {
    let Some(started) = timer.time_last_started else {
        return timer.time_previously_spent_seconds.max(0.0);
    };
    let end = match timer.time_last_paused {
        Some(paused) if paused >= started => paused,
        _ => now,
    };
    end - started - timer.time_spent_paused_seconds + timer.time_previously_spent_seconds
}

#[allow(clippy::cast_possible_truncation)]
fn whole_minutes(seconds: f64) -> i64 {
    let minutes = (seconds / 60.0).floor();
    // NaN fails the comparison and clamps as well.
    if minutes > 0.0 { minutes as i64 } else { 0 }
}

// =============================================================================
// PAGE CLOCK
// =============================================================================

/// Remaining-time presentation for one page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "minutes", rename_all = "camelCase")]
pub enum RemainingDisplay {
    /// Time left, in whole minutes.
    Minutes(i64),
    /// Minutes past the expected duration.
    Overtime(i64),
    /// Overtime too large to be meaningful as a number.
    FarOvertime,
}

impl fmt::Display for RemainingDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minutes(n) => write!(f, "{n}"),
            Self::Overtime(n) => write!(f, "+{n}"),
            Self::FarOvertime => f.write_str("+"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageClock {
    pub elapsed_minutes: i64,
    /// Expected minutes minus elapsed minutes; negative once overtime.
    pub remaining_minutes: i64,
    pub overtime: bool,
    pub display: RemainingDisplay,
}

impl PageClock {
    #[must_use]
    pub fn at(page: &AgendaPage, now: Timestamp) -> Self {
        let elapsed_minutes = whole_minutes(page_elapsed_seconds(&page.timer, now));
        let remaining_minutes = i64::from(page.expected_duration_seconds / 60) - elapsed_minutes;
        let overtime = remaining_minutes < 1;
        let display = if !overtime {
            RemainingDisplay::Minutes(remaining_minutes)
        } else if -remaining_minutes > MAX_OVERTIME_DISPLAY_MINUTES {
            RemainingDisplay::FarOvertime
        } else {
            RemainingDisplay::Overtime(-remaining_minutes)
        };
        Self { elapsed_minutes, remaining_minutes, overtime, display }
    }
}

// =============================================================================
// MEETING CLOCK
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingClock {
    pub elapsed_minutes: i64,
    /// Sum of the expected durations of all live pages, in whole minutes.
    pub expected_minutes: i64,
    pub running_late: bool,
}

impl MeetingClock {
    #[must_use]
    pub fn at(instance: &MeetingInstance, pages: &[AgendaPage], now: Timestamp) -> Self {
        let elapsed_minutes = elapsed_minutes(now, instance.meeting_start_time, 0.0);
        let expected_minutes = i64::try_from(agenda::total_expected_seconds(pages) / 60).unwrap_or(i64::MAX);
        Self { elapsed_minutes, expected_minutes, running_late: expected_minutes < elapsed_minutes }
    }
}
