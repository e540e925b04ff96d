use super::*;
use crate::model::PageType;

fn page(id: &str, expected_seconds: u32, timer: PageTimer) -> AgendaPage {
    AgendaPage {
        id: id.to_owned(),
        position: 0,
        name: id.to_owned(),
        page_type: PageType::Custom,
        expected_duration_seconds: expected_seconds,
        timer,
        deleted_at: None,
    }
}

fn started_at(t: Timestamp) -> PageTimer {
    PageTimer { time_last_started: Some(t), ..PageTimer::default() }
}

fn instance_started_at(t: Timestamp) -> MeetingInstance {
    MeetingInstance {
        id: "inst".to_owned(),
        leader_id: "u".to_owned(),
        current_page_id: None,
        is_paused: false,
        meeting_start_time: t,
        tangent_alert_time: None,
    }
}

// =============================================================================
// elapsed_minutes
// =============================================================================

#[test]
fn elapsed_minutes_floors() {
    assert_eq!(elapsed_minutes(1000.0 + 119.0, 1000.0, 0.0), 1);
    assert_eq!(elapsed_minutes(1000.0 + 120.0, 1000.0, 0.0), 2);
}

#[test]
fn elapsed_minutes_adds_previous_time() {
    assert_eq!(elapsed_minutes(1030.0, 1000.0, 90.0), 2);
}

#[test]
fn elapsed_minutes_never_negative_under_skew() {
    for skew in [0.001, 1.0, 59.0, 61.0, 3600.0, 1e9] {
        assert_eq!(elapsed_minutes(1000.0 - skew, 1000.0, 0.0), 0, "skew {skew}");
    }
    assert_eq!(elapsed_minutes(900.0, 1000.0, 30.0), 0);
}

#[test]
fn elapsed_minutes_nan_clamps_to_zero() {
    assert_eq!(elapsed_minutes(f64::NAN, 1000.0, 0.0), 0);
}

// =============================================================================
// page_elapsed_seconds
// =============================================================================

#[test]
fn never_started_page_carries_previous_time_only() {
    let timer = PageTimer { time_previously_spent_seconds: 125.0, ..PageTimer::default() };
    assert!((page_elapsed_seconds(&timer, 99_999.0) - 125.0).abs() < f64::EPSILON);
}

#[test]
fn paused_page_reads_at_pause_moment() {
    let timer = PageTimer {
        time_last_started: Some(1000.0),
        time_last_paused: Some(1100.0),
        ..PageTimer::default()
    };
    assert!((page_elapsed_seconds(&timer, 5000.0) - 100.0).abs() < f64::EPSILON);
}

#[test]
fn pause_before_last_start_is_ignored() {
    let timer = PageTimer {
        time_last_started: Some(1000.0),
        time_last_paused: Some(900.0),
        time_spent_paused_seconds: 20.0,
        ..PageTimer::default()
    };
    assert!((page_elapsed_seconds(&timer, 1100.0) - 80.0).abs() < f64::EPSILON);
}

// =============================================================================
// PageClock
// =============================================================================

#[test]
fn fresh_page_has_full_time_remaining() {
    let clock = PageClock::at(&page("p", 300, started_at(1000.0)), 1000.0);
    assert_eq!(clock.elapsed_minutes, 0);
    assert_eq!(clock.remaining_minutes, 5);
    assert!(!clock.overtime);
    assert_eq!(clock.display.to_string(), "5");
}

#[test]
fn page_overtime_past_expected_duration() {
    let clock = PageClock::at(&page("p", 300, started_at(0.0)), 400.0);
    assert_eq!(clock.elapsed_minutes, 6);
    assert_eq!(clock.remaining_minutes, -1);
    assert!(clock.overtime);
    assert_eq!(clock.display, RemainingDisplay::Overtime(1));
    assert_eq!(clock.display.to_string(), "+1");
}

#[test]
fn last_partial_minute_counts_as_overtime() {
    let clock = PageClock::at(&page("p", 300, started_at(0.0)), 300.0);
    assert_eq!(clock.remaining_minutes, 0);
    assert!(clock.overtime);
    assert_eq!(clock.display, RemainingDisplay::Overtime(0));
}

#[test]
fn overtime_display_caps_after_ninety_nine_minutes() {
    let at_cap = PageClock::at(&page("p", 60, started_at(0.0)), 100.0 * 60.0);
    assert_eq!(at_cap.remaining_minutes, -99);
    assert_eq!(at_cap.display, RemainingDisplay::Overtime(99));

    let past_cap = PageClock::at(&page("p", 60, started_at(0.0)), 101.0 * 60.0);
    assert_eq!(past_cap.remaining_minutes, -100);
    assert_eq!(past_cap.display, RemainingDisplay::FarOvertime);
    assert_eq!(past_cap.display.to_string(), "+");
}

#[test]
fn page_clock_under_skew_reports_zero_elapsed() {
    let clock = PageClock::at(&page("p", 120, started_at(1000.0)), 990.0);
    assert_eq!(clock.elapsed_minutes, 0);
    assert_eq!(clock.remaining_minutes, 2);
}

#[test]
fn sub_minute_expected_duration_is_immediately_overtime() {
    let clock = PageClock::at(&page("p", 45, started_at(0.0)), 0.0);
    assert_eq!(clock.remaining_minutes, 0);
    assert!(clock.overtime);
}

// =============================================================================
// MeetingClock
// =============================================================================

#[test]
fn meeting_on_time_within_expected_total() {
    let pages = vec![page("a", 300, PageTimer::default()), page("b", 600, PageTimer::default())];
    let clock = MeetingClock::at(&instance_started_at(0.0), &pages, 15.0 * 60.0);
    assert_eq!(clock.elapsed_minutes, 15);
    assert_eq!(clock.expected_minutes, 15);
    assert!(!clock.running_late);
}

#[test]
fn meeting_running_late_past_expected_total() {
    let pages = vec![page("a", 300, PageTimer::default()), page("b", 600, PageTimer::default())];
    let clock = MeetingClock::at(&instance_started_at(0.0), &pages, 16.0 * 60.0);
    assert!(clock.running_late);
}

#[test]
fn meeting_clock_ignores_deleted_pages() {
    let mut removed = page("b", 6000, PageTimer::default());
    removed.deleted_at = Some(1.0);
    let pages = vec![page("a", 300, PageTimer::default()), removed];
    let clock = MeetingClock::at(&instance_started_at(0.0), &pages, 6.0 * 60.0);
    assert_eq!(clock.expected_minutes, 5);
    assert!(clock.running_late);
}

#[test]
fn meeting_clock_under_skew_is_not_late() {
    let clock = MeetingClock::at(&instance_started_at(1000.0), &[], 900.0);
    assert_eq!(clock.elapsed_minutes, 0);
    assert!(!clock.running_late);
}
