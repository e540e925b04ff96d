use std::sync::Mutex;

use tokio::sync::Notify;

use super::*;
use crate::clock::ManualClock;
use crate::config::SyncConfig;
use crate::model::{AgendaPage, CurrentUser, MeetingInstance, PageTimer, PageType};

const T0: f64 = 5_000.0;

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<MeetingRequest>>,
    fail_with: Option<TransportError>,
}

impl RecordingTransport {
    fn failing(error: TransportError) -> Self {
        Self { sent: Mutex::default(), fail_with: Some(error) }
    }

    fn sent(&self) -> Vec<MeetingRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MeetingTransport for RecordingTransport {
    async fn send(&self, request: MeetingRequest) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(request);
        self.fail_with.clone().map_or(Ok(()), Err)
    }
}

/// Holds every request until released, then fails it.
#[derive(Default)]
struct GatedTransport {
    release: Notify,
}

#[async_trait::async_trait]
impl MeetingTransport for GatedTransport {
    async fn send(&self, _request: MeetingRequest) -> Result<(), TransportError> {
        self.release.notified().await;
        Err(TransportError::Unavailable("gateway timeout".to_owned()))
    }
}

fn pages() -> Vec<AgendaPage> {
    ["p1", "p2"]
        .iter()
        .zip(0u32..)
        .map(|(id, position)| AgendaPage {
            id: (*id).to_owned(),
            position,
            name: id.to_uppercase(),
            page_type: PageType::Custom,
            expected_duration_seconds: 600,
            timer: PageTimer::default(),
            deleted_at: None,
        })
        .collect()
}

fn tick(instance: Option<MeetingInstance>) -> PushTick {
    PushTick {
        meeting_instance: instance,
        pages: pages(),
        current_user: CurrentUser { id: "me".to_owned(), leader_permissions: true },
        loading: false,
    }
}

fn running(leader: &str, page: &str) -> MeetingInstance {
    MeetingInstance {
        id: "inst-1".to_owned(),
        leader_id: leader.to_owned(),
        current_page_id: Some(page.to_owned()),
        is_paused: false,
        meeting_start_time: T0,
        tangent_alert_time: None,
    }
}

fn controller<T: MeetingTransport>(transport: T) -> SessionController<T> {
    let session = MeetingSession::new(
        "m-1",
        CurrentUser { id: "me".to_owned(), leader_permissions: true },
        SyncConfig::default(),
        Arc::new(ManualClock::new(T0)),
    );
    let controller = SessionController::new(session, transport);
    controller.apply_tick(tick(None));
    controller
}

#[tokio::test]
async fn start_meeting_sends_request_after_optimistic_write() {
    let controller = controller(RecordingTransport::default());
    controller.start_meeting().await.expect("start");

    assert!(controller.view().meeting_ongoing);
    assert_eq!(
        controller.transport().sent(),
        vec![MeetingRequest::StartMeeting { meeting_id: "m-1".to_owned(), first_page_id: Some("p1".to_owned()) }]
    );
    assert!(controller.take_notifications().is_empty());
}

#[tokio::test]
async fn failed_request_notifies_but_keeps_optimistic_state() {
    let controller = controller(RecordingTransport::failing(TransportError::Rejected("forbidden".to_owned())));
    controller.start_meeting().await.expect("start");

    assert!(controller.view().meeting_ongoing);
    assert_eq!(
        controller.take_notifications(),
        vec![Notification::RequestFailed {
            syscall: "meeting:start",
            message: "request rejected: forbidden".to_owned(),
        }]
    );
}

#[tokio::test]
async fn local_validation_error_sends_nothing() {
    let controller = controller(RecordingTransport::default());
    let err = controller.conclude_meeting().await.expect_err("no meeting");
    assert_eq!(err, SessionError::MeetingNotOngoing);
    assert!(controller.transport().sent().is_empty());
}

#[tokio::test]
async fn local_navigation_sends_nothing() {
    let controller = controller(RecordingTransport::default());
    controller.set_current_page("p2", Some("p1")).await.expect("navigate");
    assert!(controller.transport().sent().is_empty());
    assert_eq!(controller.view().page.map(|p| p.id), Some("p2".to_owned()));
}

#[tokio::test]
async fn leader_navigation_and_conclude_are_sent() {
    let controller = controller(RecordingTransport::default());
    controller.apply_tick(tick(Some(running("me", "p1"))));
    controller.set_current_page("p2", Some("p1")).await.expect("navigate");
    controller.conclude_meeting().await.expect("conclude");

    let syscalls: Vec<&str> = controller.transport().sent().iter().map(MeetingRequest::syscall).collect();
    assert_eq!(syscalls, vec!["meeting:page", "meeting:conclude"]);
    assert!(!controller.view().meeting_ongoing);
}

#[tokio::test]
async fn claiming_leadership_switches_mode() {
    let controller = controller(RecordingTransport::default());
    controller.apply_tick(tick(Some(running("boss", "p2"))));
    assert_eq!(controller.follow_mode(), FollowMode::Following);

    controller.change_leader("me").await.expect("claim");
    assert_eq!(controller.follow_mode(), FollowMode::Leader);
    assert_eq!(controller.transport().sent().len(), 1);
}

#[tokio::test]
async fn agenda_edit_is_built_and_sent() {
    let controller = controller(RecordingTransport::default());
    controller
        .send_agenda_edit(|session| session.rename_section("p2", "Scorecard"))
        .await
        .expect("rename");
    assert_eq!(
        controller.transport().sent(),
        vec![MeetingRequest::RenameSection {
            meeting_id: "m-1".to_owned(),
            page_id: "p2".to_owned(),
            name: "Scorecard".to_owned(),
        }]
    );
}

#[tokio::test]
async fn push_is_applied_while_request_in_flight() {
    let controller = controller(GatedTransport::default());
    let start = controller.start_meeting();
    let drive = async {
        tokio::task::yield_now().await;
        assert!(controller.view().meeting_ongoing, "optimistic write precedes the request");

        controller.apply_tick(tick(Some(running("me", "p1"))));
        assert_eq!(controller.view().instance.map(|i| i.id), Some("inst-1".to_owned()));

        controller.transport().release.notify_one();
    };

    let (result, ()) = tokio::join!(start, drive);
    result.expect("start");

    assert!(controller.view().meeting_ongoing, "late failure does not undo the confirmed meeting");
    let notifications = controller.take_notifications();
    assert!(matches!(
        notifications.as_slice(),
        [Notification::RequestFailed { syscall: "meeting:start", .. }]
    ));
}

#[tokio::test]
async fn clones_share_one_session() {
    let controller = controller(RecordingTransport::default());
    let other = controller.clone();
    other.set_following_leader(false);
    controller.apply_tick(tick(Some(running("boss", "p2"))));
    assert_eq!(other.follow_mode(), FollowMode::Following, "new instance re-applies the top rule");
    other.set_following_leader(false);
    assert_eq!(controller.follow_mode(), FollowMode::Independent);
}
