use serde_json::json;

use super::*;

#[test]
fn syscall_names_are_namespaced() {
    let start = MeetingRequest::StartMeeting { meeting_id: "m".to_owned(), first_page_id: None };
    let page = MeetingRequest::SetCurrentPage {
        meeting_id: "m".to_owned(),
        page_id: "p2".to_owned(),
        previous_page_id: Some("p1".to_owned()),
    };
    let remove = MeetingRequest::RemoveSection { meeting_id: "m".to_owned(), page_id: "p".to_owned() };
    assert_eq!(start.syscall(), "meeting:start");
    assert_eq!(page.syscall(), "meeting:page");
    assert_eq!(remove.syscall(), "agenda:remove");
}

#[test]
fn meeting_id_is_available_for_every_variant() {
    let request = MeetingRequest::ReorderSections { meeting_id: "m-7".to_owned(), positions: Vec::new() };
    assert_eq!(request.meeting_id(), "m-7");
    let conclude = MeetingRequest::ConcludeMeeting { meeting_id: "m-8".to_owned() };
    assert_eq!(conclude.meeting_id(), "m-8");
}

#[test]
fn json_payload_is_tagged_and_camel_cased() {
    let request = MeetingRequest::SetCurrentPage {
        meeting_id: "m".to_owned(),
        page_id: "p2".to_owned(),
        previous_page_id: None,
    };
    assert_eq!(
        request.to_json(),
        json!({
            "kind": "setCurrentPage",
            "meetingId": "m",
            "pageId": "p2",
            "previousPageId": null
        })
    );
}

#[test]
fn add_section_serializes_page_type() {
    let request = MeetingRequest::AddSection {
        meeting_id: "m".to_owned(),
        name: "Issues".to_owned(),
        page_type: PageType::Issues,
        expected_duration_seconds: 3600,
        position: 4,
    };
    let value = request.to_json();
    assert_eq!(value["kind"], "addSection");
    assert_eq!(value["pageType"], "issues");
    assert_eq!(value["expectedDurationSeconds"], 3600);
}

#[test]
fn request_round_trips_through_json() {
    let request = MeetingRequest::ChangeLeader { meeting_id: "m".to_owned(), leader_id: "u-2".to_owned() };
    let decoded: MeetingRequest = serde_json::from_value(request.to_json()).expect("decode");
    assert_eq!(decoded, request);
}
