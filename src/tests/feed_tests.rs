use crate::db::requests::{create_request, record_provider_response};
use crate::domain::{DerivedStatus, ResponseStatus, ServiceRequest};
use crate::feed::{RequestFeed, StatusTracker};
use crate::tests::utils::{approved_provider, cart, init_test_db};
use chrono::Utc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn next(rx: &Receiver<ServiceRequest>) -> ServiceRequest {
    rx.recv_timeout(WAIT).expect("no snapshot delivered")
}

#[test]
fn poll_once_advances_cursor() {
    let db = init_test_db("poll_once");
    let mut feed = RequestFeed::new(db.clone(), Duration::from_millis(10));
    assert!(feed.poll_once().unwrap().is_empty());

    let req = db
        .with_conn(|conn| create_request(conn, &cart("c@example.com", "1", "x"), Utc::now()))
        .unwrap();

    let first = feed.poll_once().unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].id, req.id);
    assert_eq!(feed.cursor(), req.revision);
    assert!(feed.poll_once().unwrap().is_empty());
}

#[test]
fn subscriber_sees_each_change_as_a_full_snapshot() {
    let db = init_test_db("subscribe");
    let p1 = approved_provider(&db, "p1@example.com", "1", "cleaning");
    let p2 = approved_provider(&db, "p2@example.com", "1", "cleaning");

    let (rx, _poller) = RequestFeed::new(db.clone(), Duration::from_millis(10)).subscribe();
    let mut tracker = StatusTracker::new();

    let req = db
        .with_conn(|conn| create_request(conn, &cart("c@example.com", "1", "cleaning"), Utc::now()))
        .unwrap();
    let snap = next(&rx);
    assert_eq!(snap.id, req.id);
    let change = tracker.observe(&snap).unwrap();
    assert_eq!(change.previous, None);
    assert_eq!(change.current, DerivedStatus::Pending);

    db.with_conn(|conn| {
        record_provider_response(conn, &req.id, &p1, ResponseStatus::Rejected, Utc::now())
    })
    .unwrap();
    let snap = next(&rx);
    assert_eq!(snap.provider_responses.len(), 1);
    assert!(tracker.observe(&snap).is_none());

    db.with_conn(|conn| {
        record_provider_response(conn, &req.id, &p2, ResponseStatus::Rejected, Utc::now())
    })
    .unwrap();
    let snap = next(&rx);
    let change = tracker.observe(&snap).unwrap();
    assert_eq!(change.previous, Some(DerivedStatus::Pending));
    assert_eq!(change.current, DerivedStatus::Rejected);
    assert_eq!(change.display.label, "Rejected");
}

#[test]
fn acceptance_inside_one_poll_reads_as_change_from_pending() {
    let db = init_test_db("one_poll");
    let p1 = approved_provider(&db, "p1@example.com", "1", "cleaning");
    let mut feed = RequestFeed::new(db.clone(), Duration::from_millis(10));
    let mut tracker = StatusTracker::new();

    let req = db
        .with_conn(|conn| create_request(conn, &cart("c@example.com", "1", "cleaning"), Utc::now()))
        .unwrap();
    db.with_conn(|conn| {
        record_provider_response(conn, &req.id, &p1, ResponseStatus::Accepted, Utc::now())
    })
    .unwrap();

    let snapshots = feed.poll_once().unwrap();
    assert_eq!(snapshots.len(), 1);
    let change = tracker.observe(&snapshots[0]).unwrap();
    assert_eq!(change.previous, Some(DerivedStatus::Pending));
    assert_eq!(change.current, DerivedStatus::Accepted);
}

#[test]
fn seeded_existing_requests_report_later_changes() {
    let db = init_test_db("seeded");
    let p1 = approved_provider(&db, "p1@example.com", "1", "cleaning");
    let old = db
        .with_conn(|conn| create_request(conn, &cart("c@example.com", "1", "cleaning"), Utc::now()))
        .unwrap();

    let mut feed = RequestFeed::new(db.clone(), Duration::from_millis(10));
    let mut tracker = StatusTracker::new();
    for snapshot in feed.poll_once().unwrap() {
        assert_eq!(tracker.seed(&snapshot), DerivedStatus::Pending);
    }
    let (rx, _poller) = feed.subscribe();

    db.with_conn(|conn| {
        record_provider_response(conn, &old.id, &p1, ResponseStatus::Accepted, Utc::now())
    })
    .unwrap();
    let snap = next(&rx);
    assert_eq!(snap.id, old.id);
    let change = tracker.observe(&snap).unwrap();
    assert_eq!(change.previous, Some(DerivedStatus::Pending));
    assert_eq!(change.current, DerivedStatus::Accepted);
}
