// src/feed.rs
//! Live view of service requests: a poller delivering full snapshots over a
//! channel, and a tracker turning snapshots into derived-status changes.

use crate::db::requests::changed_since;
use crate::db::Database;
use crate::domain::{derive_status, status_display, DerivedStatus, ServiceRequest, StatusDisplay};
use crate::errors::AppError;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver};
use std::thread::JoinHandle;
use std::time::Duration;

pub struct RequestFeed {
    db: Database,
    interval: Duration,
    cursor: i64,
}

impl RequestFeed {
    /// Feed starting from the beginning, so the first poll returns every
    /// existing request once.
    pub fn new(db: Database, interval: Duration) -> Self {
        Self {
            db,
            interval,
            cursor: 0,
        }
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// Fetch snapshots changed since the last poll and advance the cursor.
    pub fn poll_once(&mut self) -> Result<Vec<ServiceRequest>, AppError> {
        let since = self.cursor;
        let snapshots = self.db.with_conn(|conn| changed_since(conn, since))?;
        if let Some(max) = snapshots.iter().map(|s| s.revision).max() {
            self.cursor = max;
        }
        Ok(snapshots)
    }

    /// Run the poller on its own thread. It stops once the receiver is dropped.
    pub fn subscribe(mut self) -> (Receiver<ServiceRequest>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel();

        let handle = std::thread::spawn(move || {
            tracing::debug!(cursor = self.cursor, "request feed started");
            loop {
                match self.poll_once() {
                    Ok(snapshots) => {
                        for snapshot in snapshots {
                            if tx.send(snapshot).is_err() {
                                tracing::debug!("request feed subscriber gone, stopping");
                                return;
                            }
                        }
                    }
                    // Transient (e.g. locked file): retry on the next tick.
                    Err(e) => tracing::warn!(error = %e, "request feed poll failed"),
                }
                std::thread::sleep(self.interval);
            }
        });

        (rx, handle)
    }
}

/// A change in what the customer sees for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub request_id: String,
    /// `None` only for a request first observed while still pending.
    pub previous: Option<DerivedStatus>,
    pub current: DerivedStatus,
    pub display: StatusDisplay,
    pub revision: i64,
}

/// Re-derives status on each snapshot and reports only real changes.
///
/// Each snapshot is self-contained. The tracker only remembers the last
/// revision and derived status per request to drop stale deliveries.
#[derive(Debug, Default)]
pub struct StatusTracker {
    seen: HashMap<String, (i64, DerivedStatus)>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot as the baseline for its request without reporting it.
    pub fn seed(&mut self, snapshot: &ServiceRequest) -> DerivedStatus {
        let current = derive_status(snapshot);
        match self.seen.get(&snapshot.id) {
            Some(&(revision, status)) if snapshot.revision <= revision => status,
            _ => {
                self.seen
                    .insert(snapshot.id.clone(), (snapshot.revision, current));
                current
            }
        }
    }

    pub fn observe(&mut self, snapshot: &ServiceRequest) -> Option<StatusChange> {
        let current = derive_status(snapshot);

        let previous = match self.seen.get(&snapshot.id) {
            Some(&(revision, _)) if snapshot.revision <= revision => return None,
            Some(&(_, status)) => Some(status),
            // Every request is created pending. Seeing it first in any other
            // state means the move away from pending happened between polls.
            None if current != DerivedStatus::Pending => Some(DerivedStatus::Pending),
            None => None,
        };
        self.seen
            .insert(snapshot.id.clone(), (snapshot.revision, current));

        if previous == Some(current) {
            return None;
        }
        Some(StatusChange {
            request_id: snapshot.id.clone(),
            previous,
            current,
            display: status_display(current),
            revision: snapshot.revision,
        })
    }

    pub fn current(&self, request_id: &str) -> Option<DerivedStatus> {
        self.seen.get(request_id).map(|(_, status)| *status)
    }
}
