use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use time::OffsetDateTime;

use crate::fix::{EventKind, Fix};
use crate::observer::LocationObserver;
use crate::source::{AuthorizationStatus, LocationSource, SourceEvent, SourceEvents};

/// Source that records every control call.
#[derive(Debug)]
pub struct FakeSource {
    pub status: AuthorizationStatus,
    pub enabled: bool,
    pub desired: f64,
    pub updating: bool,
    pub starts: u32,
    pub stops: u32,
    pub permission_requests: u32,
}

impl FakeSource {
    pub fn with_status(status: AuthorizationStatus) -> Self {
        Self {
            status,
            enabled: true,
            desired: 0.0,
            updating: false,
            starts: 0,
            stops: 0,
            permission_requests: 0,
        }
    }
}

impl LocationSource for FakeSource {
    fn start_updates(&mut self) {
        self.updating = true;
        self.starts += 1;
    }

    fn stop_updates(&mut self) {
        self.updating = false;
        self.stops += 1;
    }

    fn request_permission(&mut self) {
        self.permission_requests += 1;
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        self.status
    }

    fn desired_accuracy(&self) -> f64 {
        self.desired
    }

    fn set_desired_accuracy(&mut self, metres: f64) {
        self.desired = metres;
    }

    fn services_enabled(&self) -> bool {
        self.enabled
    }
}

/// Observer that keeps everything it was told.
#[derive(Default)]
pub struct RecordingObserver {
    pub seen: Mutex<Vec<(EventKind, Fix)>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<(EventKind, Fix)> {
        self.seen.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().into_iter().map(|(k, _)| k).collect()
    }
}

impl LocationObserver for RecordingObserver {
    fn initial_fix_found(&self, fix: &Fix) {
        self.seen.lock().unwrap().push((EventKind::InitialFixFound, fix.clone()));
    }

    fn best_effort_found(&self, fix: &Fix) {
        self.seen.lock().unwrap().push((EventKind::BestEffortFound, fix.clone()));
    }
}

/// Event stream fed from a shared queue. Reports `None` once closed and empty,
/// and parks forever while open and empty.
#[derive(Clone, Default)]
pub struct ScriptedEvents {
    pub queue: Arc<Mutex<VecDeque<SourceEvent>>>,
    pub closed: Arc<Mutex<bool>>,
}

impl ScriptedEvents {
    pub fn push(&self, ev: SourceEvent) {
        self.queue.lock().unwrap().push_back(ev);
    }

    pub fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }
}

impl SourceEvents for ScriptedEvents {
    async fn next_event(&mut self) -> Result<Option<SourceEvent>> {
        loop {
            if let Some(ev) = self.queue.lock().unwrap().pop_front() {
                return Ok(Some(ev));
            }
            if *self.closed.lock().unwrap() {
                return Ok(None);
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}

/// Fix captured `age_s` seconds ago on the wall clock.
pub fn fresh_fix(accuracy_m: f64, age_s: i64) -> Fix {
    Fix::new(40.7128, -74.006, accuracy_m, OffsetDateTime::now_utc() - time::Duration::seconds(age_s))
}
