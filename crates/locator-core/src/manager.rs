use std::sync::Arc;

use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::auth::{self, AuthAction};
use crate::config::{ConfigError, TrackingConfig};
use crate::duty::{DutyCycle, DutyState, SourceCommand};
use crate::filter::{BestEffortFilter, Verdict};
use crate::fix::{EventKind, Fix};
use crate::observer::{LocationObserver, ObserverSet};
use crate::source::{AuthorizationStatus, LocationSource, SourceEvent};

/// Best-effort location tracker over a [`LocationSource`].
///
/// Every handler runs to completion on the caller's thread. Dropping the
/// manager tears it down: the pending timer is cancelled and a running
/// source is stopped.
pub struct LocationManager<S: LocationSource> {
    source: S,
    filter: BestEffortFilter,
    duty: DutyCycle,
    observers: ObserverSet,
}

impl<S: LocationSource> LocationManager<S> {
    /// Applies the desired accuracy to the source, then reacts to whatever
    /// authorization the source already reports.
    pub fn new(mut source: S, cfg: &TrackingConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        source.set_desired_accuracy(cfg.desired_accuracy_m);

        let mut mgr = Self {
            source,
            filter: BestEffortFilter::new(cfg.max_fix_age()),
            duty: DutyCycle::new(cfg.timeout(), cfg.restart_after()),
            observers: ObserverSet::default(),
        };
        let status = mgr.source.authorization_status();
        mgr.on_authorization(status);
        Ok(mgr)
    }

    pub fn add_observer(&mut self, observer: &Arc<dyn LocationObserver>) {
        self.observers.add(observer);
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn state(&self) -> DutyState {
        self.duty.state()
    }

    pub fn best(&self) -> Option<&Fix> {
        self.filter.best()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.duty.next_deadline()
    }

    pub fn handle(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Fixes(fixes) => self.on_fixes(&fixes),
            SourceEvent::Authorization(status) => self.on_authorization(status),
        }
    }

    pub fn on_authorization(&mut self, status: AuthorizationStatus) {
        if self.duty.state() == DutyState::Stopped {
            return;
        }
        match auth::react(status) {
            AuthAction::RequestPermission => {
                if self.source.services_enabled() {
                    debug!("auth: not determined, requesting permission");
                    self.source.request_permission();
                } else {
                    info!("auth: location services disabled");
                }
            }
            AuthAction::Suspend => {
                info!(?status, "auth: location not available");
                let cmd = self.duty.suspend();
                self.apply(cmd);
            }
            AuthAction::StartTracking => {
                debug!(?status, "auth: authorized");
                let cmd = self.duty.start(Instant::now());
                self.apply(cmd);
            }
        }
    }

    /// Evaluates the newest fix of a batch.
    pub fn on_fixes(&mut self, fixes: &[Fix]) {
        let Some(fix) = fixes.last() else {
            debug!("fix: empty batch");
            return;
        };
        let now = OffsetDateTime::now_utc();
        match self.duty.state() {
            DutyState::Tracking => {}
            DutyState::Stopped => return,
            state => {
                // Invalid or stale readings still clear best state; nothing is emitted.
                self.filter.screen(fix, now);
                trace!(?state, "fix: not tracking, no events");
                return;
            }
        }

        let desired = self.source.desired_accuracy();
        let verdict = self.filter.on_fix(fix.clone(), desired, now);
        let Verdict::Improved { fix, desired_met } = verdict else {
            return;
        };

        self.observers.notify(EventKind::InitialFixFound, &fix);
        if !desired_met {
            return;
        }
        if let Some(best) = self.filter.best() {
            info!(
                lat = best.coord.lat,
                lon = best.coord.lon,
                accuracy_m = best.horizontal_accuracy_m,
                "fix: best effort location found"
            );
            self.observers.notify(EventKind::BestEffortFound, best);
        }
        let cmd = self.duty.desired_accuracy_met(Instant::now());
        self.apply(cmd);
    }

    /// Fires the duty-cycle timer if its deadline has passed.
    pub fn poll_timers(&mut self) {
        let cmd = self.duty.poll(Instant::now());
        self.apply(cmd);
    }

    /// Terminal. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.duty.state() == DutyState::Stopped {
            return;
        }
        let cmd = self.duty.teardown();
        if cmd == Some(SourceCommand::Stop) && self.source.services_enabled() {
            self.source.stop_updates();
        }
        self.filter.clear();
        debug!("manager: torn down");
    }

    fn apply(&mut self, cmd: Option<SourceCommand>) {
        match cmd {
            Some(SourceCommand::Start) => {
                debug!("source: start updates");
                self.source.start_updates();
            }
            Some(SourceCommand::Stop) => {
                debug!("source: stop updates");
                self.source.stop_updates();
            }
            None => {}
        }
    }
}

impl<S: LocationSource> Drop for LocationManager<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
