use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_TRACKING_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RESTART_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DutyState {
    Idle,
    Tracking,
    Cooldown,
    /// Torn down. No further transitions.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    StopAfterTimeout,
    RestartAfterDelay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub action: TimerAction,
    pub deadline: Instant,
}

/// Single pending scheduled action. Scheduling replaces whatever was pending.
#[derive(Debug, Default)]
pub struct DutyTimer {
    pending: Option<PendingTimer>,
}

impl DutyTimer {
    pub fn schedule(&mut self, action: TimerAction, deadline: Instant) {
        if let Some(old) = self.pending.take() {
            debug!(action = ?old.action, "duty: cancelled pending timer");
        }
        self.pending = Some(PendingTimer { action, deadline });
    }

    pub fn cancel(&mut self) -> Option<PendingTimer> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<PendingTimer> {
        self.pending
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.deadline)
    }

    /// Removes and returns the pending action if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<TimerAction> {
        match self.pending {
            Some(p) if p.deadline <= now => {
                self.pending = None;
                Some(p.action)
            }
            _ => None,
        }
    }
}

/// What the owner must do to the location source after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCommand {
    Start,
    Stop,
}

/// Tracking/cooldown state machine. Pure: it never touches the source, it
/// tells the caller what to do with it.
#[derive(Debug)]
pub struct DutyCycle {
    timeout: Duration,
    restart_after: Duration,
    state: DutyState,
    timer: DutyTimer,
}

impl Default for DutyCycle {
    fn default() -> Self {
        Self::new(DEFAULT_TRACKING_TIMEOUT, DEFAULT_RESTART_AFTER)
    }
}

impl DutyCycle {
    pub fn new(timeout: Duration, restart_after: Duration) -> Self {
        Self { timeout, restart_after, state: DutyState::Idle, timer: DutyTimer::default() }
    }

    pub fn state(&self) -> DutyState {
        self.state
    }

    pub fn pending(&self) -> Option<PendingTimer> {
        self.timer.pending()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Idle -> Tracking. Any other state is left alone.
    pub fn start(&mut self, now: Instant) -> Option<SourceCommand> {
        if self.state != DutyState::Idle {
            return None;
        }
        Some(self.begin_tracking(now))
    }

    /// Tracking -> Cooldown ahead of the timeout.
    pub fn desired_accuracy_met(&mut self, now: Instant) -> Option<SourceCommand> {
        if self.state != DutyState::Tracking {
            return None;
        }
        debug!("duty: desired accuracy met, cooling down early");
        Some(self.begin_cooldown(now))
    }

    /// Any live state -> Idle. Used when authorization is withdrawn.
    pub fn suspend(&mut self) -> Option<SourceCommand> {
        if self.state == DutyState::Stopped {
            return None;
        }
        self.timer.cancel();
        self.state = DutyState::Idle;
        Some(SourceCommand::Stop)
    }

    /// Fires the pending timer if it is due.
    pub fn poll(&mut self, now: Instant) -> Option<SourceCommand> {
        match self.timer.take_due(now)? {
            TimerAction::StopAfterTimeout if self.state == DutyState::Tracking => {
                debug!(timeout_s = self.timeout.as_secs(), "duty: timeout elapsed");
                Some(self.begin_cooldown(now))
            }
            TimerAction::RestartAfterDelay if self.state == DutyState::Cooldown => {
                debug!("duty: cooldown over, restarting");
                Some(self.begin_tracking(now))
            }
            _ => None,
        }
    }

    /// Terminal. Returns `Stop` when the source was left running.
    pub fn teardown(&mut self) -> Option<SourceCommand> {
        self.timer.cancel();
        let was = std::mem::replace(&mut self.state, DutyState::Stopped);
        (was == DutyState::Tracking).then_some(SourceCommand::Stop)
    }

    fn begin_tracking(&mut self, now: Instant) -> SourceCommand {
        self.state = DutyState::Tracking;
        self.timer.schedule(TimerAction::StopAfterTimeout, now + self.timeout);
        SourceCommand::Start
    }

    fn begin_cooldown(&mut self, now: Instant) -> SourceCommand {
        self.state = DutyState::Cooldown;
        self.timer.schedule(TimerAction::RestartAfterDelay, now + self.restart_after);
        SourceCommand::Stop
    }
}
