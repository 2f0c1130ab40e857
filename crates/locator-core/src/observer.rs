use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tracing::trace;

use crate::fix::{EventKind, Fix, LocationEvent};

/// Receives location notifications. Held weakly by the manager.
pub trait LocationObserver {
    /// Fires on the first fix and on every later accuracy improvement.
    fn initial_fix_found(&self, fix: &Fix);
    /// Fires when an improvement also meets the desired accuracy.
    fn best_effort_found(&self, fix: &Fix);
}

/// Non-owning list of observers. Dropped observers are pruned on notify.
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Weak<dyn LocationObserver>>,
}

impl ObserverSet {
    pub fn add(&mut self, observer: &Arc<dyn LocationObserver>) {
        self.observers.push(Arc::downgrade(observer));
    }

    pub fn notify(&mut self, kind: EventKind, fix: &Fix) {
        self.observers.retain(|w| {
            let Some(o) = w.upgrade() else {
                trace!("observer: dropped, pruning");
                return false;
            };
            match kind {
                EventKind::InitialFixFound => o.initial_fix_found(fix),
                EventKind::BestEffortFound => o.best_effort_found(fix),
            }
            true
        });
    }
}

/// Forwards notifications into an unbounded channel.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<LocationEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<LocationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    fn send(&self, kind: EventKind, fix: &Fix) {
        // Receiver gone means nobody is listening; nothing to do.
        let _ = self.tx.send(LocationEvent::new(kind, fix));
    }
}

impl LocationObserver for ChannelObserver {
    fn initial_fix_found(&self, fix: &Fix) {
        self.send(EventKind::InitialFixFound, fix);
    }

    fn best_effort_found(&self, fix: &Fix) {
        self.send(EventKind::BestEffortFound, fix);
    }
}
