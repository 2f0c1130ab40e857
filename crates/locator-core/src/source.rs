use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::fix::Fix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    NotDetermined,
    Denied,
    Restricted,
    AuthorizedWhenInUse,
    AuthorizedAlways,
}

/// Control side of a platform location service.
///
/// Implementations wrap the real service (or a fake in tests). Calls are
/// made from the single event-loop thread and must not block.
pub trait LocationSource {
    fn start_updates(&mut self);
    fn stop_updates(&mut self);
    fn request_permission(&mut self);

    fn authorization_status(&self) -> AuthorizationStatus;

    fn desired_accuracy(&self) -> f64;
    fn set_desired_accuracy(&mut self, metres: f64);

    /// Whether the device has location services switched on at all.
    fn services_enabled(&self) -> bool {
        true
    }
}

/// Something the source reported.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// A batch of fixes, oldest first.
    Fixes(Vec<Fix>),
    Authorization(AuthorizationStatus),
}

/// Event side of a location source, consumed by [`crate::runtime::drive`].
#[allow(async_fn_in_trait)]
pub trait SourceEvents {
    /// Next event, or `None` once the source is exhausted.
    async fn next_event(&mut self) -> Result<Option<SourceEvent>>;
}
