//! Best-effort location tracking with power duty cycling.
//!
//! A [`manager::LocationManager`] consumes fixes from a [`source::LocationSource`],
//! keeps the most accurate fresh one, notifies observers when it improves, and
//! switches the source off between tracking periods.

pub mod auth;
pub mod config;
pub mod duty;
pub mod filter;
pub mod fix;
pub mod manager;
pub mod observer;
pub mod runtime;
pub mod source;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, TrackingConfig};
pub use fix::{Coordinate, EventKind, Fix, LocationEvent};
pub use manager::LocationManager;
pub use source::{AuthorizationStatus, LocationSource, SourceEvent, SourceEvents};
