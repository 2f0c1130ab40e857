use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

/// One reported position observation.
///
/// `horizontal_accuracy_m` is the radius of uncertainty in metres. Lower is
/// better; a negative value marks the reading as invalid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub coord: Coordinate,
    pub horizontal_accuracy_m: f64,
    pub ts: OffsetDateTime,
}

impl Fix {
    pub fn new(lat: f64, lon: f64, horizontal_accuracy_m: f64, ts: OffsetDateTime) -> Self {
        Self { coord: Coordinate { lat, lon }, horizontal_accuracy_m, ts }
    }

    pub fn is_valid(&self) -> bool {
        self.horizontal_accuracy_m >= 0.0
    }

    /// Age relative to `now`. Fixes stamped in the future have zero age.
    pub fn age(&self, now: OffsetDateTime) -> time::Duration {
        (now - self.ts).max(time::Duration::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    InitialFixFound,
    BestEffortFound,
}

/// Outward notification, flattened for printing and serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEvent {
    pub kind: EventKind,
    pub ts_unix_ms: i64,
    pub lat: f64,
    pub lon: f64,
    pub accuracy_m: f64,
}

impl LocationEvent {
    pub fn new(kind: EventKind, fix: &Fix) -> Self {
        Self {
            kind,
            ts_unix_ms: (fix.ts.unix_timestamp_nanos() / 1_000_000) as i64,
            lat: fix.coord.lat,
            lon: fix.coord.lon,
            accuracy_m: fix.horizontal_accuracy_m,
        }
    }
}
