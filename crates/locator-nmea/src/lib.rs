//! NMEA 0183 adapter for `locator-core`.

pub mod parse;
pub mod source;

pub use parse::{NmeaParser, TimestampMode};
pub use source::{open_file, open_serial, replay_bytes, NmeaControl, NmeaEvents, NmeaOptions};
