use serde::Deserialize;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};
use tracing::{trace, warn};

use locator_core::Fix;

/// Accuracy reported for sentences that carry no usable fix.
pub const NO_FIX_ACCURACY: f64 = -1.0;

/// A GGA older than this (by receipt time) no longer qualifies an RMC.
pub const MAX_GGA_AGE: time::Duration = time::Duration::seconds(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampMode {
    /// Stamp fixes with the time the sentence was read.
    #[default]
    Receipt,
    /// Use the UTC date/time inside the RMC sentence.
    Sentence,
}

#[derive(Debug, Clone, Copy)]
struct GgaState {
    quality: u8,
    sats: u8,
    hdop: f64,
    at: OffsetDateTime,
}

/// Stateful NMEA 0183 parser.
///
/// GGA sentences update fix quality and HDOP; each RMC sentence produces one
/// [`Fix`] whose horizontal accuracy is `hdop * uere_m`.
#[derive(Debug, Clone)]
pub struct NmeaParser {
    uere_m: f64,
    timestamps: TimestampMode,
    last_gga: Option<GgaState>,
}

impl NmeaParser {
    pub fn new(uere_m: f64, timestamps: TimestampMode) -> Self {
        Self { uere_m, timestamps, last_gga: None }
    }

    pub fn parse_line(&mut self, line: &str, now: OffsetDateTime) -> Option<Fix> {
        let body = match strip_checksum(line.trim()) {
            Ok(b) => b,
            Err(e) => {
                warn!("nmea: {}: {}", e, line.trim());
                return None;
            }
        };
        let parts: Vec<&str> = body.split(',').collect();
        let kind = parts.first().and_then(|h| sentence_kind(h))?;

        match kind {
            "GGA" if parts.len() > 8 => {
                let quality: u8 = parts[6].parse().unwrap_or(0);
                let sats: u8 = parts[7].parse().unwrap_or(0);
                let hdop: f64 = parts[8].parse().unwrap_or(99.9);
                trace!(quality, sats, hdop, "nmea: gga");
                self.last_gga = Some(GgaState { quality, sats, hdop, at: now });
                None
            }
            "RMC" if parts.len() > 9 => self.rmc(&parts, now),
            _ => None,
        }
    }

    fn rmc(&self, parts: &[&str], now: OffsetDateTime) -> Option<Fix> {
        let ts = match self.timestamps {
            TimestampMode::Receipt => now,
            TimestampMode::Sentence => sentence_time(parts[1], parts[9]).unwrap_or_else(|| {
                trace!("nmea: rmc without usable date/time, using receipt time");
                now
            }),
        };

        let active = parts[2] == "A";
        let pos = parse_deg_min(parts[3], parts[4]).zip(parse_deg_min(parts[5], parts[6]));

        let (lat, lon) = match (active, pos) {
            (true, Some(p)) => p,
            (true, None) => {
                trace!("nmea: rmc active but position malformed");
                return None;
            }
            (false, p) => {
                let (lat, lon) = p.unwrap_or((0.0, 0.0));
                return Some(Fix::new(lat, lon, NO_FIX_ACCURACY, ts));
            }
        };

        let accuracy = match self.last_gga {
            Some(g) if now - g.at > MAX_GGA_AGE => {
                trace!(age_s = (now - g.at).as_seconds_f64(), "nmea: last gga too old");
                NO_FIX_ACCURACY
            }
            Some(g) if g.quality > 0 && g.sats > 0 => g.hdop * self.uere_m,
            _ => NO_FIX_ACCURACY,
        };
        Some(Fix::new(lat, lon, accuracy, ts))
    }
}

/// `$GPRMC` / `$GNRMC` / `$GLRMC` ... -> `RMC`
fn sentence_kind(header: &str) -> Option<&str> {
    let h = header.strip_prefix('$')?;
    if h.len() != 5 {
        return None;
    }
    h.get(2..)
}

#[derive(Debug, PartialEq)]
enum ChecksumError {
    Malformed,
    Mismatch { want: u8, got: u8 },
}

impl std::fmt::Display for ChecksumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChecksumError::Malformed => write!(f, "malformed checksum"),
            ChecksumError::Mismatch { want, got } => write!(f, "checksum mismatch (want {:02X}, got {:02X})", want, got),
        }
    }
}

/// Verifies a trailing `*hh` checksum if present and returns the sentence
/// without it.
fn strip_checksum(s: &str) -> Result<&str, ChecksumError> {
    let Some((body, sum)) = s.split_once('*') else {
        return Ok(s);
    };
    let want = u8::from_str_radix(sum, 16).map_err(|_| ChecksumError::Malformed)?;
    let got = body.trim_start_matches('$').bytes().fold(0u8, |acc, b| acc ^ b);
    if want != got {
        return Err(ChecksumError::Mismatch { want, got });
    }
    Ok(body)
}

fn parse_deg_min(v: &str, hemi: &str) -> Option<f64> {
    if v.is_empty() { return None; }
    // lat: ddmm.mmmm, lon: dddmm.mmmm
    let dot = v.find('.').unwrap_or(v.len());
    if dot < 4 { return None; }
    let deg_len = dot - 2;
    let deg: f64 = v.get(..deg_len)?.parse().ok()?;
    let min: f64 = v.get(deg_len..)?.parse().ok()?;
    let mut out = deg + (min / 60.0);
    match hemi {
        "N" | "E" => {}
        "S" | "W" => out = -out,
        _ => return None,
    }
    Some(out)
}

/// `hhmmss.sss` + `ddmmyy` -> UTC timestamp.
fn sentence_time(hms: &str, dmy: &str) -> Option<OffsetDateTime> {
    if hms.len() < 6 || dmy.len() != 6 {
        return None;
    }
    let h: u8 = hms.get(0..2)?.parse().ok()?;
    let m: u8 = hms.get(2..4)?.parse().ok()?;
    let secs: f64 = hms.get(4..)?.parse().ok()?;
    let s = secs.trunc() as u8;
    let ms = ((secs.fract() * 1000.0).round() as u16).min(999);

    let day: u8 = dmy.get(0..2)?.parse().ok()?;
    let month: u8 = dmy.get(2..4)?.parse().ok()?;
    let year: i32 = 2000 + dmy.get(4..6)?.parse::<i32>().ok()?;

    let date = Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()?;
    let time = Time::from_hms_milli(h, m, s, ms).ok()?;
    Some(PrimitiveDateTime::new(date, time).assume_utc())
}
