use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use time::OffsetDateTime;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, trace};

use locator_core::{AuthorizationStatus, LocationSource, SourceEvent, SourceEvents};

use crate::parse::{NmeaParser, TimestampMode};

#[derive(Debug, Clone)]
pub struct NmeaOptions {
    /// Metres of horizontal error per unit of HDOP.
    pub uere_m: f64,
    pub timestamps: TimestampMode,
    /// Replays only: delay between consecutive RMC fixes.
    pub replay_interval: Option<Duration>,
}

impl Default for NmeaOptions {
    fn default() -> Self {
        Self { uere_m: 5.0, timestamps: TimestampMode::Receipt, replay_interval: Some(Duration::from_secs(1)) }
    }
}

enum LineReader {
    Serial(BufReader<SerialStream>),
    File(BufReader<File>),
    Memory(BufReader<std::io::Cursor<Vec<u8>>>),
}

/// Control half of an NMEA receiver.
///
/// The receiver cannot be powered down over the wire; stopping updates makes
/// the paired [`NmeaEvents`] discard what it reads instead.
#[derive(Debug)]
pub struct NmeaControl {
    updating: Arc<AtomicBool>,
    desired_accuracy_m: f64,
}

/// Event half of an NMEA receiver.
pub struct NmeaEvents {
    reader: LineReader,
    updating: Arc<AtomicBool>,
    parser: NmeaParser,
    buf: Vec<u8>,
    replay_interval: Option<Duration>,
    next_at: Option<Instant>,
}

pub fn open_serial(dev: &str, baud: u32, opts: &NmeaOptions) -> Result<(NmeaControl, NmeaEvents)> {
    let port = tokio_serial::new(dev, baud)
        .open_native_async()
        .with_context(|| format!("open serial {}", dev))?;
    info!(dev, baud, "nmea: serial opened");
    // A live receiver paces itself.
    let opts = NmeaOptions { replay_interval: None, ..opts.clone() };
    Ok(pair(LineReader::Serial(BufReader::new(port)), &opts))
}

pub fn open_file(path: &str, opts: &NmeaOptions) -> Result<(NmeaControl, NmeaEvents)> {
    let f = std::fs::File::open(path).with_context(|| format!("open nmea file {}", path))?;
    let f = File::from_std(f);
    info!(path, "nmea: replaying file");
    Ok(pair(LineReader::File(BufReader::new(f)), opts))
}

pub fn replay_bytes(data: impl Into<Vec<u8>>, opts: &NmeaOptions) -> (NmeaControl, NmeaEvents) {
    let cursor = std::io::Cursor::new(data.into());
    pair(LineReader::Memory(BufReader::new(cursor)), opts)
}

fn pair(reader: LineReader, opts: &NmeaOptions) -> (NmeaControl, NmeaEvents) {
    let updating = Arc::new(AtomicBool::new(false));
    let control = NmeaControl { updating: updating.clone(), desired_accuracy_m: 0.0 };
    let events = NmeaEvents {
        reader,
        updating,
        parser: NmeaParser::new(opts.uere_m, opts.timestamps),
        buf: Vec::new(),
        replay_interval: opts.replay_interval,
        next_at: None,
    };
    (control, events)
}

impl NmeaControl {
    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Relaxed)
    }
}

impl LocationSource for NmeaControl {
    fn start_updates(&mut self) {
        self.updating.store(true, Ordering::Relaxed);
    }

    fn stop_updates(&mut self) {
        self.updating.store(false, Ordering::Relaxed);
    }

    fn request_permission(&mut self) {
        // Opening the device is the permission.
        debug!("nmea: permission request ignored");
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        AuthorizationStatus::AuthorizedAlways
    }

    fn desired_accuracy(&self) -> f64 {
        self.desired_accuracy_m
    }

    fn set_desired_accuracy(&mut self, metres: f64) {
        self.desired_accuracy_m = metres;
    }
}

impl NmeaEvents {
    /// Reads one line into `self.buf`. Partial reads survive cancellation.
    async fn read_line(&mut self) -> std::io::Result<usize> {
        match &mut self.reader {
            LineReader::Serial(r) => r.read_until(b'\n', &mut self.buf).await,
            LineReader::File(r) => r.read_until(b'\n', &mut self.buf).await,
            LineReader::Memory(r) => r.read_until(b'\n', &mut self.buf).await,
        }
    }
}

impl SourceEvents for NmeaEvents {
    async fn next_event(&mut self) -> Result<Option<SourceEvent>> {
        loop {
            if let Some(t) = self.next_at {
                tokio::time::sleep_until(t).await;
                self.next_at = None;
            }

            let n = self.read_line().await.context("read nmea")?;
            if n == 0 && self.buf.is_empty() {
                if let LineReader::Serial(_) = self.reader {
                    anyhow::bail!("serial port closed");
                }
                return Ok(None);
            }

            let raw = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&raw);
            let Some(fix) = self.parser.parse_line(&line, OffsetDateTime::now_utc()) else {
                continue;
            };

            if let Some(iv) = self.replay_interval {
                self.next_at = Some(Instant::now() + iv);
            }
            if !self.updating.load(Ordering::Relaxed) {
                trace!("nmea: updates stopped, fix discarded");
                continue;
            }
            return Ok(Some(SourceEvent::Fixes(vec![fix])));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
$GPGGA,093000.00,4807.038,N,01131.000,E,1,08,3.0,545.4,M,46.9,M,,\r
$GPRMC,093000.00,A,4807.038,N,01131.000,E,0.0,0.0,140324,,,A\r
$GPGSV,3,1,11,03,03,111,00,04,15,270,00,06,01,010,00,13,06,292,00\r
$GPGGA,093001.00,4807.040,N,01131.002,E,1,09,1.5,545.4,M,46.9,M,,\r
$GPRMC,093001.00,A,4807.040,N,01131.002,E,0.0,0.0,140324,,,A\r
";

    fn opts() -> NmeaOptions {
        NmeaOptions { uere_m: 4.0, timestamps: TimestampMode::Receipt, replay_interval: None }
    }

    #[tokio::test]
    async fn test_replay_yields_fixes_then_ends() {
        let (mut ctl, mut ev) = replay_bytes(LOG, &opts());
        ctl.start_updates();

        let Some(SourceEvent::Fixes(a)) = ev.next_event().await.unwrap() else { panic!("expected fixes") };
        assert_eq!(a.len(), 1);
        assert!((a[0].horizontal_accuracy_m - 12.0).abs() < 1e-9);

        let Some(SourceEvent::Fixes(b)) = ev.next_event().await.unwrap() else { panic!("expected fixes") };
        assert!((b[0].horizontal_accuracy_m - 6.0).abs() < 1e-9);

        assert!(ev.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stopped_source_discards_fixes() {
        let (ctl, mut ev) = replay_bytes(LOG, &opts());
        assert!(!ctl.is_updating());
        assert!(ev.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_control_reports_always_authorized() {
        let (mut ctl, _ev) = replay_bytes("", &opts());
        ctl.set_desired_accuracy(7.5);
        ctl.request_permission();
        assert_eq!(ctl.desired_accuracy(), 7.5);
        assert_eq!(ctl.authorization_status(), AuthorizationStatus::AuthorizedAlways);
        assert!(ctl.services_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_is_paced() {
        let opts = NmeaOptions { replay_interval: Some(Duration::from_secs(1)), ..opts() };
        let (mut ctl, mut ev) = replay_bytes(LOG, &opts);
        ctl.start_updates();

        let t0 = Instant::now();
        ev.next_event().await.unwrap();
        ev.next_event().await.unwrap();
        assert!(Instant::now() - t0 >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_tolerated() {
        let mut data = b"\xff\xfe garbage\n".to_vec();
        data.extend_from_slice(LOG.as_bytes());
        let (mut ctl, mut ev) = replay_bytes(data, &opts());
        ctl.start_updates();
        assert!(matches!(ev.next_event().await.unwrap(), Some(SourceEvent::Fixes(_))));
    }
}
