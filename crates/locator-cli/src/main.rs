use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{info, warn};

use locator_core::observer::{ChannelObserver, LocationObserver};
use locator_core::{runtime, EventKind, LocationEvent, LocationManager, TrackingConfig};
use locator_nmea::{NmeaControl, NmeaEvents, NmeaOptions, NmeaParser, TimestampMode};

#[derive(Debug, Parser)]
#[command(name = "locator", version, about = "Best-effort GNSS location with duty-cycled receiver")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the config file.
    Doctor,
    /// Track until Ctrl-C (or until a replay file runs out).
    Run,
    /// Print every fix an NMEA recording yields, without filtering.
    Parse { file: String },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    #[serde(default)]
    tracking: TrackingConfig,
    source: SourceCfg,
    #[serde(default)]
    output: OutputCfg,
}

#[derive(Debug, serde::Deserialize)]
struct SourceCfg {
    kind: String,
    nmea_device: Option<String>,
    baud: Option<u32>,
    nmea_file: Option<String>,
    uere_m: Option<f64>,
    timestamps: Option<TimestampMode>,
    replay_interval_ms: Option<u64>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct OutputCfg {
    format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl SourceCfg {
    fn options(&self) -> NmeaOptions {
        let defaults = NmeaOptions::default();
        NmeaOptions {
            uere_m: self.uere_m.unwrap_or(defaults.uere_m),
            timestamps: self.timestamps.unwrap_or_default(),
            replay_interval: match self.replay_interval_ms {
                Some(0) => None,
                Some(ms) => Some(Duration::from_millis(ms)),
                None => defaults.replay_interval,
            },
        }
    }
}

impl OutputCfg {
    fn format(&self) -> Result<OutputFormat> {
        match self.format.as_deref().unwrap_or("text") {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => anyhow::bail!("unknown output.format: {}", other),
        }
    }
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Run => run(&cfg).await?,
        Command::Parse { file } => parse(&cfg, &file)?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    cfg.tracking.validate().context("tracking config")?;
    cfg.output.format()?;

    let src = &cfg.source;
    anyhow::ensure!(src.uere_m.unwrap_or(5.0) > 0.0, "source.uere_m must be > 0");
    match src.kind.as_str() {
        "nmea-serial" => {
            anyhow::ensure!(src.nmea_device.as_ref().map(|s| !s.is_empty()).unwrap_or(false), "source.nmea_device missing");
            anyhow::ensure!(src.baud.unwrap_or(9600) > 0, "source.baud invalid");
        }
        "nmea-file" => {
            let path = src.nmea_file.as_ref().context("source.nmea_file missing")?;
            anyhow::ensure!(std::path::Path::new(path).is_file(), "source.nmea_file not found: {}", path);
        }
        other => anyhow::bail!("unknown source.kind: {}", other),
    }

    info!("doctor: OK");
    Ok(())
}

fn open_source(src: &SourceCfg) -> Result<(NmeaControl, NmeaEvents)> {
    let opts = src.options();
    match src.kind.as_str() {
        "nmea-serial" => {
            let dev = src.nmea_device.as_ref().context("source.nmea_device missing")?;
            locator_nmea::open_serial(dev, src.baud.unwrap_or(9600), &opts)
        }
        "nmea-file" => {
            let path = src.nmea_file.as_ref().context("source.nmea_file missing")?;
            locator_nmea::open_file(path, &opts)
        }
        other => anyhow::bail!("unknown source.kind: {}", other),
    }
}

async fn run(cfg: &Config) -> Result<()> {
    info!("run: starting");
    let format = cfg.output.format()?;

    let (control, mut events) = open_source(&cfg.source)?;
    let mut mgr = LocationManager::new(control, &cfg.tracking).context("tracking config")?;

    let (observer, rx) = ChannelObserver::new();
    let observer: Arc<dyn LocationObserver> = observer;
    mgr.add_observer(&observer);
    let printer = tokio::spawn(print_events(rx, format));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("run: cannot listen for ctrl-c: {:#}", e);
            std::future::pending::<()>().await;
        }
    };
    let res = runtime::drive(&mut mgr, &mut events, shutdown).await;

    // Closing the channel lets the printer drain and exit.
    drop(mgr);
    drop(observer);
    printer.await.context("printer task")?;

    info!("run: stopped");
    res
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<LocationEvent>, format: OutputFormat) {
    while let Some(ev) = rx.recv().await {
        match format {
            OutputFormat::Json => match serde_json::to_string(&ev) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("run: cannot encode event: {:#}", e),
            },
            OutputFormat::Text => {
                let label = match ev.kind {
                    EventKind::InitialFixFound => "FIX ",
                    EventKind::BestEffortFound => "BEST",
                };
                println!("{} lat={:.6} lon={:.6} acc={:.1}m t={}", label, ev.lat, ev.lon, ev.accuracy_m, ev.ts_unix_ms);
            }
        }
    }
}

fn parse(cfg: &Config, file: &str) -> Result<()> {
    let opts = cfg.source.options();
    let text = std::fs::read_to_string(file).with_context(|| format!("read nmea file {}", file))?;
    let mut parser = NmeaParser::new(opts.uere_m, opts.timestamps);

    let mut total = 0usize;
    let mut valid = 0usize;
    for line in text.lines() {
        let Some(fix) = parser.parse_line(line, OffsetDateTime::now_utc()) else { continue };
        total += 1;
        if fix.is_valid() {
            valid += 1;
            println!("{} lat={:.6} lon={:.6} acc={:.1}m", fix.ts, fix.coord.lat, fix.coord.lon, fix.horizontal_accuracy_m);
        } else {
            println!("{} no fix", fix.ts);
        }
    }
    info!(total, valid, "parse: done");
    Ok(())
}
