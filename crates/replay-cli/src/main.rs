//! Command-line entry point for kitchen replays.
//!
//! - `kitchen-replay summary <csv>` prints dataset and window facts
//! - `kitchen-replay seek <csv> <second>` prints the reconstructed state at a second
//! - `kitchen-replay play <csv>` plays headless and prints notifications as they fire
//! - `kitchen-replay serve [addr]` starts the HTTP and WebSocket server

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use contracts::{PanLocation, ReplayConfig, ReplaySnapshot};
use replay_api::{parse_csv, serve};
use replay_core::registry::NOTIFICATION_FRAMES;
use replay_core::{NormalizeReport, PlaybackDriver, ReplayEngine};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const ADDR_ENV: &str = "KITCHEN_REPLAY_ADDR";

#[derive(Parser)]
#[command(name = "kitchen-replay")]
#[command(about = "Replay recorded pan cycles second by second")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print dataset and window facts
    Summary {
        csv: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print the reconstructed state at a second of the window
    Seek {
        csv: PathBuf,
        second: i64,
        #[command(flatten)]
        config: ConfigArgs,
        /// Emit the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Play the replay headless, printing notifications as they fire
    Play {
        csv: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long, default_value_t = 0)]
        from: i64,
        /// Stop at this second instead of the end of the window
        #[arg(long)]
        to: Option<u64>,
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
        /// Pace steps on the wall clock instead of running as fast as possible
        #[arg(long)]
        realtime: bool,
    },
    /// Serve the HTTP and WebSocket API
    Serve {
        /// Bind address, falls back to KITCHEN_REPLAY_ADDR then 127.0.0.1:8080
        addr: Option<SocketAddr>,
    },
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// JSON file holding a replay config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Spicy machines and pans on the left
    #[arg(long, conflicts_with = "spicy_right")]
    spicy_left: bool,
    /// Spicy machines and pans on the right
    #[arg(long)]
    spicy_right: bool,
    /// Shift queued pans forward as pans leave the queue
    #[arg(long)]
    breading_queue: bool,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<ReplayConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_json::from_str::<ReplayConfig>(&raw)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => ReplayConfig::default(),
        };
        if self.spicy_left {
            config.spicy_left = true;
        }
        if self.spicy_right {
            config.spicy_left = false;
        }
        if self.breading_queue {
            config.use_breading_queue = true;
        }
        Ok(config)
    }
}

fn load_engine(csv: &Path, config: &ConfigArgs) -> Result<(ReplayEngine, NormalizeReport)> {
    let config = config.resolve()?;
    let text = std::fs::read_to_string(csv)
        .with_context(|| format!("failed to read {}", csv.display()))?;
    let rows = parse_csv(&text).with_context(|| format!("failed to split {}", csv.display()))?;
    let (engine, report) = ReplayEngine::from_rows(&rows, config)
        .with_context(|| format!("no replayable cycles in {}", csv.display()))?;
    for issue in &report.skipped {
        tracing::debug!(row = issue.row_index, column = issue.column, "row skipped");
    }
    Ok((engine, report))
}

fn resolve_addr(addr: Option<SocketAddr>) -> Result<SocketAddr> {
    if let Some(addr) = addr {
        return Ok(addr);
    }
    let raw = std::env::var(ADDR_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());
    raw.parse::<SocketAddr>()
        .with_context(|| format!("invalid addr: {raw}"))
}

fn location_label(location: PanLocation) -> &'static str {
    match location {
        PanLocation::Unknown => "unknown",
        PanLocation::Queue => "queue",
        PanLocation::Funnel => "funnel",
        PanLocation::Holding => "holding",
    }
}

fn print_snapshot(snapshot: &ReplaySnapshot) {
    println!(
        "second {}/{}  {}  breader {}",
        snapshot.second,
        snapshot.duration_seconds.saturating_sub(1),
        snapshot.simulation_time.to_rfc3339(),
        snapshot.current_breader.as_deref().unwrap_or("-"),
    );

    println!("pans:");
    for pan in &snapshot.pans {
        let mut line = format!(
            "  {:<16} {:<8} ({:.0}, {:.0})",
            pan.display_name,
            location_label(pan.location),
            pan.x,
            pan.y
        );
        if let (Some(x), Some(y)) = (pan.next_x, pan.next_y) {
            line.push_str(&format!(" -> ({x:.0}, {y:.0})"));
        }
        if let Some(seconds) = pan.expires_in_seconds {
            if pan.expired {
                line.push_str(" expired");
            } else {
                line.push_str(&format!(" expires in {seconds}s"));
            }
        }
        println!("{line}");
    }

    println!("machines:");
    for machine in &snapshot.machines {
        let kind = if machine.open_mode { "spicy" } else { "regular" };
        match (&machine.cooking_protein, machine.remaining_seconds) {
            (Some(pan), Some(remaining)) if machine.cooking => {
                println!("  [{}] {kind:<8} cooking {pan} ({remaining}s left)", machine.slot)
            }
            _ => println!("  [{}] {kind:<8} idle", machine.slot),
        }
    }

    if !snapshot.notifications.is_empty() {
        println!("notifications:");
        for notification in &snapshot.notifications {
            println!(
                "  {} ({:.0})",
                notification.message, notification.remaining_frames
            );
        }
    }
}

async fn play(
    engine: ReplayEngine,
    from: i64,
    to: Option<u64>,
    speed: f64,
    realtime: bool,
) -> Result<()> {
    let mut last_printed = None::<u64>;
    let renderer = move |snapshot: &ReplaySnapshot| {
        if last_printed == Some(snapshot.second) {
            return;
        }
        last_printed = Some(snapshot.second);
        for notification in &snapshot.notifications {
            if notification.remaining_frames >= NOTIFICATION_FRAMES {
                println!(
                    "[{}] {}",
                    snapshot.simulation_time.format("%H:%M:%S"),
                    notification.message
                );
            }
        }
    };

    let mut driver = PlaybackDriver::new(engine, renderer);
    let speed = driver.set_playback_speed(speed);
    let mut now = Instant::now();
    driver.seek(from, now);
    driver.play_pause(now);
    let stop_at = to.unwrap_or(u64::MAX);
    tracing::info!(from, speed, "headless playback started");

    loop {
        let interval = driver.step_interval();
        if realtime {
            tokio::time::sleep(interval).await;
            now = Instant::now();
        } else {
            now += interval;
        }
        let outcome = driver.poll(now);
        if outcome.stopped_at_end || driver.engine().current_second() >= stop_at {
            break;
        }
        if !driver.is_playing() {
            bail!("playback stopped unexpectedly at second {}", driver.engine().current_second());
        }
    }

    let status = driver.status();
    println!("stopped at second {}/{}", status.second, status.duration_seconds.saturating_sub(1));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Summary { csv, config } => {
            let (engine, report) = load_engine(&csv, &config)?;
            let summary = engine.summary(Some(&report));
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Seek {
            csv,
            second,
            config,
            json,
        } => {
            let (mut engine, _) = load_engine(&csv, &config)?;
            let report = engine.seek(second);
            tracing::debug!(
                frames = report.replayed_frames,
                applied = report.applied_events,
                "seek"
            );
            let snapshot = engine.snapshot();
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_snapshot(&snapshot);
            }
        }
        Commands::Play {
            csv,
            config,
            from,
            to,
            speed,
            realtime,
        } => {
            let (engine, _) = load_engine(&csv, &config)?;
            play(engine, from, to, speed, realtime).await?;
        }
        Commands::Serve { addr } => {
            let addr = resolve_addr(addr)?;
            println!("serving replay api on http://{addr}");
            serve(addr).await.context("server error")?;
        }
    }
    Ok(())
}
