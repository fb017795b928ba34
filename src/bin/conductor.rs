//! Conductor daemon.
//!
//! Runs the show scheduler until SIGINT or SIGTERM. Settings come from an
//! optional TOML file, overridden by command-line flags or the environment
//! variables below.
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `OPEN_HOUR` / `CLOSE_HOUR` | Business hours, `HH:MM[:SS]` |
//! | `TRACKS_TO_PLAY` | Playlist tracks per show |
//! | `BREAK_TIME` | Cooldown between shows, seconds |
//! | `TIMEKEEPER` | Presence check on/off |
//! | `TIMEKEEPER_LIMIT` | Presence deadline, seconds |
//! | `TIMEKEEPER_DISTANCE` | Settle delay after the check, seconds |
//!
//! Outputs are logged rather than driven. With `--sensor-stdin`, every line
//! on standard input counts as one pass of the train over the sensor, so a
//! GPIO watcher can be piped in.
//!
//! ```bash
//! gpiomon --rising-edge gpiochip0 17 | conductor --sensor-stdin -l /media/usb
//! ```

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rs_conductor::config::ConductorConfig;
use rs_conductor::hal::{LocalLibrary, LogAlertSink, LoggingActuator, SystemClock};
use rs_conductor::parsing::{flag_arg, parse_time_field};
use rs_conductor::presence::{presence_channel, PresenceSender};
use rs_conductor::scheduler::Scheduler;
use rs_conductor::sequencer::ShowSequencer;
use rs_conductor::traits::{Actuator, MediaSource};
use rs_conductor::{ConfigError, ShopHours};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for the conductor
#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(about = "Music-synchronized model train show scheduler")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "CONDUCTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Music library directory
    #[arg(short, long, env = "MEDIA_PATH")]
    library: Option<PathBuf>,

    /// External player command; the track path is appended
    #[arg(long, env = "PLAYER_COMMAND")]
    player: Option<String>,

    /// Opening time, HH:MM[:SS]
    #[arg(long, env = "OPEN_HOUR")]
    open_hour: Option<String>,

    /// Closing time, HH:MM[:SS]
    #[arg(long, env = "CLOSE_HOUR")]
    close_hour: Option<String>,

    /// Playlist tracks per show
    #[arg(long, env = "TRACKS_TO_PLAY")]
    tracks_to_play: Option<u32>,

    /// Cooldown between shows in seconds
    #[arg(long, env = "BREAK_TIME")]
    break_time: Option<u64>,

    /// Enable the presence check
    #[arg(long, env = "TIMEKEEPER", value_parser = flag_arg)]
    timekeeper: Option<bool>,

    /// Presence deadline in seconds
    #[arg(long, env = "TIMEKEEPER_LIMIT")]
    timekeeper_limit: Option<u64>,

    /// Settle delay after the presence check in seconds
    #[arg(long, env = "TIMEKEEPER_DISTANCE")]
    timekeeper_distance: Option<u64>,

    /// Treat each line on stdin as a sensor pulse
    #[arg(long)]
    sensor_stdin: bool,
}

impl Args {
    fn apply(&self, mut config: ConductorConfig) -> Result<ConductorConfig, ConfigError> {
        let open = self
            .open_hour
            .as_deref()
            .map(|s| parse_time_field("OPEN_HOUR", s))
            .transpose()?;
        let close = self
            .close_hour
            .as_deref()
            .map(|s| parse_time_field("CLOSE_HOUR", s))
            .transpose()?;
        if open.is_some() || close.is_some() {
            config.hours = ShopHours::new(
                open.unwrap_or(config.hours.open),
                close.unwrap_or(config.hours.close),
            );
        }
        if let Some(n) = self.tracks_to_play {
            config.show.tracks_to_play = n;
        }
        if let Some(secs) = self.break_time {
            config.show.break_time_secs = secs;
        }
        if let Some(enabled) = self.timekeeper {
            config.presence.enabled = enabled;
        }
        if let Some(secs) = self.timekeeper_limit {
            config.presence.limit_secs = secs;
        }
        if let Some(secs) = self.timekeeper_distance {
            config.presence.settle_secs = secs;
        }
        if let Some(path) = &self.library {
            config.media.library_path = path.clone();
        }
        if let Some(command) = &self.player {
            config.media.player_command = Some(command.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rs_conductor=info,conductor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ConductorConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConductorConfig::default(),
    };
    let config = args.apply(config).context("Invalid settings")?;
    config.validate().context("Invalid configuration")?;

    info!(
        open = %config.hours.open,
        close = %config.hours.close,
        tracks = config.show.tracks_to_play,
        break_secs = config.show.break_time_secs,
        presence = config.presence.enabled,
        "starting conductor"
    );

    let mut library = LocalLibrary::open(&config.media.library_path)
        .with_context(|| {
            format!(
                "Failed to open media library {}",
                config.media.library_path.display()
            )
        })?
        .with_fallback_duration(config.show.fallback_duration());
    if let Some(command) = &config.media.player_command {
        library = library.with_player_command(command.clone());
    }
    let tracks = library
        .list_tracks()
        .context("Failed to list media library")?;
    info!(
        dir = %library.dir().display(),
        tracks = tracks.len(),
        "media library ready"
    );

    let mut actuator = LoggingActuator::new();
    actuator
        .shutdown()
        .map_err(|e| anyhow::anyhow!("{e:?}"))
        .context("Failed to initialise outputs")?;

    let sequencer = Arc::new(
        ShowSequencer::new(
            &config,
            actuator,
            library,
            Arc::new(LogAlertSink),
            Arc::new(SystemClock),
        )
        .context("Failed to build show sequencer")?,
    );

    let (sensor, events) = presence_channel();
    let listener = tokio::spawn(Arc::clone(sequencer.presence()).listen(events));
    if args.sensor_stdin {
        spawn_stdin_sensor(sensor);
    } else {
        drop(sensor);
    }

    let scheduler = Scheduler::new(Arc::clone(&sequencer), config.scheduler.clone());
    let result = scheduler.run(shutdown_signal()).await;

    listener.abort();
    result.context("Failed to shut down outputs")?;
    info!("conductor stopped");
    Ok(())
}

/// Forward stdin lines to the presence channel from a plain thread.
fn spawn_stdin_sensor(sensor: PresenceSender) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if line.is_err() || !sensor.notify() {
                break;
            }
        }
        warn!("sensor input closed");
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
