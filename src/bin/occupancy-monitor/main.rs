//! # Occupancy monitor
//!
//! Host application for the people-counting camera: runs the control loop over replayed
//! detections, logs telemetry snapshots and posts them to a webhook.

mod replay;
mod sinks;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use occupancy_monitor::schedule::{Clock, Instant};
use occupancy_monitor::telemetry::Sinks;
use occupancy_monitor::{Controller, Settings};

use replay::{Annotations, Console, Replay};
use sinks::{JsonLines, Notifier, Webhook};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Override a setting, e.g. `--set /thermal/ac_threshold=24.0`
    #[arg(long = "set", value_name = "PATH=VALUE", global = true)]
    overrides: Vec<String>,

    /// Occupancy log (JSON lines)
    #[arg(long, default_value = "data/occupancy.jsonl", global = true)]
    log: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control loop over annotated frames
    Run {
        /// Frame file, one frame per line. Reads stdin if omitted or `-`.
        frames: Option<PathBuf>,

        /// Webhook receiving the telemetry of every flush period
        #[arg(long)]
        webhook: Option<String>,
    },
    /// Print the latest logged snapshots, oldest first
    History {
        #[arg(short = 'n', long, default_value_t = 100)]
        limit: usize,
    },
    /// Print the effective settings as JSON
    Settings,
}

/// Monotonic millisecond clock since process start.
struct SystemTimer(std::time::Instant);

impl Clock for SystemTimer {
    fn now(&self) -> Instant {
        Instant::from_ticks(self.0.elapsed().as_millis() as u64)
    }
}

fn settings(overrides: &[String]) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();
    for o in overrides {
        let (path, value) = o
            .split_once('=')
            .ok_or_else(|| anyhow!("expected PATH=VALUE, got `{}`", o))?;
        settings
            .set(path, value.as_bytes())
            .map_err(|e| anyhow!("setting {}: {:?}", path, e))?;
    }
    settings
        .validate()
        .map_err(|e| anyhow!("invalid settings: {:?}", e))?;
    Ok(settings)
}

fn run(
    settings: &Settings,
    frames: Option<PathBuf>,
    webhook: Option<String>,
    log: PathBuf,
) -> anyhow::Result<()> {
    let input: Box<dyn BufRead> = match frames {
        Some(path) if path.as_os_str() != "-" => Box::new(BufReader::new(
            File::open(&path).with_context(|| format!("opening {}", path.display()))?,
        )),
        _ => Box::new(BufReader::new(io::stdin())),
    };

    let notifier = match webhook {
        Some(url) => Notifier::Webhook(Webhook::new(url)?),
        None => Notifier::Disabled,
    };
    let mut sinks = Sinks::new(JsonLines::new(log), notifier);

    let clock = SystemTimer(std::time::Instant::now());
    let mut controller = Controller::new(settings, clock.now())
        .map_err(|e| anyhow!("invalid settings: {:?}", e))?;
    let mut detector = Annotations {
        min_confidence: *settings.min_confidence,
    };

    log::info!("Starting occupancy monitor. Send `q` to quit.");
    let frames = controller
        .run(
            &mut Replay::new(input),
            &mut detector,
            &mut Console,
            &mut sinks,
            &clock,
        )
        .map_err(|e| anyhow!("control loop stopped: {:?}", e))?;
    log::info!("Processed {} frames", frames);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = settings(&cli.overrides)?;

    match cli.command {
        Command::Run { frames, webhook } => run(&settings, frames, webhook, cli.log),
        Command::History { limit } => {
            for row in JsonLines::new(cli.log).tail(limit)? {
                println!("{}", serde_json::to_string(&row)?);
            }
            Ok(())
        }
        Command::Settings => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}
