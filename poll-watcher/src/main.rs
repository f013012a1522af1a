use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use codex_poll_watcher::handler::{self, RegularFilesOnly};
use codex_poll_watcher::{ChangeEvent, InitialScan, WatchConfig, Watcher};
use tracing_subscriber::EnvFilter;

/// Poll a directory and report created, modified, and erased entries.
#[derive(Debug, Parser)]
#[command(name = "codex-poll-watcher", version)]
struct Cli {
    /// Directory to watch. Overrides `root` from `--config`.
    root: Option<PathBuf>,

    /// TOML file with a watch configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Polling interval in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Report entries that already exist as created on the first tick.
    #[arg(long)]
    report_existing: bool,

    /// Maximum depth to recurse below the root.
    #[arg(long)]
    max_depth: Option<usize>,

    /// Descend into symlinked directories.
    #[arg(long)]
    follow_symlinks: bool,

    /// Report directories and other non-regular entries too.
    #[arg(long)]
    all_entries: bool,

    /// Print one JSON object per event.
    #[arg(long)]
    json: bool,

    /// Events buffered between the polling thread and the printer.
    #[arg(long, default_value_t = 256)]
    channel_capacity: usize,
}

impl Cli {
    fn watch_config(&self) -> anyhow::Result<WatchConfig> {
        let mut config = match (&self.config, &self.root) {
            (Some(path), _) => WatchConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            (None, Some(root)) => WatchConfig::new(root, Duration::from_secs(5)),
            (None, None) => bail!("either a ROOT directory or --config is required"),
        };

        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(interval_ms) = self.interval_ms {
            config.interval = Duration::from_millis(interval_ms);
        }
        if self.report_existing {
            config.initial_scan = InitialScan::ReportExisting;
        }
        if let Some(depth) = self.max_depth {
            config.max_depth = Some(depth);
        }
        if self.follow_symlinks {
            config = config.follow_symlinks();
        }

        config.validate()?;
        Ok(config)
    }
}

fn print_event(event: &ChangeEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else {
        println!("{:<8} {}", event.kind, event.path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.watch_config()?;

    // Declared before the receiver so an early return drops the receiver first.
    let mut watcher = Watcher::new(config)?;
    let (sender, mut events) = handler::channel(cli.channel_capacity)?;
    if cli.all_entries {
        watcher.start(sender)?;
    } else {
        watcher.start(RegularFilesOnly::new(sender))?;
    }

    loop {
        tokio::select! {
            Some(event) = events.recv() => print_event(&event, cli.json)?,
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for Ctrl-C")?;
                break;
            }
        }
    }

    // A full channel would otherwise block the polling thread and the join.
    drop(events);
    let stats = tokio::task::spawn_blocking(move || {
        watcher.stop()?;
        Ok::<_, codex_poll_watcher::WatcherError>(watcher.stats())
    })
    .await??;
    tracing::info!(
        "Processed {} events over {} ticks",
        stats.events,
        stats.ticks
    );

    Ok(())
}
