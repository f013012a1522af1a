//! Directory watcher implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::WatchConfig;
use crate::error::{Result, WatcherError};
use crate::handler::EventHandler;
use crate::poller::{Counters, Poller};

/// Lifecycle of a [`Watcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Constructed, not started.
    Idle,

    /// Polling on the background thread.
    Running,

    /// Stopped. Terminal; a stopped watcher cannot be restarted.
    Stopped,
}

/// Polls a directory on a dedicated background thread and reports changes to
/// a handler.
///
/// The interval is measured from the end of one tick's dispatch to the start
/// of the next, so a slow handler delays polling instead of piling up work.
/// Dropping a running watcher stops it.
pub struct Watcher {
    config: WatchConfig,
    state: WatcherState,
    worker: Option<Worker>,
    counters: Arc<Counters>,
}

struct Worker {
    running: Arc<AtomicBool>,
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Watcher {
    /// Create a new watcher. Fails with
    /// [`WatcherError::InvalidConfiguration`] if the config is rejected.
    pub fn new(config: WatchConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            state: WatcherState::Idle,
            worker: None,
            counters: Arc::default(),
        })
    }

    /// Create a watcher for `root` with default options.
    pub fn with_interval(root: impl Into<PathBuf>, interval: Duration) -> Result<Self> {
        Self::new(WatchConfig::new(root, interval))
    }

    /// Seed the baseline and start polling in the background.
    ///
    /// The baseline is captured on the calling thread, so an unavailable root
    /// is reported here and the watcher stays idle.
    pub fn start<H>(&mut self, handler: H) -> Result<()>
    where
        H: EventHandler + 'static,
    {
        match self.state {
            WatcherState::Idle => {}
            WatcherState::Running => {
                return Err(WatcherError::AlreadyStarted(self.config.root.clone()));
            }
            WatcherState::Stopped => {
                return Err(WatcherError::AlreadyStopped(self.config.root.clone()));
            }
        }

        let poller = Poller::with_counters(self.config.clone(), handler, self.counters.clone())?;

        let running = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("poll-watcher".to_string())
            .spawn({
                let running = running.clone();
                move || run_loop(poller, &running, &shutdown_rx)
            })
            .map_err(WatcherError::Spawn)?;

        self.worker = Some(Worker {
            running,
            shutdown_tx,
            handle,
        });
        self.state = WatcherState::Running;
        info!(
            "Started watching {} every {:?}",
            self.config.root.display(),
            self.config.interval
        );

        Ok(())
    }

    /// Stop polling and wait for the background thread to exit.
    ///
    /// A tick in progress completes first; no handler call happens after this
    /// returns. Calling `stop` on an idle or stopped watcher does nothing.
    pub fn stop(&mut self) -> Result<()> {
        let Some(Worker {
            running,
            shutdown_tx,
            handle,
        }) = self.worker.take()
        else {
            return Ok(());
        };

        running.store(false, Ordering::Release);
        // Wakes the loop out of its interval wait.
        drop(shutdown_tx);
        self.state = WatcherState::Stopped;

        handle.join().map_err(|_| WatcherError::WorkerPanicked)?;
        info!("Stopped watching {}", self.config.root.display());

        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Check if the watcher is running.
    pub fn is_running(&self) -> bool {
        self.state == WatcherState::Running
    }

    /// Configuration this watcher was created with.
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Counters accumulated since `start`.
    pub fn stats(&self) -> WatcherStats {
        self.counters.snapshot()
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(
                "Failed to stop watcher for {}: {e}",
                self.config.root.display()
            );
        }
    }
}

fn run_loop<H: EventHandler>(
    mut poller: Poller<H>,
    running: &AtomicBool,
    shutdown_rx: &mpsc::Receiver<()>,
) {
    let interval = poller.config().interval;

    loop {
        match shutdown_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        if !running.load(Ordering::Acquire) {
            break;
        }
        poller.tick();
    }

    debug!("Polling loop exited for {}", poller.config().root.display());
}

/// Statistics about a watcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WatcherStats {
    /// Ticks run, including failed captures.
    pub ticks: u64,

    /// Events dispatched to the handler.
    pub events: u64,

    /// Ticks whose capture failed.
    pub capture_failures: u64,

    /// Handler calls that returned an error or panicked.
    pub handler_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChangeEvent;
    use tempfile::TempDir;

    fn noop(_: &ChangeEvent) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn test_watcher_creation() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = Watcher::with_interval(temp_dir.path(), Duration::from_secs(5)).unwrap();

        assert_eq!(watcher.state(), WatcherState::Idle);
        assert!(!watcher.is_running());
        assert_eq!(watcher.stats(), WatcherStats::default());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = Watcher::with_interval("/tmp", Duration::ZERO);
        assert!(matches!(
            result,
            Err(WatcherError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_start_twice_fails() {
        let temp_dir = TempDir::new().unwrap();
        let mut watcher =
            Watcher::with_interval(temp_dir.path(), Duration::from_millis(20)).unwrap();

        watcher.start(noop).unwrap();
        let err = watcher.start(noop).unwrap_err();

        assert!(matches!(err, WatcherError::AlreadyStarted(_)));
        assert!(watcher.is_running());
        watcher.stop().unwrap();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut watcher =
            Watcher::with_interval(temp_dir.path(), Duration::from_millis(20)).unwrap();

        watcher.stop().unwrap();
        assert_eq!(watcher.state(), WatcherState::Idle);

        watcher.start(noop).unwrap();
        watcher.stop().unwrap();
        watcher.stop().unwrap();
        assert_eq!(watcher.state(), WatcherState::Stopped);
    }

    #[test]
    fn test_no_restart_after_stop() {
        let temp_dir = TempDir::new().unwrap();
        let mut watcher =
            Watcher::with_interval(temp_dir.path(), Duration::from_millis(20)).unwrap();

        watcher.start(noop).unwrap();
        watcher.stop().unwrap();

        assert!(matches!(
            watcher.start(noop),
            Err(WatcherError::AlreadyStopped(_))
        ));
    }

    #[test]
    fn test_start_with_missing_root_stays_idle() {
        let temp_dir = TempDir::new().unwrap();
        let mut watcher =
            Watcher::with_interval(temp_dir.path().join("missing"), Duration::from_millis(20))
                .unwrap();

        assert!(matches!(
            watcher.start(noop),
            Err(WatcherError::PathUnavailable { .. })
        ));
        assert_eq!(watcher.state(), WatcherState::Idle);
    }

    #[test]
    fn test_stop_does_not_wait_for_interval() {
        let temp_dir = TempDir::new().unwrap();
        let mut watcher =
            Watcher::with_interval(temp_dir.path(), Duration::from_secs(3600)).unwrap();
        watcher.start(noop).unwrap();

        let started = std::time::Instant::now();
        watcher.stop().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(watcher.stats().ticks, 0);
    }
}
