//! The tick state machine: capture, diff, dispatch.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::config::{InitialScan, WatchConfig};
use crate::error::Result;
use crate::handler::EventHandler;
use crate::snapshot::{self, Snapshot};
use crate::watcher::WatcherStats;

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Events detected and dispatched.
    pub events: usize,

    /// Handler invocations that returned an error or panicked.
    pub handler_failures: usize,

    /// Whether the capture failed and the diff was skipped.
    pub capture_failed: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    ticks: AtomicU64,
    events: AtomicU64,
    capture_failures: AtomicU64,
    handler_failures: AtomicU64,
}

impl Counters {
    pub(crate) fn snapshot(&self) -> WatcherStats {
        WatcherStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            capture_failures: self.capture_failures.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        }
    }

    fn record(&self, report: &TickReport) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.events.fetch_add(report.events as u64, Ordering::Relaxed);
        self.handler_failures
            .fetch_add(report.handler_failures as u64, Ordering::Relaxed);
        if report.capture_failed {
            self.capture_failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Owns the previous snapshot and the handler, and runs ticks against them.
///
/// [`Watcher`](crate::Watcher) drives a poller from its background thread.
/// A poller can also be driven manually, one [`tick`](Poller::tick) per call.
pub struct Poller<H> {
    config: WatchConfig,
    previous: Snapshot,
    handler: H,
    counters: Arc<Counters>,
}

impl<H: EventHandler> Poller<H> {
    /// Validate the config and seed the baseline according to its
    /// [`InitialScan`] policy.
    pub fn new(config: WatchConfig, handler: H) -> Result<Self> {
        Self::with_counters(config, handler, Arc::default())
    }

    pub(crate) fn with_counters(
        config: WatchConfig,
        handler: H,
        counters: Arc<Counters>,
    ) -> Result<Self> {
        config.validate()?;

        let previous = match config.initial_scan {
            InitialScan::Baseline => Snapshot::capture(&config)?,
            InitialScan::ReportExisting => {
                snapshot::ensure_root(&config.root)?;
                Snapshot::empty()
            }
        };
        debug!(
            "Seeded baseline for {} with {} entries",
            config.root.display(),
            previous.len()
        );

        Ok(Self {
            config,
            previous,
            handler,
            counters,
        })
    }

    /// Run one polling cycle.
    ///
    /// On capture failure the handler's error callback is invoked and the
    /// previous snapshot is kept. Otherwise every detected event is
    /// dispatched, in order, before the previous snapshot is replaced.
    pub fn tick(&mut self) -> TickReport {
        let started = Instant::now();

        let current = match Snapshot::capture(&self.config) {
            Ok(current) => current,
            Err(e) => {
                warn!("Capture failed, keeping previous snapshot: {e}");
                let handler = &mut self.handler;
                if panic::catch_unwind(AssertUnwindSafe(|| handler.on_error(&e))).is_err() {
                    error!("Error callback panicked for {}", self.config.root.display());
                }
                let report = TickReport {
                    capture_failed: true,
                    ..TickReport::default()
                };
                self.counters.record(&report);
                return report;
            }
        };

        let events = self.previous.diff(&current);
        let mut handler_failures = 0;

        for event in &events {
            let handler = &mut self.handler;
            match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    handler_failures += 1;
                    warn!("Handler failed for {event}: {e:#}");
                }
                Err(_) => {
                    handler_failures += 1;
                    error!("Handler panicked for {event}");
                }
            }
        }

        self.previous = current;

        let report = TickReport {
            events: events.len(),
            handler_failures,
            capture_failed: false,
        };
        self.counters.record(&report);
        debug!(
            "Tick for {} found {} events in {:?}",
            self.config.root.display(),
            report.events,
            started.elapsed()
        );

        report
    }

    /// Snapshot the next tick is diffed against.
    pub fn previous(&self) -> &Snapshot {
        &self.previous
    }

    /// Configuration this poller runs with.
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Counters accumulated over all ticks.
    pub fn stats(&self) -> WatcherStats {
        self.counters.snapshot()
    }
}
