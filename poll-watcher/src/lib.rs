//! # Poll Watcher
//!
//! This crate provides poll-based directory monitoring for the Codex context
//! system. A [`Watcher`] periodically snapshots a directory tree, diffs the
//! snapshot against the previous one, and reports each change to a handler.
//!
//! ## Features
//!
//! - **Polling by contract**: No platform notification backend; works on any
//!   filesystem that reports modification times
//! - **Clean shutdown**: `stop` joins the polling thread, so no handler call
//!   outlives it
//! - **Failure containment**: Capture failures and handler errors are
//!   reported, never fatal to the loop
//! - **Backpressure**: A slow handler delays the next tick instead of
//!   queueing events
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Poll Watcher                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  WatchConfig ──► Watcher ──► Poller ──► EventHandler            │
//! │                     │          │             ▲                  │
//! │                     ▼          ▼             │                  │
//! │              poll thread   Snapshot ──diff──► ChangeEvent       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use codex_poll_watcher::{ChangeEvent, Watcher};
//!
//! # fn main() -> codex_poll_watcher::Result<()> {
//! let mut watcher = Watcher::with_interval("/srv/data", Duration::from_secs(5))?;
//! watcher.start(|event: &ChangeEvent| -> anyhow::Result<()> {
//!     println!("{event}");
//!     Ok(())
//! })?;
//! // ...
//! watcher.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod poller;
pub mod snapshot;
pub mod watcher;

pub use config::{InitialScan, WatchConfig};
pub use error::{Result, WatcherError};
pub use event::{ChangeEvent, ChangeKind};
pub use handler::{ChannelHandler, EventHandler, RegularFilesOnly, WithErrorCallback};
pub use poller::{Poller, TickReport};
pub use snapshot::{Snapshot, Timestamp};
pub use watcher::{Watcher, WatcherState, WatcherStats};
