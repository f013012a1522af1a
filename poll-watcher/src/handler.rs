//! Handlers that consume change events on the polling thread.
//!
//! Any `FnMut(&ChangeEvent) -> anyhow::Result<()> + Send` closure is a
//! handler. The adapters here attach an error callback, forward events into
//! async code, or restrict delivery to regular files.

use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::error::{Result, WatcherError};
use crate::event::ChangeEvent;

/// Trait for callers that react to detected changes.
///
/// Handlers run synchronously on the polling thread. A slow handler delays
/// the next tick rather than queueing work.
pub trait EventHandler: Send {
    /// Handle one change event. Errors are logged and counted; they never
    /// stop the polling loop.
    fn handle(&mut self, event: &ChangeEvent) -> anyhow::Result<()>;

    /// Called when a tick could not capture the root.
    fn on_error(&mut self, error: &WatcherError) {
        warn!("Poll failed: {error}");
    }
}

impl<F> EventHandler for F
where
    F: FnMut(&ChangeEvent) -> anyhow::Result<()> + Send,
{
    fn handle(&mut self, event: &ChangeEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Handler paired with a callback for capture failures.
pub struct WithErrorCallback<H, E> {
    inner: H,
    on_error: E,
}

/// Attach `on_error` to `handler` as the capture-failure side channel.
pub fn with_error_callback<H, E>(handler: H, on_error: E) -> WithErrorCallback<H, E>
where
    H: EventHandler,
    E: FnMut(&WatcherError) + Send,
{
    WithErrorCallback {
        inner: handler,
        on_error,
    }
}

impl<H, E> EventHandler for WithErrorCallback<H, E>
where
    H: EventHandler,
    E: FnMut(&WatcherError) + Send,
{
    fn handle(&mut self, event: &ChangeEvent) -> anyhow::Result<()> {
        self.inner.handle(event)
    }

    fn on_error(&mut self, error: &WatcherError) {
        (self.on_error)(error);
    }
}

/// Handler that forwards events into a bounded tokio channel.
///
/// A full channel blocks the polling thread until the receiver catches up.
/// Must not be driven from inside an async context.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::Sender<ChangeEvent>,
}

/// Create a channel handler and the receiver its events arrive on.
pub fn channel(capacity: usize) -> Result<(ChannelHandler, mpsc::Receiver<ChangeEvent>)> {
    if capacity == 0 {
        return Err(WatcherError::InvalidConfiguration(
            "channel capacity must be greater than zero".to_string(),
        ));
    }

    let (tx, rx) = mpsc::channel(capacity);
    Ok((ChannelHandler { tx }, rx))
}

impl EventHandler for ChannelHandler {
    fn handle(&mut self, event: &ChangeEvent) -> anyhow::Result<()> {
        self.tx
            .blocking_send(event.clone())
            .map_err(|_| anyhow::anyhow!("event receiver dropped"))
    }
}

/// Forwards only events for regular files, plus every erasure.
///
/// An erased entry can no longer be inspected, so its type is unknown and
/// it is always forwarded.
pub struct RegularFilesOnly<H> {
    inner: H,
}

impl<H: EventHandler> RegularFilesOnly<H> {
    /// Wrap a handler.
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    /// Unwrap the inner handler.
    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: EventHandler> EventHandler for RegularFilesOnly<H> {
    fn handle(&mut self, event: &ChangeEvent) -> anyhow::Result<()> {
        if !event.is_erased() && !event.path.is_file() {
            trace!("Ignoring non-regular entry: {}", event.path.display());
            return Ok(());
        }
        self.inner.handle(event)
    }

    fn on_error(&mut self, error: &WatcherError) {
        self.inner.on_error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChangeKind;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        events: Vec<ChangeEvent>,
    }

    impl EventHandler for Recorder {
        fn handle(&mut self, event: &ChangeEvent) -> anyhow::Result<()> {
            self.events.push(event.clone());
            Ok(())
        }
    }

    #[test]
    fn test_closure_is_a_handler() {
        let mut seen = Vec::new();
        let mut handler = |event: &ChangeEvent| -> anyhow::Result<()> {
            seen.push(event.kind);
            Ok(())
        };

        handler
            .handle(&ChangeEvent::new("/w/a", ChangeKind::Created))
            .unwrap();
        assert_eq!(seen, vec![ChangeKind::Created]);
    }

    #[test]
    fn test_error_callback_receives_failures() {
        let mut reasons = Vec::new();
        {
            let mut handler = with_error_callback(
                |_: &ChangeEvent| -> anyhow::Result<()> { Ok(()) },
                |error: &WatcherError| reasons.push(error.to_string()),
            );
            handler.on_error(&WatcherError::path_unavailable(Path::new("/w"), "gone"));
        }

        assert_eq!(reasons, vec!["path unavailable: /w: gone".to_string()]);
    }

    #[test]
    fn test_regular_files_only() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        let dir = temp_dir.path().join("sub");
        fs::write(&file, "a").unwrap();
        fs::create_dir(&dir).unwrap();

        let mut handler = RegularFilesOnly::new(Recorder::default());
        for event in [
            ChangeEvent::new(&file, ChangeKind::Created),
            ChangeEvent::new(&dir, ChangeKind::Created),
            ChangeEvent::new(&dir, ChangeKind::Modified),
            ChangeEvent::new(temp_dir.path().join("gone"), ChangeKind::Erased),
        ] {
            handler.handle(&event).unwrap();
        }

        let kinds: Vec<_> = handler
            .into_inner()
            .events
            .into_iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds, vec![ChangeKind::Created, ChangeKind::Erased]);
    }

    #[test]
    fn test_channel_rejects_zero_capacity() {
        assert!(matches!(
            channel(0),
            Err(WatcherError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_channel_delivers_events() {
        let (mut handler, mut rx) = channel(4).unwrap();
        let event = ChangeEvent::new("/w/a", ChangeKind::Modified);

        handler.handle(&event).unwrap();

        assert_eq!(rx.blocking_recv(), Some(event));
    }

    #[test]
    fn test_channel_fails_after_receiver_dropped() {
        let (mut handler, rx) = channel(1).unwrap();
        drop(rx);

        assert!(
            handler
                .handle(&ChangeEvent::new("/w/a", ChangeKind::Created))
                .is_err()
        );
    }
}
