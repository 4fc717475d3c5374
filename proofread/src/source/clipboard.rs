use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::time::{Duration, Interval, MissedTickBehavior};
use tracing::trace;

use super::{ChangeSource, SourceError, SourceKind};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1_500;

/// Platform clipboard primitive.
pub trait ClipboardReader: Send + Sync {
    fn read_text(&self) -> BoxFuture<'_, Result<String, SourceError>>;
}

/// System clipboard through `arboard`, read on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    fn read_blocking() -> Result<String, SourceError> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|err| SourceError::ClipboardUnavailable(err.to_string()))?;

        match clipboard.get_text() {
            Ok(text) => Ok(text),
            // Images or an empty clipboard are not text changes.
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(err) => Err(SourceError::ClipboardRead(err.to_string())),
        }
    }

    /// Whether a clipboard handle can be opened at all.
    pub fn probe() -> Result<(), SourceError> {
        arboard::Clipboard::new()
            .map(|_| ())
            .map_err(|err| SourceError::ClipboardUnavailable(err.to_string()))
    }
}

impl ClipboardReader for SystemClipboard {
    fn read_text(&self) -> BoxFuture<'_, Result<String, SourceError>> {
        Box::pin(async {
            match tokio::task::spawn_blocking(Self::read_blocking).await {
                Ok(result) => result,
                Err(err) => Err(SourceError::Worker(err.to_string())),
            }
        })
    }
}

/// Polls a clipboard on a fixed interval while the monitor runs.
pub struct ClipboardSource {
    reader: Arc<dyn ClipboardReader>,
    poll_interval: Duration,
    read_timeout: Duration,
    ticker: Option<Interval>,
}

impl ClipboardSource {
    pub fn new(
        reader: Arc<dyn ClipboardReader>,
        poll_interval: Duration,
        read_timeout: Duration,
    ) -> Self {
        Self {
            reader,
            poll_interval,
            read_timeout,
            ticker: None,
        }
    }

    pub fn system(poll_interval: Duration) -> Self {
        Self::new(
            Arc::new(SystemClipboard),
            poll_interval,
            Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        )
    }

    async fn read_bounded(&self) -> Result<String, SourceError> {
        match tokio::time::timeout(self.read_timeout, self.reader.read_text()).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(self.read_timeout.as_millis() as u64)),
        }
    }
}

impl ChangeSource for ClipboardSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Clipboard
    }

    fn read(&mut self) -> BoxFuture<'_, Result<String, SourceError>> {
        Box::pin(self.read_bounded())
    }

    fn next_change(&mut self) -> BoxFuture<'_, Result<Option<String>, SourceError>> {
        Box::pin(async move {
            let poll_interval = self.poll_interval;
            let ticker = self.ticker.get_or_insert_with(|| {
                let first_tick = tokio::time::Instant::now() + poll_interval;
                let mut ticker = tokio::time::interval_at(first_tick, poll_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });
            ticker.tick().await;
            trace!("polling clipboard");

            self.read_bounded().await.map(Some)
        })
    }
}
