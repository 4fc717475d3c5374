pub mod clipboard;
pub mod live;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use clipboard::{ClipboardReader, ClipboardSource, SystemClipboard};
pub use live::{LiveInputHandle, LiveInputSource, live_input};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Clipboard,
    LiveInput,
    Manual,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("clipboard is unavailable: {0}")]
    ClipboardUnavailable(String),
    #[error("failed to read clipboard: {0}")]
    ClipboardRead(String),
    #[error("source read timed out after {0} ms")]
    Timeout(u64),
    #[error("source worker failed: {0}")]
    Worker(String),
    #[error("live input source is closed")]
    Closed,
}

/// Where candidate text comes from.
///
/// `next_change` resolves with the next candidate (polled or pushed, depending
/// on the source) and with `None` once the source is exhausted. Both methods
/// are plain reads.
pub trait ChangeSource: Send {
    fn kind(&self) -> SourceKind;

    fn read(&mut self) -> BoxFuture<'_, Result<String, SourceError>>;

    fn next_change(&mut self) -> BoxFuture<'_, Result<Option<String>, SourceError>>;
}
