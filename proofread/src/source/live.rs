use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use super::{ChangeSource, SourceError, SourceKind};

pub const DEFAULT_EDIT_CHANNEL_CAPACITY: usize = 64;

/// Editor-facing end of a live input stream. Every call to [`edit`] is one
/// keystroke/edit event carrying the full current document.
///
/// [`edit`]: LiveInputHandle::edit
#[derive(Debug, Clone)]
pub struct LiveInputHandle {
    tx: mpsc::Sender<String>,
}

impl LiveInputHandle {
    pub async fn edit(&self, text: impl Into<String>) -> Result<(), SourceError> {
        self.tx
            .send(text.into())
            .await
            .map_err(|_| SourceError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct LiveInputSource {
    rx: mpsc::Receiver<String>,
    current: String,
}

pub fn live_input(capacity: usize) -> (LiveInputHandle, LiveInputSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        LiveInputHandle { tx },
        LiveInputSource {
            rx,
            current: String::new(),
        },
    )
}

impl ChangeSource for LiveInputSource {
    fn kind(&self) -> SourceKind {
        SourceKind::LiveInput
    }

    fn read(&mut self) -> BoxFuture<'_, Result<String, SourceError>> {
        let current = self.current.clone();
        Box::pin(async move { Ok(current) })
    }

    fn next_change(&mut self) -> BoxFuture<'_, Result<Option<String>, SourceError>> {
        Box::pin(async move {
            let Some(text) = self.rx.recv().await else {
                return Ok(None);
            };
            self.current.clone_from(&text);
            Ok(Some(text))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn edits_arrive_in_order_and_update_current_text() {
        let (handle, mut source) = live_input(4);
        handle.edit("Hel").await.expect("send edit");
        handle.edit("Hello").await.expect("send edit");

        assert_eq!(
            source.next_change().await.expect("recv").as_deref(),
            Some("Hel")
        );
        assert_eq!(
            source.next_change().await.expect("recv").as_deref(),
            Some("Hello")
        );
        assert_eq!(source.read().await.expect("read"), "Hello");
    }

    #[tokio::test]
    async fn dropping_every_handle_exhausts_the_source() {
        let (handle, mut source) = live_input(4);
        drop(handle);

        assert_eq!(source.next_change().await.expect("recv"), None);
    }

    #[tokio::test]
    async fn edits_fail_once_the_source_is_gone() {
        let (handle, source) = live_input(4);
        drop(source);

        assert!(handle.is_closed());
        assert!(matches!(handle.edit("text").await, Err(SourceError::Closed)));
    }
}
