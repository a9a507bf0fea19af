//! Delivery of forwarded frames to caller code.
//!
//! The connection task hands every forwarded frame to an [`EventHandler`]
//! as the raw text received from the socket, so callers can parse it
//! however they like.
//!
//! Any `Fn(&str) + Send + Sync` closure is a handler. Callers that prefer
//! async iteration can use [`channel`], which returns a handler paired with
//! an [`EventStream`].
//!
//! # Examples
//!
//! ```ignore
//! use futures::StreamExt;
//! use webhookrelay_client::{handler, Credentials, RelayClient};
//!
//! let (handler, mut events) = handler::channel();
//! let client = RelayClient::new(Credentials::from_env()?, vec!["my-bucket".into()], handler);
//! client.connect().await?;
//!
//! while let Some(frame) = events.next().await {
//!     println!("{frame}");
//! }
//! ```

use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Receives raw frames forwarded by the connection task.
///
/// Handlers run on the connection task, so a slow handler delays the
/// processing of later frames. A panic inside a handler does not take the
/// connection down: it is logged and re-raised on a separate task, and the
/// next frame is delivered as usual.
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one raw inbound frame.
    fn handle(&self, frame: &str);
}

impl<F> EventHandler for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn handle(&self, frame: &str) {
        self(frame)
    }
}

/// Handler that pushes frames into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    sender: mpsc::UnboundedSender<String>,
}

impl EventHandler for ChannelHandler {
    fn handle(&self, frame: &str) {
        if self.sender.send(frame.to_owned()).is_err() {
            tracing::debug!("event stream dropped, discarding frame");
        }
    }
}

/// Stream of raw frames fed by a [`ChannelHandler`].
///
/// Ends when every handler feeding it has been dropped.
pub struct EventStream {
    receiver: UnboundedReceiverStream<String>,
}

impl EventStream {
    /// Receive the next frame.
    pub async fn recv(&mut self) -> Option<String> {
        StreamExt::next(self).await
    }
}

impl Stream for EventStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

/// Create a handler and the stream it feeds.
pub fn channel() -> (ChannelHandler, EventStream) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        ChannelHandler { sender },
        EventStream {
            receiver: UnboundedReceiverStream::new(receiver),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_handler_delivers_in_order() {
        let (handler, mut events) = channel();
        handler.handle("first");
        handler.handle("second");
        drop(handler);

        assert_eq!(events.recv().await.as_deref(), Some("first"));
        assert_eq!(events.next().await.as_deref(), Some("second"));
        assert_eq!(events.next().await, None);
    }

    #[test]
    fn test_closure_is_a_handler() {
        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = move |frame: &str| sink.lock().push(frame.to_owned());

        handler.handle("frame");
        assert_eq!(*seen.lock(), vec!["frame".to_string()]);
    }

    #[test]
    fn test_dropped_stream_does_not_panic() {
        let (handler, events) = channel();
        drop(events);
        handler.handle("ignored");
    }
}
