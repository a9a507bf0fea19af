//! Socket transport seam.
//!
//! The connection task only needs an ordered, message-framed, full-duplex
//! channel of text frames. [`Transport`] is that channel and [`Connector`]
//! opens one. [`WebSocketConnector`] is the production implementation over
//! `tokio-tungstenite`; tests plug in an in-memory pair instead.

use crate::error::{RelayError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An open, ordered channel of text frames.
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame.
    async fn send(&mut self, frame: String) -> Result<()>;

    /// Next inbound frame. `None` once the transport is closed.
    ///
    /// Must be cancel-safe: the connection task races it against timers.
    async fn recv(&mut self) -> Option<Result<String>>;

    /// Close the transport. Closing an already closed transport is not an
    /// error.
    async fn close(&mut self) -> Result<()>;
}

/// Opens transports to the relay service.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new transport to `url`.
    async fn connect(&self, url: &Url) -> Result<Box<dyn Transport>>;
}

/// Connector for `ws://` and `wss://` endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Transport>> {
        let (stream, response) = connect_async(url.as_str()).await?;
        tracing::debug!(status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WebSocketTransport::new(stream)))
    }
}

/// WebSocket-backed transport.
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    fn new(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

fn decode_binary(data: Bytes) -> Result<String> {
    String::from_utf8(data.to_vec())
        .map_err(|e| RelayError::Transport(format!("binary frame is not UTF-8: {e}")))
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: String) -> Result<()> {
        if self.closed {
            return Err(RelayError::Transport("socket is closed".into()));
        }
        self.stream.send(Message::Text(frame.into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        if self.closed {
            return None;
        }
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text.as_str().to_owned())),
                Some(Ok(Message::Binary(data))) => return Some(decode_binary(data)),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "server closed socket");
                    self.closed = true;
                    return None;
                }
                // ping/pong are answered by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    // tungstenite cannot resume a stream after an error
                    self.closed = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
