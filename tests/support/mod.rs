//! In-memory relay server for connection tests.
//!
//! Every transport the client opens shows up on the test side as a
//! [`ServerSide`]: the frames the client sent, and a way to push frames,
//! errors or a close back at it.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use webhookrelay_client::handler::{self, EventStream};
use webhookrelay_client::{
    Connector, Credentials, EventHandler, RelayClient, RelayConfig, RelayError, Result,
    Transport,
};

enum Inbound {
    Frame(String),
    Error(String),
}

struct MemoryTransport {
    to_server: Option<mpsc::UnboundedSender<String>>,
    from_server: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, frame: String) -> Result<()> {
        let to_server = self
            .to_server
            .as_ref()
            .ok_or_else(|| RelayError::Transport("closed".into()))?;
        to_server
            .send(frame)
            .map_err(|_| RelayError::Transport("server gone".into()))
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        if self.to_server.is_none() {
            return None;
        }
        match self.from_server.recv().await? {
            Inbound::Frame(frame) => Some(Ok(frame)),
            Inbound::Error(error) => Some(Err(RelayError::Transport(error))),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.to_server = None;
        Ok(())
    }
}

struct MemoryConnector {
    sessions: mpsc::UnboundedSender<ServerSide>,
    attempts: Arc<AtomicUsize>,
    refuse: Arc<AtomicUsize>,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _url: &Url) -> Result<Box<dyn Transport>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(RelayError::Transport("connection refused".into()));
        }

        let (to_server, outbound) = mpsc::unbounded_channel();
        let (inbound, from_server) = mpsc::unbounded_channel();
        self.sessions
            .send(ServerSide {
                outbound,
                inbound: Some(inbound),
            })
            .map_err(|_| RelayError::Transport("test server gone".into()))?;

        Ok(Box::new(MemoryTransport {
            to_server: Some(to_server),
            from_server,
        }))
    }
}

/// Test end of one transport.
pub struct ServerSide {
    outbound: mpsc::UnboundedReceiver<String>,
    inbound: Option<mpsc::UnboundedSender<Inbound>>,
}

impl ServerSide {
    /// Deliver a raw frame to the client.
    pub fn push(&self, frame: &str) {
        if let Some(inbound) = &self.inbound {
            let _ = inbound.send(Inbound::Frame(frame.to_owned()));
        }
    }

    /// Deliver a transport error to the client.
    pub fn push_error(&self, error: &str) {
        if let Some(inbound) = &self.inbound {
            let _ = inbound.send(Inbound::Error(error.to_owned()));
        }
    }

    /// Close the transport from the server side.
    pub fn close(&mut self) {
        self.inbound = None;
    }

    /// Next frame sent by the client, parsed. `None` once the client closed
    /// or dropped the transport.
    pub async fn next_frame(&mut self) -> Option<Value> {
        let frame = self.outbound.recv().await?;
        Some(serde_json::from_str(&frame).expect("client sent invalid JSON"))
    }

    /// Frame already sent by the client, if any.
    pub fn try_frame(&mut self) -> Option<Value> {
        let frame = self.outbound.try_recv().ok()?;
        Some(serde_json::from_str(&frame).expect("client sent invalid JSON"))
    }

    /// Next frame, asserting its action.
    pub async fn expect_action(&mut self, action: &str) -> Value {
        let frame = self.next_frame().await.expect("transport closed");
        assert_eq!(frame["action"], action, "unexpected frame {frame}");
        frame
    }

    /// Wait until the client has closed this transport, discarding frames.
    pub async fn closed(&mut self) {
        while self.outbound.recv().await.is_some() {}
    }

    /// Play the relay's side of the handshake up to the subscription.
    pub async fn handshake(&mut self) -> Value {
        self.expect_action("auth").await;
        self.push(r#"{"type":"status","status":"authenticated"}"#);
        self.expect_action("subscribe").await
    }
}

/// Test end of the connector.
pub struct Server {
    sessions: mpsc::UnboundedReceiver<ServerSide>,
    attempts: Arc<AtomicUsize>,
    refuse: Arc<AtomicUsize>,
}

impl Server {
    /// Wait for the client to open a transport.
    pub async fn accept(&mut self) -> ServerSide {
        self.sessions.recv().await.expect("connector dropped")
    }

    /// Transport opened but not yet accepted, if any.
    pub fn try_accept(&mut self) -> Option<ServerSide> {
        self.sessions.try_recv().ok()
    }

    /// Refuse the next `n` connection attempts.
    pub fn refuse_next(&self, n: usize) {
        self.refuse.store(n, Ordering::SeqCst);
    }

    /// Connection attempts so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

pub fn config() -> RelayConfig {
    RelayConfig {
        socket_url: "ws://relay.test/v1/socket".into(),
        api_base: "http://relay.test".into(),
        ..Default::default()
    }
}

/// Client wired to an in-memory server, with its frames on a stream.
pub fn client(buckets: &[&str]) -> (RelayClient, Server, EventStream) {
    let (handler, events) = handler::channel();
    let (client, server) = client_with_handler(buckets, handler);
    (client, server, events)
}

/// Client wired to an in-memory server, delivering frames to `handler`.
pub fn client_with_handler(
    buckets: &[&str],
    handler: impl EventHandler,
) -> (RelayClient, Server) {
    let (sessions_tx, sessions) = mpsc::unbounded_channel();
    let attempts = Arc::new(AtomicUsize::new(0));
    let refuse = Arc::new(AtomicUsize::new(0));
    let connector = MemoryConnector {
        sessions: sessions_tx,
        attempts: attempts.clone(),
        refuse: refuse.clone(),
    };

    let client = RelayClient::builder(Credentials::new("key", "secret"))
        .with_buckets(buckets.iter().copied())
        .with_handler(handler)
        .with_config(config())
        .with_connector(connector)
        .build()
        .expect("valid test config");

    (
        client,
        Server {
            sessions,
            attempts,
            refuse,
        },
    )
}
