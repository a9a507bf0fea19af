//! Relay socket client.
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── relay      - RelayClient and its builder
//! ├── connection - connection lifecycle task (handshake, keepalive, reconnect)
//! ├── dispatch   - classification of inbound frames
//! ├── responder  - side-channel responses over HTTP
//! ├── handler    - delivery of forwarded frames to caller code
//! ├── transport  - socket transport seam and WebSocket implementation
//! └── config     - credentials and client configuration
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RelayClient`] | Connects, subscribes, reconnects and responds |
//! | [`RelayConfig`] | Endpoints and timing |
//! | [`Credentials`] | Access key and secret |
//! | [`EventHandler`] | Receives raw forwarded frames |
//! | [`Responder`] | Submits responses without a socket |
//! | [`Transport`] / [`Connector`] | Pluggable socket transport |
//!
//! # Examples
//!
//! ```
//! use webhookrelay_client::client::{Credentials, RelayClient, RelayConfig};
//!
//! let client = RelayClient::builder(Credentials::new("key", "secret"))
//!     .with_buckets(["my-bucket"])
//!     .with_handler(|frame: &str| println!("{frame}"))
//!     .with_config(RelayConfig {
//!         reconnect_interval_ms: 3_000,
//!         ..Default::default()
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert!(!client.is_connected());
//! ```

mod config;
mod connection;
mod dispatch;
pub mod handler;
mod relay;
mod responder;
mod transport;

pub use config::{Credentials, RelayConfig, ENV_API_URL, ENV_KEY, ENV_SECRET, ENV_SOCKET_URL};
pub use connection::ConnectionPhase;
pub use dispatch::{route, Route};
pub use handler::{ChannelHandler, EventHandler, EventStream};
pub use relay::{RelayClient, RelayClientBuilder};
pub use responder::{RespondOutcome, Responder};
pub use transport::{Connector, Transport, WebSocketConnector, WebSocketTransport};
