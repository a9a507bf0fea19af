#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Webhook Relay socket client
//!
//! A relay service receives third-party webhooks into named delivery
//! channels ("buckets") and forwards them to subscribed clients over a
//! persistent socket. This crate is such a client: it authenticates,
//! subscribes to a fixed list of buckets, hands every forwarded frame to a
//! caller-supplied handler, keeps the connection alive and reconnects when
//! it drops. It can also answer a forwarded webhook by pushing a response
//! back to the relay, which returns it to the webhook's original caller.
//!
//! ## Lifecycle
//!
//! 1. `connect()` opens the socket and sends `auth`.
//! 2. The relay answers `authenticated`; the client sends `subscribe`.
//! 3. The relay pings about once a minute; the client answers `pong`.
//!    Ninety seconds without any traffic marks the connection dead.
//! 4. When the socket closes for any reason other than `disconnect()`, the
//!    client reconnects after three seconds and starts over at step 1.
//!
//! Delivery is at least once. Frames may repeat or arrive out of order
//! around a reconnect.
//!
//! ## Module Structure
//!
//! - **[client]** - `RelayClient`, connection lifecycle, dispatch, responder
//! - **[protocol]** - wire constants, message types and codec
//! - **[error]** - error type and result alias
//! - **[logging]** - tracing subscriber setup for binaries

pub mod client;
pub mod error;
pub mod logging;
pub mod protocol;

pub use client::{
    handler, ConnectionPhase, Connector, Credentials, EventHandler, RelayClient,
    RelayClientBuilder, RelayConfig, RespondOutcome, Responder, Transport,
};
pub use error::{RelayError, Result};
pub use protocol::{ClientFrame, Meta, ResponseSubmission, SubscriptionEvent};
