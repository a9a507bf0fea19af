//! Classification of inbound frames.
//!
//! Every decoded frame is either consumed by the protocol (authentication
//! acknowledgement, ping) or forwarded to the caller's handler. Classification
//! order:
//!
//! | Frame | Action |
//! |-------|--------|
//! | status `authenticated` | reply with `subscribe`, not forwarded |
//! | status `ping` | reply with `pong`, not forwarded |
//! | status `subscribed` | logged, forwarded |
//! | status `unauthorized` | logged, forwarded |
//! | any other status | forwarded |
//! | `webhook` | forwarded |
//! | any other type | warning logged, forwarded |
//!
//! Frames that are not JSON at all are logged and dropped. Nothing the relay
//! sends can make the dispatcher fail.
//!
//! A panic in the handler is caught so the connection survives it, then
//! raised again on a task of its own.

use crate::client::handler::EventHandler;
use crate::protocol::{decode, ClientFrame, EventType, Status, SubscriptionEvent};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// What the protocol does with a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Credentials accepted: send the subscription.
    Subscribe,
    /// Liveness check: answer it.
    Pong,
    /// Recognized frame for the caller.
    Forward,
    /// Unrecognized frame type, still handed to the caller.
    ForwardUnknown,
}

/// Classify a decoded frame.
///
/// ```
/// use webhookrelay_client::client::{route, Route};
/// use webhookrelay_client::protocol::decode;
///
/// let ping = decode(r#"{"type":"status","status":"ping"}"#).unwrap();
/// assert_eq!(route(&ping), Route::Pong);
/// ```
pub fn route(event: &SubscriptionEvent) -> Route {
    match (&event.kind, &event.status) {
        (EventType::Status, Status::Authenticated) => Route::Subscribe,
        (EventType::Status, Status::Ping) => Route::Pong,
        (EventType::Status, _) | (EventType::Webhook, _) => Route::Forward,
        (EventType::Other(_), _) => Route::ForwardUnknown,
    }
}

/// Result of dispatching one raw frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    /// Send this frame back to the server.
    Reply(ClientFrame),
    /// The frame went to the caller's handler.
    Forwarded,
    /// The frame was not JSON.
    Dropped,
}

/// Routes frames for one client.
pub(crate) struct Dispatcher {
    key: String,
    buckets: Arc<[String]>,
    handler: Option<Arc<dyn EventHandler>>,
}

impl Dispatcher {
    pub(crate) fn new(
        key: impl Into<String>,
        buckets: Arc<[String]>,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> Self {
        Self {
            key: key.into(),
            buckets,
            handler,
        }
    }

    /// Decode and dispatch a raw frame.
    pub(crate) fn dispatch_raw(&self, raw: &str) -> Action {
        match decode(raw) {
            Ok(event) => self.dispatch(&event, raw),
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                Action::Dropped
            }
        }
    }

    /// Dispatch a decoded frame; `raw` is what the handler receives.
    pub(crate) fn dispatch(&self, event: &SubscriptionEvent, raw: &str) -> Action {
        match route(event) {
            Route::Subscribe => {
                tracing::debug!(buckets = ?self.buckets, "authenticated, subscribing");
                Action::Reply(ClientFrame::Subscribe {
                    buckets: self.buckets.to_vec(),
                })
            }
            Route::Pong => Action::Reply(ClientFrame::Pong),
            Route::Forward => {
                if event.is_status(&Status::Subscribed) {
                    tracing::info!("subscribed to webhook stream successfully");
                } else if event.is_status(&Status::Unauthorized) {
                    tracing::error!(key = %self.key, "authorization failed");
                }
                self.forward(raw)
            }
            Route::ForwardUnknown => {
                tracing::warn!(kind = %event.kind, "unknown message type");
                self.forward(raw)
            }
        }
    }

    fn forward(&self, raw: &str) -> Action {
        let Some(handler) = &self.handler else {
            tracing::debug!("no handler configured, dropping frame");
            return Action::Forwarded;
        };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(raw))) {
            tracing::error!("event handler panicked");
            tokio::spawn(async move {
                panic::resume_unwind(payload);
            });
        }
        Action::Forwarded
    }
}
