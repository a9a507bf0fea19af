//! The public relay client.

use crate::client::config::{Credentials, RelayConfig};
use crate::client::connection::{Connection, ConnectionPhase, ConnectionSettings};
use crate::client::dispatch::Dispatcher;
use crate::client::handler::EventHandler;
use crate::client::responder::{RespondOutcome, Responder};
use crate::client::transport::{Connector, WebSocketConnector};
use crate::error::Result;
use crate::protocol::ResponseSubmission;
use serde_json::Value;
use std::sync::Arc;

/// Client for the relay service.
///
/// Subscribes to a fixed list of buckets over a persistent socket, hands
/// every forwarded frame to the configured [`EventHandler`] and reconnects
/// on its own when the socket drops. Responses to webhooks go through
/// [`respond`](Self::respond), which does not need a connection at all.
///
/// Clones share one connection. The connection task keeps running until
/// [`disconnect`](Self::disconnect) is called, even if every clone has been
/// dropped.
///
/// # Examples
///
/// ```ignore
/// use webhookrelay_client::{Credentials, RelayClient};
///
/// let client = RelayClient::new(
///     Credentials::from_env()?,
///     vec!["my-bucket".to_string()],
///     |frame: &str| println!("{frame}"),
/// )?;
/// client.connect().await?;
/// ```
#[derive(Clone)]
pub struct RelayClient {
    connection: Connection,
    responder: Responder,
    buckets: Arc<[String]>,
}

impl RelayClient {
    /// Client with the default configuration.
    pub fn new(
        credentials: Credentials,
        buckets: Vec<String>,
        handler: impl EventHandler,
    ) -> Result<Self> {
        Self::builder(credentials)
            .with_buckets(buckets)
            .with_handler(handler)
            .build()
    }

    /// Start building a client. A client built without buckets or handler
    /// can still [`respond`](Self::respond).
    pub fn builder(credentials: Credentials) -> RelayClientBuilder {
        RelayClientBuilder {
            credentials,
            buckets: Vec::new(),
            handler: None,
            config: RelayConfig::default(),
            connector: None,
        }
    }

    /// Open the connection and send the `auth` frame.
    ///
    /// Resolves as soon as the transport is open and `auth` has been sent;
    /// it does not wait for the relay to accept the credentials, so frames
    /// for the subscription may still be on their way. Returns immediately
    /// if already connected. If the transport cannot be opened the client
    /// keeps retrying at the reconnect interval and this call waits for the
    /// first success.
    ///
    /// Fails only with [`RelayError::Disconnected`](crate::RelayError::Disconnected)
    /// when [`disconnect`](Self::disconnect) is called while waiting.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn connect(&self) -> Result<()> {
        self.connection.connect().await
    }

    /// Close the connection and stop reconnecting until the next
    /// [`connect`](Self::connect). Idempotent.
    pub fn disconnect(&self) {
        self.connection.disconnect()
    }

    /// Submit a response to a forwarded webhook.
    pub async fn respond(&self, submission: &ResponseSubmission) -> RespondOutcome {
        self.responder.respond(submission).await
    }

    /// Submit a response given as untyped JSON.
    pub async fn respond_json(&self, submission: &Value) -> RespondOutcome {
        self.responder.respond_json(submission).await
    }

    /// Whether a transport is currently being opened.
    pub fn is_connecting(&self) -> bool {
        self.connection.is_connecting()
    }

    /// Whether the transport is open. True from the moment `auth` is sent.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Whether the last lifecycle event was an explicit disconnect.
    pub fn is_manually_disconnected(&self) -> bool {
        self.connection.is_manually_disconnected()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.connection.phase()
    }

    /// Buckets subscribed on every (re)authentication.
    pub fn buckets(&self) -> &[String] {
        &self.buckets
    }

    /// The side-channel responder, for use without a client handle.
    pub fn responder(&self) -> &Responder {
        &self.responder
    }
}

/// Builder for [`RelayClient`].
pub struct RelayClientBuilder {
    credentials: Credentials,
    buckets: Vec<String>,
    handler: Option<Arc<dyn EventHandler>>,
    config: RelayConfig,
    connector: Option<Arc<dyn Connector>>,
}

impl RelayClientBuilder {
    /// Buckets to subscribe to, in order.
    pub fn with_buckets<I, S>(mut self, buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.buckets = buckets.into_iter().map(Into::into).collect();
        self
    }

    /// Append one bucket.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.buckets.push(bucket.into());
        self
    }

    /// Handler for forwarded frames.
    pub fn with_handler(mut self, handler: impl EventHandler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Open transports with `connector` instead of the WebSocket default.
    pub fn with_connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Validate the configuration and build the client.
    pub fn build(self) -> Result<RelayClient> {
        let socket_url = self.config.parsed_socket_url()?;
        let responder = Responder::new(self.credentials.clone(), &self.config)?;
        let buckets: Arc<[String]> = self.buckets.into();

        let span = tracing::info_span!("relay_client", key = %self.credentials.key());
        let dispatcher = Dispatcher::new(self.credentials.key(), buckets.clone(), self.handler);
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector) as Arc<dyn Connector>);

        let connection = Connection::new(ConnectionSettings {
            credentials: self.credentials,
            socket_url,
            reconnect_interval: self.config.reconnect_interval(),
            keepalive_timeout: self.config.keepalive_timeout(),
            connector,
            dispatcher,
            span,
        });

        Ok(RelayClient {
            connection,
            responder,
            buckets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RelayError;

    #[test]
    fn test_builder_keeps_bucket_order() {
        let client = RelayClient::builder(Credentials::new("k", "s"))
            .with_buckets(["b", "a"])
            .with_bucket("c")
            .build()
            .unwrap();
        assert_eq!(client.buckets(), ["b", "a", "c"]);
        assert_eq!(client.phase(), ConnectionPhase::Idle);
        assert!(!client.is_connected());
        assert!(!client.is_connecting());
    }

    #[test]
    fn test_invalid_socket_url_fails_build() {
        let result = RelayClient::builder(Credentials::new("k", "s"))
            .with_config(RelayConfig {
                socket_url: "::".into(),
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(RelayError::InvalidUrl(_))));
    }

    #[test]
    fn test_disconnect_before_connect_is_harmless() {
        let client = RelayClient::builder(Credentials::new("k", "s")).build().unwrap();
        client.disconnect();
        client.disconnect();
        assert!(client.is_manually_disconnected());
        assert_eq!(client.phase(), ConnectionPhase::Idle);
    }
}
