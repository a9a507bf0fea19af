//! Wire constants shared by the socket protocol and the relay API.

/// Default socket endpoint of the relay service.
pub const DEFAULT_SOCKET_URL: &str = "wss://my.webhookrelay.com/v1/socket";

/// Default base address of the relay HTTP API.
pub const DEFAULT_API_BASE: &str = "https://my.webhookrelay.com";

/// User agent sent on side-channel requests.
pub const DEFAULT_USER_AGENT: &str = "webhookrelay-ws-client";

/// Delay between a closed transport and the next connection attempt.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 3_000;

/// Maximum silence on an authenticated connection. Servers ping every minute.
pub const DEFAULT_KEEPALIVE_TIMEOUT_MS: u64 = 90_000;

/// Timeout for a single side-channel HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Path segments of the log resource updated by a response submission.
pub const LOGS_PATH: [&str; 2] = ["v1", "logs"];

/// Values of the `type` field on inbound frames.
pub mod event_types {
    /// Protocol status notification.
    pub const STATUS: &str = "status";
    /// Forwarded webhook delivery.
    pub const WEBHOOK: &str = "webhook";
}

/// Values of the `status` field on inbound status frames.
pub mod statuses {
    /// Credentials accepted; the client should subscribe.
    pub const AUTHENTICATED: &str = "authenticated";
    /// Subscription to the requested buckets is active.
    pub const SUBSCRIBED: &str = "subscribed";
    /// Credentials rejected.
    pub const UNAUTHORIZED: &str = "unauthorized";
    /// Server liveness check; answered with a pong.
    pub const PING: &str = "ping";
    /// Server-side error notification.
    pub const ERROR: &str = "error";
}
