//! Message types exchanged with the relay service and their JSON codec.
//!
//! Inbound frames decode into [`SubscriptionEvent`]. Decoding is tolerant:
//! unknown fields are ignored, missing or `null` fields take their defaults,
//! text fields holding another JSON type keep its JSON text, headers accept a
//! single string per name, and unrecognized `type` / `status` values are
//! kept verbatim instead of failing. A JSON value that is not an object
//! decodes to an event of unknown type. Only text that is not JSON at all is
//! a decode error.
//!
//! Outbound socket frames are [`ClientFrame`]s. Responses to a webhook are
//! built by the caller as a [`ResponseSubmission`] and converted into the
//! [`LogUpdate`] record that the relay API stores against the log.
//!
//! # Examples
//!
//! ```
//! use webhookrelay_client::protocol::{decode, EventType, Status};
//!
//! let event = decode(r#"{"type":"status","status":"ping","extra":1}"#).unwrap();
//! assert_eq!(event.kind, EventType::Status);
//! assert_eq!(event.status, Status::Ping);
//! ```

use crate::error::{RelayError, Result};
use super::constants::{event_types, statuses};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Header name to ordered header values.
pub type HeaderMap = BTreeMap<String, Vec<String>>;

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn value_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

/// Text-like field: a string as-is, `null` as the default, anything else as
/// its JSON text.
fn lenient_text<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + From<String>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_text(value).map(T::from).unwrap_or_default())
}

/// Log id: strings and numbers are kept, anything else is absent.
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) => Some(id),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    })
}

/// Header map: a single value per name becomes a one-element list.
fn lenient_headers<'de, D>(deserializer: D) -> std::result::Result<HeaderMap, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(entries) = Value::deserialize(deserializer)? else {
        return Ok(HeaderMap::new());
    };
    Ok(entries
        .into_iter()
        .map(|(name, values)| {
            let values = match values {
                Value::Array(items) => items.into_iter().filter_map(value_text).collect(),
                single => value_text(single).into_iter().collect(),
            };
            (name, values)
        })
        .collect())
}

/// Meta object; any other JSON type counts as no meta.
fn lenient_meta<'de, D>(deserializer: D) -> std::result::Result<Option<Meta>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => Ok(Meta::deserialize(value).ok()),
        _ => Ok(None),
    }
}

/// Kind of an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// Protocol status notification.
    Status,
    /// Forwarded webhook delivery.
    Webhook,
    /// Anything else, kept as received.
    Other(String),
}

impl EventType {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Status => event_types::STATUS,
            EventType::Webhook => event_types::WEBHOOK,
            EventType::Other(other) => other,
        }
    }
}

impl Default for EventType {
    fn default() -> Self {
        EventType::Other(String::new())
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            event_types::STATUS => EventType::Status,
            event_types::WEBHOOK => EventType::Webhook,
            _ => EventType::Other(value),
        }
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        match value {
            EventType::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of the `status` field. The set is open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    /// Credentials accepted.
    Authenticated,
    /// Bucket subscription active.
    Subscribed,
    /// Credentials rejected.
    Unauthorized,
    /// Liveness check.
    Ping,
    /// Server-side error.
    Error,
    /// Unrecognized or absent status, kept as received.
    Other(String),
}

impl Status {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Status::Authenticated => statuses::AUTHENTICATED,
            Status::Subscribed => statuses::SUBSCRIBED,
            Status::Unauthorized => statuses::UNAUTHORIZED,
            Status::Ping => statuses::PING,
            Status::Error => statuses::ERROR,
            Status::Other(other) => other,
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Other(String::new())
    }
}

impl From<String> for Status {
    fn from(value: String) -> Self {
        match value.as_str() {
            statuses::AUTHENTICATED => Status::Authenticated,
            statuses::SUBSCRIBED => Status::Subscribed,
            statuses::UNAUTHORIZED => Status::Unauthorized,
            statuses::PING => Status::Ping,
            statuses::ERROR => Status::Error,
            _ => Status::Other(value),
        }
    }
}

impl From<Status> for String {
    fn from(value: Status) -> Self {
        match value {
            Status::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the log record behind a delivery.
///
/// A response must echo the `meta` of the webhook it answers; `id` addresses
/// the log record that the response updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meta {
    /// Log identifier. Required for responses.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_id")]
    pub id: Option<String>,
    /// Bucket that received the webhook.
    #[serde(deserialize_with = "lenient_text")]
    pub bucket_id: String,
    /// Human-readable bucket name.
    #[serde(deserialize_with = "lenient_text")]
    pub bucket_name: String,
    /// Input (public endpoint) identifier.
    #[serde(deserialize_with = "lenient_text")]
    pub input_id: String,
    /// Input name.
    #[serde(deserialize_with = "lenient_text")]
    pub input_name: String,
    /// Output name.
    #[serde(deserialize_with = "lenient_text")]
    pub output_name: String,
    /// Output destination address.
    #[serde(deserialize_with = "lenient_text")]
    pub output_destination: String,
}

impl Meta {
    /// The log id, if present and non-empty.
    pub fn log_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Inbound frame: a status notification or a forwarded webhook.
///
/// Webhook-only fields (`headers`, `query`, `body`, `method`) are empty on
/// status frames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionEvent {
    /// Frame kind.
    #[serde(rename = "type", deserialize_with = "lenient_text")]
    pub kind: EventType,
    /// Status value on status frames.
    #[serde(deserialize_with = "lenient_text")]
    pub status: Status,
    /// Free-form server message.
    #[serde(deserialize_with = "lenient_text")]
    pub message: String,
    /// Originating log record.
    #[serde(deserialize_with = "lenient_meta")]
    pub meta: Option<Meta>,
    /// Request headers of the forwarded webhook.
    #[serde(deserialize_with = "lenient_headers")]
    pub headers: HeaderMap,
    /// Raw query string.
    #[serde(deserialize_with = "lenient_text")]
    pub query: String,
    /// Raw request body.
    #[serde(deserialize_with = "lenient_text")]
    pub body: String,
    /// HTTP method of the forwarded webhook.
    #[serde(deserialize_with = "lenient_text")]
    pub method: String,
}

impl SubscriptionEvent {
    /// Whether this is a status frame carrying `status`.
    pub fn is_status(&self, status: &Status) -> bool {
        self.kind == EventType::Status && &self.status == status
    }

    /// Log id of the delivery, if this event can be answered.
    pub fn log_id(&self) -> Option<&str> {
        self.meta.as_ref().and_then(Meta::log_id)
    }

    /// Identifier of the bucket that received the webhook.
    pub fn bucket_id(&self) -> Option<&str> {
        self.meta.as_ref().map(|meta| meta.bucket_id.as_str())
    }

    /// Name of the bucket that received the webhook.
    pub fn bucket_name(&self) -> Option<&str> {
        self.meta.as_ref().map(|meta| meta.bucket_name.as_str())
    }
}

/// Decode a raw inbound frame.
pub fn decode(raw: &str) -> Result<SubscriptionEvent> {
    let value: Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Ok(SubscriptionEvent::default());
    }
    Ok(SubscriptionEvent::deserialize(value)?)
}

/// Outbound socket frame.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Handshake carrying the credentials.
    Auth {
        /// Access key.
        key: String,
        /// Access secret.
        secret: String,
    },
    /// Subscription request for the configured buckets.
    Subscribe {
        /// Bucket names or ids, in configured order.
        buckets: Vec<String>,
    },
    /// Answer to a server ping.
    Pong,
}

impl ClientFrame {
    /// Serialize to the JSON text sent over the socket.
    ///
    /// ```
    /// use webhookrelay_client::protocol::ClientFrame;
    ///
    /// assert_eq!(ClientFrame::Pong.encode().unwrap(), r#"{"action":"pong"}"#);
    /// ```
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| RelayError::Encode(e.to_string()))
    }

    /// Action name, for logging.
    pub fn action(&self) -> &'static str {
        match self {
            ClientFrame::Auth { .. } => "auth",
            ClientFrame::Subscribe { .. } => "subscribe",
            ClientFrame::Pong => "pong",
        }
    }
}

impl fmt::Debug for ClientFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientFrame::Auth { key, .. } => f
                .debug_struct("Auth")
                .field("key", key)
                .field("secret", &"<redacted>")
                .finish(),
            ClientFrame::Subscribe { buckets } => {
                f.debug_struct("Subscribe").field("buckets", buckets).finish()
            }
            ClientFrame::Pong => f.write_str("Pong"),
        }
    }
}

/// Caller-built response to a forwarded webhook.
///
/// `meta` must be the `meta` received with the webhook; a missing `status`
/// defaults to 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseSubmission {
    /// Echo of the triggering event's `meta`.
    pub meta: Option<Meta>,
    /// HTTP status returned to the original caller.
    pub status: u16,
    /// Response headers.
    #[serde(deserialize_with = "null_as_default")]
    pub headers: HeaderMap,
    /// Raw response body.
    #[serde(deserialize_with = "null_as_default")]
    pub body: String,
}

impl Default for ResponseSubmission {
    fn default() -> Self {
        Self {
            meta: None,
            status: 200,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }
}

impl ResponseSubmission {
    /// Start a response to `event`, echoing its `meta`.
    pub fn for_event(event: &SubscriptionEvent) -> Self {
        Self {
            meta: event.meta.clone(),
            ..Self::default()
        }
    }

    /// Set the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Append a header value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// Record stored against a log by the relay API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogUpdate {
    /// Log identifier.
    pub id: String,
    /// Bucket the log belongs to.
    pub bucket_id: String,
    /// Base64 of the response body.
    pub response_body: String,
    /// Status code for the original caller.
    pub status_code: u16,
    /// Response headers.
    pub response_headers: HeaderMap,
}

impl LogUpdate {
    /// Build the record for `submission`. Validation is the caller's job;
    /// a missing meta yields empty identifiers.
    pub fn from_submission(submission: &ResponseSubmission) -> Self {
        let meta = submission.meta.clone().unwrap_or_default();
        Self {
            id: meta.id.unwrap_or_default(),
            bucket_id: meta.bucket_id,
            response_body: STANDARD.encode(submission.body.as_bytes()),
            status_code: submission.status,
            response_headers: submission.headers.clone(),
        }
    }

    /// Decoded response body bytes.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.response_body)
            .map_err(|e| RelayError::InvalidResponse(format!("response_body is not base64: {e}")))
    }
}

/// Encode a response submission into the JSON body of the log update call.
pub fn encode_response(submission: &ResponseSubmission) -> Result<Vec<u8>> {
    serde_json::to_vec(&LogUpdate::from_submission(submission))
        .map_err(|e| RelayError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBHOOK: &str = r#"{
        "type": "webhook",
        "meta": {
            "id": "log-1",
            "bucket_id": "1593fe5f-45f9-45cc-ba23-675fdc7c1638",
            "bucket_name": "my-1-bucket-name",
            "input_id": "b90f2fe9-621d-4290-9e74-edd5b61325dd",
            "input_name": "Default public endpoint",
            "output_name": "111",
            "output_destination": "http://localhost:8080"
        },
        "headers": {"Content-Type": ["application/json"]},
        "query": "foo=bar",
        "body": "{\"hi\": \"there\"}",
        "method": "PUT"
    }"#;

    #[test]
    fn test_decode_webhook() {
        let event = decode(WEBHOOK).unwrap();
        assert_eq!(event.kind, EventType::Webhook);
        assert_eq!(event.method, "PUT");
        assert_eq!(event.query, "foo=bar");
        assert_eq!(event.body, r#"{"hi": "there"}"#);
        assert_eq!(event.headers["Content-Type"], vec!["application/json"]);
        assert_eq!(event.log_id(), Some("log-1"));
        assert_eq!(event.bucket_name(), Some("my-1-bucket-name"));
        assert_eq!(
            event.bucket_id(),
            Some("1593fe5f-45f9-45cc-ba23-675fdc7c1638")
        );
    }

    #[test]
    fn test_decode_tolerates_unknown_and_null_fields() {
        let event = decode(
            r#"{"type":"status","status":"draining","message":null,"meta":{"id":null},"created":"x"}"#,
        )
        .unwrap();
        assert_eq!(event.kind, EventType::Status);
        assert_eq!(event.status, Status::Other("draining".into()));
        assert!(event.message.is_empty());
        assert_eq!(event.log_id(), None);
    }

    #[test]
    fn test_decode_keeps_unknown_type() {
        let event = decode(r#"{"type":"telemetry"}"#).unwrap();
        assert_eq!(event.kind, EventType::Other("telemetry".into()));
        assert_eq!(event.kind.to_string(), "telemetry");
    }

    #[test]
    fn test_decode_rejects_invalid_json_only() {
        assert!(matches!(decode("not json"), Err(RelayError::Decode(_))));
        assert!(matches!(decode("{\"type\":"), Err(RelayError::Decode(_))));

        for raw in ["\"ping\"", "null", "[1,2]", "7"] {
            let event = decode(raw).unwrap();
            assert_eq!(event.kind, EventType::Other(String::new()));
        }
    }

    #[test]
    fn test_decode_tolerates_mistyped_fields() {
        let event = decode(r#"{"type":7,"status":["ping"]}"#).unwrap();
        assert_eq!(event.kind, EventType::Other("7".into()));
        assert_eq!(event.status, Status::Other(r#"["ping"]"#.into()));

        let event = decode(
            r#"{"type":"webhook","headers":{"Content-Type":"application/json","X-N":[1,"b"]}}"#,
        )
        .unwrap();
        assert_eq!(event.headers["Content-Type"], vec!["application/json"]);
        assert_eq!(event.headers["X-N"], vec!["1", "b"]);

        let event = decode(r#"{"type":"webhook","meta":{"id":42,"bucket_id":true}}"#).unwrap();
        assert_eq!(event.log_id(), Some("42"));
        assert_eq!(event.bucket_id(), Some("true"));

        let event = decode(r#"{"type":"webhook","body":{"a":1},"message":{"code":1}}"#).unwrap();
        assert_eq!(event.body, r#"{"a":1}"#);
        assert_eq!(event.message, r#"{"code":1}"#);

        let event = decode(r#"{"type":"webhook","meta":"log-1","headers":"x"}"#).unwrap();
        assert!(event.meta.is_none());
        assert!(event.headers.is_empty());
    }

    #[test]
    fn test_empty_log_id_is_absent() {
        let meta = Meta {
            id: Some(String::new()),
            ..Meta::default()
        };
        assert_eq!(meta.log_id(), None);
    }

    #[test]
    fn test_client_frames_on_the_wire() {
        let auth = ClientFrame::Auth {
            key: "k".into(),
            secret: "s".into(),
        };
        let json: serde_json::Value = serde_json::from_str(&auth.encode().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"action": "auth", "key": "k", "secret": "s"})
        );

        let subscribe = ClientFrame::Subscribe {
            buckets: vec!["b".into(), "a".into()],
        };
        assert_eq!(
            subscribe.encode().unwrap(),
            r#"{"action":"subscribe","buckets":["b","a"]}"#
        );
    }

    #[test]
    fn test_auth_debug_redacts_secret() {
        let auth = ClientFrame::Auth {
            key: "k".into(),
            secret: "hunter2".into(),
        };
        assert!(!format!("{auth:?}").contains("hunter2"));
    }

    #[test]
    fn test_submission_defaults() {
        let submission: ResponseSubmission =
            serde_json::from_str(r#"{"meta":{"id":"abc"},"headers":null}"#).unwrap();
        assert_eq!(submission.status, 200);
        assert!(submission.headers.is_empty());
        assert!(submission.body.is_empty());
    }

    #[test]
    fn test_response_round_trip() {
        let event = decode(WEBHOOK).unwrap();
        let submission = ResponseSubmission::for_event(&event)
            .with_status(201)
            .with_header("xkey", "xvalue")
            .with_body("banana");

        let encoded = encode_response(&submission).unwrap();
        let record: LogUpdate = serde_json::from_slice(&encoded).unwrap();

        assert_eq!(record.id, "log-1");
        assert_eq!(record.status_code, 201);
        assert_eq!(record.response_body, "YmFuYW5h");
        assert_eq!(record.decode_body().unwrap(), b"banana");
        assert_eq!(record.response_headers["xkey"], vec!["xvalue"]);
    }
}
