//! Relay wire protocol: constants, message types and the JSON codec.
//!
//! # Socket frames
//!
//! | Direction | Frame |
//! |-----------|-------|
//! | client → server | `{"action":"auth","key":..,"secret":..}` |
//! | client → server | `{"action":"subscribe","buckets":[..]}` |
//! | client → server | `{"action":"pong"}` |
//! | server → client | `{"type":"status","status":..,"message":..}` |
//! | server → client | `{"type":"webhook","meta":{..},"headers":{..},"query":..,"body":..,"method":..}` |
//!
//! # Side channel
//!
//! Responses are not sent over the socket. They are `PUT` to
//! `<api-base>/v1/logs/<id>` as a [`LogUpdate`] with basic authentication.

pub mod constants;
mod messages;

pub use messages::{
    decode, encode_response, ClientFrame, EventType, HeaderMap, LogUpdate, Meta,
    ResponseSubmission, Status, SubscriptionEvent,
};
