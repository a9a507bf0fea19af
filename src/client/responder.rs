//! Side-channel responses to forwarded webhooks.
//!
//! A response does not travel over the socket. It is validated, converted
//! into a [`LogUpdate`] and `PUT` to `<api-base>/v1/logs/<id>` with the
//! client's key and secret as basic-auth credentials.
//!
//! Submission is best effort: validation failures, non-200 answers and
//! network errors are logged and reported through [`RespondOutcome`], never
//! retried and never returned as errors. The original caller of the webhook
//! may already have given up by the time a response arrives.
//!
//! # Examples
//!
//! ```ignore
//! use webhookrelay_client::protocol::{decode, ResponseSubmission};
//!
//! let event = decode(&frame)?;
//! let outcome = client
//!     .respond(
//!         &ResponseSubmission::for_event(&event)
//!             .with_status(201)
//!             .with_header("Content-Type", "text/plain")
//!             .with_body("banana"),
//!     )
//!     .await;
//! assert!(outcome.is_delivered());
//! ```

use crate::client::config::{Credentials, RelayConfig};
use crate::error::{RelayError, Result};
use crate::protocol::constants::LOGS_PATH;
use crate::protocol::{LogUpdate, ResponseSubmission};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// How a response submission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespondOutcome {
    /// The relay API accepted the response.
    Delivered,
    /// The submission failed validation; no request was made.
    Rejected(String),
    /// The request failed or the API answered with a non-200 status.
    Failed(String),
}

impl RespondOutcome {
    /// Whether the relay API accepted the response.
    pub fn is_delivered(&self) -> bool {
        matches!(self, RespondOutcome::Delivered)
    }
}

/// Submits responses to the relay API.
///
/// Cheap to clone; independent of the socket connection and safe to use
/// from many tasks at once.
#[derive(Debug, Clone)]
pub struct Responder {
    client: reqwest::Client,
    api_base: Url,
    credentials: Credentials,
}

impl Responder {
    /// Create a responder for the API configured in `config`.
    pub fn new(credentials: Credentials, config: &RelayConfig) -> Result<Self> {
        let api_base = config.parsed_api_base()?;
        if api_base.cannot_be_a_base() {
            return Err(RelayError::InvalidUrl(
                url::ParseError::RelativeUrlWithCannotBeABaseBase,
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(config.user_agent.as_str())
            .build()
            .unwrap_or_default();

        Ok(Self {
            client,
            api_base,
            credentials,
        })
    }

    /// Address of the log record `id`.
    pub fn log_url(&self, id: &str) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(LOGS_PATH).push(id);
        }
        url
    }

    /// Check that `submission` can be delivered and return its log id.
    pub fn validate(submission: &ResponseSubmission) -> Result<&str> {
        let meta = submission.meta.as_ref().ok_or_else(|| {
            RelayError::InvalidResponse(
                "meta is missing; pass the meta received with the webhook".into(),
            )
        })?;
        meta.log_id().ok_or_else(|| {
            RelayError::InvalidResponse(
                "meta.id cannot be empty; pass the whole meta received with the webhook".into(),
            )
        })
    }

    /// Validate and submit a response.
    pub async fn respond(&self, submission: &ResponseSubmission) -> RespondOutcome {
        let id = match Self::validate(submission) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, "response rejected");
                return RespondOutcome::Rejected(e.to_string());
            }
        };

        let update = LogUpdate::from_submission(submission);
        match self.submit(id, &update).await {
            Ok(()) => {
                tracing::debug!(log_id = id, status = update.status_code, "response delivered");
                RespondOutcome::Delivered
            }
            Err(e) => {
                tracing::error!(log_id = id, error = %e, "failed to deliver response");
                RespondOutcome::Failed(e.to_string())
            }
        }
    }

    /// Submit a response given as untyped JSON.
    ///
    /// `null`, `{}`, `[]` and `""` are rejected as empty, as is anything that
    /// does not have the shape of a [`ResponseSubmission`].
    pub async fn respond_json(&self, value: &Value) -> RespondOutcome {
        if is_empty(value) {
            tracing::error!("response message cannot be empty");
            return RespondOutcome::Rejected("response message cannot be empty".into());
        }
        match serde_json::from_value::<ResponseSubmission>(value.clone()) {
            Ok(submission) => self.respond(&submission).await,
            Err(e) => {
                tracing::error!(error = %e, "response has an invalid shape");
                RespondOutcome::Rejected(format!("invalid response: {e}"))
            }
        }
    }

    async fn submit(&self, id: &str, update: &LogUpdate) -> Result<()> {
        let response = self
            .client
            .put(self.log_url(id))
            .basic_auth(self.credentials.key(), Some(self.credentials.secret()))
            .json(update)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::UnexpectedStatus { status, body });
        }
        Ok(())
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Meta;

    fn responder(api_base: &str) -> Responder {
        let config = RelayConfig {
            api_base: api_base.into(),
            ..Default::default()
        };
        Responder::new(Credentials::new("key", "secret"), &config).unwrap()
    }

    #[test]
    fn test_log_url() {
        let url = responder("https://my.webhookrelay.com").log_url("abc");
        assert_eq!(url.as_str(), "https://my.webhookrelay.com/v1/logs/abc");

        let url = responder("http://localhost:8080/relay/").log_url("a/b c");
        assert_eq!(url.as_str(), "http://localhost:8080/relay/v1/logs/a%2Fb%20c");
    }

    #[test]
    fn test_validate() {
        let mut submission = ResponseSubmission::default();
        assert!(Responder::validate(&submission).is_err());

        submission.meta = Some(Meta::default());
        assert!(Responder::validate(&submission).is_err());

        submission.meta = Some(Meta {
            id: Some("abc".into()),
            ..Meta::default()
        });
        assert_eq!(Responder::validate(&submission).unwrap(), "abc");
    }

    #[test]
    fn test_cannot_be_a_base_api_is_rejected() {
        let config = RelayConfig {
            api_base: "mailto:ops@example.com".into(),
            ..Default::default()
        };
        let result = Responder::new(Credentials::new("k", "s"), &config);
        assert!(matches!(result, Err(RelayError::InvalidUrl(_))));
    }

    #[test]
    fn test_empty_values() {
        assert!(is_empty(&Value::Null));
        assert!(is_empty(&serde_json::json!({})));
        assert!(is_empty(&serde_json::json!("")));
        assert!(!is_empty(&serde_json::json!({"meta": {}})));
    }
}
