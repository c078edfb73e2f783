use std::fmt;

use multistripe_types::UnknownEventType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::normalizer::WebhookStage;

/// Error returned by the vendor API, passed through without interpretation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// HTTP status of the vendor response, absent for transport failures
    pub status: Option<u16>,
    /// Vendor error category (e.g., "card_error")
    pub error_type: Option<String>,
    pub code: Option<String>,
    pub decline_code: Option<String>,
    pub param: Option<String>,
    pub message: String,
}

impl RemoteError {
    /// Error raised before any vendor response was received
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, &self.code) {
            (Some(status), Some(code)) => write!(f, "{} ({}): {}", status, code, self.message),
            (Some(status), None) => write!(f, "{}: {}", status, self.message),
            (None, _) => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Classified failures surfaced by adapters, the normalizer and the registry
#[derive(Error, Debug)]
pub enum StripeError {
    /// Bad or missing webhook signature
    #[error("Authentication failure: {0}")]
    AuthenticationFailure(String),

    /// Verified event whose kind matches none of the known kinds
    #[error("Unrecognized event kind: {0}")]
    UnrecognizedEventKind(String),

    /// Malformed nested event object
    #[error("Failed to decode {event_type} payload: {source}")]
    DecodeFailure {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// Vendor API returned an error
    #[error("Remote call failed: {0}")]
    RemoteCallFailure(#[from] RemoteError),

    /// Registry lookup for a version nobody registered
    #[error("No adapter registered for version {0}")]
    NotRegistered(String),

    /// Operation invoked before the secret key was set
    #[error("Adapter {0} has no secret key configured")]
    NotConfigured(String),

    #[error("Call cancelled")]
    Cancelled,

    #[error("Call deadline exceeded")]
    DeadlineExceeded,

    /// Callback queue has no free slot (non-blocking publish only)
    #[error("Callback queue is full")]
    QueueFull,

    #[error("Callback queue closed")]
    QueueClosed,
}

impl From<UnknownEventType> for StripeError {
    fn from(err: UnknownEventType) -> Self {
        StripeError::UnrecognizedEventKind(err.0)
    }
}

impl StripeError {
    pub(crate) fn decode(event_type: impl Into<String>, source: serde_json::Error) -> Self {
        StripeError::DecodeFailure {
            event_type: event_type.into(),
            source,
        }
    }

    /// Last webhook stage reached before this error rejected the event
    ///
    /// `None` for errors that never come out of webhook processing.
    pub fn rejected_at(&self) -> Option<WebhookStage> {
        match self {
            StripeError::AuthenticationFailure(_) => Some(WebhookStage::Unverified),
            StripeError::UnrecognizedEventKind(_) => Some(WebhookStage::Verified),
            StripeError::DecodeFailure { .. } => Some(WebhookStage::Classified),
            _ => None,
        }
    }
}

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, StripeError>;
