use thiserror::Error;

use crate::models::Severity;

/// Error type covering every failure mode of the notification subsystem.
///
/// Construction failures are reported before any network I/O happens, input
/// failures before any network I/O for the offending `post` call. Delivery
/// failures are only reported after the pipeline's own bounded retries are
/// exhausted.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Provider configuration rejected at construction time
    #[error("invalid provider configuration for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    /// Event is missing or carries malformed required metadata
    #[error("invalid event input: {message}")]
    Input { message: String },

    /// Severity/reason combination that maps to no commit status state
    #[error("cannot map severity {severity:?} to a commit status state")]
    StateMapping { severity: Severity },

    /// HTTP delivery failed: rejected response, transport failure after
    /// retries, or an unreadable response body
    #[error("delivery failed: {message}")]
    Delivery {
        status_code: Option<u16>,
        message: String,
    },

    /// A forge REST operation failed
    #[error("{operation} failed")]
    Api {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// Notification payload could not be serialized to JSON
    #[error("failed to serialize notification payload")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },

    /// The caller-supplied cancellation context fired mid-flight
    #[error("operation cancelled")]
    Cancelled,
}

impl NotifyError {
    /// Shorthand for construction-time validation failures
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        NotifyError::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for per-call input failures
    pub fn input(message: impl Into<String>) -> Self {
        NotifyError::Input {
            message: message.into(),
        }
    }
}

/// Type alias for Result with NotifyError to simplify function signatures
pub type NotifyResult<T> = Result<T, NotifyError>;
