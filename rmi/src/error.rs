//! Local errors raised by RMI declaration, registration and dispatch.

use sync::SyncError;
use thiserror::Error;

/// Result type for RMI operations.
pub type RmiResult<T> = Result<T, RmiError>;

/// A call or declaration that the calling code must fix.
///
/// One variant per validation rule so callers can tell the rules apart.
/// Conditions caused by a remote peer are never returned as `RmiError`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RmiError {
    #[error("{method} must return a success flag (bool)")]
    MustReturnSuccessFlag { method: String },

    #[error("{method} takes no parameters but a carrier was supplied")]
    UnexpectedCarrier { method: String },

    #[error("{method} takes a parameter carrier but none was supplied")]
    MissingCarrier { method: String },

    #[error("{method} declares {count} parameters, must be exactly 0 or 1")]
    TooManyParameters { method: String, count: usize },

    #[error("{method} parameter {parameter} must be a carrier type")]
    ParameterNotCarrier { method: String, parameter: String },

    #[error("{method} expects carrier {expected}, got {found}")]
    CarrierTypeMismatch {
        method: String,
        expected: String,
        found: String,
    },

    #[error("{method} is not marked remote-callable")]
    NotRemoteCallable { method: String },

    #[error("{method} is a to-server method and must be called from a client")]
    MustBeCalledFromClient { method: String },

    #[error("{method} is a to-server method and must be directed to the server")]
    MustBeDirectedToServer { method: String },

    #[error("target allows no destination")]
    NoAllowedDestination,

    #[error("channel not specified for a client-channel target (got {channel})")]
    ChannelNotSpecified { channel: i32 },

    #[error("cannot target a specific channel and the own client simultaneously")]
    ChannelAndOwnClient,

    #[error("sender has no own client to target")]
    NoOwnClient,

    #[error("method {method} not found on {type_name}")]
    MethodNotFound { type_name: String, method: String },

    #[error("method {method} registered twice on {type_name}")]
    DuplicateMethod { type_name: String, method: String },

    #[error("carrier type {name} registered twice")]
    DuplicateCarrier { name: String },

    #[error("carrier serialization failed: {0}")]
    Sync(#[from] SyncError),
}

/// Failure raised by the body of an invoked remote method.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InvokeError {
    message: String,
}

impl InvokeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
