//! Error types for msim-notify

use thiserror::Error;

use crate::types::SubscriptionId;

/// Result type alias for notifier operations
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Main error type for notifier operations
///
/// None of these ever reach the notification shade. The dispatcher logs them
/// and moves on to the next event.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Event tagged with a subscription this device does not have
    #[error("Invalid subscription: {0}")]
    InvalidSubscription(SubscriptionId),

    /// Event requires a capability the device lacks (e.g. MWI without voice)
    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// Directory lookup failed
    #[error("Lookup failed: {0}")]
    LookupFailed(String),

    /// Call log could not be read
    #[error("Call log error: {0}")]
    CallLog(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The dispatcher queue is gone
    #[error("Event queue closed")]
    ChannelClosed,
}

impl NotifyError {
    /// True when the error means an upstream component broke a precondition.
    ///
    /// These are logged at warn level; everything else at debug.
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            NotifyError::InvalidSubscription(_) | NotifyError::UnsupportedCapability(_)
        )
    }
}

impl From<std::io::Error> for NotifyError {
    fn from(err: std::io::Error) -> Self {
        NotifyError::ConfigError(err.to_string())
    }
}

impl From<serde_yaml::Error> for NotifyError {
    fn from(err: serde_yaml::Error) -> Self {
        NotifyError::ConfigError(format!("YAML error: {}", err))
    }
}
