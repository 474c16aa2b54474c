//! Recoverable error handling for channel event dispatch.
//!
//! Only the three lookup/consistency failures that are expected to happen
//! during normal operation (mostly: right after connecting, before our
//! state has caught up with Asterisk's) are modeled here. Everything else
//! that could go wrong indicates the event stream itself violated
//! documented Asterisk semantics and is treated as a contract violation
//! (`assert!`/`panic!` at the call site), not a `ManagerError`.

use std::error::Error as StdError;
use std::fmt;

/// Recoverable errors raised while dispatching a single AMI event.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerError {
    /// A channel lookup by name failed.
    MissingChannel { key: String, value: String },

    /// A channel lookup by uniqueid failed.
    MissingUniqueid { uniqueid: String },

    /// A channel expected to have exactly one bridged peer had zero or many.
    BridgedError { message: String },
}

impl fmt::Display for ManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagerError::MissingChannel { key, value } => {
                write!(f, "channel {}={:?} not in memory when processing event", key, value)
            }
            ManagerError::MissingUniqueid { uniqueid } => {
                write!(f, "channel with uniqueid {:?} not in memory when processing event", uniqueid)
            }
            ManagerError::BridgedError { message } => {
                write!(f, "{}", message)
            }
        }
    }
}

impl StdError for ManagerError {}

impl ManagerError {
    pub fn missing_channel(key: impl Into<String>, value: impl Into<String>) -> Self {
        ManagerError::MissingChannel { key: key.into(), value: value.into() }
    }

    pub fn missing_uniqueid(uniqueid: impl Into<String>) -> Self {
        ManagerError::MissingUniqueid { uniqueid: uniqueid.into() }
    }

    pub fn bridged_error(message: impl Into<String>) -> Self {
        ManagerError::BridgedError { message: message.into() }
    }

    /// Whether dispatch should simply log and skip the event (always true
    /// today — kept as a hook so a future error kind can opt out).
    pub fn is_recoverable(&self) -> bool {
        true
    }
}

/// Result type for channel-manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_channel_renders_key_and_value() {
        let err = ManagerError::missing_channel("Channel", "SIP/trunk-0000000c");
        assert!(err.to_string().contains("Channel"));
        assert!(err.to_string().contains("SIP/trunk-0000000c"));
    }

    #[test]
    fn bridged_error_renders_message() {
        let err = ManagerError::bridged_error("expected one bridged channel, found 2");
        assert!(err.to_string().contains("expected one bridged channel"));
        assert!(err.is_recoverable());
    }
}
