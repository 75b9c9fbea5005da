/// Fabric controller error types
///
/// Comprehensive error handling for controller-facing operations.
use std::io;
use thiserror::Error;

/// Main error type for controller operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// IO error during socket operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// `send_to` targeted an id or dpid with no registered connection/switch
    #[error("unknown destination: {0}")]
    UnknownDestination(String),

    /// The dpid is known but its current connection is not ESTABLISHED
    #[error("switch offline: {0}")]
    SwitchOffline(String),

    /// A NApp failed to instantiate or start
    #[error("napp load failure: {name}: {cause}")]
    NAppLoad { name: String, cause: String },

    /// The per-connection task has already exited; its command channel is closed
    #[error("connection closed: {0}")]
    ChannelClosed(String),

    /// The acceptor failed to bind its listening socket
    #[error("bind failure: {0}")]
    BindFailure(io::Error),

    /// A listener pattern failed to compile as an anchored regular expression
    #[error("invalid listener pattern {pattern:?}: {cause}")]
    InvalidPattern { pattern: String, cause: String },
}

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create an unknown-destination error
    pub fn unknown_destination(dest: impl Into<String>) -> Self {
        Self::UnknownDestination(dest.into())
    }

    /// Create a switch-offline error
    pub fn switch_offline(dpid: impl Into<String>) -> Self {
        Self::SwitchOffline(dpid.into())
    }

    /// Create a NApp load-failure error
    pub fn napp_load(name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::NAppLoad {
            name: name.into(),
            cause: cause.into(),
        }
    }

    /// Check if this is a connection-lifecycle error rather than a caller mistake
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::ChannelClosed(_) | Self::SwitchOffline(_))
    }
}
