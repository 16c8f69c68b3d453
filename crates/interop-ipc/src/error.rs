//! Error types for channel creation and remote calls.

use interop_core::ProtocolError;
use thiserror::Error;

/// Errors raised while creating a server channel.
///
/// All of them are fatal for the channel name in question: the caller must
/// retry with a different name or give up.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel or port name contains characters outside `[0-9A-Za-z]`.
    #[error("invalid channel name {0:?}")]
    InvalidName(String),

    /// Another channel is already bound to this endpoint.
    #[error("channel endpoint {endpoint} is already in use")]
    NameInUse { endpoint: String },

    /// The operating system refused to create the endpoint.
    #[error("failed to bind channel endpoint {endpoint}: {source}")]
    BindFailed {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by a [`crate::RemoteProxy`] call.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote endpoint is unreachable, closed the connection, or did not
    /// answer within the call timeout.
    #[error("channel {endpoint} unreachable: {reason}")]
    Transport { endpoint: String, reason: String },

    /// The remote service received the call and reported a failure.
    #[error("remote fault: {0}")]
    Fault(String),

    /// A frame or payload could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl RemoteError {
    pub(crate) fn transport(endpoint: impl ToString, reason: impl ToString) -> Self {
        Self::Transport {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` when the failure means the remote side is gone.
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport { .. })
    }
}
