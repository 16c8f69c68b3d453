//! Local endpoints: Unix domain sockets on Unix, named pipes on Windows.
//!
//! An endpoint is identified by a channel name and a port name. Neither is
//! ever taken from an existing endpoint: binding a name that is already
//! bound fails with [`ChannelError::NameInUse`], so a stale or foreign
//! endpoint can never be hijacked.

use std::fmt;
use std::io;

use interop_core::protocol::channel_name::is_valid_channel_name;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::ChannelError;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use self::unix as platform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use self::windows as platform;

pub use platform::Listener;

/// A connected, bidirectional byte stream to a peer process.
pub trait IpcStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> IpcStream for T {}

pub type BoxedStream = Box<dyn IpcStream>;

/// Which local principals may connect to a server channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessRule {
    /// Every local user, including processes running under another token.
    #[default]
    AllLocalUsers,
    /// Every authenticated local user (Windows); same as `AllLocalUsers` on Unix.
    AuthenticatedUsers,
    /// Only the user that created the channel.
    CurrentUser,
}

/// A channel name plus a port name. The port defaults to the channel name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    channel: String,
    port: String,
}

impl Endpoint {
    /// Builds an endpoint without validating it. Validation happens when the
    /// endpoint is bound or connected.
    pub fn new(channel: impl Into<String>, port: Option<&str>) -> Self {
        let channel = channel.into();
        let port = port.map(str::to_owned).unwrap_or_else(|| channel.clone());
        Self { channel, port }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// Both names become part of a filesystem path or pipe name, so only
    /// `[0-9A-Za-z]` is accepted.
    pub fn validate(&self) -> Result<(), ChannelError> {
        for name in [&self.channel, &self.port] {
            if !is_valid_channel_name(name) {
                return Err(ChannelError::InvalidName(name.clone()));
            }
        }
        Ok(())
    }

    /// The OS-level address: a socket path on Unix, a pipe name on Windows.
    pub fn address(&self) -> String {
        platform::address(self)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ipc://{}/{}", self.channel, self.port)
    }
}

/// Creates the endpoint and returns a listener for incoming connections.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns [`ChannelError::InvalidName`] for bad names,
/// [`ChannelError::NameInUse`] if the endpoint already exists, and
/// [`ChannelError::BindFailed`] for any other OS failure.
pub fn bind(endpoint: &Endpoint, access: AccessRule) -> Result<Listener, ChannelError> {
    endpoint.validate()?;
    platform::bind(endpoint, access)
}

/// Opens a client connection to `endpoint`.
pub async fn connect(endpoint: &Endpoint) -> io::Result<BoxedStream> {
    endpoint
        .validate()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    platform::connect(endpoint).await
}

/// Removes whatever the endpoint left behind in the filesystem.
///
/// Only the owner of a bound endpoint calls this, once, when it closes.
pub fn release(endpoint: &Endpoint) {
    platform::release(endpoint);
}
