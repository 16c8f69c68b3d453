//! Unix domain socket endpoints.
//!
//! The socket lives at `<runtime dir>/<channel>.<port>.sock`, where the
//! runtime dir is `$XDG_RUNTIME_DIR` when it exists and the system temp dir
//! otherwise. Access control is the socket file's mode.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use tokio::net::{UnixListener, UnixStream};
use tracing::warn;

use super::{AccessRule, BoxedStream, Endpoint};
use crate::error::ChannelError;

/// Accepts connections on a bound socket.
pub struct Listener {
    inner: UnixListener,
}

impl Listener {
    pub async fn accept(&mut self) -> io::Result<BoxedStream> {
        let (stream, _) = self.inner.accept().await?;
        Ok(Box::new(stream))
    }
}

pub(super) fn address(endpoint: &Endpoint) -> String {
    socket_path(endpoint).display().to_string()
}

fn socket_path(endpoint: &Endpoint) -> PathBuf {
    runtime_dir().join(format!("{}.{}.sock", endpoint.channel(), endpoint.port()))
}

fn runtime_dir() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .filter(|dir| dir.is_dir())
        .unwrap_or_else(std::env::temp_dir)
}

fn socket_mode(access: AccessRule) -> u32 {
    match access {
        AccessRule::AllLocalUsers | AccessRule::AuthenticatedUsers => 0o666,
        AccessRule::CurrentUser => 0o600,
    }
}

pub(super) fn bind(endpoint: &Endpoint, access: AccessRule) -> Result<Listener, ChannelError> {
    let path = socket_path(endpoint);
    let name_in_use = || ChannelError::NameInUse {
        endpoint: endpoint.to_string(),
    };

    // A leftover file is never unlinked; the caller must pick another name.
    if fs::symlink_metadata(&path).is_ok() {
        return Err(name_in_use());
    }

    let inner = UnixListener::bind(&path).map_err(|source| match source.kind() {
        io::ErrorKind::AddrInUse => name_in_use(),
        _ => ChannelError::BindFailed {
            endpoint: endpoint.to_string(),
            source,
        },
    })?;

    let permissions = fs::Permissions::from_mode(socket_mode(access));
    if let Err(source) = fs::set_permissions(&path, permissions) {
        let _ = fs::remove_file(&path);
        return Err(ChannelError::BindFailed {
            endpoint: endpoint.to_string(),
            source,
        });
    }

    Ok(Listener { inner })
}

pub(super) async fn connect(endpoint: &Endpoint) -> io::Result<BoxedStream> {
    let stream = UnixStream::connect(socket_path(endpoint)).await?;
    Ok(Box::new(stream))
}

pub(super) fn release(endpoint: &Endpoint) {
    match fs::remove_file(socket_path(endpoint)) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(%endpoint, "failed to remove socket file: {e}"),
    }
}
