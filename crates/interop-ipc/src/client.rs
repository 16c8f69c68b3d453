//! Lazy client proxies.
//!
//! [`connect_client`] performs no I/O. The proxy opens its connection on the
//! first call and keeps it for later calls. Any transport or protocol
//! failure drops the cached connection, and the next call starts over with a
//! fresh connect. This is what lets a plugin build its proxy before the
//! host's channel exists.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use interop_core::protocol::codec::{decode_payload, encode_payload};
use interop_core::protocol::messages::{Frame, FrameKind};
use interop_core::{Contract, ProtocolError};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::connection::{read_frame, write_frame, FrameIoError};
use crate::error::RemoteError;
use crate::transport::{self, BoxedStream, Endpoint};

/// Timeouts applied by a [`RemoteProxy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyOptions {
    /// Upper bound for opening the connection and completing the handshake.
    pub connect_timeout: Duration,
    /// Upper bound for one call, including a lazy connect.
    pub call_timeout: Duration,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            call_timeout: Duration::from_secs(10),
        }
    }
}

/// A local stand-in for a service published under contract `C` in another
/// process.
pub struct RemoteProxy<C: Contract> {
    endpoint: Endpoint,
    options: ProxyOptions,
    connection: Mutex<Option<BoxedStream>>,
    next_call_id: AtomicU64,
    _contract: PhantomData<fn() -> C>,
}

/// Returns a proxy for the service on `channel_name`/`port_name` with the
/// default timeouts. Never fails; an unreachable server surfaces as
/// [`RemoteError::Transport`] when a call is made.
pub fn connect_client<C: Contract>(channel_name: &str, port_name: Option<&str>) -> RemoteProxy<C> {
    connect_client_with(channel_name, port_name, ProxyOptions::default())
}

/// Like [`connect_client`] with explicit timeouts.
pub fn connect_client_with<C: Contract>(
    channel_name: &str,
    port_name: Option<&str>,
    options: ProxyOptions,
) -> RemoteProxy<C> {
    RemoteProxy {
        endpoint: Endpoint::new(channel_name, port_name),
        options,
        connection: Mutex::new(None),
        next_call_id: AtomicU64::new(1),
        _contract: PhantomData,
    }
}

impl<C: Contract> RemoteProxy<C> {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Sends `request` and waits for the response.
    ///
    /// Calls through one proxy are serialized on its single connection.
    ///
    /// # Errors
    ///
    /// - [`RemoteError::Transport`] if the server cannot be reached, hangs up,
    ///   or does not answer within the call timeout.
    /// - [`RemoteError::Fault`] if the service reported a failure.
    /// - [`RemoteError::Protocol`] if the reply could not be decoded.
    pub async fn call(&self, request: C::Request) -> Result<C::Response, RemoteError> {
        let mut slot = self.connection.lock().await;
        // The stream is out of the slot for the whole exchange, so a call that
        // is cancelled midway never leaves an unread reply behind.
        let cached = slot.take();
        let exchange = self.exchange(cached, request);

        match tokio::time::timeout(self.options.call_timeout, exchange).await {
            Ok(Ok((outcome, stream))) => {
                *slot = Some(stream);
                outcome
            }
            Ok(Err(e)) => {
                debug!(endpoint = %self.endpoint, "dropped broken connection");
                Err(e)
            }
            Err(_) => Err(RemoteError::transport(&self.endpoint, "call timed out")),
        }
    }

    /// Drops the cached connection, if any. The next call reconnects.
    pub async fn disconnect(&self) {
        self.connection.lock().await.take();
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Runs one call on `cached`, or on a fresh connection.
    ///
    /// The stream is handed back only when the exchange completed cleanly;
    /// a fault reply leaves it usable. Every other failure is the outer error
    /// and the stream is dropped.
    async fn exchange(
        &self,
        cached: Option<BoxedStream>,
        request: C::Request,
    ) -> Result<(Result<C::Response, RemoteError>, BoxedStream), RemoteError> {
        let mut stream = match cached {
            Some(stream) => stream,
            None => self.open().await?,
        };

        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let payload = encode_payload(&request)?;
        write_frame(&mut stream, &Frame::new(FrameKind::Call, call_id, payload))
            .await
            .map_err(|e| self.frame_error(e))?;

        let reply = read_frame(&mut stream)
            .await
            .map_err(|e| self.frame_error(e))?
            .ok_or_else(|| RemoteError::transport(&self.endpoint, "connection closed by remote"))?;

        if reply.call_id != call_id {
            return Err(ProtocolError::CallIdMismatch {
                expected: call_id,
                got: reply.call_id,
            }
            .into());
        }

        match reply.kind {
            FrameKind::Reply => Ok((Ok(decode_payload(&reply.payload)?), stream)),
            FrameKind::Fault => Ok((Err(RemoteError::Fault(reply.payload_text())), stream)),
            other => Err(ProtocolError::UnexpectedFrame(other).into()),
        }
    }

    async fn open(&self) -> Result<BoxedStream, RemoteError> {
        let stream = tokio::time::timeout(self.options.connect_timeout, self.handshake())
            .await
            .map_err(|_| RemoteError::transport(&self.endpoint, "connect timed out"))??;

        info!(endpoint = %self.endpoint, contract = C::NAME, "connected");
        Ok(stream)
    }

    async fn handshake(&self) -> Result<BoxedStream, RemoteError> {
        let mut stream = transport::connect(&self.endpoint)
            .await
            .map_err(|e| RemoteError::transport(&self.endpoint, e))?;

        write_frame(&mut stream, &Frame::hello(C::NAME))
            .await
            .map_err(|e| self.frame_error(e))?;

        match read_frame(&mut stream).await.map_err(|e| self.frame_error(e))? {
            Some(frame) if frame.kind == FrameKind::HelloAck => Ok(stream),
            Some(frame) if frame.kind == FrameKind::Fault => {
                Err(RemoteError::Fault(frame.payload_text()))
            }
            Some(frame) => Err(ProtocolError::UnexpectedFrame(frame.kind).into()),
            None => Err(RemoteError::transport(
                &self.endpoint,
                "connection closed during handshake",
            )),
        }
    }

    fn frame_error(&self, err: FrameIoError) -> RemoteError {
        match err {
            FrameIoError::Io(e) => RemoteError::transport(&self.endpoint, e),
            FrameIoError::Protocol(e) => RemoteError::Protocol(e),
        }
    }
}

impl<C: Contract> fmt::Debug for RemoteProxy<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteProxy")
            .field("endpoint", &self.endpoint)
            .field("contract", &C::NAME)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use interop_core::{generate_channel_name, HostContract, HostRequest};

    use super::*;

    #[test]
    fn test_default_timeouts() {
        let options = ProxyOptions::default();
        assert_eq!(options.connect_timeout, Duration::from_secs(2));
        assert_eq!(options.call_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_connect_client_does_no_io() {
        // Arrange / Act
        let proxy = connect_client::<HostContract>(&generate_channel_name(), None);

        // Assert
        assert!(!proxy.is_connected().await);
    }

    #[tokio::test]
    async fn test_call_to_missing_server_is_a_transport_error() {
        let proxy = connect_client::<HostContract>(&generate_channel_name(), None);

        let result = proxy.call(HostRequest::Ping).await;

        assert!(matches!(result, Err(RemoteError::Transport { .. })));
        assert!(!proxy.is_connected().await);
    }

    #[tokio::test]
    async fn test_invalid_name_fails_at_call_time_not_construction() {
        let proxy = connect_client::<HostContract>("no/such/channel", None);

        let result = proxy.call(HostRequest::Ping).await;

        assert!(matches!(result, Err(RemoteError::Transport { .. })));
    }
}
