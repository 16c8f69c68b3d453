//! Publishing a service on a named channel.
//!
//! [`create_server`] binds the endpoint, then spawns an accept loop. Each
//! accepted connection gets its own task that performs the `Hello`
//! handshake and then answers `Call` frames until the peer hangs up.
//! Connection tasks live in a [`JoinSet`] owned by the accept loop, so
//! aborting the loop tears every connection down with it.

use std::sync::Arc;

use interop_core::protocol::codec::{decode_payload, encode_payload};
use interop_core::protocol::messages::{Frame, FrameKind};
use interop_core::{generate_channel_name, Contract};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::connection::{read_frame, write_frame, FrameIoError};
use crate::error::ChannelError;
use crate::service::Service;
use crate::transport::{self, AccessRule, BoxedStream, Endpoint, Listener};

/// Where and how to publish a service.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Channel name; a fresh random one is generated when `None`.
    pub channel_name: Option<String>,
    /// Port name; defaults to the channel name.
    pub port_name: Option<String>,
    pub access: AccessRule,
}

/// Owns a published channel.
///
/// Dropping the handle closes the channel; [`ChannelHandle::close`] does the
/// same explicitly and may be called any number of times.
#[derive(Debug)]
pub struct ChannelHandle {
    endpoint: Endpoint,
    accept_task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The channel name clients must pass to [`crate::connect_client`].
    pub fn channel_name(&self) -> &str {
        self.endpoint.channel()
    }

    pub fn port_name(&self) -> &str {
        self.endpoint.port()
    }

    pub fn is_open(&self) -> bool {
        self.accept_task.is_some()
    }

    /// Stops accepting, drops every live connection, and removes the
    /// endpoint. Connected clients observe end-of-stream on their next call.
    pub fn close(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
            transport::release(&self.endpoint);
            info!(endpoint = %self.endpoint, "channel closed");
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Publishes `service` under contract `C` and starts accepting connections.
///
/// # Errors
///
/// Returns [`ChannelError`] if the endpoint cannot be bound. A name
/// collision ([`ChannelError::NameInUse`]) is fatal for that name; retry
/// with another one.
pub async fn create_server<C: Contract>(
    service: Arc<dyn Service<C>>,
    options: ServerOptions,
) -> Result<ChannelHandle, ChannelError> {
    let channel = options.channel_name.unwrap_or_else(generate_channel_name);
    let endpoint = Endpoint::new(channel, options.port_name.as_deref());
    let listener = transport::bind(&endpoint, options.access)?;

    info!(
        endpoint = %endpoint,
        contract = C::NAME,
        access = ?options.access,
        "channel published"
    );

    let accept_task = tokio::spawn(accept_loop(listener, service, endpoint.clone()));
    Ok(ChannelHandle {
        endpoint,
        accept_task: Some(accept_task),
    })
}

async fn accept_loop<C: Contract>(
    mut listener: Listener,
    service: Arc<dyn Service<C>>,
    endpoint: Endpoint,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(stream) => {
                    debug!(%endpoint, "client connected");
                    let service = Arc::clone(&service);
                    connections.spawn(serve_connection(stream, service, endpoint.clone()));
                }
                Err(e) => {
                    warn!(%endpoint, "accept failed: {e}");
                    break;
                }
            },
            // Reap finished connection tasks so the set does not grow.
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn serve_connection<C: Contract>(
    mut stream: BoxedStream,
    service: Arc<dyn Service<C>>,
    endpoint: Endpoint,
) {
    match handshake::<C>(&mut stream).await {
        Ok(true) => {}
        Ok(false) => return,
        Err(e) => {
            debug!(%endpoint, "handshake failed: {e}");
            return;
        }
    }

    loop {
        let frame = match read_frame(&mut stream).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!(%endpoint, "client disconnected");
                return;
            }
            Err(e) => {
                warn!(%endpoint, "dropping connection: {e}");
                return;
            }
        };

        let reply = answer(&*service, frame).await;
        if let Err(e) = write_frame(&mut stream, &reply).await {
            debug!(%endpoint, "failed to send reply: {e}");
            return;
        }
    }
}

/// Reads the client's `Hello` and answers it. Returns `Ok(false)` when the
/// client asked for a different contract.
async fn handshake<C: Contract>(stream: &mut BoxedStream) -> Result<bool, FrameIoError> {
    let hello = match read_frame(stream).await? {
        Some(frame) if frame.kind == FrameKind::Hello => frame,
        Some(frame) => {
            write_frame(stream, &Frame::fault(frame.call_id, "expected Hello")).await?;
            return Ok(false);
        }
        None => return Ok(false),
    };

    let requested = hello.payload_text();
    if requested != C::NAME {
        warn!(requested = %requested, published = C::NAME, "contract mismatch");
        let fault = Frame::fault(0, format!("contract {requested} is not published here"));
        write_frame(stream, &fault).await?;
        return Ok(false);
    }

    write_frame(stream, &Frame::hello_ack()).await?;
    Ok(true)
}

async fn answer<C: Contract>(service: &dyn Service<C>, frame: Frame) -> Frame {
    let call_id = frame.call_id;
    if frame.kind != FrameKind::Call {
        return Frame::fault(call_id, format!("unexpected {:?} frame", frame.kind));
    }

    let request = match decode_payload::<C::Request>(&frame.payload) {
        Ok(request) => request,
        Err(e) => return Frame::fault(call_id, format!("undecodable request: {e}")),
    };
    debug!(call_id, ?request, "dispatching call");

    match service.handle(request).await {
        Ok(response) => match encode_payload(&response) {
            Ok(payload) => Frame::new(FrameKind::Reply, call_id, payload),
            Err(e) => Frame::fault(call_id, format!("unencodable response: {e}")),
        },
        Err(fault) => Frame::fault(call_id, fault.0),
    }
}
