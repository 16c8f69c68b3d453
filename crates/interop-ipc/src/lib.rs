//! # interop-ipc
//!
//! Local inter-process channels between a host application and its plugins.
//!
//! - **`server`** – [`create_server`] publishes a [`Service`] under a named,
//!   access-controlled endpoint and returns a [`ChannelHandle`] that closes
//!   the endpoint when dropped.
//! - **`client`** – [`connect_client`] returns a [`RemoteProxy`] at once. The
//!   proxy connects on its first call, so the two processes may start in
//!   either order.
//! - **`events`** – [`invoke_safely`] and [`EventSource`] deliver a multicast
//!   event to remote subscribers, dropping any subscriber whose process has
//!   gone away after exactly one failed delivery.
//! - **`transport`** – Unix domain sockets or Windows named pipes.

pub mod client;
pub mod connection;
pub mod error;
pub mod events;
pub mod server;
pub mod service;
pub mod transport;

pub use client::{connect_client, connect_client_with, ProxyOptions, RemoteProxy};
pub use error::{ChannelError, RemoteError};
pub use events::{
    invoke_safely, DeliveryReport, EventHandler, EventSource, HandlerError, WeakHandler,
};
pub use server::{create_server, ChannelHandle, ServerOptions};
pub use service::{Service, ServiceFault};
pub use transport::{AccessRule, Endpoint};
