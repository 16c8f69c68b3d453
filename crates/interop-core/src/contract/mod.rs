//! Contracts: the typed surface a service publishes over a channel.
//!
//! A contract is a zero-sized marker type that ties together a name, a request
//! enum and a response enum. The server side implements a service for the
//! contract; the client side gets a proxy that sends `Request` values and
//! receives `Response` values. Because both associated types must be
//! `Serialize + DeserializeOwned`, nothing that cannot cross a process
//! boundary (closures, handles, references) can ever appear in a call.

pub mod host;

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use host::{
    HostContract, HostRequest, HostResponse, PluginCallbackContract, PluginCallbackRequest,
    PluginCallbackResponse,
};

/// Binds a request type to a response type under a stable name.
///
/// The name is exchanged in the connection handshake, so a client built for
/// one contract can never talk to a server publishing another.
pub trait Contract: Send + Sync + 'static {
    /// Stable identifier sent in the `Hello` frame.
    const NAME: &'static str;

    type Request: Serialize + DeserializeOwned + Debug + Send + Sync + 'static;
    type Response: Serialize + DeserializeOwned + Debug + Send + Sync + 'static;
}
