//! The server-side half of a contract.

use async_trait::async_trait;
use interop_core::Contract;
use thiserror::Error;

/// A failure reported by a service implementation.
///
/// The text travels back to the caller in a `Fault` frame and surfaces as
/// [`crate::RemoteError::Fault`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ServiceFault(pub String);

impl ServiceFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// An object published on a channel under contract `C`.
///
/// Calls on one connection are handled one at a time, in order. Calls from
/// different connections may run concurrently.
#[async_trait]
pub trait Service<C: Contract>: Send + Sync + 'static {
    async fn handle(&self, request: C::Request) -> Result<C::Response, ServiceFault>;
}
