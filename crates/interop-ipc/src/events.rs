//! Best-effort multicast delivery to remote subscribers.
//!
//! [`invoke_safely`] calls every handler in registration order and
//! classifies each failure on its own, so one dead subscriber never stops the
//! rest from being notified:
//!
//! | Handler result                  | Action                                        |
//! |---------------------------------|-----------------------------------------------|
//! | [`HandlerError::Unreachable`]   | warn, then pass the handler to `on_unreachable` |
//! | [`HandlerError::Unresolved`]    | warn, keep the handler                        |
//! | [`HandlerError::Failed`]        | error, keep the handler                       |
//!
//! [`EventSource`] builds on this with an ordered list of subscriber records.
//! A record whose remote end is gone is flagged dead during delivery and
//! removed once the pass is over, so a crashed plugin costs exactly one
//! failed delivery and no separate heartbeat.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use interop_core::SubscriptionId;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::error::RemoteError;

/// How a single handler invocation failed.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The remote endpoint is gone or the call could not be marshalled.
    #[error("remote endpoint unreachable: {0}")]
    Unreachable(String),

    /// The handler's target no longer exists, so there is nothing to unsubscribe.
    #[error("handler target could not be resolved")]
    Unresolved,

    /// Any other failure inside the handler.
    #[error("{0}")]
    Failed(String),
}

impl From<RemoteError> for HandlerError {
    fn from(err: RemoteError) -> Self {
        match err {
            // A call that cannot be marshalled is as dead as a closed pipe.
            RemoteError::Transport { .. } | RemoteError::Protocol(_) => {
                HandlerError::Unreachable(err.to_string())
            }
            RemoteError::Fault(_) => HandlerError::Failed(err.to_string()),
        }
    }
}

/// One subscriber to an event carrying an `A`.
#[async_trait]
pub trait EventHandler<A>: Send + Sync {
    async fn handle(&self, arg: &A) -> Result<(), HandlerError>;

    /// Short identity used in log records.
    fn describe(&self) -> String {
        "handler".to_string()
    }
}

#[async_trait]
impl<A, T> EventHandler<A> for Arc<T>
where
    A: Sync,
    T: EventHandler<A> + ?Sized,
{
    async fn handle(&self, arg: &A) -> Result<(), HandlerError> {
        (**self).handle(arg).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Holds its target weakly; reports [`HandlerError::Unresolved`] once the
/// target has been dropped.
pub struct WeakHandler<T: ?Sized>(Weak<T>);

impl<T: ?Sized> WeakHandler<T> {
    pub fn new(target: &Arc<T>) -> Self {
        Self(Arc::downgrade(target))
    }
}

#[async_trait]
impl<A, T> EventHandler<A> for WeakHandler<T>
where
    A: Sync,
    T: EventHandler<A> + ?Sized,
{
    async fn handle(&self, arg: &A) -> Result<(), HandlerError> {
        let target = self.0.upgrade().ok_or(HandlerError::Unresolved)?;
        target.handle(arg).await
    }

    fn describe(&self) -> String {
        match self.0.upgrade() {
            Some(target) => target.describe(),
            None => "dropped handler".to_string(),
        }
    }
}

/// Outcome counts of one delivery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub unreachable: usize,
    pub unresolved: usize,
    pub failed: usize,
}

/// Invokes every handler in order with `arg`, isolating failures.
///
/// `on_unreachable` receives each handler whose remote end is gone, so the
/// caller can remove exactly that handler from its source. Nothing a handler
/// does is propagated to the caller.
pub async fn invoke_safely<A, H, F>(
    event_name: &str,
    handlers: &[H],
    arg: &A,
    mut on_unreachable: F,
) -> DeliveryReport
where
    A: Sync,
    H: EventHandler<A>,
    F: FnMut(&H),
{
    let mut report = DeliveryReport::default();

    for handler in handlers {
        match handler.handle(arg).await {
            Ok(()) => report.delivered += 1,
            Err(HandlerError::Unreachable(reason)) => {
                warn!(
                    event = event_name,
                    handler = %handler.describe(),
                    "remote handler unreachable, unsubscribing: {reason}"
                );
                report.unreachable += 1;
                on_unreachable(handler);
            }
            Err(HandlerError::Unresolved) => {
                warn!(event = event_name, "handler target could not be resolved");
                report.unresolved += 1;
            }
            Err(HandlerError::Failed(reason)) => {
                error!(
                    event = event_name,
                    handler = %handler.describe(),
                    "handler failed: {reason}"
                );
                report.failed += 1;
            }
        }
    }

    report
}

/// A subscriber record: the handler plus a liveness flag.
pub struct Subscriber<A> {
    id: SubscriptionId,
    handler: Box<dyn EventHandler<A>>,
    alive: AtomicBool,
}

impl<A> Subscriber<A> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

#[async_trait]
impl<A: Sync> EventHandler<A> for Subscriber<A> {
    async fn handle(&self, arg: &A) -> Result<(), HandlerError> {
        self.handler.handle(arg).await
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.handler.describe(), self.id)
    }
}

/// An event with an ordered list of subscribers.
pub struct EventSource<A> {
    name: String,
    subscribers: RwLock<Vec<Arc<Subscriber<A>>>>,
}

impl<A: Sync> EventSource<A> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends `handler` to the end of the delivery order.
    pub fn subscribe(&self, handler: impl EventHandler<A> + 'static) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.subscribers.write().push(Arc::new(Subscriber {
            id,
            handler: Box::new(handler),
            alive: AtomicBool::new(true),
        }));
        debug!(event = %self.name, subscription = %id, "subscribed");
        id
    }

    /// Removes the subscription. Returns `false` if it did not exist.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        before != subscribers.len()
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Delivers `arg` to every live subscriber and removes the ones whose
    /// remote end turned out to be unreachable.
    ///
    /// The subscriber list is snapshotted first, so handlers may subscribe
    /// or unsubscribe while the event is being raised.
    pub async fn raise(&self, arg: &A) -> DeliveryReport {
        let snapshot: Vec<Arc<Subscriber<A>>> = self
            .subscribers
            .read()
            .iter()
            .filter(|s| s.is_alive())
            .cloned()
            .collect();

        let report = invoke_safely(&self.name, &snapshot, arg, |dead| {
            dead.alive.store(false, Ordering::Release);
        })
        .await;

        if report.unreachable > 0 {
            self.subscribers.write().retain(|s| s.is_alive());
        }
        report
    }
}
