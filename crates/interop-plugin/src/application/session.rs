//! The plugin's connection to its host.
//!
//! # Session setup
//!
//! 1. Build a lazy proxy to the host channel and `Ping` it.
//! 2. Publish a [`PluginCallbackService`] on a fresh random channel.
//! 3. `Subscribe` that channel to every host lifecycle event.
//! 4. Seed the [`HostContext`] with `HostInfo`.
//!
//! From then on lifecycle notifications keep the context current, and
//! [`HostInfoLocator`] lets the keyboard hook ask the host directly when the
//! context is empty.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use interop_core::{
    HostContract, HostEvent, HostRequest, HostResponse, HostWindow, PluginCallbackContract,
    PluginCallbackRequest, PluginCallbackResponse, SubscriptionId,
};
use interop_hook::{HostContext, HostLocator};
use interop_ipc::{
    connect_client_with, create_server, AccessRule, ChannelError, ChannelHandle, ProxyOptions,
    RemoteError, RemoteProxy, ServerOptions, Service, ServiceFault,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_BUFFER: usize = 32;
const PUBLISH_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("host unreachable: {0}")]
    Host(#[from] RemoteError),

    #[error("cannot publish callback channel: {0}")]
    Channel(#[from] ChannelError),

    #[error("unexpected host response to {request}: {response}")]
    UnexpectedResponse { request: &'static str, response: String },
}

/// Settings for [`PluginSession::connect`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    pub proxy: ProxyOptions,
    /// Who may call the plugin's callback channel.
    pub callback_access: AccessRule,
}

// ── Callback service ──────────────────────────────────────────────────────────

/// Receives host lifecycle notifications.
///
/// Keeps the shared [`HostContext`] in step with the host and re-broadcasts
/// every event to local listeners.
pub struct PluginCallbackService {
    context: Arc<HostContext>,
    events: broadcast::Sender<HostEvent>,
}

impl PluginCallbackService {
    pub fn new(context: Arc<HostContext>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self { context, events }
    }

    pub fn events(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }

    pub fn apply(&self, event: &HostEvent) {
        match event {
            HostEvent::Started(window) | HostEvent::WindowChanged(window) => {
                self.context.update(*window)
            }
            HostEvent::Stopped => self.context.clear(),
            HostEvent::Starting => {}
        }
    }
}

#[async_trait]
impl Service<PluginCallbackContract> for PluginCallbackService {
    async fn handle(
        &self,
        request: PluginCallbackRequest,
    ) -> Result<PluginCallbackResponse, ServiceFault> {
        let PluginCallbackRequest::Notify(event) = request;
        debug!(event = event.kind().as_str(), "host notification");
        self.apply(&event);
        // No local listener is fine.
        let _ = self.events.send(event);
        Ok(PluginCallbackResponse::Ack)
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

pub struct PluginSession {
    host: Arc<RemoteProxy<HostContract>>,
    callbacks: Arc<PluginCallbackService>,
    callback_channel: ChannelHandle,
    subscription: Option<SubscriptionId>,
    context: Arc<HostContext>,
}

impl PluginSession {
    /// Connects to the host published on `host_channel` and subscribes to its
    /// lifecycle events.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Host`] if the host cannot be reached.
    /// - [`SessionError::Channel`] if the callback channel cannot be created.
    /// - [`SessionError::UnexpectedResponse`] if the host answers out of
    ///   contract.
    pub async fn connect(
        host_channel: &str,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        let host = Arc::new(connect_client_with::<HostContract>(host_channel, None, options.proxy));
        match host.call(HostRequest::Ping).await? {
            HostResponse::Pong(_) => {}
            other => return Err(unexpected("Ping", &other)),
        }

        let context = Arc::new(HostContext::new());
        let callbacks = Arc::new(PluginCallbackService::new(Arc::clone(&context)));
        let mut callback_channel = publish_callbacks(&callbacks, options.callback_access).await?;

        let subscribed = host
            .call(HostRequest::Subscribe {
                events: Vec::new(),
                callback_channel: callback_channel.channel_name().to_string(),
                callback_port: Some(callback_channel.port_name().to_string()),
            })
            .await;
        let subscription = match subscribed {
            Ok(HostResponse::Subscribed(id)) => id,
            Ok(other) => {
                callback_channel.close();
                return Err(unexpected("Subscribe", &other));
            }
            Err(e) => {
                callback_channel.close();
                return Err(e.into());
            }
        };

        let mut session = Self {
            host,
            callbacks,
            callback_channel,
            subscription: Some(subscription),
            context,
        };
        session.refresh_host_window().await?;

        info!(
            host = host_channel,
            callback = %session.callback_channel.endpoint(),
            subscription = %subscription,
            "plugin session established"
        );
        Ok(session)
    }

    pub fn host(&self) -> &Arc<RemoteProxy<HostContract>> {
        &self.host
    }

    pub fn context(&self) -> &Arc<HostContext> {
        &self.context
    }

    pub fn events(&self) -> broadcast::Receiver<HostEvent> {
        self.callbacks.events()
    }

    pub fn callback_channel(&self) -> &str {
        self.callback_channel.channel_name()
    }

    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    /// Asks the host for its main window and records the answer.
    pub async fn refresh_host_window(&mut self) -> Result<Option<HostWindow>, SessionError> {
        match self.host.call(HostRequest::HostInfo).await? {
            HostResponse::HostInfo(Some(window)) => {
                self.context.update(window);
                Ok(Some(window))
            }
            HostResponse::HostInfo(None) => Ok(None),
            other => Err(unexpected("HostInfo", &other)),
        }
    }

    /// A locator for the keyboard hook that queries this session's host.
    pub fn locator(&self, runtime: tokio::runtime::Handle) -> HostInfoLocator {
        HostInfoLocator::new(Arc::clone(&self.host), runtime)
    }

    /// Unsubscribes from the host and closes the callback channel.
    ///
    /// An unreachable host is logged, not reported; the callback channel is
    /// closed either way.
    pub async fn close(&mut self) {
        if let Some(id) = self.subscription.take() {
            match self.host.call(HostRequest::Unsubscribe(id)).await {
                Ok(_) => debug!(subscription = %id, "unsubscribed from host"),
                Err(e) => warn!(subscription = %id, "could not unsubscribe from host: {e}"),
            }
        }
        self.callback_channel.close();
        self.host.disconnect().await;
        info!("plugin session closed");
    }
}

/// Publishes the callback service under a fresh random name, drawing a new
/// name if one is already taken.
async fn publish_callbacks(
    callbacks: &Arc<PluginCallbackService>,
    access: AccessRule,
) -> Result<ChannelHandle, ChannelError> {
    let mut attempt = 1;
    loop {
        let published = create_server::<PluginCallbackContract>(
            Arc::clone(callbacks) as Arc<dyn Service<PluginCallbackContract>>,
            ServerOptions {
                access,
                ..ServerOptions::default()
            },
        )
        .await;
        match published {
            Err(ChannelError::NameInUse { endpoint }) if attempt < PUBLISH_ATTEMPTS => {
                warn!(%endpoint, attempt, "callback channel name already in use; retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}

fn unexpected(request: &'static str, response: &HostResponse) -> SessionError {
    SessionError::UnexpectedResponse {
        request,
        response: format!("{response:?}"),
    }
}

// ── Host locator ──────────────────────────────────────────────────────────────

/// Answers the hook's "where is the host window?" with a `HostInfo` call.
///
/// Blocks the calling thread on `runtime`, so it must only be used from
/// threads outside the runtime, such as the hook's callback worker.
pub struct HostInfoLocator {
    host: Arc<RemoteProxy<HostContract>>,
    runtime: tokio::runtime::Handle,
    timeout: Duration,
}

impl HostInfoLocator {
    pub fn new(host: Arc<RemoteProxy<HostContract>>, runtime: tokio::runtime::Handle) -> Self {
        Self {
            host,
            runtime,
            timeout: Duration::from_millis(500),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl HostLocator for HostInfoLocator {
    fn current_host_window(&self) -> Option<HostWindow> {
        let call = tokio::time::timeout(self.timeout, self.host.call(HostRequest::HostInfo));
        match self.runtime.block_on(call) {
            Ok(Ok(HostResponse::HostInfo(window))) => window,
            Ok(Ok(other)) => {
                warn!(?other, "unexpected HostInfo response");
                None
            }
            Ok(Err(e)) => {
                warn!("host window lookup failed: {e}");
                None
            }
            Err(_) => {
                warn!("host window lookup timed out");
                None
            }
        }
    }
}
