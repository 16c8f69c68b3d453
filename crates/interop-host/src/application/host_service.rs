//! The service the host publishes to its plugins.
//!
//! Plugins subscribe by handing over the name of their own callback channel.
//! Each subscription becomes a [`RemoteSubscriber`] in the lifecycle
//! [`EventSource`]; a plugin whose channel has gone away is dropped after the
//! first delivery that cannot reach it.

use async_trait::async_trait;
use interop_core::{
    HostContract, HostEvent, HostEventKind, HostRequest, HostResponse, HostWindow,
    PluginCallbackContract, PluginCallbackRequest, PluginCallbackResponse,
};
use interop_ipc::{
    connect_client_with, DeliveryReport, Endpoint, EventHandler, EventSource, HandlerError,
    ProxyOptions, RemoteProxy, Service, ServiceFault,
};
use parking_lot::RwLock;
use tracing::{debug, info};

/// Forwards host events to one plugin's callback channel.
pub struct RemoteSubscriber {
    proxy: RemoteProxy<PluginCallbackContract>,
    kinds: Vec<HostEventKind>,
}

impl RemoteSubscriber {
    /// An empty `kinds` list accepts every event.
    pub fn new(proxy: RemoteProxy<PluginCallbackContract>, kinds: Vec<HostEventKind>) -> Self {
        Self { proxy, kinds }
    }

    pub fn accepts(&self, kind: HostEventKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }
}

#[async_trait]
impl EventHandler<HostEvent> for RemoteSubscriber {
    async fn handle(&self, event: &HostEvent) -> Result<(), HandlerError> {
        if !self.accepts(event.kind()) {
            return Ok(());
        }
        match self.proxy.call(PluginCallbackRequest::Notify(event.clone())).await? {
            PluginCallbackResponse::Ack => Ok(()),
        }
    }

    fn describe(&self) -> String {
        self.proxy.endpoint().to_string()
    }
}

/// Host-side implementation of [`HostContract`].
pub struct HostService {
    lifecycle: EventSource<HostEvent>,
    window: RwLock<Option<HostWindow>>,
    callback_options: ProxyOptions,
}

impl HostService {
    pub fn new(callback_options: ProxyOptions) -> Self {
        Self {
            lifecycle: EventSource::new("host_lifecycle"),
            window: RwLock::new(None),
            callback_options,
        }
    }

    pub fn current_window(&self) -> Option<HostWindow> {
        *self.window.read()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lifecycle.len()
    }

    /// Records `event` and pushes it to every subscribed plugin.
    pub async fn notify_lifecycle(&self, event: HostEvent) -> DeliveryReport {
        match &event {
            HostEvent::Started(window) | HostEvent::WindowChanged(window) => {
                *self.window.write() = Some(*window);
            }
            HostEvent::Stopped => *self.window.write() = None,
            HostEvent::Starting => {}
        }

        let report = self.lifecycle.raise(&event).await;
        info!(
            event = event.kind().as_str(),
            delivered = report.delivered,
            dropped = report.unreachable,
            "lifecycle event raised"
        );
        report
    }

    fn subscribe(
        &self,
        events: Vec<HostEventKind>,
        callback_channel: &str,
        callback_port: Option<&str>,
    ) -> Result<HostResponse, ServiceFault> {
        let endpoint = Endpoint::new(callback_channel, callback_port);
        endpoint
            .validate()
            .map_err(|e| ServiceFault::new(format!("cannot subscribe: {e}")))?;

        let proxy = connect_client_with::<PluginCallbackContract>(
            callback_channel,
            callback_port,
            self.callback_options,
        );
        let id = self.lifecycle.subscribe(RemoteSubscriber::new(proxy, events));
        info!(subscription = %id, callback = %endpoint, "plugin subscribed");
        Ok(HostResponse::Subscribed(id))
    }
}

impl Default for HostService {
    fn default() -> Self {
        Self::new(ProxyOptions::default())
    }
}

#[async_trait]
impl Service<HostContract> for HostService {
    async fn handle(&self, request: HostRequest) -> Result<HostResponse, ServiceFault> {
        debug!(?request, "host request");
        match request {
            HostRequest::Ping => Ok(HostResponse::Pong("pong".to_string())),
            HostRequest::HostInfo => Ok(HostResponse::HostInfo(self.current_window())),
            HostRequest::Subscribe {
                events,
                callback_channel,
                callback_port,
            } => self.subscribe(events, &callback_channel, callback_port.as_deref()),
            HostRequest::Unsubscribe(id) => {
                let removed = self.lifecycle.unsubscribe(id);
                info!(subscription = %id, removed, "plugin unsubscribed");
                Ok(HostResponse::Unsubscribed(removed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interop_core::SubscriptionId;
    use interop_ipc::connect_client;

    #[tokio::test]
    async fn test_ping_answers_pong() {
        let service = HostService::default();
        let response = service.handle(HostRequest::Ping).await;
        assert_eq!(response.unwrap(), HostResponse::Pong("pong".to_string()));
    }

    #[tokio::test]
    async fn test_host_info_tracks_lifecycle() {
        // Arrange
        let service = HostService::default();
        let window = HostWindow::new(0x10, 99);

        // Act
        let before = service.handle(HostRequest::HostInfo).await.unwrap();
        service.notify_lifecycle(HostEvent::Started(window)).await;
        let during = service.handle(HostRequest::HostInfo).await.unwrap();
        service.notify_lifecycle(HostEvent::Stopped).await;
        let after = service.handle(HostRequest::HostInfo).await.unwrap();

        // Assert
        assert_eq!(before, HostResponse::HostInfo(None));
        assert_eq!(during, HostResponse::HostInfo(Some(window)));
        assert_eq!(after, HostResponse::HostInfo(None));
    }

    #[tokio::test]
    async fn test_subscribe_with_invalid_channel_is_a_fault() {
        let service = HostService::default();
        let result = service
            .handle(HostRequest::Subscribe {
                events: Vec::new(),
                callback_channel: "not a channel".to_string(),
                callback_port: None,
            })
            .await;

        assert!(result.is_err());
        assert_eq!(service.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_id_reports_false() {
        let service = HostService::default();
        let response = service.handle(HostRequest::Unsubscribe(SubscriptionId::new())).await;
        assert_eq!(response.unwrap(), HostResponse::Unsubscribed(false));
    }

    #[test]
    fn test_subscriber_kind_filter() {
        let all = RemoteSubscriber::new(connect_client("Plugin0001", None), Vec::new());
        let only_stop = RemoteSubscriber::new(
            connect_client("Plugin0002", None),
            vec![HostEventKind::Stopped],
        );

        assert!(all.accepts(HostEventKind::Started));
        assert!(only_stop.accepts(HostEventKind::Stopped));
        assert!(!only_stop.accepts(HostEventKind::Started));
    }
}
