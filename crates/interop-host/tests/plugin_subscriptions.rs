//! Host service end to end: plugins subscribe over the host channel and
//! receive lifecycle events on their own callback channels.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use interop_core::{
    HostContract, HostEvent, HostEventKind, HostRequest, HostResponse, HostWindow,
    PluginCallbackContract, PluginCallbackRequest, PluginCallbackResponse,
};
use interop_host::HostService;
use interop_ipc::{
    connect_client_with, create_server, ChannelHandle, ProxyOptions, RemoteProxy, ServerOptions,
    Service, ServiceFault,
};
use parking_lot::Mutex;

#[derive(Default)]
struct RecordingPlugin {
    received: Mutex<Vec<HostEvent>>,
}

#[async_trait]
impl Service<PluginCallbackContract> for RecordingPlugin {
    async fn handle(
        &self,
        request: PluginCallbackRequest,
    ) -> Result<PluginCallbackResponse, ServiceFault> {
        let PluginCallbackRequest::Notify(event) = request;
        self.received.lock().push(event);
        Ok(PluginCallbackResponse::Ack)
    }
}

fn fast() -> ProxyOptions {
    ProxyOptions {
        connect_timeout: Duration::from_millis(500),
        call_timeout: Duration::from_secs(2),
    }
}

async fn start_host() -> (Arc<HostService>, ChannelHandle, RemoteProxy<HostContract>) {
    let service = Arc::new(HostService::new(fast()));
    let handle = create_server::<HostContract>(
        Arc::clone(&service) as Arc<dyn Service<HostContract>>,
        ServerOptions::default(),
    )
    .await
    .expect("host must bind");
    let proxy = connect_client_with::<HostContract>(handle.channel_name(), None, fast());
    (service, handle, proxy)
}

async fn start_plugin() -> (Arc<RecordingPlugin>, ChannelHandle) {
    let plugin = Arc::new(RecordingPlugin::default());
    let handle = create_server::<PluginCallbackContract>(
        Arc::clone(&plugin) as Arc<dyn Service<PluginCallbackContract>>,
        ServerOptions::default(),
    )
    .await
    .expect("plugin callback channel must bind");
    (plugin, handle)
}

async fn subscribe(
    host: &RemoteProxy<HostContract>,
    plugin: &ChannelHandle,
    events: Vec<HostEventKind>,
) {
    let response = host
        .call(HostRequest::Subscribe {
            events,
            callback_channel: plugin.channel_name().to_string(),
            callback_port: None,
        })
        .await
        .expect("subscribe");
    assert!(matches!(response, HostResponse::Subscribed(_)));
}

#[tokio::test]
async fn test_subscribed_plugin_receives_lifecycle_in_order() {
    // Arrange
    let (service, _host_handle, host) = start_host().await;
    let (plugin, plugin_handle) = start_plugin().await;
    subscribe(&host, &plugin_handle, Vec::new()).await;
    let window = HostWindow::new(0x2000, 314);

    // Act
    service.notify_lifecycle(HostEvent::Starting).await;
    service.notify_lifecycle(HostEvent::Started(window)).await;
    let info = host.call(HostRequest::HostInfo).await.expect("host info");

    // Assert
    assert_eq!(
        *plugin.received.lock(),
        vec![HostEvent::Starting, HostEvent::Started(window)]
    );
    assert_eq!(info, HostResponse::HostInfo(Some(window)));
}

#[tokio::test]
async fn test_plugin_only_receives_requested_kinds() {
    let (service, _host_handle, host) = start_host().await;
    let (plugin, plugin_handle) = start_plugin().await;
    subscribe(&host, &plugin_handle, vec![HostEventKind::Stopped]).await;

    service.notify_lifecycle(HostEvent::Started(HostWindow::new(1, 2))).await;
    service.notify_lifecycle(HostEvent::Stopped).await;

    assert_eq!(*plugin.received.lock(), vec![HostEvent::Stopped]);
}

#[tokio::test]
async fn test_dead_plugin_is_dropped_after_one_failed_delivery() {
    // Arrange
    let (service, _host_handle, host) = start_host().await;
    let (alive, alive_handle) = start_plugin().await;
    let (_dead, mut dead_handle) = start_plugin().await;
    subscribe(&host, &alive_handle, Vec::new()).await;
    subscribe(&host, &dead_handle, Vec::new()).await;
    dead_handle.close();

    // Act
    let first = service.notify_lifecycle(HostEvent::Starting).await;
    let second = service.notify_lifecycle(HostEvent::Stopped).await;

    // Assert
    assert_eq!(first.delivered, 1);
    assert_eq!(first.unreachable, 1);
    assert_eq!(second.delivered, 1);
    assert_eq!(second.unreachable, 0);
    assert_eq!(service.subscriber_count(), 1);
    assert_eq!(*alive.received.lock(), vec![HostEvent::Starting, HostEvent::Stopped]);
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    // Arrange
    let (service, _host_handle, host) = start_host().await;
    let (plugin, plugin_handle) = start_plugin().await;
    let id = match host
        .call(HostRequest::Subscribe {
            events: Vec::new(),
            callback_channel: plugin_handle.channel_name().to_string(),
            callback_port: None,
        })
        .await
        .expect("subscribe")
    {
        HostResponse::Subscribed(id) => id,
        other => panic!("unexpected response {other:?}"),
    };

    // Act
    let removed = host.call(HostRequest::Unsubscribe(id)).await.expect("unsubscribe");
    service.notify_lifecycle(HostEvent::Stopped).await;

    // Assert
    assert_eq!(removed, HostResponse::Unsubscribed(true));
    assert!(plugin.received.lock().is_empty());
}
