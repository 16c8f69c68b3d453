//! End-to-end tests of server channels and lazy client proxies over real
//! local endpoints.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use interop_core::{generate_channel_name, Contract};
use interop_ipc::{
    connect_client, connect_client_with, create_server, AccessRule, ChannelError, ProxyOptions,
    RemoteError, ServerOptions, Service, ServiceFault,
};
use serde::{Deserialize, Serialize};

// ── Test contract ─────────────────────────────────────────────────────────────

enum PingContract {}

#[derive(Debug, Serialize, Deserialize)]
enum PingRequest {
    Ping,
    Echo(String),
    Fail,
    /// Answers `Pong` after the given number of milliseconds.
    Slow(u64),
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
enum PingResponse {
    Pong(String),
    Echoed(String),
}

impl Contract for PingContract {
    const NAME: &'static str = "test.ping.v1";
    type Request = PingRequest;
    type Response = PingResponse;
}

enum OtherContract {}

impl Contract for OtherContract {
    const NAME: &'static str = "test.other.v1";
    type Request = PingRequest;
    type Response = PingResponse;
}

#[derive(Default)]
struct PingService {
    calls: AtomicUsize,
}

#[async_trait]
impl Service<PingContract> for PingService {
    async fn handle(&self, request: PingRequest) -> Result<PingResponse, ServiceFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match request {
            PingRequest::Ping => Ok(PingResponse::Pong("pong".to_string())),
            PingRequest::Echo(text) => Ok(PingResponse::Echoed(text)),
            PingRequest::Fail => Err(ServiceFault::new("refused on purpose")),
            PingRequest::Slow(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(PingResponse::Pong("slow pong".to_string()))
            }
        }
    }
}

fn ping_service() -> Arc<PingService> {
    Arc::new(PingService::default())
}

fn fast_options() -> ProxyOptions {
    ProxyOptions {
        connect_timeout: Duration::from_millis(500),
        call_timeout: Duration::from_secs(2),
    }
}

fn options_for(name: &str) -> ServerOptions {
    ServerOptions {
        channel_name: Some(name.to_string()),
        ..ServerOptions::default()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ping_returns_pong_then_transport_fault_after_close() {
    // Arrange
    let service = ping_service();
    let mut handle = create_server::<PingContract>(service, ServerOptions::default())
        .await
        .expect("server must bind");
    let proxy = connect_client_with::<PingContract>(handle.channel_name(), None, fast_options());

    // Act
    let before = proxy.call(PingRequest::Ping).await;
    handle.close();
    let after = tokio::time::timeout(Duration::from_secs(5), proxy.call(PingRequest::Ping))
        .await
        .expect("call after close must not hang");

    // Assert
    assert_eq!(before.expect("ping must succeed"), PingResponse::Pong("pong".to_string()));
    assert!(
        matches!(after, Err(RemoteError::Transport { .. })),
        "expected transport fault, got {after:?}"
    );
}

#[tokio::test]
async fn test_generated_channel_name_is_reported_by_handle() {
    let handle = create_server::<PingContract>(ping_service(), ServerOptions::default())
        .await
        .expect("server must bind");

    assert!((20..=29).contains(&handle.channel_name().len()));
    assert_eq!(handle.port_name(), handle.channel_name());
    assert!(handle.is_open());
}

#[tokio::test]
async fn test_client_created_before_server_connects_lazily() {
    // Arrange
    let name = generate_channel_name();
    let proxy = connect_client_with::<PingContract>(&name, Some("late"), fast_options());

    // Act
    let early = proxy.call(PingRequest::Ping).await;
    let _handle = create_server::<PingContract>(
        ping_service(),
        ServerOptions {
            channel_name: Some(name.clone()),
            port_name: Some("late".to_string()),
            access: AccessRule::CurrentUser,
        },
    )
    .await
    .expect("server must bind");
    let late = proxy.call(PingRequest::Echo("hello".to_string())).await;

    // Assert
    assert!(matches!(early, Err(RemoteError::Transport { .. })));
    assert_eq!(
        late.expect("call must succeed once server exists"),
        PingResponse::Echoed("hello".to_string())
    );
}

#[tokio::test]
async fn test_second_server_on_same_name_fails_with_name_in_use() {
    let name = generate_channel_name();
    let _first = create_server::<PingContract>(ping_service(), options_for(&name))
        .await
        .expect("first bind must succeed");

    let second = create_server::<PingContract>(ping_service(), options_for(&name)).await;

    assert!(matches!(second, Err(ChannelError::NameInUse { .. })));
}

#[tokio::test]
async fn test_name_is_reusable_after_close() {
    let name = generate_channel_name();
    let mut first = create_server::<PingContract>(ping_service(), options_for(&name))
        .await
        .expect("first bind must succeed");
    first.close();
    first.close();

    let second = create_server::<PingContract>(ping_service(), options_for(&name)).await;

    assert!(second.is_ok());
}

#[tokio::test]
async fn test_invalid_channel_name_is_rejected_at_bind() {
    let result = create_server::<PingContract>(ping_service(), options_for("bad name")).await;
    assert!(matches!(result, Err(ChannelError::InvalidName(_))));
}

#[tokio::test]
async fn test_service_fault_is_reported_and_connection_stays_usable() {
    // Arrange
    let service = ping_service();
    let published = Arc::clone(&service) as Arc<dyn Service<PingContract>>;
    let handle = create_server::<PingContract>(published, ServerOptions::default())
        .await
        .expect("server must bind");
    let proxy = connect_client_with::<PingContract>(handle.channel_name(), None, fast_options());

    // Act
    let fault = proxy.call(PingRequest::Fail).await;
    let connected_after_fault = proxy.is_connected().await;
    let ok = proxy.call(PingRequest::Ping).await;

    // Assert
    assert!(
        matches!(fault, Err(RemoteError::Fault(ref msg)) if msg.contains("refused on purpose"))
    );
    assert!(connected_after_fault, "a service fault must not drop the connection");
    assert!(ok.is_ok());
    assert_eq!(service.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_contract_mismatch_is_a_fault() {
    let handle = create_server::<PingContract>(ping_service(), ServerOptions::default())
        .await
        .expect("server must bind");
    let proxy = connect_client_with::<OtherContract>(handle.channel_name(), None, fast_options());

    let result = proxy.call(PingRequest::Ping).await;

    assert!(
        matches!(result, Err(RemoteError::Fault(ref msg)) if msg.contains(OtherContract::NAME))
    );
    assert!(!proxy.is_connected().await);
}

#[tokio::test]
async fn test_proxy_reconnects_after_server_restart() {
    // Arrange
    let name = generate_channel_name();
    let mut first = create_server::<PingContract>(ping_service(), options_for(&name))
        .await
        .expect("bind");
    let proxy = connect_client_with::<PingContract>(&name, None, fast_options());
    proxy.call(PingRequest::Ping).await.expect("first call");

    // Act
    first.close();
    let during_outage = proxy.call(PingRequest::Ping).await;
    let _second = create_server::<PingContract>(ping_service(), options_for(&name))
        .await
        .expect("rebind");
    let after_restart = proxy.call(PingRequest::Ping).await;

    // Assert
    assert!(during_outage.is_err());
    assert_eq!(after_restart.expect("reconnected call"), PingResponse::Pong("pong".to_string()));
}

#[tokio::test]
async fn test_concurrent_clients_are_served_independently() {
    let handle = create_server::<PingContract>(ping_service(), ServerOptions::default())
        .await
        .expect("server must bind");
    let name = handle.channel_name().to_string();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let name = name.clone();
        tasks.push(tokio::spawn(async move {
            let proxy = connect_client::<PingContract>(&name, None);
            proxy.call(PingRequest::Echo(format!("client-{i}"))).await
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        let response = task.await.expect("join").expect("call");
        assert_eq!(response, PingResponse::Echoed(format!("client-{i}")));
    }
}

#[tokio::test]
async fn test_cancelled_call_does_not_poison_the_next_one() {
    // Arrange
    let handle = create_server::<PingContract>(ping_service(), ServerOptions::default())
        .await
        .expect("server must bind");
    let proxy = connect_client_with::<PingContract>(handle.channel_name(), None, fast_options());

    // Act
    let slow_call = proxy.call(PingRequest::Slow(300));
    let cancelled = tokio::time::timeout(Duration::from_millis(50), slow_call).await;
    let connected_after_cancel = proxy.is_connected().await;
    tokio::time::sleep(Duration::from_millis(400)).await;
    let next = proxy.call(PingRequest::Ping).await;

    // Assert
    assert!(cancelled.is_err(), "the slow call should have been cut off");
    assert!(!connected_after_cancel, "a cancelled call must not leave its stream cached");
    assert_eq!(next.expect("call after cancellation"), PingResponse::Pong("pong".to_string()));
}
