//! Reconnect behavior across dropped and unreachable connections
//!
//! Cover automatic reconnects with backoff, re-subscription ordering,
//! and close during an outage.

use std::sync::Arc;
use std::time::Duration;

use integration_tests::{
    fast_client_config, identity, next_client_event, next_subscription_event, simple_query,
    MockLiveQueryServer,
};
use livequery_client::{
    ClientConfig, ClientEvent, ClientState, LiveQueryClient, LiveQueryError, SubscriptionEvent,
};
use tokio::net::TcpListener;

fn client_for(server: &MockLiveQueryServer) -> Arc<LiveQueryClient> {
    LiveQueryClient::with_config(identity(&server.ws_url()), fast_client_config())
        .expect("client construction")
}

#[tokio::test]
async fn test_reconnects_after_connection_drop() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    let client = client_for(&server);
    let mut events = client.events();

    client.connect().await.expect("connect");
    assert_eq!(next_client_event(&mut events).await, ClientEvent::Opened);

    server.drop_connection(0);

    assert_eq!(
        next_client_event(&mut events).await,
        ClientEvent::Reconnecting { attempt: 1 }
    );
    assert_eq!(next_client_event(&mut events).await, ClientEvent::Opened);
    assert_eq!(client.state(), ClientState::Connected);
    assert_eq!(server.connection_count(), 2);

    // The new connection performs a full handshake of its own
    assert_eq!(server.received_on(1)[0]["op"], "connect");
}

#[tokio::test]
async fn test_resubscribes_in_creation_order_after_reconnect() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    let client = client_for(&server);

    let classes = ["Alpha", "Beta", "Gamma", "Delta"];
    let mut subscriptions = Vec::new();
    for class in classes {
        subscriptions.push(client.subscribe(simple_query(class)).await.expect("subscribe"));
    }
    for subscription in &mut subscriptions {
        assert_eq!(
            next_subscription_event(subscription).await,
            SubscriptionEvent::Opened
        );
    }

    server.drop_connection(0);

    // Every subscription is acknowledged again on the new connection
    for subscription in &mut subscriptions {
        assert_eq!(
            next_subscription_event(subscription).await,
            SubscriptionEvent::Opened
        );
    }

    let frames = server.received_on(1);
    assert_eq!(frames[0]["op"], "connect");
    let replayed_ids: Vec<u64> = frames
        .iter()
        .filter(|frame| frame["op"] == "subscribe")
        .map(|frame| frame["requestId"].as_u64().expect("request id"))
        .collect();
    assert_eq!(replayed_ids, vec![1, 2, 3, 4]);
    let replayed_classes: Vec<&str> = frames
        .iter()
        .filter(|frame| frame["op"] == "subscribe")
        .map(|frame| frame["query"]["className"].as_str().expect("class name"))
        .collect();
    assert_eq!(replayed_classes, classes);
}

#[tokio::test]
async fn test_subscription_created_during_outage_flushes_on_reconnect() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    let client = client_for(&server);
    let mut events = client.events();

    let mut existing = client
        .subscribe(simple_query("Existing"))
        .await
        .expect("subscribe");
    assert_eq!(next_client_event(&mut events).await, ClientEvent::Opened);
    assert_eq!(
        next_subscription_event(&mut existing).await,
        SubscriptionEvent::Opened
    );

    server.drop_connection(0);
    assert_eq!(
        next_client_event(&mut events).await,
        ClientEvent::Reconnecting { attempt: 1 }
    );

    let mut offline = client
        .subscribe(simple_query("Offline"))
        .await
        .expect("subscribe during outage");
    assert_eq!(
        next_subscription_event(&mut offline).await,
        SubscriptionEvent::Opened
    );

    // The surviving subscription is replayed before the one created
    // during the outage
    let frames = server.received_on(1);
    let replayed_classes: Vec<&str> = frames
        .iter()
        .filter(|frame| frame["op"] == "subscribe")
        .map(|frame| frame["query"]["className"].as_str().expect("class name"))
        .collect();
    assert_eq!(replayed_classes, vec!["Existing", "Offline"]);
}

#[tokio::test]
async fn test_backoff_resets_after_successful_reconnect() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    let client = client_for(&server);
    let mut events = client.events();

    client.connect().await.expect("connect");
    assert_eq!(next_client_event(&mut events).await, ClientEvent::Opened);

    server.drop_connection(0);
    assert_eq!(
        next_client_event(&mut events).await,
        ClientEvent::Reconnecting { attempt: 1 }
    );
    assert_eq!(next_client_event(&mut events).await, ClientEvent::Opened);

    // The successful handshake reset the attempt counter
    server.drop_connection(1);
    assert_eq!(
        next_client_event(&mut events).await,
        ClientEvent::Reconnecting { attempt: 1 }
    );
}

#[tokio::test]
async fn test_retries_grow_while_the_server_is_unreachable() {
    // Bind and immediately release a port so connections get refused
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let dead_url = format!("ws://{}", listener.local_addr().expect("local addr"));
    drop(listener);

    let client = LiveQueryClient::with_config(identity(&dead_url), fast_client_config())
        .expect("client construction");
    let mut events = client.events();
    client.connect().await.expect("connect");

    let mut attempts = Vec::new();
    while attempts.len() < 3 {
        match next_client_event(&mut events).await {
            ClientEvent::Reconnecting { attempt } => attempts.push(attempt),
            ClientEvent::Error(LiveQueryError::Socket(_)) => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(attempts, vec![1, 2, 3]);
    assert_eq!(client.state(), ClientState::Reconnecting);
}

#[tokio::test]
async fn test_close_cancels_a_pending_reconnect() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    // A long base delay leaves a window to close while the timer is armed
    let config = ClientConfig {
        reconnect_base_delay: Duration::from_millis(300),
        reconnect_max_delay: Duration::from_millis(600),
        reconnect_jitter: 0.0,
        ..ClientConfig::default()
    };
    let client =
        LiveQueryClient::with_config(identity(&server.ws_url()), config).expect("client");
    let mut events = client.events();

    client.connect().await.expect("connect");
    assert_eq!(next_client_event(&mut events).await, ClientEvent::Opened);

    server.drop_connection(0);
    assert_eq!(
        next_client_event(&mut events).await,
        ClientEvent::Reconnecting { attempt: 1 }
    );

    client.close().await;
    assert_eq!(next_client_event(&mut events).await, ClientEvent::Closed);

    // The armed reconnect never fires
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(server.connection_count(), 1);
    assert_eq!(client.state(), ClientState::Closed);
}
