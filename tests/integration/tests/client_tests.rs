//! Connection client tests against an in-process mock server
//!
//! Cover the connect handshake, subscription bookkeeping, event routing,
//! and teardown.

use std::sync::Arc;
use std::time::Duration;

use integration_tests::{
    expect_stream_closed, fast_client_config, identity, next_client_event,
    next_subscription_event, object_frame, simple_query, unique_class, wait_until, MockBehavior,
    MockLiveQueryServer, EVENT_TIMEOUT,
};
use livequery_client::{
    ClientEvent, ClientState, LiveQueryClient, LiveQueryError, RequestId, SubscriptionEvent,
};
use serde_json::json;

fn client_for(server: &MockLiveQueryServer) -> Arc<LiveQueryClient> {
    LiveQueryClient::with_config(identity(&server.ws_url()), fast_client_config())
        .expect("client construction")
}

#[tokio::test]
async fn test_connect_performs_handshake() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    let client = client_for(&server);
    let mut events = client.events();

    client.connect().await.expect("connect");

    assert_eq!(next_client_event(&mut events).await, ClientEvent::Opened);
    assert_eq!(client.state(), ClientState::Connected);

    wait_until(EVENT_TIMEOUT, || !server.received().is_empty()).await;
    let frames = server.received_on(0);
    assert_eq!(frames[0]["op"], "connect");
    assert_eq!(frames[0]["applicationId"], "integration-app");
    assert_eq!(frames[0]["javascriptKey"], "integration-js-key");
    assert!(frames[0].get("masterKey").is_none());
    assert!(frames[0].get("sessionToken").is_none());
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    let client = client_for(&server);
    let mut events = client.events();

    client.connect().await.expect("connect");
    client.connect().await.expect("connect while connecting");
    assert_eq!(next_client_event(&mut events).await, ClientEvent::Opened);
    client.connect().await.expect("connect while connected");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn test_state_is_observable_through_the_watch_stream() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    let client = client_for(&server);
    let mut states = client.state_changes();
    assert_eq!(*states.borrow(), ClientState::Closed);

    client.connect().await.expect("connect");
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while *states.borrow_and_update() != ClientState::Connected {
            states.changed().await.expect("state stream");
        }
    })
    .await
    .expect("never reached the connected state");

    assert!(client.state().is_connected());
}

#[tokio::test]
async fn test_subscribe_sends_subscribe_after_connect_ack() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    let client = client_for(&server);
    let class = unique_class();

    let mut subscription = client
        .subscribe(simple_query(&class))
        .await
        .expect("subscribe");
    assert_eq!(subscription.request_id(), RequestId::new(1));
    assert_eq!(
        next_subscription_event(&mut subscription).await,
        SubscriptionEvent::Opened
    );

    let frames = server.received_on(0);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["op"], "connect");
    assert_eq!(frames[1]["op"], "subscribe");
    assert_eq!(frames[1]["requestId"], 1);
    assert_eq!(frames[1]["query"]["className"], class.as_str());
    assert_eq!(frames[1]["query"]["where"], json!({}));
    assert!(frames[1].get("sessionToken").is_none());
}

#[tokio::test]
async fn test_subscribe_with_token_sends_it() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    let client = client_for(&server);

    let mut subscription = client
        .subscribe_with_token(simple_query("Message"), "sub-token")
        .await
        .expect("subscribe");
    assert_eq!(
        next_subscription_event(&mut subscription).await,
        SubscriptionEvent::Opened
    );

    let frames = server.received_on(0);
    assert_eq!(frames[1]["op"], "subscribe");
    assert_eq!(frames[1]["sessionToken"], "sub-token");
}

#[tokio::test]
async fn test_subscribe_before_ack_is_buffered() {
    let server = MockLiveQueryServer::start_with(MockBehavior::holding_connect_ack())
        .await
        .expect("mock server");
    let client = client_for(&server);

    let mut subscription = client
        .subscribe(simple_query("Message"))
        .await
        .expect("subscribe");

    // Only the connect frame goes out while the handshake is pending
    wait_until(EVENT_TIMEOUT, || server.received().len() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.received_on(0).len(), 1);

    server.release_connect_ack(0);
    assert_eq!(
        next_subscription_event(&mut subscription).await,
        SubscriptionEvent::Opened
    );
    let frames = server.received_on(0);
    assert_eq!(frames[1]["op"], "subscribe");
    assert_eq!(frames[1]["requestId"], 1);
}

#[tokio::test]
async fn test_object_events_reach_the_subscription() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    let client = client_for(&server);

    let mut subscription = client
        .subscribe(simple_query("Score"))
        .await
        .expect("subscribe");
    assert_eq!(
        next_subscription_event(&mut subscription).await,
        SubscriptionEvent::Opened
    );

    server.send_raw(0, &object_frame("create", 1, json!({"objectId": "abc", "score": 10})));
    server.send_raw(0, &object_frame("update", 1, json!({"objectId": "abc", "score": 11})));
    server.send_raw(0, &object_frame("leave", 1, json!({"objectId": "abc"})));
    server.send_raw(0, &object_frame("enter", 1, json!({"objectId": "abc"})));
    server.send_raw(0, &object_frame("delete", 1, json!({"objectId": "abc"})));

    match next_subscription_event(&mut subscription).await {
        SubscriptionEvent::Create(object) => assert_eq!(object["objectId"], "abc"),
        other => panic!("expected create, got {other:?}"),
    }
    assert_eq!(next_subscription_event(&mut subscription).await.name(), "update");
    assert_eq!(next_subscription_event(&mut subscription).await.name(), "leave");
    assert_eq!(next_subscription_event(&mut subscription).await.name(), "enter");
    assert_eq!(next_subscription_event(&mut subscription).await.name(), "delete");
}

#[tokio::test]
async fn test_events_route_by_request_id() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    let client = client_for(&server);

    let mut first = client
        .subscribe(simple_query("Message"))
        .await
        .expect("first subscribe");
    let mut second = client
        .subscribe(simple_query("Score"))
        .await
        .expect("second subscribe");
    assert_eq!(next_subscription_event(&mut first).await, SubscriptionEvent::Opened);
    assert_eq!(next_subscription_event(&mut second).await, SubscriptionEvent::Opened);

    server.send_raw(0, &object_frame("create", 2, json!({"objectId": "for-second"})));
    server.send_raw(0, &object_frame("update", 1, json!({"objectId": "for-first"})));

    // The first subscription never sees the request 2 event
    match next_subscription_event(&mut first).await {
        SubscriptionEvent::Update(object) => assert_eq!(object["objectId"], "for-first"),
        other => panic!("expected update, got {other:?}"),
    }
    match next_subscription_event(&mut second).await {
        SubscriptionEvent::Create(object) => assert_eq!(object["objectId"], "for-second"),
        other => panic!("expected create, got {other:?}"),
    }
}

#[tokio::test]
async fn test_undecodable_frames_do_not_kill_the_connection() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    let client = client_for(&server);

    let mut subscription = client
        .subscribe(simple_query("Message"))
        .await
        .expect("subscribe");
    assert_eq!(
        next_subscription_event(&mut subscription).await,
        SubscriptionEvent::Opened
    );

    // None of these decode: unknown op, no op at all, not even JSON
    server.send_raw(0, &json!({"op": "push", "requestId": 1}));
    server.send_raw(0, &json!({"objectId": "missing-op"}));
    server.send_text(0, "not json at all");

    // Later frames on the same connection still get through
    server.send_raw(0, &object_frame("create", 1, json!({"objectId": "after-noise"})));
    match next_subscription_event(&mut subscription).await {
        SubscriptionEvent::Create(object) => assert_eq!(object["objectId"], "after-noise"),
        other => panic!("expected create, got {other:?}"),
    }

    // And the client still does full round-trips
    let mut second = client
        .subscribe(simple_query(&unique_class()))
        .await
        .expect("subscribe after noise");
    assert_eq!(
        next_subscription_event(&mut second).await,
        SubscriptionEvent::Opened
    );
    assert_eq!(client.state(), ClientState::Connected);
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn test_unsubscribe_closes_the_stream() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    let client = client_for(&server);

    let mut subscription = client
        .subscribe(simple_query("Message"))
        .await
        .expect("subscribe");
    assert_eq!(
        next_subscription_event(&mut subscription).await,
        SubscriptionEvent::Opened
    );

    client.unsubscribe(&subscription).await.expect("unsubscribe");
    expect_stream_closed(&mut subscription).await;

    // A second unsubscribe for the same id is tolerated
    client
        .unsubscribe(&subscription)
        .await
        .expect("duplicate unsubscribe");

    wait_until(EVENT_TIMEOUT, || {
        server
            .received_on(0)
            .iter()
            .any(|frame| frame["op"] == "unsubscribe")
    })
    .await;
    let frame = server
        .received_on(0)
        .into_iter()
        .find(|frame| frame["op"] == "unsubscribe")
        .expect("unsubscribe frame");
    assert_eq!(frame["requestId"], 1);

    // The connection itself stays up
    assert_eq!(client.state(), ClientState::Connected);
}

#[tokio::test]
async fn test_close_is_terminal() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    let client = client_for(&server);
    let mut events = client.events();

    let mut subscription = client
        .subscribe(simple_query("Message"))
        .await
        .expect("subscribe");
    assert_eq!(next_client_event(&mut events).await, ClientEvent::Opened);
    assert_eq!(
        next_subscription_event(&mut subscription).await,
        SubscriptionEvent::Opened
    );

    client.close().await;

    assert_eq!(next_client_event(&mut events).await, ClientEvent::Closed);
    assert_eq!(client.state(), ClientState::Closed);
    expect_stream_closed(&mut subscription).await;

    // Closing again is a no-op
    client.close().await;

    let error = client
        .subscribe(simple_query("Message"))
        .await
        .expect_err("subscribe after close");
    assert_eq!(error, LiveQueryError::ClientClosed);
}

#[tokio::test]
async fn test_recoverable_subscription_error_keeps_the_subscription() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    let client = client_for(&server);

    let mut subscription = client
        .subscribe(simple_query("Message"))
        .await
        .expect("subscribe");
    assert_eq!(
        next_subscription_event(&mut subscription).await,
        SubscriptionEvent::Opened
    );

    server.send_raw(
        0,
        &json!({"op": "error", "code": 141, "error": "invalid query", "reconnect": true, "requestId": 1}),
    );
    assert_eq!(
        next_subscription_event(&mut subscription).await,
        SubscriptionEvent::Error {
            code: 141,
            message: "invalid query".to_string(),
            recoverable: true,
        }
    );

    // Later events still arrive
    server.send_raw(0, &object_frame("create", 1, json!({"objectId": "still-here"})));
    assert_eq!(next_subscription_event(&mut subscription).await.name(), "create");
}

#[tokio::test]
async fn test_fatal_subscription_error_removes_it() {
    let server = MockLiveQueryServer::start().await.expect("mock server");
    let client = client_for(&server);

    let mut subscription = client
        .subscribe(simple_query("Message"))
        .await
        .expect("subscribe");
    assert_eq!(
        next_subscription_event(&mut subscription).await,
        SubscriptionEvent::Opened
    );

    server.send_raw(
        0,
        &json!({"op": "error", "code": 101, "error": "forbidden", "reconnect": false, "requestId": 1}),
    );
    assert_eq!(
        next_subscription_event(&mut subscription).await,
        SubscriptionEvent::Error {
            code: 101,
            message: "forbidden".to_string(),
            recoverable: false,
        }
    );
    expect_stream_closed(&mut subscription).await;

    // Only the subscription dies; the client stays connected
    assert_eq!(client.state(), ClientState::Connected);
}

#[tokio::test]
async fn test_connect_rejected_closes_the_client() {
    let server = MockLiveQueryServer::start_with(MockBehavior::rejecting(4, "invalid application id"))
        .await
        .expect("mock server");
    let client = client_for(&server);
    let mut events = client.events();

    let mut subscription = client
        .subscribe(simple_query("Message"))
        .await
        .expect("subscribe");

    assert_eq!(
        next_client_event(&mut events).await,
        ClientEvent::Error(LiveQueryError::AuthenticationRejected {
            code: 4,
            message: "invalid application id".to_string(),
        })
    );
    assert_eq!(next_client_event(&mut events).await, ClientEvent::Closed);
    assert_eq!(client.state(), ClientState::Closed);

    assert_eq!(
        next_subscription_event(&mut subscription).await,
        SubscriptionEvent::Error {
            code: 4,
            message: "invalid application id".to_string(),
            recoverable: false,
        }
    );
    expect_stream_closed(&mut subscription).await;
}
