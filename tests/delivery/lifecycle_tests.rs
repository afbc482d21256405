//! Connection registration and teardown

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use pretty_assertions::assert_eq;

use super::TestClient;
use crate::common::{
    spawn_hub, test_settings, wait_for_connections, FakeChatMembers, FakeMessageStore,
};

#[tokio::test]
async fn test_peer_close_unregisters_connection() {
    let settings = test_settings();
    let hub = spawn_hub(
        &settings,
        Arc::new(FakeMessageStore::default()),
        Arc::new(FakeChatMembers::default()),
    );

    let mut alice = TestClient::connect(&hub, 1, &settings);
    wait_for_connections(&hub, 1).await;
    assert!(hub.is_online(1).await.unwrap());

    alice.close();

    // The hub closes the mailbox, so the server answers with a close frame
    assert!(matches!(
        alice.recv(Duration::from_secs(2)).await,
        Some(Message::Close(None))
    ));
    tokio::time::timeout(Duration::from_secs(2), &mut alice.task)
        .await
        .unwrap()
        .unwrap();

    wait_for_connections(&hub, 0).await;
    assert!(!hub.is_online(1).await.unwrap());
}

#[tokio::test]
async fn test_reconnect_supersedes_previous_connection() {
    let settings = test_settings();
    let members = Arc::new(FakeChatMembers::default().with_chat(7, &[1, 2]));
    let hub = spawn_hub(&settings, Arc::new(FakeMessageStore::default()), members);

    let mut first = TestClient::connect(&hub, 1, &settings);
    wait_for_connections(&hub, 1).await;

    let mut second = TestClient::connect(&hub, 1, &settings);

    assert!(matches!(
        first.recv(Duration::from_secs(2)).await,
        Some(Message::Close(None))
    ));
    tokio::time::timeout(Duration::from_secs(2), &mut first.task)
        .await
        .unwrap()
        .unwrap();

    // The stale unregister from the first connection must not remove the second
    wait_for_connections(&hub, 1).await;
    assert!(hub.is_online(1).await.unwrap());

    let bob = TestClient::connect(&hub, 2, &settings);
    wait_for_connections(&hub, 2).await;

    bob.send_chat(2, 7, "hi again");
    assert_eq!(second.recv_delivery().await.message, "hi again");
}

#[tokio::test]
async fn test_client_hangup_unregisters_connection() {
    let settings = test_settings();
    let hub = spawn_hub(
        &settings,
        Arc::new(FakeMessageStore::default()),
        Arc::new(FakeChatMembers::default()),
    );

    let alice = TestClient::connect(&hub, 1, &settings);
    wait_for_connections(&hub, 1).await;

    // Dropping the client side ends the inbound stream
    let TestClient { to_server, task, .. } = alice;
    drop(to_server);

    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap();
    wait_for_connections(&hub, 0).await;
}

#[tokio::test]
async fn test_read_error_unregisters_connection() {
    let settings = test_settings();
    let hub = spawn_hub(
        &settings,
        Arc::new(FakeMessageStore::default()),
        Arc::new(FakeChatMembers::default()),
    );

    let mut alice = TestClient::connect(&hub, 1, &settings);
    wait_for_connections(&hub, 1).await;

    alice
        .to_server
        .unbounded_send(Err(axum::Error::new(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        ))))
        .unwrap();

    tokio::time::timeout(Duration::from_secs(2), &mut alice.task)
        .await
        .unwrap()
        .unwrap();
    wait_for_connections(&hub, 0).await;
}

#[tokio::test]
async fn test_write_error_unregisters_connection() {
    let settings = test_settings();
    let members = Arc::new(FakeChatMembers::default().with_chat(7, &[1, 2]));
    let hub = spawn_hub(&settings, Arc::new(FakeMessageStore::default()), members);

    let alice = TestClient::connect(&hub, 1, &settings);
    let bob = TestClient::connect(&hub, 2, &settings);
    wait_for_connections(&hub, 2).await;

    // Bob stops reading, so the next write to his socket fails
    let TestClient {
        to_server: _bob_input,
        from_server,
        task: bob_task,
    } = bob;
    drop(from_server);

    alice.send_chat(1, 7, "are you there?");

    tokio::time::timeout(Duration::from_secs(2), bob_task)
        .await
        .unwrap()
        .unwrap();
    wait_for_connections(&hub, 1).await;
    assert!(!hub.is_online(2).await.unwrap());
    assert!(hub.is_online(1).await.unwrap());
}
