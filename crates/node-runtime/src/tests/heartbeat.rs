//! Liveness pings and exit after missed acknowledgments.

use super::harness::{itinerary, settings, RecordingBackend, TestNode};
use crate::{RuntimeExit, RuntimeOptions};
use messaging_backend::MessagingBackend;
use std::time::Duration;

fn options(interval: Duration, accepted: u32) -> RuntimeOptions {
    RuntimeOptions {
        heartbeat_interval: interval,
        accepted_missed_heartbeats: accepted,
        ..RuntimeOptions::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_node_exits_after_accepted_missed_heartbeats() {
    let backend = RecordingBackend::disconnected();
    backend.ack_heartbeats(false);
    let node = TestNode::build(settings("node1"), backend, None, options(Duration::from_secs(10), 3))
        .await
        .spawn();

    let exit = node.task.await.unwrap();

    assert_eq!(exit, RuntimeExit::HeartbeatLost);
    assert!(exit.is_failure());
    assert_eq!(node.backend.heartbeats().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_acknowledged_heartbeats_keep_the_node_running() {
    let node = TestNode::build(
        settings("node1"),
        RecordingBackend::disconnected(),
        None,
        options(Duration::from_secs(10), 1),
    )
    .await
    .spawn();

    tokio::time::sleep(Duration::from_secs(95)).await;
    node.handle.shutdown();
    let exit = node.task.await.unwrap();

    assert_eq!(exit, RuntimeExit::Shutdown);
    assert!(!exit.is_failure());
    assert_eq!(node.backend.heartbeats().len(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_ids_are_unique() {
    let backend = RecordingBackend::disconnected();
    backend.ack_heartbeats(false);
    let node = TestNode::build(settings("node1"), backend, None, options(Duration::from_secs(1), 2))
        .await
        .spawn();

    node.task.await.unwrap();

    let mut ids = node.backend.heartbeats();
    let sent = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), sent);
}

#[tokio::test]
async fn test_shutdown_stops_the_backend() {
    let mut node = TestNode::new("node1").await;
    node.sign_in(vec![itinerary(&[("A", "node1")], &[])]).await;
    assert!(node.backend.is_connected());
    let node = node.spawn();

    node.handle.shutdown();
    let exit = node.task.await.unwrap();

    assert_eq!(exit, RuntimeExit::Shutdown);
    assert!(!node.backend.is_connected());
}
