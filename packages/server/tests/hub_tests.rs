//! Hub delivery semantics exercised through the public API.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use server_core::kernel::{
    BusEvent, JobStatus, JobUpdateMessage, NotificationHub, TaskStatus, TaskStatusUpdateMessage,
    TaskType,
};
use tokio::sync::mpsc;
use uuid::Uuid;

fn job_event(job_id: Uuid) -> BusEvent {
    BusEvent::JobUpdate(JobUpdateMessage::new(job_id, JobStatus::Running, None))
}

fn task_event(job_id: Uuid) -> BusEvent {
    BusEvent::TaskStatusUpdate(TaskStatusUpdateMessage::new(
        job_id,
        TaskType::Analyzing,
        TaskStatus::Running,
    ))
}

fn recv_text(rx: &mut mpsc::Receiver<Message>) -> Option<String> {
    match rx.try_recv() {
        Ok(Message::Text(text)) => Some(text),
        Ok(other) => panic!("unexpected frame: {other:?}"),
        Err(_) => None,
    }
}

#[tokio::test]
async fn group_broadcast_reaches_only_subscribers() {
    let hub = Arc::new(NotificationHub::new());
    let job_id = Uuid::now_v7();

    let (tx_a, mut rx_a) = mpsc::channel(8);
    let (tx_b, mut rx_b) = mpsc::channel(8);
    let (tx_c, mut rx_c) = mpsc::channel(8);
    let conn_a = hub.register(tx_a);
    let conn_b = hub.register(tx_b);
    let _conn_c = hub.register(tx_c);

    conn_a.subscribe(&job_id.to_string());
    conn_b.subscribe(&job_id.to_string());

    hub.broadcast_to_group(&task_event(job_id), &job_id.to_string());

    assert!(recv_text(&mut rx_a).is_some());
    assert!(recv_text(&mut rx_b).is_some());
    assert!(recv_text(&mut rx_c).is_none());
}

#[tokio::test]
async fn global_broadcast_reaches_every_connection() {
    let hub = Arc::new(NotificationHub::new());

    let (tx_a, mut rx_a) = mpsc::channel(8);
    let (tx_b, mut rx_b) = mpsc::channel(8);
    hub.register(tx_a);
    let conn_b = hub.register(tx_b);
    conn_b.subscribe("some-other-group");

    let job_id = Uuid::now_v7();
    hub.broadcast(&job_event(job_id));

    let payload = recv_text(&mut rx_a).expect("unsubscribed connection still gets job updates");
    assert!(recv_text(&mut rx_b).is_some());

    // Frames carry the bus message verbatim, discriminator included.
    let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
    assert_eq!(value["type"], "job.update");
    assert_eq!(value["job_id"], job_id.to_string());
}

#[tokio::test]
async fn unsubscribe_stops_group_delivery() {
    let hub = Arc::new(NotificationHub::new());
    let job_id = Uuid::now_v7();

    let (tx, mut rx) = mpsc::channel(8);
    let conn = hub.register(tx);
    conn.subscribe(&job_id.to_string());

    hub.broadcast_to_group(&task_event(job_id), &job_id.to_string());
    assert!(recv_text(&mut rx).is_some());

    conn.unsubscribe(&job_id.to_string());
    hub.broadcast_to_group(&task_event(job_id), &job_id.to_string());
    assert!(recv_text(&mut rx).is_none());
}

#[tokio::test]
async fn dead_connection_is_evicted_and_others_keep_receiving() {
    let hub = Arc::new(NotificationHub::new());
    let job_id = Uuid::now_v7();

    let (tx_dead, rx_dead) = mpsc::channel(8);
    let (tx_live, mut rx_live) = mpsc::channel(8);
    let dead = hub.register(tx_dead);
    let live = hub.register(tx_live);
    dead.subscribe(&job_id.to_string());
    live.subscribe(&job_id.to_string());
    assert_eq!(hub.connection_count(), 2);

    // Simulate a gone client: its write pump has dropped the receiver.
    drop(rx_dead);

    hub.broadcast_to_group(&task_event(job_id), &job_id.to_string());
    assert!(recv_text(&mut rx_live).is_some());

    // Eviction runs off the sweep path.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(hub.connection_count(), 1);
    assert!(dead.cancel_token().is_cancelled());

    hub.broadcast_to_group(&task_event(job_id), &job_id.to_string());
    assert!(recv_text(&mut rx_live).is_some());
}

#[tokio::test]
async fn close_all_cancels_and_clears() {
    let hub = Arc::new(NotificationHub::new());
    let (tx_a, _rx_a) = mpsc::channel(8);
    let (tx_b, _rx_b) = mpsc::channel(8);
    let conn_a = hub.register(tx_a);
    let conn_b = hub.register(tx_b);

    hub.close_all();
    assert_eq!(hub.connection_count(), 0);
    assert!(conn_a.cancel_token().is_cancelled());
    assert!(conn_b.cancel_token().is_cancelled());
}
