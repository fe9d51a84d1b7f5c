// SPDX-FileCopyrightText: 2026 apns-core contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for the delivery client against the mock gateway.

mod common;

use std::sync::Arc;

use apns_core::network::{MockGatewayListener, ScriptedDial};
use apns_core::{
    ChannelSink, Client, ClientConfig, DeliveryError, DeliveryFailure, FailureReport, MockDialer,
    Status,
};
use common::{alert_of, notification, test_config, within, Unencodable};
use tokio::sync::mpsc::UnboundedReceiver;

struct Harness {
    client: Client<MockDialer>,
    dialer: MockDialer,
    listener: MockGatewayListener,
    failures: UnboundedReceiver<DeliveryFailure>,
}

fn harness(config: ClientConfig) -> Harness {
    let (dialer, listener) = MockDialer::new();
    let (sink, failures) = ChannelSink::new();
    let client = Client::new(config, dialer.clone(), sink).unwrap();
    Harness {
        client,
        dialer,
        listener,
        failures,
    }
}

// === Sending ===

#[tokio::test]
async fn test_sends_are_written_in_order() {
    let mut h = harness(test_config());

    for i in 0..3 {
        assert_eq!(h.client.send(notification(i)).await.unwrap(), i as i32);
    }

    let mut gateway = within(h.listener.accept()).await.unwrap();
    for i in 0..3 {
        let frame = within(gateway.read_frame()).await.unwrap();
        assert_eq!(frame.command, 2);
        assert_eq!(frame.sequence(), Some(i as i32));
        assert_eq!(alert_of(&frame.payload().unwrap()), format!("n{}", i));
    }
    assert_eq!(h.dialer.dial_count(), 1);
}

#[tokio::test]
async fn test_replay_queue_keeps_latest_sends() {
    let config = ClientConfig {
        replay_capacity: 3,
        ..test_config()
    };
    let h = harness(config);

    for i in 0..5 {
        h.client.send(notification(i)).await.unwrap();
    }

    assert_eq!(h.client.in_flight().await, 3);
    assert_eq!(h.client.in_flight_sequences().await, vec![2, 3, 4]);
}

#[tokio::test]
async fn test_connect_eagerly_reuses_connection() {
    let h = harness(test_config());

    h.client.connect().await.unwrap();
    assert!(h.client.is_connected().await);

    h.client.send(notification(0)).await.unwrap();
    assert_eq!(h.dialer.dial_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_get_unique_sequences() {
    let h = harness(test_config());

    let mut tasks = Vec::new();
    for i in 0..20 {
        let client = h.client.clone();
        tasks.push(tokio::spawn(async move { client.send(notification(i)).await }));
    }

    let mut seqs = Vec::new();
    for task in tasks {
        seqs.push(task.await.unwrap().unwrap());
    }
    seqs.sort_unstable();

    assert_eq!(seqs, (0..20).collect::<Vec<_>>());
    assert_eq!(h.client.in_flight().await, 20);
}

#[tokio::test]
async fn test_sequence_wraps_within_configured_bound() {
    let config = ClientConfig {
        replay_capacity: 2,
        sequence_bound: 3,
        ..test_config()
    };
    let h = harness(config);

    let mut seqs = Vec::new();
    for i in 0..4 {
        seqs.push(h.client.send(notification(i)).await.unwrap());
    }

    assert_eq!(seqs, vec![0, 1, 2, 0]);
    assert_eq!(h.client.in_flight_sequences().await, vec![2, 0]);
}

// === Write failures ===

#[tokio::test]
async fn test_single_write_failure_retries_on_fresh_connection() {
    let mut h = harness(test_config());
    h.dialer.script(ScriptedDial::Dead);

    assert_eq!(h.client.send(notification(0)).await.unwrap(), 0);
    assert_eq!(h.dialer.dial_count(), 2);

    let mut gateway = within(h.listener.accept()).await.unwrap();
    assert_eq!(gateway.number(), 2);
    assert_eq!(within(gateway.read_frame()).await.unwrap().sequence(), Some(0));

    assert!(h.failures.try_recv().is_err());
    assert_eq!(h.client.in_flight().await, 1);
}

#[tokio::test]
async fn test_second_write_failure_surfaces_and_reports_once() {
    let mut h = harness(test_config());
    h.dialer.script(ScriptedDial::Dead);
    h.dialer.script(ScriptedDial::Dead);

    let result = h.client.send(notification(0)).await;
    assert!(matches!(result, Err(DeliveryError::Write(_))));
    assert_eq!(h.dialer.dial_count(), 2);

    let failure = within(h.failures.recv()).await.unwrap();
    assert_eq!(failure.sequence, 0);
    assert!(failure.report.is_none());
    assert!(h.failures.try_recv().is_err());

    assert!(!h.client.is_connected().await);
    assert_eq!(h.client.in_flight().await, 0);

    // The failed send still consumed its sequence number
    assert_eq!(h.client.send(notification(1)).await.unwrap(), 1);
    assert_eq!(h.dialer.dial_count(), 3);
}

#[tokio::test]
async fn test_connect_error_surfaces_and_reports() {
    let mut h = harness(test_config());
    h.dialer.script(ScriptedDial::FailConnect("connection refused".into()));

    let result = h.client.send(notification(0)).await;
    assert!(matches!(result, Err(DeliveryError::Connect(_))));

    let failure = within(h.failures.recv()).await.unwrap();
    assert_eq!(failure.sequence, 0);
    assert!(failure.report.is_none());
    assert_eq!(h.dialer.dial_count(), 1);
}

#[tokio::test]
async fn test_certificate_error_surfaces_and_reports() {
    let mut h = harness(test_config());
    h.dialer.script(ScriptedDial::FailCertificate("bad key".into()));

    let result = h.client.send(notification(0)).await;
    assert!(matches!(result, Err(DeliveryError::Certificate(_))));
    assert!(within(h.failures.recv()).await.unwrap().report.is_none());
}

#[tokio::test]
async fn test_serialization_error_does_no_io() {
    let mut h = harness(test_config());

    let result = h.client.send(Arc::new(Unencodable)).await;
    assert!(matches!(result, Err(DeliveryError::Serialization(_))));

    assert_eq!(h.dialer.dial_count(), 0);
    assert!(h.listener.try_accept().is_none());
    assert!(h.failures.try_recv().is_err());
    assert_eq!(h.client.next_sequence().await, 1);
}

// === Gateway failure reports ===

#[tokio::test]
async fn test_error_frame_replays_tail() {
    let mut h = harness(test_config());

    for i in 0..3 {
        h.client.send(notification(i)).await.unwrap();
    }
    let mut gateway = within(h.listener.accept()).await.unwrap();
    for _ in 0..3 {
        within(gateway.read_frame()).await.unwrap();
    }

    gateway.send_error(Status::InvalidToken, 1).await.unwrap();

    let failure = within(h.failures.recv()).await.unwrap();
    assert_eq!(failure.sequence, 1);
    assert_eq!(
        failure.report,
        Some(FailureReport::new(Status::InvalidToken, 1))
    );

    // Notification 2 is resent on a fresh connection under a new sequence
    let mut replay = within(h.listener.accept()).await.unwrap();
    assert_eq!(replay.number(), 2);
    let frame = within(replay.read_frame()).await.unwrap();
    assert_eq!(frame.sequence(), Some(3));
    assert_eq!(alert_of(&frame.payload().unwrap()), "n2");

    // Notification 0 is never resent
    assert_eq!(h.client.in_flight_sequences().await, vec![3]);
    assert!(h.failures.try_recv().is_err());
    assert_eq!(h.dialer.dial_count(), 2);
}

#[tokio::test]
async fn test_error_frame_reported_after_write_fails_on_closed_connection() {
    let mut h = harness(test_config());

    for i in 0..3 {
        h.client.send(notification(i)).await.unwrap();
    }
    let mut gateway = within(h.listener.accept()).await.unwrap();
    for _ in 0..3 {
        within(gateway.read_frame()).await.unwrap();
    }

    // The gateway reports and hangs up; the next send hits the dead socket
    gateway.send_error(Status::InvalidToken, 1).await.unwrap();
    drop(gateway);
    let sequence = h.client.send(notification(3)).await.unwrap();
    assert!(sequence >= 3);

    let failure = within(h.failures.recv()).await.unwrap();
    assert_eq!(failure.sequence, 1);
    assert_eq!(
        failure.report,
        Some(FailureReport::new(Status::InvalidToken, 1))
    );

    // Notification 2 is resent on the replacement connection
    let mut replay = within(h.listener.accept()).await.unwrap();
    assert_eq!(replay.number(), 2);
    let mut alerts = Vec::new();
    while !alerts.iter().any(|a| a == "n2") {
        let frame = within(replay.read_frame()).await.unwrap();
        alerts.push(alert_of(&frame.payload().unwrap()));
    }

    let in_flight = h.client.in_flight_sequences().await;
    assert!(in_flight.iter().all(|s| *s >= 3), "{:?}", in_flight);
    assert!(h.failures.try_recv().is_err());
    assert_eq!(h.dialer.dial_count(), 2);
}

#[tokio::test]
async fn test_report_failure_for_last_send_resends_nothing() {
    let mut h = harness(test_config());

    for i in 0..3 {
        h.client.send(notification(i)).await.unwrap();
    }
    h.client
        .report_failure(FailureReport::new(Status::MissingPayload, 2))
        .await;

    let failure = within(h.failures.recv()).await.unwrap();
    assert_eq!(failure.sequence, 2);
    assert_eq!(h.client.in_flight().await, 0);
    assert_eq!(h.client.next_sequence().await, 3);
}

#[tokio::test]
async fn test_report_failure_resends_on_current_connection() {
    let mut h = harness(test_config());

    for i in 0..3 {
        h.client.send(notification(i)).await.unwrap();
    }
    h.client
        .report_failure(FailureReport::new(Status::ProcessingError, 0))
        .await;

    let failure = within(h.failures.recv()).await.unwrap();
    assert_eq!(failure.sequence, 0);

    let mut gateway = within(h.listener.accept()).await.unwrap();
    for _ in 0..3 {
        within(gateway.read_frame()).await.unwrap();
    }

    // Two resends, each an independent task; completion order is free
    let mut resent = Vec::new();
    for _ in 0..2 {
        let frame = within(gateway.read_frame()).await.unwrap();
        resent.push((frame.sequence().unwrap(), alert_of(&frame.payload().unwrap())));
    }
    resent.sort();
    let sequences: Vec<i32> = resent.iter().map(|(s, _)| *s).collect();
    let mut alerts: Vec<String> = resent.into_iter().map(|(_, a)| a).collect();
    alerts.sort();

    assert_eq!(sequences, vec![3, 4]);
    assert_eq!(alerts, vec!["n1".to_string(), "n2".to_string()]);
    assert_eq!(h.client.in_flight().await, 2);
}

#[tokio::test]
async fn test_evicted_failure_is_only_a_warning() {
    let config = ClientConfig {
        replay_capacity: 2,
        ..test_config()
    };
    let mut h = harness(config);

    for i in 0..3 {
        h.client.send(notification(i)).await.unwrap();
    }
    h.client
        .report_failure(FailureReport::new(Status::InvalidToken, 0))
        .await;

    assert_eq!(h.client.in_flight_sequences().await, vec![1, 2]);
    assert_eq!(h.client.next_sequence().await, 3);
    assert!(h.failures.try_recv().is_err());
    assert_eq!(h.dialer.dial_count(), 1);
}

#[tokio::test]
async fn test_failed_resend_does_not_block_others() {
    let mut h = harness(test_config());

    for i in 0..3 {
        h.client.send(notification(i)).await.unwrap();
    }
    let mut gateway = within(h.listener.accept()).await.unwrap();
    for _ in 0..3 {
        within(gateway.read_frame()).await.unwrap();
    }

    // The first reconnect fails, the second succeeds
    h.dialer.script(ScriptedDial::FailConnect("refused".into()));
    gateway.send_error(Status::Shutdown, 0).await.unwrap();

    let reported = within(h.failures.recv()).await.unwrap();
    assert_eq!(reported.sequence, 0);
    assert!(reported.report.is_some());

    let local = within(h.failures.recv()).await.unwrap();
    assert_eq!(local.sequence, 3);
    assert!(local.report.is_none());

    let mut replay = within(h.listener.accept()).await.unwrap();
    assert_eq!(replay.number(), 3);
    let frame = within(replay.read_frame()).await.unwrap();
    assert_eq!(frame.sequence(), Some(4));
    assert_eq!(h.client.in_flight_sequences().await, vec![4]);
}

#[tokio::test]
async fn test_unrecognized_frame_is_discarded() {
    let mut h = harness(test_config());

    h.client.send(notification(0)).await.unwrap();
    let mut gateway = within(h.listener.accept()).await.unwrap();
    within(gateway.read_frame()).await.unwrap();

    // Unknown command, then unknown status on the next connection
    gateway.send_raw(&[9, 8, 0, 0, 0, 0]).await.unwrap();
    drop(gateway);

    h.client.send(notification(1)).await.unwrap();
    let mut gateway = within(h.listener.accept()).await.unwrap();
    within(gateway.read_frame()).await.unwrap();
    gateway.send_raw(&[8, 99, 0, 0, 0, 1]).await.unwrap();
    drop(gateway);

    h.client.send(notification(2)).await.unwrap();

    assert!(h.failures.try_recv().is_err());
    assert_eq!(h.client.in_flight_sequences().await, vec![0, 1, 2]);
    assert_eq!(h.dialer.dial_count(), 3);
}

#[tokio::test]
async fn test_gateway_close_reconnects_lazily() {
    let mut h = harness(test_config());

    h.client.send(notification(0)).await.unwrap();
    let gateway = within(h.listener.accept()).await.unwrap();
    drop(gateway);

    h.client.send(notification(1)).await.unwrap();
    assert_eq!(h.dialer.dial_count(), 2);
    assert!(h.failures.try_recv().is_err());
    assert_eq!(h.client.in_flight().await, 2);
}

// === Close ===

#[tokio::test]
async fn test_close_rejects_sends_without_io() {
    let mut h = harness(test_config());

    h.client.send(notification(0)).await.unwrap();
    let mut gateway = within(h.listener.accept()).await.unwrap();
    within(gateway.read_frame()).await.unwrap();

    h.client.close().await;
    assert!(!h.client.is_running().await);
    assert!(!h.client.is_connected().await);
    assert_eq!(h.client.in_flight().await, 0);

    assert!(matches!(
        h.client.send(notification(1)).await,
        Err(DeliveryError::NotRunning)
    ));
    assert!(matches!(
        h.client.connect().await,
        Err(DeliveryError::NotRunning)
    ));
    assert_eq!(h.dialer.dial_count(), 1);

    // The gateway sees the connection close
    assert!(within(gateway.read_frame()).await.is_err());
}

#[tokio::test]
async fn test_close_is_idempotent_and_drops_reports() {
    let mut h = harness(test_config());

    h.client.send(notification(0)).await.unwrap();
    h.client.close().await;
    h.client.close().await;

    h.client
        .report_failure(FailureReport::new(Status::InvalidToken, 0))
        .await;
    assert!(h.failures.try_recv().is_err());
    assert_eq!(h.dialer.dial_count(), 1);
}
