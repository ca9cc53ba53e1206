//! Session lifecycle tests against a scripted transport.
//!
//! All tests run on a paused clock, so reconnect delays are observed exactly
//! and cost no wall time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use catalog_realtime::display::{ACTIVE_NOTICE, EXHAUSTED_NOTICE};
use catalog_realtime::{
    ActivationGate, ConnectionStatus, NotificationKind, RealtimeError, RealtimeSession,
    SessionOptions, ToastStyle, Topic,
};
use common::{
    MockTransport, RecordingSink, Shown, Step, eventually, wait_for_snapshot, wait_for_status,
};
use pretty_assertions::assert_eq;
use tokio::sync::watch;
use tokio_stream::StreamExt as _;

const ALBUM_CREATED: &str = r#"{"type":"ALBUM_CREATED","message":"Novo álbum cadastrado: X",
    "payload":{"id":7,"nome":"X","artistaNome":"Y"},"timestamp":"2025-03-01T12:00:00"}"#;

fn start(transport: &MockTransport) -> (RealtimeSession, Arc<RecordingSink>) {
    start_with(transport, SessionOptions::default())
}

fn start_with(
    transport: &MockTransport,
    options: SessionOptions,
) -> (RealtimeSession, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let session = RealtimeSession::new(Arc::new(transport.clone()), sink.clone(), options);
    (session, sink)
}

fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_secs).collect()
}

#[tokio::test(start_paused = true)]
async fn test_connect_subscribes_all_topics_in_order() {
    let transport = MockTransport::accepting();
    let (session, sink) = start(&transport);
    assert_eq!(session.status(), ConnectionStatus::Disconnected);

    session.connect().unwrap();
    wait_for_status(&session, ConnectionStatus::Connected).await;

    let link = transport.link(0);
    link.wait_subscribed().await;
    assert_eq!(
        link.subscriptions(),
        vec![
            ("sub-0".to_string(), "/topic/artistas".to_string()),
            ("sub-1".to_string(), "/topic/albuns".to_string()),
            ("sub-2".to_string(), "/topic/sync".to_string()),
            ("sub-3".to_string(), "/topic/system".to_string()),
        ]
    );
    assert_eq!(
        sink.shown(),
        vec![Shown {
            message: ACTIVE_NOTICE.to_string(),
            style: ToastStyle::Info,
            duration: Some(Duration::from_millis(2000)),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_connect_while_connecting_is_noop() {
    let transport = MockTransport::new([], Step::Hang);
    let (session, _sink) = start(&transport);

    session.connect().unwrap();
    transport.wait_for_attempts(1).await;
    assert_eq!(session.status(), ConnectionStatus::Connecting);

    session.connect().unwrap();
    session.connect().unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(transport.attempts(), 1);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.status, ConnectionStatus::Connecting);
    assert_eq!(snapshot.attempt_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_while_connected_is_noop() {
    let transport = MockTransport::accepting();
    let (session, sink) = start(&transport);

    session.connect().unwrap();
    wait_for_status(&session, ConnectionStatus::Connected).await;
    session.connect().unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(transport.attempts(), 1);
    assert_eq!(transport.link_count(), 1);
    assert_eq!(sink.count(ACTIVE_NOTICE), 1);
    assert_eq!(session.status(), ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_is_linear_and_budget_exhausts_once() {
    let transport = MockTransport::refusing();
    let (session, sink) = start(&transport);

    session.connect().unwrap();
    let snapshot = wait_for_snapshot(&session, |s| s.exhausted).await;
    assert_eq!(snapshot.status, ConnectionStatus::Error);
    assert_eq!(snapshot.attempt_count, 5);

    // One initial attempt plus five reconnects
    assert_eq!(transport.attempts(), 6);
    assert_eq!(transport.attempt_gaps(), secs(&[3, 6, 9, 12, 15]));

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(transport.attempts(), 6);
    assert_eq!(session.status(), ConnectionStatus::Error);

    assert_eq!(sink.count(EXHAUSTED_NOTICE), 1);
    assert_eq!(
        sink.shown(),
        vec![Shown {
            message: EXHAUSTED_NOTICE.to_string(),
            style: ToastStyle::Error,
            duration: None,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_external_connect_after_exhaustion_starts_new_cycle() {
    let transport = MockTransport::new(
        [Step::Fail, Step::Fail, Step::Fail, Step::Fail, Step::Fail, Step::Fail],
        Step::Succeed,
    );
    let (session, _sink) = start(&transport);

    session.connect().unwrap();
    wait_for_snapshot(&session, |s| s.exhausted).await;
    assert_eq!(transport.attempts(), 6);

    session.connect().unwrap();
    let snapshot = wait_for_status(&session, ConnectionStatus::Connected).await;
    assert_eq!(transport.attempts(), 7);
    assert_eq!(snapshot.attempt_count, 0);
    assert!(!snapshot.exhausted);
}

#[tokio::test(start_paused = true)]
async fn test_successful_connection_resets_attempts() {
    let transport = MockTransport::new([Step::Fail, Step::Fail, Step::Succeed], Step::Succeed);
    let (session, _sink) = start(&transport);

    session.connect().unwrap();
    wait_for_snapshot(&session, |s| s.attempt_count == 2).await;
    let snapshot = wait_for_status(&session, ConnectionStatus::Connected).await;
    assert_eq!(snapshot.attempt_count, 0);
    assert_eq!(transport.attempt_gaps(), secs(&[3, 6]));

    // A later drop starts the schedule from the first delay again
    transport.link(0).drop_connection().await;
    wait_for_snapshot(&session, |s| s.status == ConnectionStatus::Error).await;
    wait_for_status(&session, ConnectionStatus::Connected).await;
    assert_eq!(transport.attempts(), 4);
    let gap = transport.attempt_gaps()[2];
    assert!(
        gap >= Duration::from_secs(3) && gap < Duration::from_secs(4),
        "unexpected gap {gap:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_lost_connection_resubscribes_on_new_connection() {
    let transport = MockTransport::accepting();
    let (session, sink) = start(&transport);

    session.connect().unwrap();
    wait_for_status(&session, ConnectionStatus::Connected).await;
    let first = transport.link(0);
    first.wait_subscribed().await;

    first.drop_connection().await;
    let snapshot = wait_for_status(&session, ConnectionStatus::Error).await;
    assert_eq!(snapshot.attempt_count, 1);

    wait_for_status(&session, ConnectionStatus::Connected).await;
    let second = transport.link(1);
    second.wait_subscribed().await;
    assert_eq!(second.subscriptions(), first.subscriptions());
    assert_eq!(sink.count(ACTIVE_NOTICE), 2);

    // Traffic now flows through the new connection only
    let mut albums = session.subscribe(Topic::Albums);
    second.deliver(Topic::Albums, ALBUM_CREATED).await;
    let event = tokio::time::timeout(Duration::from_secs(5), albums.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.kind, NotificationKind::AlbumCreated);
}

#[tokio::test(start_paused = true)]
async fn test_album_created_reaches_channels_and_sink() {
    let transport = MockTransport::accepting();
    let (session, sink) = start(&transport);
    let mut albums = session.subscribe(Topic::Albums);
    let mut artists = session.subscribe(Topic::Artists);
    let mut global = session.subscribe_all();
    let mut album_changes = session.album_changes();

    session.connect().unwrap();
    wait_for_status(&session, ConnectionStatus::Connected).await;
    transport.link(0).deliver(Topic::Albums, ALBUM_CREATED).await;

    let event = tokio::time::timeout(Duration::from_secs(5), albums.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.kind, NotificationKind::AlbumCreated);
    let album = event.album().unwrap();
    assert_eq!(album.id, 7);
    assert_eq!(album.name.as_deref(), Some("X"));
    assert_eq!(album.artist_name.as_deref(), Some("Y"));

    assert_eq!(global.recv().await.unwrap(), event);
    assert!(artists.try_recv().is_err());

    assert_eq!(album_changes.next().await.unwrap(), event);

    let shown = sink.shown();
    assert_eq!(
        shown.last(),
        Some(&Shown {
            message: "Novo álbum cadastrado: X".to_string(),
            style: ToastStyle::Success,
            duration: None,
        })
    );
    assert_eq!(session.dispatcher().stats().delivered, 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_sync_payload_changes_nothing() {
    let transport = MockTransport::accepting();
    let (session, sink) = start(&transport);
    let mut sync = session.subscribe(Topic::Sync);
    let mut global = session.subscribe_all();

    session.connect().unwrap();
    wait_for_status(&session, ConnectionStatus::Connected).await;
    let before = session.snapshot();
    let link = transport.link(0);

    link.deliver(Topic::Sync, r#"{"type":"SYNC_COMPLETED","message":"#)
        .await;
    eventually(|| session.dispatcher().stats().dropped_malformed == 1).await;

    assert_eq!(session.snapshot(), before);
    assert!(sync.try_recv().is_err());
    assert!(global.try_recv().is_err());
    assert_eq!(sink.shown().len(), 1, "only the connection notice");

    // The link keeps working after the bad frame
    link.deliver(
        Topic::Sync,
        r#"{"type":"SYNC_COMPLETED","message":"Sync done","payload":{"total":3,"novos":1,"atualizados":2},
            "timestamp":"2025-03-01T12:00:00Z"}"#,
    )
    .await;
    let event = tokio::time::timeout(Duration::from_secs(5), sync.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.sync_counters().map(|c| c.total), Some(3));
    assert_eq!(
        sink.shown().last().map(|s| (s.style, s.duration)),
        Some((ToastStyle::Success, Some(Duration::from_millis(5000))))
    );
}

#[tokio::test(start_paused = true)]
async fn test_deactivation_mid_backoff_stops_retries() {
    let transport = MockTransport::refusing();
    let (session, _sink) = start(&transport);
    let (active_tx, active_rx) = watch::channel(false);
    let _gate = ActivationGate::spawn(session.clone(), active_rx);

    active_tx.send(true).unwrap();
    transport.wait_for_attempts(2).await;
    wait_for_snapshot(&session, |s| {
        s.status == ConnectionStatus::Error && s.attempt_count == 2
    })
    .await;

    active_tx.send(false).unwrap();
    wait_for_status(&session, ConnectionStatus::Disconnected).await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.attempts(), 2);
    assert_eq!(session.status(), ConnectionStatus::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_gate_ignores_repeated_values() {
    let transport = MockTransport::accepting();
    let (session, _sink) = start(&transport);
    let (active_tx, active_rx) = watch::channel(true);
    let _gate = ActivationGate::spawn(session.clone(), active_rx);

    wait_for_status(&session, ConnectionStatus::Connected).await;
    active_tx.send(true).unwrap();
    active_tx.send(true).unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.attempts(), 1);

    active_tx.send(false).unwrap();
    wait_for_status(&session, ConnectionStatus::Disconnected).await;
    transport.link(0).wait_closed().await;

    active_tx.send(true).unwrap();
    wait_for_status(&session, ConnectionStatus::Connected).await;
    assert_eq!(transport.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_closes_connection_and_cancels_timer() {
    let transport = MockTransport::new([Step::Succeed], Step::Fail);
    let (session, _sink) = start(&transport);

    session.connect().unwrap();
    wait_for_status(&session, ConnectionStatus::Connected).await;
    session.disconnect().unwrap();
    wait_for_status(&session, ConnectionStatus::Disconnected).await;
    transport.link(0).wait_closed().await;

    // Fail once, then disconnect while the retry is pending
    session.connect().unwrap();
    wait_for_snapshot(&session, |s| s.attempt_count == 1).await;
    session.disconnect().unwrap();
    session.disconnect().unwrap();
    let snapshot = wait_for_status(&session, ConnectionStatus::Disconnected).await;
    assert_eq!(snapshot.attempt_count, 0);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_handshake_aborts_attempt() {
    let transport = MockTransport::new([Step::Hang], Step::Succeed);
    let (session, _sink) = start(&transport);

    session.connect().unwrap();
    transport.wait_for_attempts(1).await;
    session.disconnect().unwrap();
    wait_for_status(&session, ConnectionStatus::Disconnected).await;

    session.connect().unwrap();
    wait_for_status(&session, ConnectionStatus::Connected).await;
    assert_eq!(transport.attempts(), 2);
    assert_eq!(transport.link_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hung_handshake_times_out_into_backoff() {
    let transport = MockTransport::new([Step::Hang], Step::Succeed);
    let (session, _sink) = start(&transport);

    session.connect().unwrap();
    let snapshot = wait_for_status(&session, ConnectionStatus::Error).await;
    assert_eq!(snapshot.attempt_count, 1);
    assert_eq!(transport.attempts(), 1);

    wait_for_status(&session, ConnectionStatus::Connected).await;
    assert_eq!(transport.attempts(), 2);
    // Ten second handshake bound, then the first three second delay
    let gap = transport.attempt_gaps()[0];
    assert!(
        gap >= Duration::from_secs(13) && gap < Duration::from_secs(14),
        "unexpected gap {gap:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_handshake_timeout_follows_options() {
    let transport = MockTransport::new([], Step::Hang);
    let (session, _sink) = start_with(
        &transport,
        SessionOptions {
            connect_timeout: Duration::from_secs(2),
            ..SessionOptions::default()
        },
    );

    session.connect().unwrap();
    wait_for_status(&session, ConnectionStatus::Error).await;
    transport.wait_for_attempts(2).await;
    let gap = transport.attempt_gaps()[0];
    assert!(
        gap >= Duration::from_secs(5) && gap < Duration::from_secs(6),
        "unexpected gap {gap:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_close_failure_still_disconnects() {
    let transport = MockTransport::accepting().failing_close();
    let (session, _sink) = start(&transport);

    session.connect().unwrap();
    wait_for_status(&session, ConnectionStatus::Connected).await;
    transport.link(0).wait_subscribed().await;

    assert!(session.disconnect().is_ok());
    let snapshot = wait_for_status(&session, ConnectionStatus::Disconnected).await;
    assert_eq!(snapshot.attempt_count, 0);
    assert!(!snapshot.exhausted);
    transport.link(0).wait_closed().await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.attempts(), 1);
    assert_eq!(session.status(), ConnectionStatus::Disconnected);

    // The session stays usable
    session.connect().unwrap();
    wait_for_status(&session, ConnectionStatus::Connected).await;
    assert_eq!(transport.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_notices_can_be_disabled() {
    let transport = MockTransport::accepting();
    let (session, sink) = start_with(
        &transport,
        SessionOptions {
            notices: false,
            ..SessionOptions::default()
        },
    );

    session.connect().unwrap();
    wait_for_status(&session, ConnectionStatus::Connected).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(sink.shown().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_close_shuts_session_down() {
    let transport = MockTransport::accepting();
    let (session, _sink) = start(&transport);

    session.connect().unwrap();
    wait_for_status(&session, ConnectionStatus::Connected).await;

    session.close().await;
    assert_eq!(session.status(), ConnectionStatus::Disconnected);
    assert!(transport.link(0).is_closed());
    eventually(|| session.is_closed()).await;
    assert!(matches!(session.connect(), Err(RealtimeError::SessionClosed)));

    // Closing twice is harmless
    session.close().await;
}
