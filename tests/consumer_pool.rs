//! End-to-end tests against an in-process word server.

mod common;

use std::time::Duration;

use common::{MockConfig, MockServer, eventually, init_logging};
use wordpool::{
    Command, Connection, ConnectionState, Error, ExchangeBuffer, FrameCodec, GovernorState,
    PoolController, SessionId, WorkItem,
};

const SETTLE: Duration = Duration::from_secs(10);

/// Waits for every consumer to leave on its own, then joins their tasks.
async fn drained(pool: &PoolController) -> bool {
    let watched = pool.clone();
    let empty = eventually(SETTLE, move || {
        let pool = watched.clone();
        async move { pool.consumer_count() == 0 }
    })
    .await;

    pool.join_exited_consumers().await;
    empty && pool.task_count() == 0
}

// ============================================================================
// Connection
// ============================================================================

#[tokio::test]
async fn test_primary_receives_session_id() -> anyhow::Result<()> {
    init_logging();
    let server = MockServer::start(MockConfig::default()).await;

    let primary = server.connect_primary().await;
    assert_eq!(primary.state(), ConnectionState::Active);
    assert_eq!(primary.endpoint(), Some(server.addr()));

    let reply = primary.exchange(&Command::Id).await?;
    assert_eq!(reply, server.session().to_string());

    let session = SessionId::parse(&reply)?;
    assert_eq!(*session.as_uuid(), server.session());

    primary.close().await;
    assert_eq!(primary.state(), ConnectionState::Stopped);
    Ok(())
}

#[tokio::test]
async fn test_remote_reset_stops_connection() {
    init_logging();
    let server = MockServer::start(MockConfig {
        reset_on_getword: true,
        ..MockConfig::default()
    })
    .await;

    let connection = Connection::new(FrameCodec::default());
    let mut buffer = ExchangeBuffer::for_codec(connection.codec());
    connection
        .connect_addr(server.addr(), &mut buffer)
        .await
        .unwrap();
    assert!(buffer.message().starts_with("SUCCESSFULLY CONNECTED TO:"));

    buffer.reset();
    let err = connection
        .exchange_with(&Command::GetWord, &mut buffer)
        .await
        .unwrap_err();

    assert!(err.is_remote_reset(), "unexpected error: {err}");
    assert!(buffer.is_error());
    assert_eq!(connection.state(), ConnectionState::Stopped);

    let err = connection.exchange(&Command::GetWord).await.unwrap_err();
    assert!(matches!(err, Error::ConnectionStopped));
}

// ============================================================================
// Manual Scaling
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_consumer_drains_finite_stream() -> anyhow::Result<()> {
    init_logging();
    let server = MockServer::start(MockConfig::finite(&["Call", "me", "Ishmael."])).await;
    let pool = PoolController::attach(server.connect_primary().await).await;

    assert_eq!(
        pool.session_id().map(|s| *s.as_uuid()),
        Some(server.session())
    );
    assert_eq!(pool.start_consumers(1).await?, 1);
    assert!(drained(&pool).await);

    let indices: Vec<u64> = pool.work_items().iter().map(WorkItem::index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(pool.ordered_text(), "Call me Ishmael.");
    assert_eq!(server.unlinks(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_consumers_share_one_stream() {
    init_logging();
    let words: Vec<String> = (0..40).map(|n| format!("w{n}")).collect();
    let refs: Vec<&str> = words.iter().map(String::as_str).collect();

    let server = MockServer::start(MockConfig::finite(&refs)).await;
    let pool = PoolController::attach(server.connect_primary().await).await;

    assert_eq!(pool.start_consumers(4).await.unwrap(), 4);
    assert!(drained(&pool).await);

    let indices: Vec<u64> = pool.work_items().iter().map(WorkItem::index).collect();
    assert_eq!(indices, (0..40).collect::<Vec<u64>>());
    assert_eq!(pool.ordered_text(), words.join(" "));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_empty_stream_yields_no_items() {
    init_logging();
    let server = MockServer::start(MockConfig::finite(&[])).await;
    let pool = PoolController::attach(server.connect_primary().await).await;

    assert_eq!(pool.start_consumers(1).await.unwrap(), 1);
    assert!(drained(&pool).await);
    assert_eq!(pool.work_item_count(), 0);
    assert_eq!(pool.ordered_text(), "");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_start_then_stop_leaves_nothing_behind() {
    init_logging();
    let server = MockServer::start(MockConfig::default()).await;
    let pool = PoolController::attach(server.connect_primary().await).await;

    for n in [0, 1, 3] {
        assert_eq!(pool.start_consumers(n).await.unwrap(), n);
        assert_eq!(pool.consumer_count(), n);

        assert_eq!(pool.stop_consumers(n).await, n);
        assert_eq!(pool.consumer_count(), 0);
        assert_eq!(pool.task_count(), 0);
    }

    assert_eq!(server.links(), 4);
    assert_eq!(server.unlinks(), 4);
    assert!(pool.primary().is_active());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exited_workers_stay_tracked_until_joined() {
    init_logging();
    let server = MockServer::start(MockConfig::finite(&["Loomings"])).await;
    let pool = PoolController::attach(server.connect_primary().await).await;

    assert_eq!(pool.start_consumers(2).await.unwrap(), 2);
    let watched = pool.clone();
    assert!(
        eventually(SETTLE, move || {
            let pool = watched.clone();
            async move { pool.consumer_count() == 0 }
        })
        .await
    );

    assert_eq!(pool.task_count(), 2);
    assert_eq!(pool.join_exited_consumers().await, 2);
    assert_eq!(pool.task_count(), 0);
    assert_eq!(server.unlinks(), 2);
    assert_eq!(pool.ordered_text(), "Loomings");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_start_and_stop_keep_registries_in_step() {
    init_logging();
    let server = MockServer::start(MockConfig::default()).await;
    let pool = PoolController::attach(server.connect_primary().await).await;

    let churners: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move {
                for _ in 0..10 {
                    pool.start_consumers(1).await.unwrap();
                    pool.stop_consumers(1).await;
                }
            })
        })
        .collect();
    for churner in churners {
        churner.await.unwrap();
    }

    assert_eq!(pool.task_count(), pool.consumer_count());

    pool.stop_all_consumers().await;
    assert_eq!(pool.consumer_count(), 0);
    assert_eq!(pool.task_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_all_waits_for_every_worker() {
    init_logging();
    let server = MockServer::start(MockConfig::default()).await;
    let pool = PoolController::attach(server.connect_primary().await).await;

    for round in 0..20 {
        pool.start_consumers(8).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.stop_all_consumers().await;

        assert_eq!(pool.consumer_count(), 0, "round {round}");
        assert_eq!(pool.task_count(), 0, "round {round}");
        // Every linked consumer finished its farewell before the return.
        assert_eq!(server.unlinks(), server.links(), "round {round}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_more_than_running() {
    init_logging();
    let server = MockServer::start(MockConfig::default()).await;
    let pool = PoolController::attach(server.connect_primary().await).await;

    pool.start_consumers(2).await.unwrap();
    assert_eq!(pool.stop_consumers(10).await, 2);
    assert_eq!(pool.stop_consumers(1).await, 0);
}

// ============================================================================
// Failure Modes
// ============================================================================

#[tokio::test]
async fn test_bad_session_id_disables_consumers() {
    init_logging();
    let server = MockServer::start(MockConfig {
        bad_id: true,
        ..MockConfig::default()
    })
    .await;
    let pool = PoolController::attach(server.connect_primary().await).await;

    assert!(pool.session_id().is_none());
    let err = pool.start_consumers(2).await.unwrap_err();
    assert!(matches!(err, Error::SessionUnavailable));
    assert_eq!(server.links(), 0);
}

#[tokio::test]
async fn test_closed_primary_disables_consumers() {
    init_logging();
    let server = MockServer::start(MockConfig::default()).await;
    let pool = PoolController::attach(server.connect_primary().await).await;

    pool.primary().close().await;
    let err = pool.start_consumers(1).await.unwrap_err();
    assert!(matches!(err, Error::SessionUnavailable));
}

#[tokio::test]
async fn test_rejected_link_starts_nothing() {
    init_logging();
    let server = MockServer::start(MockConfig {
        link_reply: Some("NO SUCH CLIENT".to_string()),
        ..MockConfig::default()
    })
    .await;
    let pool = PoolController::attach(server.connect_primary().await).await;

    assert_eq!(pool.start_consumers(2).await.unwrap(), 0);
    assert_eq!(pool.consumer_count(), 0);
    assert_eq!(pool.task_count(), 0);
    assert_eq!(server.links(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_consumers_clean_up_after_themselves() {
    init_logging();
    let server = MockServer::start(MockConfig {
        reset_on_getword: true,
        ..MockConfig::default()
    })
    .await;
    let pool = PoolController::attach(server.connect_primary().await).await;

    assert_eq!(pool.start_consumers(3).await.unwrap(), 3);
    assert!(drained(&pool).await);
    assert_eq!(pool.work_item_count(), 0);
}

// ============================================================================
// Governor
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_governor_follows_gauge() {
    init_logging();
    let server = MockServer::start(MockConfig {
        gauge: 95.0,
        ..MockConfig::default()
    })
    .await;

    let pool = PoolController::builder()
        .max_consumers(4)
        .governor_interval(Duration::from_millis(20))
        .build(server.connect_primary().await)
        .await
        .unwrap();

    assert!(pool.start_self_adjusting_consumers());
    assert_eq!(pool.governor_state(), GovernorState::Running);

    let grew = {
        let pool = pool.clone();
        eventually(SETTLE, move || {
            let pool = pool.clone();
            async move { pool.consumer_count() >= 3 }
        })
        .await
    };
    assert!(grew);
    assert!(pool.consumer_count() <= 4);

    server.set_gauge(10.0);
    let shrank = {
        let pool = pool.clone();
        eventually(SETTLE, move || {
            let pool = pool.clone();
            async move { pool.buffer_level() <= 30.0 && pool.consumer_count() == 1 }
        })
        .await
    };
    assert!(shrank);

    pool.stop_all_consumers().await;
    assert_eq!(pool.consumer_count(), 0);
    assert_eq!(pool.task_count(), 0);
    assert_eq!(pool.governor_state(), GovernorState::StopRequested);
    assert!(pool.work_item_count() > 0);

    // A stopped governor does not come back.
    assert!(!pool.start_self_adjusting_consumers());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_governor_survives_failing_consumers() {
    init_logging();
    let server = MockServer::start(MockConfig {
        reset_on_getword: true,
        ..MockConfig::default()
    })
    .await;

    let pool = PoolController::builder()
        .governor_interval(Duration::from_millis(10))
        .build(server.connect_primary().await)
        .await
        .unwrap();

    assert!(pool.start_self_adjusting_consumers());

    for _ in 0..5 {
        // Every consumer is reset on its first fetch.
        pool.start_consumers(2).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(pool.governor_state(), GovernorState::Running);
    }
    assert!(server.links() >= 11);

    pool.stop_all_consumers().await;
    assert_eq!(pool.governor_state(), GovernorState::StopRequested);
    assert_eq!(pool.consumer_count(), 0);
    assert_eq!(pool.task_count(), 0);
    assert_eq!(pool.work_item_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_all_after_manual_start() {
    init_logging();
    let server = MockServer::start(MockConfig::default()).await;
    let pool = PoolController::attach(server.connect_primary().await).await;

    pool.start_consumers(5).await.unwrap();
    pool.stop_all_consumers().await;

    assert_eq!(pool.consumer_count(), 0);
    assert_eq!(pool.task_count(), 0);
    assert!(pool.is_stop_requested());
    assert_eq!(pool.governor_state(), GovernorState::Idle);

    // Manual scale-out is still allowed and clears the stop.
    assert_eq!(pool.start_consumers(1).await.unwrap(), 1);
    assert!(!pool.is_stop_requested());
    assert_eq!(pool.stop_consumers(1).await, 1);
}
