//! Run dispatcher tests: worker bound and shutdown

mod helpers;

use helpers::*;
use siteiq_scoring::models::{RunStatus, ScoringRun};
use siteiq_scoring::pipeline::RunDispatcher;
use siteiq_scoring::store::{RunStore, SqliteStore};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Poll `condition` until it holds, failing after five seconds
async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async move {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn reload(store: &SqliteStore, run: &ScoringRun) -> ScoringRun {
    store.get_run(TENANT, run.id).await.unwrap().unwrap()
}

/// Dispatcher over a store whose record fetches block on `gate`
async fn gated_dispatcher(
    store: &SqliteStore,
    gate: Arc<Semaphore>,
    worker_count: usize,
) -> (Arc<FlakyStore>, Arc<RunDispatcher>) {
    let flaky = Arc::new(FlakyStore::new(store.clone()).gate_fetch(gate));
    let pipeline = Arc::new(pipeline_over(flaky.clone(), fast_config(0)));
    let dispatcher = Arc::new(RunDispatcher::new(pipeline, worker_count, CancellationToken::new()));
    (flaky, dispatcher)
}

#[tokio::test]
async fn test_single_worker_runs_one_attempt_and_shutdown_keeps_waiting_run_queued() {
    let (_dir, pool) = create_test_db().await;
    install_global(&pool).await;
    let upload = seed_upload(&pool, TENANT, three_sites()).await;
    let store = SqliteStore::new(pool);

    // Given: one worker, and the first attempt held inside the store
    let gate = Arc::new(Semaphore::new(0));
    let (flaky, dispatcher) = gated_dispatcher(&store, gate.clone(), 1).await;

    let first = queued_run(&store, &upload).await;
    let second = queued_run(&store, &upload).await;
    dispatcher.submit(first.clone());
    dispatcher.submit(second.clone());

    wait_until(|| flaky.active_fetches.load(Ordering::SeqCst) == 1).await;
    // Room for a second attempt to start if the bound leaked
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Then: one run is running, the other has not started
    assert_eq!(flaky.max_active_fetches.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.in_flight(), 2);

    let (a, b) = (reload(&store, &first).await, reload(&store, &second).await);
    let (running, waiting) = if a.status == RunStatus::Running { (a, b) } else { (b, a) };
    assert_eq!(running.status, RunStatus::Running);
    assert_eq!(running.attempt, 1);
    assert_eq!(waiting.status, RunStatus::Queued);
    assert_eq!(waiting.attempt, 0);

    // When: shutdown begins while the second run still waits for a permit
    let stopping = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.shutdown().await })
    };
    wait_until(|| dispatcher.in_flight() == 1).await;
    gate.add_permits(1);

    tokio::time::timeout(Duration::from_secs(5), stopping)
        .await
        .expect("shutdown did not finish")
        .unwrap();

    // Then: the running attempt finished, the waiting run was never started
    let running = reload(&store, &running).await;
    assert_eq!(running.status, RunStatus::Succeeded);

    let waiting = reload(&store, &waiting).await;
    assert_eq!(waiting.status, RunStatus::Queued);
    assert_eq!(waiting.attempt, 0);
    assert!(waiting.started_at.is_none());
    assert_eq!(dispatcher.in_flight(), 0);
}

#[tokio::test]
async fn test_worker_count_allows_parallel_attempts() {
    let (_dir, pool) = create_test_db().await;
    install_global(&pool).await;
    let upload = seed_upload(&pool, TENANT, three_sites()).await;
    let store = SqliteStore::new(pool);

    let gate = Arc::new(Semaphore::new(0));
    let (flaky, dispatcher) = gated_dispatcher(&store, gate.clone(), 2).await;

    let runs = vec![
        queued_run(&store, &upload).await,
        queued_run(&store, &upload).await,
        queued_run(&store, &upload).await,
    ];
    for run in &runs {
        dispatcher.submit(run.clone());
    }

    // Two workers: two attempts inside the store at once, never three
    wait_until(|| flaky.active_fetches.load(Ordering::SeqCst) == 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(flaky.max_active_fetches.load(Ordering::SeqCst), 2);

    gate.add_permits(3);
    dispatcher.wait_idle().await;

    for run in &runs {
        assert_eq!(reload(&store, run).await.status, RunStatus::Succeeded);
    }
    assert_eq!(flaky.max_active_fetches.load(Ordering::SeqCst), 2);
}
