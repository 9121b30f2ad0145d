//! ReconciliationWorker against a scripted accrual source and the in-memory store
//!
//! All tests run on a paused clock, so backoff delays are virtual.

use async_trait::async_trait;
use chrono::Utc;
use loyalty_server::accrual::{AccrualDecision, AccrualError, AccrualSource, FetchOutcome};
use loyalty_server::db::{Ledger, MemoryStore, OrderStore, StatusUpdate};
use loyalty_server::reconcile::{CallGate, ReconcileConfig, ReconcileError, ReconciliationWorker};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shared::models::{AccrualStatus, Order, OrderStatus};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Replays a fixed list of outcomes per order; the last one repeats.
#[derive(Default)]
struct ScriptedAccrual {
    scripts: Mutex<HashMap<String, VecDeque<FetchOutcome>>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedAccrual {
    fn script(self, number: &str, outcomes: Vec<FetchOutcome>) -> Self {
        self.scripts
            .lock()
            .insert(number.to_string(), outcomes.into());
        self
    }

    fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AccrualSource for ScriptedAccrual {
    async fn fetch(&self, number: &str) -> Result<FetchOutcome, AccrualError> {
        self.calls.lock().push((number.to_string(), Instant::now()));
        let mut scripts = self.scripts.lock();
        let queue = scripts
            .get_mut(number)
            .unwrap_or_else(|| panic!("no script for order {number}"));
        let outcome = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(outcome.unwrap_or(FetchOutcome::ServerError))
    }
}

/// Accepts the request and never answers
#[derive(Default)]
struct StalledAccrual {
    calls: Mutex<usize>,
}

#[async_trait]
impl AccrualSource for StalledAccrual {
    async fn fetch(&self, _number: &str) -> Result<FetchOutcome, AccrualError> {
        *self.calls.lock() += 1;
        std::future::pending().await
    }
}

fn resolved(number: &str, status: AccrualStatus, accrual: Option<Decimal>) -> FetchOutcome {
    FetchOutcome::Resolved(AccrualDecision {
        order: number.to_string(),
        status,
        accrual,
    })
}

fn rate_limited(secs: u64) -> FetchOutcome {
    FetchOutcome::RateLimited {
        retry_after: Some(Duration::from_secs(secs)),
        message: "No more than 10 requests per minute allowed".to_string(),
    }
}

fn seed(store: &MemoryStore, number: &str, status: OrderStatus, minutes_ago: i64) {
    store
        .seed_order(Order {
            number: number.to_string(),
            owner: "alice".to_string(),
            status,
            accrual: None,
            uploaded_at: Utc::now() - chrono::Duration::minutes(minutes_ago),
        })
        .unwrap();
}

fn config() -> ReconcileConfig {
    ReconcileConfig {
        poll_interval: Duration::from_secs(1),
        pass_retry_delay: Duration::from_secs(10),
        default_retry_after: Duration::from_secs(60),
        max_retry_after: Duration::from_secs(3600),
        min_call_delay: Duration::ZERO,
    }
}

fn worker(
    store: &Arc<MemoryStore>,
    accrual: &Arc<ScriptedAccrual>,
    shutdown: &CancellationToken,
) -> ReconciliationWorker<MemoryStore, ScriptedAccrual> {
    ReconciliationWorker::new(store.clone(), accrual.clone(), config(), shutdown.clone())
}

#[tokio::test(start_paused = true)]
async fn rate_limit_holds_the_whole_queue_and_retries_the_same_order() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, "79927398713", OrderStatus::Processing, 30);
    seed(&store, "12345678903", OrderStatus::New, 10);

    let accrual = Arc::new(
        ScriptedAccrual::default()
            .script(
                "79927398713",
                vec![
                    rate_limited(30),
                    resolved("79927398713", AccrualStatus::Processed, Some(dec!(500))),
                ],
            )
            .script(
                "12345678903",
                vec![resolved("12345678903", AccrualStatus::Invalid, None)],
            ),
    );
    let token = CancellationToken::new();

    let mut gate = CallGate::new(Duration::ZERO);
    let summary = worker(&store, &accrual, &token)
        .run_pass(&mut gate)
        .await
        .unwrap();

    assert_eq!(summary.checked, 2);
    assert_eq!(summary.updated, 2);
    assert_eq!(summary.rate_limited, 1);

    let calls = accrual.calls();
    let numbers: Vec<&str> = calls.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(numbers, ["79927398713", "79927398713", "12345678903"]);

    let first = calls[0].1;
    assert!(calls[1].1 - first >= Duration::from_secs(30));
    assert!(calls[2].1 - first >= Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn rate_limit_without_retry_after_uses_default_delay() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, "79927398713", OrderStatus::New, 1);

    let accrual = Arc::new(ScriptedAccrual::default().script(
        "79927398713",
        vec![
            FetchOutcome::RateLimited {
                retry_after: None,
                message: String::new(),
            },
            resolved("79927398713", AccrualStatus::Processing, None),
        ],
    ));
    let token = CancellationToken::new();

    let mut gate = CallGate::new(Duration::ZERO);
    worker(&store, &accrual, &token)
        .run_pass(&mut gate)
        .await
        .unwrap();

    let calls = accrual.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].1 - calls[0].1 >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn oversized_retry_after_is_capped() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, "79927398713", OrderStatus::New, 1);

    let accrual = Arc::new(ScriptedAccrual::default().script(
        "79927398713",
        vec![
            rate_limited(u64::MAX),
            resolved("79927398713", AccrualStatus::Processed, Some(dec!(5))),
        ],
    ));
    let token = CancellationToken::new();
    let handle = tokio::spawn(worker(&store, &accrual, &token).run());

    tokio::time::sleep(Duration::from_secs(3601)).await;

    let calls = accrual.calls();
    assert_eq!(calls.len(), 2);
    let gap = calls[1].1 - calls[0].1;
    assert!(gap >= Duration::from_secs(3600) && gap < Duration::from_secs(3601));
    assert_eq!(
        store.get_order("79927398713").await.unwrap().status,
        OrderStatus::Processed
    );

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn processed_order_is_persisted_and_leaves_the_queue() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, "79927398713", OrderStatus::Processing, 5);

    // the service echoes a different number; the requested one is updated
    let accrual = Arc::new(ScriptedAccrual::default().script(
        "79927398713",
        vec![resolved("0079927398713", AccrualStatus::Processed, Some(dec!(500)))],
    ));
    let token = CancellationToken::new();

    let mut gate = CallGate::new(Duration::ZERO);
    worker(&store, &accrual, &token)
        .run_pass(&mut gate)
        .await
        .unwrap();

    let order = store.get_order("79927398713").await.unwrap();
    assert_eq!(order.status, OrderStatus::Processed);
    assert_eq!(order.accrual, Some(dec!(500)));
    assert!(store.list_pending().await.unwrap().is_empty());
    assert_eq!(store.balance("alice").await.unwrap().current, dec!(500));

    let summary = worker(&store, &accrual, &token)
        .run_pass(&mut gate)
        .await
        .unwrap();
    assert_eq!(summary.checked, 0);
    assert_eq!(accrual.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn server_error_is_transient_and_unexpected_is_fatal() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, "79927398713", OrderStatus::New, 5);

    let token = CancellationToken::new();
    let mut gate = CallGate::new(Duration::ZERO);

    let accrual = Arc::new(
        ScriptedAccrual::default().script("79927398713", vec![FetchOutcome::ServerError]),
    );
    let err = worker(&store, &accrual, &token)
        .run_pass(&mut gate)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Transient(_)));

    let accrual = Arc::new(ScriptedAccrual::default().script(
        "79927398713",
        vec![FetchOutcome::Unexpected {
            status: 404,
            body: "order is not registered".to_string(),
        }],
    ));
    let err = worker(&store, &accrual, &token)
        .run_pass(&mut gate)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Fatal { status: 404, .. }));

    // nothing was written
    let order = store.get_order("79927398713").await.unwrap();
    assert_eq!(order.status, OrderStatus::New);
}

#[tokio::test(start_paused = true)]
async fn replaying_the_current_state_changes_nothing() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, "79927398713", OrderStatus::Processing, 5);
    let before = store.get_order("79927398713").await.unwrap();

    let accrual = Arc::new(ScriptedAccrual::default().script(
        "79927398713",
        vec![resolved("79927398713", AccrualStatus::Processing, None)],
    ));
    let token = CancellationToken::new();

    let mut gate = CallGate::new(Duration::ZERO);
    let summary = worker(&store, &accrual, &token)
        .run_pass(&mut gate)
        .await
        .unwrap();
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(store.get_order("79927398713").await.unwrap(), before);

    assert_eq!(
        store
            .update_status("79927398713", OrderStatus::Processed, Some(dec!(500)))
            .await
            .unwrap(),
        StatusUpdate::Applied
    );
    assert_eq!(
        store
            .update_status("79927398713", OrderStatus::Processed, Some(dec!(500)))
            .await
            .unwrap(),
        StatusUpdate::Unchanged
    );
}

#[tokio::test(start_paused = true)]
async fn worker_recovers_after_a_failed_pass() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, "79927398713", OrderStatus::New, 5);

    let accrual = Arc::new(ScriptedAccrual::default().script(
        "79927398713",
        vec![
            FetchOutcome::ServerError,
            resolved("79927398713", AccrualStatus::Processed, Some(dec!(10))),
        ],
    ));
    let token = CancellationToken::new();
    let handle = tokio::spawn(worker(&store, &accrual, &token).run());

    tokio::time::sleep(Duration::from_secs(15)).await;

    let order = store.get_order("79927398713").await.unwrap();
    assert_eq!(order.status, OrderStatus::Processed);

    let calls = accrual.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].1 - calls[0].1 >= Duration::from_secs(10));

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_long_backoff() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, "79927398713", OrderStatus::New, 5);

    let accrual =
        Arc::new(ScriptedAccrual::default().script("79927398713", vec![rate_limited(3600)]));
    let token = CancellationToken::new();
    let handle = tokio::spawn(worker(&store, &accrual, &token).run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(accrual.calls().len(), 1);

    let start = Instant::now();
    token.cancel();
    handle.await.unwrap();
    assert!(Instant::now() - start < Duration::from_secs(1));
    assert_eq!(accrual.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_an_outstanding_request() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, "79927398713", OrderStatus::New, 5);

    let accrual = Arc::new(StalledAccrual::default());
    let token = CancellationToken::new();
    let worker = ReconciliationWorker::new(store.clone(), accrual.clone(), config(), token.clone());
    let handle = tokio::spawn(worker.run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(*accrual.calls.lock(), 1);

    let start = Instant::now();
    token.cancel();
    handle.await.unwrap();
    assert!(Instant::now() - start < Duration::from_secs(1));
}
