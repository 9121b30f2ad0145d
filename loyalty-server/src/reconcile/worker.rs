//! ReconciliationWorker: drains the pending-order queue against the accrual
//! service, one request at a time.
//!
//! Each pass lists pending orders (oldest first) and queries them in order.
//! A 429 closes the [`CallGate`] for `Retry-After` and the same order is asked
//! again once it reopens, so the whole queue is throttled. A failed pass is
//! logged and retried after `pass_retry_delay`; the worker only stops when the
//! shutdown token is cancelled.

use shared::models::{Order, OrderStatus};
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use super::gate::CallGate;
use crate::accrual::{AccrualDecision, AccrualSource, FetchOutcome};
use crate::db::{OrderStore, StatusUpdate};
use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Pause between successful passes
    pub poll_interval: Duration,
    /// Pause after a pass that failed
    pub pass_retry_delay: Duration,
    /// Backoff for a 429 without a usable `Retry-After`
    pub default_retry_after: Duration,
    /// Upper bound on any `Retry-After` the service asks for
    pub max_retry_after: Duration,
    /// Spacing between two consecutive accrual calls
    pub min_call_delay: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            pass_retry_delay: Duration::from_secs(10),
            default_retry_after: Duration::from_secs(60),
            max_retry_after: Duration::from_secs(3600),
            min_call_delay: Duration::ZERO,
        }
    }
}

/// Counters for one pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    /// Orders taken from the pending queue
    pub checked: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// 429 responses absorbed by backoff
    pub rate_limited: usize,
    /// Orders whose update could not be stored
    pub failed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Server error or network failure; the pass is retried later
    #[error("accrual service unavailable: {0}")]
    Transient(String),

    /// Response outside the accrual protocol
    #[error("unexpected accrual response (HTTP {status}): {body}")]
    Fatal { status: u16, body: String },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("reconciliation cancelled")]
    Cancelled,
}

pub struct ReconciliationWorker<S: ?Sized, A: ?Sized> {
    store: Arc<S>,
    accrual: Arc<A>,
    config: ReconcileConfig,
    shutdown: CancellationToken,
}

impl<S, A> ReconciliationWorker<S, A>
where
    S: OrderStore + ?Sized,
    A: AccrualSource + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        accrual: Arc<A>,
        config: ReconcileConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            accrual,
            config,
            shutdown,
        }
    }

    /// Run passes until the shutdown token is cancelled.
    pub async fn run(self) {
        tracing::info!("ReconciliationWorker started");
        let mut gate = CallGate::new(self.config.min_call_delay);

        loop {
            let pause = match self.run_pass(&mut gate).await {
                Ok(summary) => {
                    if summary.updated > 0 || summary.rate_limited > 0 || summary.failed > 0 {
                        tracing::info!(
                            checked = summary.checked,
                            updated = summary.updated,
                            unchanged = summary.unchanged,
                            rate_limited = summary.rate_limited,
                            failed = summary.failed,
                            "Reconciliation pass complete"
                        );
                    } else {
                        tracing::debug!(checked = summary.checked, "Reconciliation pass complete");
                    }
                    self.config.poll_interval
                }
                Err(ReconcileError::Cancelled) => break,
                Err(e @ ReconcileError::Transient(_)) => {
                    tracing::warn!(
                        error = %e,
                        retry_in_secs = self.config.pass_retry_delay.as_secs(),
                        "Reconciliation pass interrupted"
                    );
                    self.config.pass_retry_delay
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        retry_in_secs = self.config.pass_retry_delay.as_secs(),
                        "Reconciliation pass failed"
                    );
                    self.config.pass_retry_delay
                }
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        tracing::info!("ReconciliationWorker stopped");
    }

    /// One traversal of the pending queue.
    pub async fn run_pass(&self, gate: &mut CallGate) -> Result<PassSummary, ReconcileError> {
        let pending = tokio::select! {
            _ = self.shutdown.cancelled() => return Err(ReconcileError::Cancelled),
            result = self.store.list_pending() => result?,
        };

        let mut summary = PassSummary::default();
        for order in &pending {
            summary.checked += 1;

            loop {
                if !gate.wait(&self.shutdown).await {
                    return Err(ReconcileError::Cancelled);
                }

                let outcome = tokio::select! {
                    _ = self.shutdown.cancelled() => return Err(ReconcileError::Cancelled),
                    result = self.accrual.fetch(&order.number) => {
                        result.map_err(|e| ReconcileError::Transient(e.to_string()))?
                    }
                };

                match outcome {
                    FetchOutcome::Resolved(decision) => {
                        gate.reset();
                        self.apply(order, decision, &mut summary).await;
                        break;
                    }
                    FetchOutcome::RateLimited {
                        retry_after,
                        message,
                    } => {
                        let delay = retry_after
                            .unwrap_or(self.config.default_retry_after)
                            .min(self.config.max_retry_after);
                        gate.defer(delay);
                        summary.rate_limited += 1;
                        tracing::info!(
                            order = %order.number,
                            retry_after_secs = delay.as_secs(),
                            header_present = retry_after.is_some(),
                            message = %message.trim(),
                            "Accrual service rate limit, backing off"
                        );
                    }
                    FetchOutcome::ServerError => {
                        return Err(ReconcileError::Transient(
                            "accrual service returned 500".to_string(),
                        ));
                    }
                    FetchOutcome::Unexpected { status, body } => {
                        return Err(ReconcileError::Fatal { status, body });
                    }
                }
            }
        }

        Ok(summary)
    }

    async fn apply(&self, order: &Order, decision: AccrualDecision, summary: &mut PassSummary) {
        if decision.order != order.number {
            tracing::warn!(
                order = %order.number,
                reported = %decision.order,
                "Accrual service answered for a different order number"
            );
        }

        let status = OrderStatus::from(decision.status);
        match self
            .store
            .update_status(&order.number, status, decision.accrual)
            .await
        {
            Ok(StatusUpdate::Applied) => {
                summary.updated += 1;
                tracing::debug!(
                    order = %order.number,
                    from = %order.status,
                    to = %status,
                    accrual = ?decision.accrual,
                    "Order status updated"
                );
            }
            Ok(StatusUpdate::Unchanged) => summary.unchanged += 1,
            Err(e @ (StoreError::TerminalState { .. } | StoreError::NotFound(_))) => {
                summary.failed += 1;
                tracing::warn!(order = %order.number, error = %e, "Order no longer pending");
            }
            Err(e) => {
                summary.failed += 1;
                tracing::error!(
                    order = %order.number,
                    status = %status,
                    error = %e,
                    "Failed to store accrual decision"
                );
            }
        }
    }
}
