//! Deadline scheduler.
//!
//! Periodically settles every proposal whose deadline has passed. Storage
//! failures are retried with exponential backoff; a proposal that still fails
//! is reported and picked up again on the next tick. Settlement is idempotent,
//! so a duplicate tick is harmless.

use crate::config::SchedulerConfig;
use crate::engine::VotingEngine;
use crate::error::GovernanceError;
use crate::proposal::SettlementReport;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tessera_types::ProposalId;
use tracing::{debug, error, info, warn};

/// Result of one scheduler pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub settled: Vec<ProposalId>,
    pub failed: Vec<ProposalId>,
}

/// Background task settling proposals at their deadline.
pub struct DeadlineScheduler {
    engine: Arc<VotingEngine>,
    config: SchedulerConfig,
}

impl DeadlineScheduler {
    pub fn new(engine: Arc<VotingEngine>, config: SchedulerConfig) -> Self {
        Self { engine, config }
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            tick_ms = self.config.tick_interval_ms,
            max_attempts = self.config.max_attempts,
            "deadline scheduler started"
        );
        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.tick().await;
                    if !report.settled.is_empty() || !report.failed.is_empty() {
                        debug!(settled = report.settled.len(), failed = report.failed.len(), "scheduler tick");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("deadline scheduler stopped");
    }

    /// Settle everything that is due now.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        for id in self.engine.due_proposals() {
            match self.settle_with_retry(id).await {
                Ok(_) => report.settled.push(id),
                Err(e) => {
                    error!(proposal = %id, error = %e, "settlement gave up; will retry next tick");
                    self.engine.report_settlement_failure(id, &e);
                    report.failed.push(id);
                }
            }
        }
        report
    }

    async fn settle_with_retry(&self, id: ProposalId) -> Result<SettlementReport, GovernanceError> {
        let mut attempt = 1;
        loop {
            match self.engine.settle_proposal(id) {
                Ok(report) => return Ok(report),
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    let delay = self.config.backoff(attempt);
                    warn!(proposal = %id, attempt, ?delay, error = %e, "settlement failed, retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
