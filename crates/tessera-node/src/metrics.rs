//! Metrics collection and reporting.
//!
//! Uses Prometheus for metrics collection and exposition. The engine feeds
//! the collector through `EngineObserver`.

use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};
use std::sync::Arc;
use tessera_governance::{EngineObserver, GovernanceError, ProposalState, SettlementReport};
use tessera_types::ProposalId;

/// Metrics collector.
pub struct Metrics {
    /// Prometheus registry
    registry: Registry,
    /// Proposals currently accepting votes
    pub active_proposals: Gauge,
    /// Total proposals created
    pub proposals_created: Counter,
    /// Total ballots cast, including replacements
    pub ballots_cast: Counter,
    /// Ballots that replaced an earlier one
    pub ballots_replaced: Counter,
    /// Settled proposals by final state
    pub proposals_settled: CounterVec,
    /// Stake moved to the reward pool
    pub stake_forfeited: Counter,
    /// Settlements the scheduler gave up on
    pub scheduler_failures: Counter,
}

impl Metrics {
    /// Create new metrics collector.
    pub fn new() -> anyhow::Result<Arc<Self>> {
        let registry = Registry::new();

        let active_proposals = Gauge::new(
            "tessera_active_proposals",
            "Number of proposals accepting votes",
        )?;
        registry.register(Box::new(active_proposals.clone()))?;

        let proposals_created = Counter::new(
            "tessera_proposals_created_total",
            "Total number of proposals created",
        )?;
        registry.register(Box::new(proposals_created.clone()))?;

        let ballots_cast = Counter::new(
            "tessera_ballots_cast_total",
            "Total number of ballots cast",
        )?;
        registry.register(Box::new(ballots_cast.clone()))?;

        let ballots_replaced = Counter::new(
            "tessera_ballots_replaced_total",
            "Total number of ballots that replaced an earlier ballot",
        )?;
        registry.register(Box::new(ballots_replaced.clone()))?;

        let proposals_settled = CounterVec::new(
            Opts::new(
                "tessera_proposals_settled_total",
                "Total number of settled proposals",
            ),
            &["state"],
        )?;
        registry.register(Box::new(proposals_settled.clone()))?;

        let stake_forfeited = Counter::new(
            "tessera_stake_forfeited_total",
            "Stake moved to the reward pool by settlement",
        )?;
        registry.register(Box::new(stake_forfeited.clone()))?;

        let scheduler_failures = Counter::new(
            "tessera_scheduler_failures_total",
            "Settlements that failed after every retry",
        )?;
        registry.register(Box::new(scheduler_failures.clone()))?;

        Ok(Arc::new(Self {
            registry,
            active_proposals,
            proposals_created,
            ballots_cast,
            ballots_replaced,
            proposals_settled,
            stake_forfeited,
            scheduler_failures,
        }))
    }

    /// Export metrics in Prometheus text format.
    pub fn export(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl EngineObserver for Metrics {
    fn proposal_created(&self, _id: ProposalId) {
        self.proposals_created.inc();
    }

    fn proposal_activated(&self, _id: ProposalId) {
        self.active_proposals.inc();
    }

    fn ballot_cast(&self, _id: ProposalId, replaced: bool) {
        self.ballots_cast.inc();
        if replaced {
            self.ballots_replaced.inc();
        }
    }

    fn proposal_finalized(&self, _id: ProposalId, _state: ProposalState) {
        self.active_proposals.dec();
    }

    fn proposal_settled(&self, _id: ProposalId, report: &SettlementReport) {
        self.proposals_settled
            .with_label_values(&[report.state.name()])
            .inc();
        self.stake_forfeited.inc_by(report.forfeited.get() as f64);
    }

    fn settlement_failed(&self, _id: ProposalId, _error: &GovernanceError) {
        self.scheduler_failures.inc();
    }
}

/// Metrics server.
pub struct MetricsServer {
    addr: std::net::SocketAddr,
    metrics: Arc<Metrics>,
}

impl MetricsServer {
    /// Create new metrics server.
    pub fn new(addr: std::net::SocketAddr, metrics: Arc<Metrics>) -> Self {
        Self { addr, metrics }
    }

    /// Serve `/metrics` until `shutdown` resolves.
    pub async fn start(
        &self,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let metrics = self.metrics.clone();

        let app = axum::Router::new()
            .route("/metrics", axum::routing::get(move || {
                let metrics = metrics.clone();
                async move {
                    match metrics.export() {
                        Ok(output) => (axum::http::StatusCode::OK, output),
                        Err(_) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "Error".to_string()),
                    }
                }
            }));

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("Metrics server listening on {}", self.addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::Amount;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.active_proposals.get(), 0.0);
        assert_eq!(metrics.ballots_cast.get(), 0.0);
    }

    #[test]
    fn test_observer_updates() {
        let metrics = Metrics::new().unwrap();
        let id = ProposalId::new(1);

        metrics.proposal_created(id);
        metrics.proposal_activated(id);
        metrics.ballot_cast(id, false);
        metrics.ballot_cast(id, true);
        assert_eq!(metrics.active_proposals.get(), 1.0);
        assert_eq!(metrics.ballots_cast.get(), 2.0);
        assert_eq!(metrics.ballots_replaced.get(), 1.0);

        metrics.proposal_finalized(id, ProposalState::Passed);
        metrics.proposal_settled(
            id,
            &SettlementReport {
                state: ProposalState::Passed,
                ballots_settled: 2,
                refunded: Amount::new(15),
                forfeited: Amount::new(5),
            },
        );
        assert_eq!(metrics.active_proposals.get(), 0.0);
        assert_eq!(
            metrics.proposals_settled.with_label_values(&["passed"]).get(),
            1.0
        );
        assert_eq!(metrics.stake_forfeited.get(), 5.0);
    }

    #[test]
    fn test_metrics_export() {
        let metrics = Metrics::new().unwrap();
        metrics.settlement_failed(ProposalId::new(3), &GovernanceError::Storage("down".into()));

        let output = metrics.export().unwrap();
        assert!(output.contains("tessera_scheduler_failures_total 1"));
        assert!(output.contains("tessera_active_proposals"));
    }
}
