use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ptop_common::{
    ClusterSnapshot, CommandFailure, ConfigError, Diagnostic, Feed, JobRow, NodeStatus,
    ParseFailure, Problem,
};

use crate::metrics::RefreshMetrics;
use crate::reconcile::{reconcile, Reconciliation};
use crate::records::{
    job_row, JobAllocationRecord, NodeInventoryRecord, JOB_ALLOCATIONS, JOB_LISTING,
    NODE_INVENTORY,
};
use crate::runner::{CommandRunner, InspectionCommands};
use crate::table::parse;

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Hosts to report on, in display order.
    pub hostnames: Vec<String>,
    pub node_interval: Duration,
    pub job_interval: Duration,
}

impl RefreshConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hostnames.is_empty() {
            return Err(ConfigError::NoHostnames);
        }
        let mut seen = HashSet::new();
        for hostname in &self.hostnames {
            if !seen.insert(hostname.as_str()) {
                return Err(ConfigError::DuplicateHostname(hostname.clone()));
            }
        }
        if self.node_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("node"));
        }
        if self.job_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("job"));
        }
        Ok(())
    }
}

/// Why a whole cycle produced no fresh data.
#[derive(Debug, Error)]
enum CycleError {
    #[error(transparent)]
    Command(#[from] CommandFailure),
    #[error(transparent)]
    Parse(#[from] ParseFailure),
}

enum Outcome<T> {
    Live {
        data: T,
        diagnostics: Vec<Diagnostic>,
    },
    Degraded {
        reason: String,
        diagnostics: Vec<Diagnostic>,
    },
}

impl<T: Clone> Outcome<T> {
    fn apply(self, feed: &Feed<T>) -> Feed<T> {
        let now = Utc::now();
        match self {
            Self::Live { data, diagnostics } => feed.next_live(data, diagnostics, now),
            Self::Degraded {
                reason,
                diagnostics,
            } => feed.next_degraded(reason, diagnostics, now),
        }
    }
}

/// Drives the node/GPU loop and the job-listing loop and publishes each
/// finished cycle as a new [`ClusterSnapshot`].
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    config: RefreshConfig,
    commands: InspectionCommands,
    runner: Arc<dyn CommandRunner>,
    metrics: Arc<RefreshMetrics>,
    tx: watch::Sender<Arc<ClusterSnapshot>>,
}

impl RefreshScheduler {
    pub fn new(
        config: RefreshConfig,
        commands: InspectionCommands,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (tx, _rx) = watch::channel(Arc::new(ClusterSnapshot::default()));
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                commands,
                runner,
                metrics: Arc::new(RefreshMetrics::default()),
                tx,
            }),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ClusterSnapshot>> {
        self.inner.tx.subscribe()
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<ClusterSnapshot> {
        self.inner.tx.borrow().clone()
    }

    pub fn metrics(&self) -> Arc<RefreshMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    /// Run one node/GPU cycle in place and publish it.
    pub async fn refresh_nodes_once(&self) {
        self.inner.refresh_nodes_once().await;
    }

    /// Run one job-listing cycle in place and publish it.
    pub async fn refresh_jobs_once(&self) {
        self.inner.refresh_jobs_once().await;
    }

    /// Start both loops as background tasks.
    pub fn spawn(self) -> RefreshHandle {
        let cancel = CancellationToken::new();
        let nodes = tokio::spawn(Arc::clone(&self.inner).node_loop(cancel.clone()));
        let jobs = tokio::spawn(Arc::clone(&self.inner).job_loop(cancel.clone()));
        RefreshHandle {
            scheduler: self,
            cancel,
            nodes,
            jobs,
        }
    }
}

/// Running refresh loops.
pub struct RefreshHandle {
    scheduler: RefreshScheduler,
    cancel: CancellationToken,
    nodes: JoinHandle<()>,
    jobs: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn subscribe(&self) -> watch::Receiver<Arc<ClusterSnapshot>> {
        self.scheduler.subscribe()
    }

    pub fn snapshot(&self) -> Arc<ClusterSnapshot> {
        self.scheduler.snapshot()
    }

    pub fn metrics(&self) -> Arc<RefreshMetrics> {
        self.scheduler.metrics()
    }

    /// Stop both loops once their in-flight cycles have finished.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for (name, task) in [("node", self.nodes), ("job", self.jobs)] {
            if let Err(e) = task.await {
                tracing::error!(error=%e, loop_name = name, "refresh loop panicked");
            }
        }
    }
}

impl Inner {
    async fn node_loop(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            hosts = self.config.hostnames.len(),
            interval_ms = self.config.node_interval.as_millis() as u64,
            "node refresh loop started"
        );
        loop {
            self.refresh_nodes_once().await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.node_interval) => {}
            }
        }
        tracing::info!("node refresh loop stopped");
    }

    async fn job_loop(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            interval_ms = self.config.job_interval.as_millis() as u64,
            "job refresh loop started"
        );
        loop {
            self.refresh_jobs_once().await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.job_interval) => {}
            }
        }
        tracing::info!("job refresh loop stopped");
    }

    async fn refresh_nodes_once(&self) {
        let outcome = match self.collect_nodes().await {
            Ok(result) => self.node_outcome(result),
            Err(err) => {
                self.count_failure(&err);
                tracing::warn!(error=%err, "node refresh cycle degraded");
                Outcome::Degraded {
                    reason: err.to_string(),
                    diagnostics: Vec::new(),
                }
            }
        };

        RefreshMetrics::incr(&self.metrics.node_cycles_total);
        if matches!(outcome, Outcome::Degraded { .. }) {
            RefreshMetrics::incr(&self.metrics.node_cycles_degraded);
        }
        self.tx.send_modify(|snapshot| {
            let feed = outcome.apply(&snapshot.nodes);
            *snapshot = Arc::new(snapshot.with_nodes(feed));
        });
    }

    async fn refresh_jobs_once(&self) {
        let outcome = match self.collect_jobs().await {
            Ok((jobs, diagnostics)) => {
                tracing::debug!(jobs = jobs.len(), "job listing refreshed");
                Outcome::Live {
                    data: jobs,
                    diagnostics,
                }
            }
            Err(err) => {
                self.count_failure(&err);
                tracing::warn!(error=%err, "job refresh cycle degraded");
                Outcome::Degraded {
                    reason: err.to_string(),
                    diagnostics: Vec::new(),
                }
            }
        };

        RefreshMetrics::incr(&self.metrics.job_cycles_total);
        if matches!(outcome, Outcome::Degraded { .. }) {
            RefreshMetrics::incr(&self.metrics.job_cycles_degraded);
        }
        self.tx.send_modify(|snapshot| {
            let feed = outcome.apply(&snapshot.jobs);
            *snapshot = Arc::new(snapshot.with_jobs(feed));
        });
    }

    async fn collect_nodes(&self) -> Result<Reconciliation, CycleError> {
        let (inventory, allocations) = tokio::join!(
            self.runner.run(&self.commands.node_inventory),
            self.runner.run(&self.commands.job_allocations),
        );
        let (inventory, allocations) = (inventory?, allocations?);

        let inventory: Vec<NodeInventoryRecord> = parse(&inventory, &NODE_INVENTORY)?
            .filter_map(|row| NodeInventoryRecord::from_row(&row))
            .collect();
        let allocations: Vec<JobAllocationRecord> = parse(&allocations, &JOB_ALLOCATIONS)?
            .filter_map(|row| JobAllocationRecord::from_row(&row))
            .collect();

        Ok(reconcile(&self.config.hostnames, &inventory, &allocations))
    }

    async fn collect_jobs(&self) -> Result<(Vec<JobRow>, Vec<Diagnostic>), CycleError> {
        let text = self.runner.run(&self.commands.job_listing).await?;
        let mut jobs = Vec::new();
        let mut diagnostics = Vec::new();
        for row in parse(&text, &JOB_LISTING)? {
            match job_row(&row) {
                Some(job) => jobs.push(job),
                None => {
                    tracing::debug!(line = row.line(), "skipping unreadable job row");
                    RefreshMetrics::incr(&self.metrics.extraction_failures_total);
                    diagnostics.push(Diagnostic::unattached(Problem::MalformedJobRow {
                        line: row.line().trim().to_string(),
                    }));
                }
            }
        }
        Ok((jobs, diagnostics))
    }

    fn node_outcome(&self, result: Reconciliation) -> Outcome<Vec<NodeStatus>> {
        for diagnostic in &result.diagnostics {
            match diagnostic.problem {
                Problem::MissingHostRecord => {
                    RefreshMetrics::incr(&self.metrics.missing_hosts_total)
                }
                Problem::MalformedNode { .. } | Problem::MalformedJob { .. } => {
                    RefreshMetrics::incr(&self.metrics.extraction_failures_total)
                }
                Problem::GpuOversubscribed { .. } | Problem::MalformedJobRow { .. } => {}
            }
        }

        if result.all_hosts_failed(self.config.hostnames.len()) {
            tracing::warn!(
                hosts = self.config.hostnames.len(),
                "no requested host reported status"
            );
            return Outcome::Degraded {
                reason: "no requested host reported status".to_string(),
                diagnostics: result.diagnostics,
            };
        }

        tracing::debug!(
            nodes = result.nodes.len(),
            diagnostics = result.diagnostics.len(),
            "node status refreshed"
        );
        Outcome::Live {
            data: result.nodes,
            diagnostics: result.diagnostics,
        }
    }

    fn count_failure(&self, err: &CycleError) {
        match err {
            CycleError::Command(_) => RefreshMetrics::incr(&self.metrics.command_failures_total),
            CycleError::Parse(_) => RefreshMetrics::incr(&self.metrics.parse_failures_total),
        }
    }
}
