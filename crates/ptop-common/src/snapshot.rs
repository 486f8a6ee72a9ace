use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Diagnostic, JobRow, NodeStatus};

/// State of the most recent cycle of one refresh loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeedHealth {
    /// No cycle has finished yet.
    Loading,
    Live,
    /// The last cycle failed; `data` is what the last good cycle produced.
    Degraded { reason: String },
}

/// The output of one refresh loop, replaced wholesale every cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feed<T> {
    pub data: T,
    /// Finished cycles, successful or degraded. Never decreases.
    pub cycles_completed: u64,
    /// Cycles that produced fresh data. Zero until the first successful load,
    /// however many failed cycles came before it.
    pub loads_completed: u64,
    pub health: FeedHealth,
    pub diagnostics: Vec<Diagnostic>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl<T: Default> Default for Feed<T> {
    fn default() -> Self {
        Self {
            data: T::default(),
            cycles_completed: 0,
            loads_completed: 0,
            health: FeedHealth::Loading,
            diagnostics: Vec::new(),
            refreshed_at: None,
        }
    }
}

impl<T> Feed<T> {
    /// No cycle has produced data yet. A feed whose first cycles failed is
    /// still loading, and may also be degraded.
    pub fn is_loading(&self) -> bool {
        self.loads_completed == 0
    }

    pub fn has_loaded(&self) -> bool {
        self.loads_completed > 0
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.health, FeedHealth::Degraded { .. })
    }

    /// The feed after a cycle that produced fresh data.
    pub fn next_live(&self, data: T, diagnostics: Vec<Diagnostic>, at: DateTime<Utc>) -> Self {
        Self {
            data,
            cycles_completed: self.cycles_completed + 1,
            loads_completed: self.loads_completed + 1,
            health: FeedHealth::Live,
            diagnostics,
            refreshed_at: Some(at),
        }
    }

    /// The feed after a cycle that failed; the previous data is kept.
    pub fn next_degraded(
        &self,
        reason: impl Into<String>,
        diagnostics: Vec<Diagnostic>,
        at: DateTime<Utc>,
    ) -> Self
    where
        T: Clone,
    {
        Self {
            data: self.data.clone(),
            cycles_completed: self.cycles_completed + 1,
            loads_completed: self.loads_completed,
            health: FeedHealth::Degraded {
                reason: reason.into(),
            },
            diagnostics,
            refreshed_at: Some(at),
        }
    }
}

/// Everything a presentation layer needs for one redraw.
///
/// Each loop swaps in its own feed; the other feed is shared, not copied.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterSnapshot {
    /// In the order the hostnames were configured.
    pub nodes: Arc<Feed<Vec<NodeStatus>>>,
    pub jobs: Arc<Feed<Vec<JobRow>>>,
}

impl ClusterSnapshot {
    pub fn with_nodes(&self, nodes: Feed<Vec<NodeStatus>>) -> Self {
        Self {
            nodes: Arc::new(nodes),
            jobs: Arc::clone(&self.jobs),
        }
    }

    pub fn with_jobs(&self, jobs: Feed<Vec<JobRow>>) -> Self {
        Self {
            nodes: Arc::clone(&self.nodes),
            jobs: Arc::new(jobs),
        }
    }

    pub fn node(&self, hostname: &str) -> Option<&NodeStatus> {
        self.nodes.data.iter().find(|n| n.hostname() == hostname)
    }
}
