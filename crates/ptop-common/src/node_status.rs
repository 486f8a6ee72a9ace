use std::collections::BTreeMap;

use serde::Serialize;

/// A taken/total pair for one countable resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub taken: u64,
    pub total: u64,
}

impl Usage {
    pub fn new(taken: u64, total: u64) -> Self {
        Self { taken, total }
    }
}

/// Aggregated status of one node for one refresh cycle.
///
/// Built only through [`NodeStatus::new`], which derives `gpu_taken` from
/// `gpu_users`, so the two always agree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStatus {
    hostname: String,
    cpu: Usage,
    /// Load average as a percentage of the node's CPUs.
    cpu_load: f64,
    /// Megabytes, as reported by the workload manager.
    mem: Usage,
    gpu: Usage,
    gpu_users: BTreeMap<String, u64>,
}

impl NodeStatus {
    pub fn new(
        hostname: impl Into<String>,
        cpu: Usage,
        cpu_load: f64,
        mem: Usage,
        gpu_total: u64,
        gpu_users: BTreeMap<String, u64>,
    ) -> Self {
        let gpu_taken = gpu_users.values().sum();
        Self {
            hostname: hostname.into(),
            cpu,
            cpu_load,
            mem,
            gpu: Usage::new(gpu_taken, gpu_total),
            gpu_users,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn cpu_taken(&self) -> u64 {
        self.cpu.taken
    }

    pub fn cpu_total(&self) -> u64 {
        self.cpu.total
    }

    pub fn cpu_load(&self) -> f64 {
        self.cpu_load
    }

    pub fn mem_taken(&self) -> u64 {
        self.mem.taken
    }

    pub fn mem_total(&self) -> u64 {
        self.mem.total
    }

    pub fn gpu_taken(&self) -> u64 {
        self.gpu.taken
    }

    pub fn gpu_total(&self) -> u64 {
        self.gpu.total
    }

    pub fn gpu_users(&self) -> &BTreeMap<String, u64> {
        &self.gpu_users
    }

    /// True when running jobs claim more GPUs than the node reports.
    pub fn is_gpu_oversubscribed(&self) -> bool {
        self.gpu.taken > self.gpu.total
    }

    /// `"alice (1), bob (2)"`, ascending by GPU count, then by user.
    pub fn gpu_users_summary(&self) -> String {
        let mut users: Vec<(&String, &u64)> = self.gpu_users.iter().collect();
        users.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
        users
            .into_iter()
            .map(|(user, gpus)| format!("{user} ({gpus})"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// One entry per display variant, in display order.
    pub fn metrics(&self) -> [NodeMetric; 4] {
        [
            NodeMetric {
                kind: MetricKind::Cpu,
                used: self.cpu.taken as f64,
                capacity: self.cpu.total as f64,
            },
            NodeMetric {
                kind: MetricKind::CpuLoad,
                used: self.cpu_load,
                capacity: 100.0,
            },
            NodeMetric {
                kind: MetricKind::Memory,
                used: self.mem.taken as f64,
                capacity: self.mem.total as f64,
            },
            NodeMetric {
                kind: MetricKind::Gpu,
                used: self.gpu.taken as f64,
                capacity: self.gpu.total as f64,
            },
        ]
    }
}

/// Per-node display variants consumed by a presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Cpu,
    CpuLoad,
    Gpu,
    Memory,
}

impl MetricKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::CpuLoad => "LOAD",
            Self::Gpu => "GPU",
            Self::Memory => "MEM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeMetric {
    pub kind: MetricKind,
    pub used: f64,
    pub capacity: f64,
}

impl NodeMetric {
    /// `used / capacity`, or 0.0 for a zero-capacity resource. May exceed 1.0.
    pub fn fraction(&self) -> f64 {
        if self.capacity > 0.0 {
            self.used / self.capacity
        } else {
            0.0
        }
    }
}
