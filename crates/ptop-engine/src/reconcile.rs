use std::collections::{BTreeMap, HashMap};

use ptop_common::{Diagnostic, ExtractionFailure, NodeStatus, Problem, Usage};

use crate::extract;
use crate::records::{JobAllocationRecord, NodeInventoryRecord};

/// Result of joining one cycle's inventory with its allocations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reconciliation {
    /// Same order as the requested hostnames, minus omitted hosts.
    pub nodes: Vec<NodeStatus>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Reconciliation {
    /// True when hosts were requested and none of them made it into `nodes`.
    pub fn all_hosts_failed(&self, requested: usize) -> bool {
        requested > 0 && self.nodes.is_empty()
    }
}

/// Whether an allocation row describes live resource consumption: a running
/// job carrying the billing marker and a time limit. Job steps (`.batch`,
/// `.extern`) have no time limit and would count the job twice.
pub fn is_live_allocation(record: &JobAllocationRecord) -> bool {
    record.is_running() && extract::is_billing(&record.alloc_tres) && !record.time_limit.is_empty()
}

/// Build one [`NodeStatus`] per requested hostname.
///
/// Node lists are matched against hostnames exactly; bracketed ranges such as
/// `node[01-03]` are not expanded. Hosts without a usable inventory row are
/// omitted and reported in the diagnostics.
pub fn reconcile(
    hostnames: &[String],
    inventory: &[NodeInventoryRecord],
    allocations: &[JobAllocationRecord],
) -> Reconciliation {
    let mut by_host: HashMap<&str, &NodeInventoryRecord> = HashMap::new();
    for record in inventory {
        by_host.entry(record.hostname.as_str()).or_insert(record);
    }

    let mut jobs_by_host: HashMap<&str, Vec<&JobAllocationRecord>> = HashMap::new();
    for record in allocations.iter().filter(|r| is_live_allocation(r)) {
        jobs_by_host
            .entry(record.node_list.as_str())
            .or_default()
            .push(record);
    }

    let mut out = Reconciliation::default();
    for hostname in hostnames {
        let Some(record) = by_host.get(hostname.as_str()) else {
            tracing::warn!(host=%hostname, "no info found for host");
            out.diagnostics
                .push(Diagnostic::new(hostname, Problem::MissingHostRecord));
            continue;
        };

        let jobs = jobs_by_host
            .get(hostname.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default();

        match node_status(record, jobs, &mut out.diagnostics) {
            Ok(status) => {
                if status.is_gpu_oversubscribed() {
                    tracing::warn!(
                        host=%hostname,
                        taken = status.gpu_taken(),
                        total = status.gpu_total(),
                        "jobs hold more GPUs than the node reports"
                    );
                    out.diagnostics.push(Diagnostic::new(
                        hostname,
                        Problem::GpuOversubscribed {
                            taken: status.gpu_taken(),
                            total: status.gpu_total(),
                        },
                    ));
                }
                out.nodes.push(status);
            }
            Err(failure) => {
                tracing::warn!(host=%hostname, error=%failure, "skipping host with malformed inventory");
                out.diagnostics
                    .push(Diagnostic::new(hostname, Problem::MalformedNode { failure }));
            }
        }
    }
    out
}

fn node_status(
    record: &NodeInventoryRecord,
    jobs: &[&JobAllocationRecord],
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<NodeStatus, ExtractionFailure> {
    let cpus = extract::cpu_state(&record.cpus_state)?;
    let load = extract::cpu_load(&record.cpu_load)?;
    let mem_total = extract::megabytes(&record.memory)?;
    let mem_free = extract::megabytes(&record.free_mem)?;
    let gpu_total = extract::gres_gpu_count(&record.gres)?;

    let cpu_load = if cpus.total > 0 {
        load / cpus.total as f64 * 100.0
    } else {
        0.0
    };

    let mut gpu_users: BTreeMap<String, u64> = BTreeMap::new();
    for job in jobs {
        match extract::allocated_gpu_count(&job.alloc_tres) {
            // users holding zero GPUs are still listed
            Ok(gpus) => *gpu_users.entry(job.user.clone()).or_default() += gpus,
            Err(failure) => {
                tracing::debug!(host=%record.hostname, user=%job.user, error=%failure, "skipping job");
                diagnostics.push(Diagnostic::new(
                    &record.hostname,
                    Problem::MalformedJob {
                        user: job.user.clone(),
                        failure,
                    },
                ));
            }
        }
    }

    Ok(NodeStatus::new(
        &record.hostname,
        Usage::new(cpus.allocated, cpus.total),
        cpu_load,
        Usage::new(mem_total.saturating_sub(mem_free), mem_total),
        gpu_total,
        gpu_users,
    ))
}
