use ptop_common::{ClusterSnapshot, Feed, FeedHealth, MetricKind, NodeStatus};

pub fn print_snapshot(snapshot: &ClusterSnapshot) {
    print!("{}", render_snapshot(snapshot));
}

pub fn render_snapshot(snapshot: &ClusterSnapshot) -> String {
    let mut out = String::new();
    out.push_str("\n=== Cluster Status ===\n");

    out.push_str(&format!("\n[Nodes]{}\n", feed_suffix(&snapshot.nodes)));
    if snapshot.nodes.is_loading() {
        out.push_str("  (loading...)\n");
    } else if snapshot.nodes.data.is_empty() {
        out.push_str("  (No node status)\n");
    } else {
        out.push_str(&format!(
            "  {:<20} {:>12} {:>8} {:>18} {:>8}  {}\n",
            "Host",
            MetricKind::Cpu.label(),
            MetricKind::CpuLoad.label(),
            MetricKind::Memory.label(),
            MetricKind::Gpu.label(),
            "GPU Users"
        ));
        for node in &snapshot.nodes.data {
            out.push_str(&node_line(node));
        }
    }
    push_diagnostics(&mut out, &snapshot.nodes);

    out.push_str(&format!("\n[Jobs]{}\n", feed_suffix(&snapshot.jobs)));
    if snapshot.jobs.is_loading() {
        out.push_str("  (loading...)\n");
    } else if snapshot.jobs.data.is_empty() {
        out.push_str("  (No jobs)\n");
    } else {
        out.push_str(&format!(
            "  {:<10} {:<12} {:<12} {:<10} {:<3} {:>10} {:>5}  {}\n",
            "Job ID", "Partition", "Name", "User", "ST", "Time", "Nodes", "Nodelist"
        ));
        for job in &snapshot.jobs.data {
            out.push_str(&format!(
                "  {:<10} {:<12} {:<12} {:<10} {:<3} {:>10} {:>5}  {}\n",
                job.job_id,
                job.partition,
                job.name,
                job.user,
                job.state,
                job.elapsed,
                job.nodes,
                job.node_list
            ));
        }
    }
    push_diagnostics(&mut out, &snapshot.jobs);
    out
}

fn node_line(node: &NodeStatus) -> String {
    format!(
        "  {:<20} {:>12} {:>7.1}% {:>18} {:>8}  {}\n",
        node.hostname(),
        format!("{}/{}", node.cpu_taken(), node.cpu_total()),
        node.cpu_load(),
        format!("{}/{} MB", node.mem_taken(), node.mem_total()),
        format!("{}/{}", node.gpu_taken(), node.gpu_total()),
        node.gpu_users_summary()
    )
}

fn feed_suffix<T>(feed: &Feed<T>) -> String {
    let stamp = feed
        .refreshed_at
        .map(|at| format!(" @ {}", at.format("%H:%M:%S")))
        .unwrap_or_default();
    match &feed.health {
        FeedHealth::Degraded { reason } => format!("{stamp} (stale: {reason})"),
        FeedHealth::Loading | FeedHealth::Live => stamp,
    }
}

fn push_diagnostics<T>(out: &mut String, feed: &Feed<T>) {
    for diagnostic in &feed.diagnostics {
        out.push_str(&format!("  ! {diagnostic}\n"));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use ptop_common::{Diagnostic, JobRow, Problem, Usage};

    use super::*;

    fn make_node() -> NodeStatus {
        let mut users = BTreeMap::new();
        users.insert("jxm3".to_string(), 3);
        users.insert("alice".to_string(), 1);
        NodeStatus::new(
            "rush-compute-01",
            Usage::new(4, 16),
            22.0,
            Usage::new(41000, 191000),
            8,
            users,
        )
    }

    #[test]
    fn test_loading_and_empty_are_distinct() {
        let loading = ClusterSnapshot::default();
        let text = render_snapshot(&loading);
        assert_eq!(text.matches("(loading...)").count(), 2);

        let loaded = loading.with_jobs(Feed::default().next_live(Vec::new(), Vec::new(), Utc::now()));
        let text = render_snapshot(&loaded);
        assert!(text.contains("(No jobs)"));
        assert_eq!(text.matches("(loading...)").count(), 1);
    }

    #[test]
    fn test_node_table_and_diagnostics() {
        let feed = Feed::default().next_live(
            vec![make_node()],
            vec![Diagnostic::new("nlp-large-01", Problem::MissingHostRecord)],
            Utc::now(),
        );
        let text = render_snapshot(&ClusterSnapshot::default().with_nodes(feed));
        assert!(text.contains("rush-compute-01"));
        assert!(text.contains("4/16"));
        assert!(text.contains("41000/191000 MB"));
        assert!(text.contains("alice (1), jxm3 (3)"));
        assert!(text.contains("! no info found for host nlp-large-01"));
    }

    #[test]
    fn test_failed_first_cycle_renders_as_loading() {
        let failed = Feed::default().next_degraded("`squeue` failed", Vec::new(), Utc::now());
        let text = render_snapshot(&ClusterSnapshot::default().with_jobs(failed));
        assert!(text.contains("(stale: `squeue` failed)"));
        assert!(!text.contains("(No jobs)"));
        assert_eq!(text.matches("(loading...)").count(), 2);
    }

    #[test]
    fn test_degraded_feed_is_marked_stale() {
        let job = JobRow {
            job_id: "1123860".to_string(),
            partition: "gpu".to_string(),
            name: "06112023".to_string(),
            user: "jxm3".to_string(),
            state: "R".to_string(),
            elapsed: "51:53".to_string(),
            nodes: "1".to_string(),
            node_list: "lil-compute-04".to_string(),
        };
        let live = Feed::default().next_live(vec![job], Vec::new(), Utc::now());
        let stale = live.next_degraded("`squeue` exited with exit status: 1", Vec::new(), Utc::now());
        let text = render_snapshot(&ClusterSnapshot::default().with_jobs(stale));
        assert!(text.contains("(stale: `squeue` exited"));
        assert!(text.contains("1123860"));
    }
}
