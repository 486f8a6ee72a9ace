use serde::Serialize;

/// One row of the job listing (`squeue`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRow {
    pub job_id: String,
    pub partition: String,
    pub name: String,
    pub user: String,
    /// Compact state code, e.g. `R` or `PD`.
    pub state: String,
    /// Elapsed run time as printed by the workload manager (`2:53:41`).
    pub elapsed: String,
    pub nodes: String,
    /// Node list for running jobs, `(Reason)` for pending ones.
    pub node_list: String,
}

impl JobRow {
    pub fn is_running(&self) -> bool {
        self.state == "R"
    }

    pub fn is_pending(&self) -> bool {
        self.state == "PD"
    }
}
