//! Table schemas for the three inspection commands and the records read
//! from them. Records keep fields as text; numbers are extracted later so
//! that a bad value is reported against its host.

use ptop_common::JobRow;

use crate::table::{Column, FixedColumn, Layout, Row, TableSchema};

/// `sinfo -N -O ...`: one row per (node, partition).
pub const NODE_INVENTORY: TableSchema = TableSchema {
    name: "node inventory",
    layout: Layout::Whitespace(&[
        Column::new("NODELIST"),
        Column::new("PARTITION"),
        Column::new("CPUS(A/I/O/T)"),
        Column::with_aliases("CPU_LOAD", &["CPUS_LOAD"]),
        Column::new("MEMORY"),
        Column::new("FREE_MEM"),
        Column::new("STATE"),
        Column::new("THREADS"),
        Column::new("GRES"),
    ]),
};

/// `sacct --format=User%10,partition%20,NodeList%25,State%10,AllocTRES%50,Time`.
/// Each `%N` column is N characters wide plus one separating space.
pub const JOB_ALLOCATIONS: TableSchema = TableSchema {
    name: "job allocations",
    layout: Layout::Fixed(&[
        FixedColumn {
            name: "User",
            start: 0,
            end: Some(10),
        },
        FixedColumn {
            name: "Partition",
            start: 11,
            end: Some(31),
        },
        FixedColumn {
            name: "NodeList",
            start: 32,
            end: Some(57),
        },
        FixedColumn {
            name: "State",
            start: 58,
            end: Some(68),
        },
        FixedColumn {
            name: "AllocTRES",
            start: 69,
            end: Some(119),
        },
        FixedColumn {
            name: "Timelimit",
            start: 120,
            end: None,
        },
    ]),
};

/// Default `squeue` output.
pub const JOB_LISTING: TableSchema = TableSchema {
    name: "job listing",
    layout: Layout::Whitespace(&[
        Column::new("JOBID"),
        Column::new("PARTITION"),
        Column::new("NAME"),
        Column::new("USER"),
        Column::new("ST"),
        Column::new("TIME"),
        Column::new("NODES"),
        Column::new("NODELIST(REASON)"),
    ]),
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInventoryRecord {
    pub hostname: String,
    pub partition: String,
    pub cpus_state: String,
    pub cpu_load: String,
    pub memory: String,
    pub free_mem: String,
    pub state: String,
    pub threads: String,
    pub gres: String,
}

impl NodeInventoryRecord {
    /// `None` for a row without a hostname.
    pub fn from_row(row: &Row<'_>) -> Option<Self> {
        let hostname = row.get("NODELIST").filter(|h| !h.is_empty())?;
        Some(Self {
            hostname: hostname.to_string(),
            partition: row.text("PARTITION").to_string(),
            cpus_state: row.text("CPUS(A/I/O/T)").to_string(),
            cpu_load: row.text("CPU_LOAD").to_string(),
            memory: row.text("MEMORY").to_string(),
            free_mem: row.text("FREE_MEM").to_string(),
            state: row.text("STATE").to_string(),
            threads: row.text("THREADS").to_string(),
            gres: row.text("GRES").to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobAllocationRecord {
    pub user: String,
    pub partition: String,
    pub node_list: String,
    pub state: String,
    pub alloc_tres: String,
    pub time_limit: String,
}

impl JobAllocationRecord {
    /// `None` for rows that name no node (jobs that never started).
    pub fn from_row(row: &Row<'_>) -> Option<Self> {
        let node_list = row.get("NodeList").filter(|n| !n.is_empty())?;
        Some(Self {
            user: row.text("User").to_string(),
            partition: row.text("Partition").to_string(),
            node_list: node_list.to_string(),
            state: row.text("State").to_string(),
            alloc_tres: row.text("AllocTRES").to_string(),
            time_limit: row.text("Timelimit").to_string(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.state == "RUNNING"
    }
}

/// `None` when the row is too short to hold every column but the last.
pub fn job_row(row: &Row<'_>) -> Option<JobRow> {
    Some(JobRow {
        job_id: row.get("JOBID")?.to_string(),
        partition: row.get("PARTITION")?.to_string(),
        name: row.get("NAME")?.to_string(),
        user: row.get("USER")?.to_string(),
        state: row.get("ST")?.to_string(),
        elapsed: row.get("TIME")?.to_string(),
        nodes: row.get("NODES")?.to_string(),
        node_list: row.text("NODELIST(REASON)").to_string(),
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Captured command output shared by the engine tests.

    pub const SINFO: &str = "\
NODELIST                      PARTITION                     CPUS(A/I/O/T)                 CPU_LOAD                      MEMORY                        FREE_MEM                      STATE                         THREADS                       GRES
rush-compute-01               rush                          4/12/0/16                     3.52                          191000                        150000                        mix                           2                             gpu:titanrtx:8(S:0-1)
rush-compute-01               gpu                           4/12/0/16                     3.52                          191000                        150000                        mix                           2                             gpu:titanrtx:8(S:0-1)
rush-compute-02               rush                          0/32/0/32                     0.01                          380000                        370000                        idle                          2                             gpu:a100:4(S:0-1)
rush-compute-03               rush                          16                            0.00                          191000                        191000                        down*                         2                             (null)
lil-compute-04                gpu                           8/8/0/16                      N/A                           64000                         N/A                           drain                         1                             gpu:1080ti:2(S:0)

";

    pub const SACCT: &str = "\
      User            Partition                  NodeList      State                                          AllocTRES  Timelimit
---------- -------------------- ------------------------- ---------- -------------------------------------------------- ----------
      jxm3                 rush           rush-compute-01    RUNNING billing=4,cpu=4,gres/gpu:titanrtx=1,gres/gpu=1,me+ 2-00:00:00
                                          rush-compute-01    RUNNING       cpu=4,gres/gpu:titanrtx=1,gres/gpu=1,mem=10G
                                          rush-compute-01    RUNNING billing=4,cpu=4,gres/gpu:titanrtx=1,gres/gpu=1,me+
     alice                 rush           rush-compute-01    RUNNING billing=8,cpu=8,gres/gpu:titanrtx=2,gres/gpu=2,me+ 1-00:00:00
      jxm3                 rush           rush-compute-01    RUNNING billing=2,cpu=2,gres/gpu:titanrtx=2,gres/gpu=2,me+ 2-00:00:00
       bob                 rush           rush-compute-01    PENDING billing=4,cpu=4,gres/gpu:titanrtx=4,gres/gpu=4,me+ 2-00:00:00
       bob                 rush           rush-compute-02  COMPLETED billing=4,cpu=4,gres/gpu:a100=1,gres/gpu=1,mem=10G 2-00:00:00
     carol                 rush       rush-compute[02-03]    RUNNING billing=4,cpu=4,gres/gpu:a100=2,gres/gpu=2,mem=10G 2-00:00:00
      dave                 rush             None assigned    PENDING                             billing=1,cpu=1,mem=1G   01:00:00
";

    pub const SQUEUE: &str = "\
             JOBID PARTITION     NAME     USER ST       TIME  NODES NODELIST(REASON)
           1123860       gpu 06112023     jxm3  R      51:53      1 lil-compute-04
           1123862       gpu 06112023     jxm3  R    2:53:41      1 badfellow
           1123857      rush 06112023     jxm3 PD       0:00      1 (Priority)
           1124203 rush-inte      zsh     jxm3  R      28:46      1 rush-compute-01
";
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::table::parse;

    #[test]
    fn test_node_inventory_rows() {
        let records: Vec<NodeInventoryRecord> = parse(SINFO, &NODE_INVENTORY)
            .unwrap()
            .filter_map(|r| NodeInventoryRecord::from_row(&r))
            .collect();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].hostname, "rush-compute-01");
        assert_eq!(records[0].cpus_state, "4/12/0/16");
        assert_eq!(records[0].gres, "gpu:titanrtx:8(S:0-1)");
        assert_eq!(records[3].cpus_state, "16");
        assert_eq!(records[3].state, "down*");
        assert_eq!(records[4].free_mem, "N/A");
    }

    #[test]
    fn test_node_inventory_accepts_cpus_load_header() {
        let text = "NODELIST PARTITION CPUS(A/I/O/T) CPUS_LOAD MEMORY FREE_MEM STATE THREADS GRES\n\
                    n1 p 1/1/0/2 0.50 1000 500 mix 1 (null)\n";
        let rows: Vec<_> = parse(text, &NODE_INVENTORY).unwrap().collect();
        let record = NodeInventoryRecord::from_row(&rows[0]).unwrap();
        assert_eq!(record.cpu_load, "0.50");
        assert_eq!(record.gres, "(null)");
    }

    #[test]
    fn test_job_allocation_columns() {
        let records: Vec<JobAllocationRecord> = parse(SACCT, &JOB_ALLOCATIONS)
            .unwrap()
            .filter_map(|r| JobAllocationRecord::from_row(&r))
            .collect();
        assert_eq!(records.len(), 9);

        let first = &records[0];
        assert_eq!(first.user, "jxm3");
        assert_eq!(first.partition, "rush");
        assert_eq!(first.node_list, "rush-compute-01");
        assert_eq!(first.state, "RUNNING");
        assert_eq!(
            first.alloc_tres,
            "billing=4,cpu=4,gres/gpu:titanrtx=1,gres/gpu=1,me+"
        );
        assert_eq!(first.time_limit, "2-00:00:00");
        assert!(first.is_running());

        let step = &records[1];
        assert_eq!(step.user, "");
        assert_eq!(step.alloc_tres, "cpu=4,gres/gpu:titanrtx=1,gres/gpu=1,mem=10G");
        assert_eq!(step.time_limit, "");

        assert_eq!(records[7].node_list, "rush-compute[02-03]");
        assert_eq!(records[8].node_list, "None assigned");
    }

    #[test]
    fn test_job_listing_rows() {
        let rows: Vec<JobRow> = parse(SQUEUE, &JOB_LISTING)
            .unwrap()
            .filter_map(|r| job_row(&r))
            .collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].elapsed, "2:53:41");
        assert_eq!(rows[2].node_list, "(Priority)");
        assert!(rows[2].is_pending());
        assert_eq!(rows[3].partition, "rush-inte");
        assert!(rows[3].is_running());
    }

    #[test]
    fn test_short_job_listing_row_is_rejected() {
        let text = "JOBID PARTITION NAME USER ST TIME NODES NODELIST(REASON)\n42 gpu train\n";
        let mut rows = parse(text, &JOB_LISTING).unwrap();
        assert!(job_row(&rows.next().unwrap()).is_none());
    }
}
