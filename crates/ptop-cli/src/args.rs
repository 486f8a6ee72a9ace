use std::time::Duration;

use clap::{Parser, Subcommand};

use ptop_engine::{InspectionCommands, RefreshConfig};

#[derive(Debug, Parser)]
#[command(name = "ptop")]
#[command(about = "Live Slurm node, GPU and job status", long_about = None)]
pub struct Args {
    /// Hostnames to report on, in display order
    #[arg(long, env = "PTOP_HOSTS", value_delimiter = ',', required = true)]
    pub hosts: Vec<String>,

    /// Node/GPU refresh interval
    #[arg(long, env = "PTOP_NODE_INTERVAL_MS", default_value_t = 1000)]
    pub node_interval_ms: u64,

    /// Job listing refresh interval
    #[arg(long, env = "PTOP_JOB_INTERVAL_MS", default_value_t = 5000)]
    pub job_interval_ms: u64,

    #[arg(long, env = "PTOP_SINFO_BIN", default_value = "sinfo")]
    pub sinfo_bin: String,

    #[arg(long, env = "PTOP_SACCT_BIN", default_value = "sacct")]
    pub sacct_bin: String,

    #[arg(long, env = "PTOP_SQUEUE_BIN", default_value = "squeue")]
    pub squeue_bin: String,

    /// Kill an inspection command that runs longer than this
    #[arg(long, env = "PTOP_COMMAND_TIMEOUT_MS", default_value_t = 10_000)]
    pub command_timeout_ms: u64,

    /// Serve /metrics and /healthz on this address (e.g. 127.0.0.1:9464)
    #[arg(long, env = "PTOP_METRICS_ADDR")]
    pub metrics_addr: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "PTOP_LOG", default_value = "info")]
    pub log_filter: String,

    /// OTLP/HTTP endpoint for span export
    #[arg(long, env = "OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Bearer token for the OTLP endpoint
    #[arg(long, env = "OTLP_TOKEN")]
    pub otlp_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Refresh continuously and print every new snapshot
    Watch,
    /// Run one refresh of each loop and print the result
    Status {
        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },
}

impl Args {
    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            hostnames: self.hosts.clone(),
            node_interval: Duration::from_millis(self.node_interval_ms),
            job_interval: Duration::from_millis(self.job_interval_ms),
        }
    }

    pub fn commands(&self) -> InspectionCommands {
        InspectionCommands::new(&self.sinfo_bin, &self.sacct_bin, &self.squeue_bin)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hosts_are_comma_separated() {
        let args = Args::try_parse_from([
            "ptop",
            "--hosts",
            "rush-compute-01,rush-compute-02",
            "--node-interval-ms",
            "250",
            "status",
            "--json",
        ])
        .unwrap();

        let config = args.refresh_config();
        assert_eq!(config.hostnames, vec!["rush-compute-01", "rush-compute-02"]);
        assert_eq!(config.node_interval, Duration::from_millis(250));
        assert_eq!(config.job_interval, Duration::from_millis(5000));
        assert!(matches!(args.command, Command::Status { json: true }));
        assert_eq!(args.commands(), InspectionCommands::default());
    }
}
