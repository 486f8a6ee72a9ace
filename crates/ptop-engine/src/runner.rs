use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use ptop_common::CommandFailure;

/// `sinfo` output format. The node inventory schema depends on it.
pub const NODE_INVENTORY_FORMAT: &str = "NodeList:30,Partition:30,CPUsState:30,CPUsLoad:30,Memory:30,FreeMem:30,StateCompact:30,Threads:30,Gres:30";

/// `sacct` output format. The job allocation column offsets depend on it.
pub const JOB_ALLOCATION_FORMAT: &str =
    "--format=User%10,partition%20,NodeList%25,State%10,AllocTRES%50,Time";

/// A program plus its arguments. Run directly, never through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// The three inspection commands the engine runs each cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionCommands {
    pub node_inventory: CommandSpec,
    pub job_allocations: CommandSpec,
    pub job_listing: CommandSpec,
}

impl InspectionCommands {
    /// Only the program paths are configurable; the output formats are fixed.
    pub fn new(sinfo: &str, sacct: &str, squeue: &str) -> Self {
        Self {
            node_inventory: CommandSpec::new(sinfo, ["-N", "-O", NODE_INVENTORY_FORMAT]),
            job_allocations: CommandSpec::new(
                sacct,
                [JOB_ALLOCATION_FORMAT, "-a", "--units=G"],
            ),
            job_listing: CommandSpec::new(squeue, Vec::<String>::new()),
        }
    }
}

impl Default for InspectionCommands {
    fn default() -> Self {
        Self::new("sinfo", "sacct", "squeue")
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion and return its stdout.
    async fn run(&self, spec: &CommandSpec) -> Result<String, CommandFailure>;
}

/// Runs commands as child processes on the tokio runtime.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<String, CommandFailure> {
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(CommandFailure::Spawn {
                    program: spec.program.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(CommandFailure::TimedOut {
                    program: spec.program.clone(),
                    after: self.timeout,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CommandFailure::Exited {
                program: spec.program.clone(),
                status: output.status.to_string(),
                stderr: stderr.lines().next().unwrap_or_default().trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::trace!(command=%spec, bytes = stdout.len(), "command finished");
        Ok(stdout)
    }
}
