use serde::Serialize;

use crate::error::ExtractionFailure;

/// Something that went wrong for one host (or one job on it) during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// `None` for problems not tied to a host, such as an unreadable job row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub problem: Problem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Problem {
    /// The node inventory had no row for this host.
    MissingHostRecord,
    /// The host's inventory row was unusable; the host was omitted.
    MalformedNode { failure: ExtractionFailure },
    /// One job on the host was unusable; the job was skipped.
    MalformedJob {
        user: String,
        failure: ExtractionFailure,
    },
    /// Running jobs claim more GPUs than the node reports.
    GpuOversubscribed { taken: u64, total: u64 },
    /// A job-listing row could not be interpreted.
    MalformedJobRow { line: String },
}

impl Diagnostic {
    pub fn new(hostname: impl Into<String>, problem: Problem) -> Self {
        Self {
            hostname: Some(hostname.into()),
            problem,
        }
    }

    pub fn unattached(problem: Problem) -> Self {
        Self {
            hostname: None,
            problem,
        }
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Whether the host is absent from the cycle's node sequence.
    pub fn omits_host(&self) -> bool {
        matches!(
            self.problem,
            Problem::MissingHostRecord | Problem::MalformedNode { .. }
        )
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let host = self.hostname().unwrap_or("?");
        match &self.problem {
            Problem::MissingHostRecord => write!(f, "no info found for host {host}"),
            Problem::MalformedNode { failure } => write!(f, "{host}: {failure}"),
            Problem::MalformedJob { user, failure } => {
                write!(f, "{host}: job of {user} skipped, {failure}")
            }
            Problem::GpuOversubscribed { taken, total } => {
                write!(f, "{host}: jobs hold {taken} GPUs but node reports {total}")
            }
            Problem::MalformedJobRow { line } => write!(f, "unreadable job row `{line}`"),
        }
    }
}
