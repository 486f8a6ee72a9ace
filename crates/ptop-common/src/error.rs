use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// An inspection command could not be run or exited abnormally.
#[derive(Debug, Error)]
pub enum CommandFailure {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    Exited {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("`{program}` did not finish within {after:?}")]
    TimedOut { program: String, after: Duration },
}

impl CommandFailure {
    pub fn program(&self) -> &str {
        match self {
            Self::Spawn { program, .. }
            | Self::Exited { program, .. }
            | Self::TimedOut { program, .. } => program,
        }
    }
}

/// Command output did not have the expected tabular shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("{table}: output has no header row")]
    MissingHeader { table: &'static str },

    #[error("{table}: header has no `{column}` column")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },

    #[error("{table}: expected header `{expected}`, found `{found}`")]
    HeaderMismatch {
        table: &'static str,
        expected: &'static str,
        found: String,
    },
}

/// Composite field kinds understood by the field extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    CpuState,
    CpuLoad,
    Memory,
    GenericResource,
    AllocatedResources,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CpuState => "CPUS(A/I/O/T)",
            Self::CpuLoad => "CPU_LOAD",
            Self::Memory => "MEMORY",
            Self::GenericResource => "GRES",
            Self::AllocatedResources => "AllocTRES",
        };
        f.write_str(name)
    }
}

/// One composite field on one record was malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("malformed {field} field: `{raw}`")]
pub struct ExtractionFailure {
    pub field: FieldKind,
    pub raw: String,
}

impl ExtractionFailure {
    pub fn new(field: FieldKind, raw: &str) -> Self {
        Self {
            field,
            raw: raw.to_string(),
        }
    }
}

/// Startup-time configuration problems; the only fatal error class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no hostnames to monitor")]
    NoHostnames,

    #[error("hostname `{0}` is listed more than once")]
    DuplicateHostname(String),

    #[error("{0} refresh interval must be greater than zero")]
    ZeroInterval(&'static str),
}
