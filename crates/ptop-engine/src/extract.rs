//! Small grammars for the composite fields inside inspection output.
//!
//! Each extractor either returns a value, falls back explicitly, or reports an
//! [`ExtractionFailure`] naming the field. None of them panic.

use std::sync::LazyLock;

use regex::Regex;

use ptop_common::{ExtractionFailure, FieldKind};

/// `gpu:<type>:<count>` with an optional type, e.g. `gpu:titanrtx:8(S:0-1)`.
/// The count must end the entry so a numeric type such as `1080ti` is not
/// read as a count.
static GRES_GPU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"gpu:(?:[^:(),]+:)?(\d+)(?:\(|,|$)").expect("valid regex"));

/// The bare GPU total in a TRES list, not the per-type `gres/gpu:<type>=` entry.
static TRES_GPU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|,)gres/gpu=(\d+)").expect("valid regex"));

/// `CPUS(A/I/O/T)` broken into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuState {
    pub allocated: u64,
    pub idle: u64,
    pub other: u64,
    pub total: u64,
}

/// Parse `"<allocated>/<idle>/<other>/<total>"`.
///
/// A single bare number (reported for offline or degenerate nodes) counts as
/// fully allocated: allocated = total = that number.
pub fn cpu_state(field: &str) -> Result<CpuState, ExtractionFailure> {
    let fail = || ExtractionFailure::new(FieldKind::CpuState, field);
    let parts: Vec<&str> = field.trim().split('/').collect();
    let numbers = parts
        .iter()
        .map(|p| p.trim().parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| fail())?;

    match numbers.as_slice() {
        [allocated, idle, other, total] => Ok(CpuState {
            allocated: *allocated,
            idle: *idle,
            other: *other,
            total: *total,
        }),
        [n] => Ok(CpuState {
            allocated: *n,
            idle: 0,
            other: 0,
            total: *n,
        }),
        _ => Err(fail()),
    }
}

/// Total GPUs in a `GRES` field. No `gpu:` entry means zero GPUs; several
/// entries (mixed GPU types) are summed.
pub fn gres_gpu_count(field: &str) -> Result<u64, ExtractionFailure> {
    if !field.contains("gpu:") {
        return Ok(0);
    }
    let mut total = 0u64;
    let mut matched = false;
    for caps in GRES_GPU.captures_iter(field) {
        let count = caps[1]
            .parse::<u64>()
            .map_err(|_| ExtractionFailure::new(FieldKind::GenericResource, field))?;
        total = total.saturating_add(count);
        matched = true;
    }
    if matched {
        Ok(total)
    } else {
        Err(ExtractionFailure::new(FieldKind::GenericResource, field))
    }
}

/// GPUs charged to a job in its `AllocTRES` field. No `gres/gpu=` entry means
/// the job holds no GPUs.
pub fn allocated_gpu_count(field: &str) -> Result<u64, ExtractionFailure> {
    match TRES_GPU.captures(field) {
        Some(caps) => caps[1]
            .parse::<u64>()
            .map_err(|_| ExtractionFailure::new(FieldKind::AllocatedResources, field)),
        None if field.contains("gres/gpu=") => {
            Err(ExtractionFailure::new(FieldKind::AllocatedResources, field))
        }
        None => Ok(0),
    }
}

/// Whether an `AllocTRES` field carries the billing marker of a live job.
pub fn is_billing(field: &str) -> bool {
    field.starts_with("billing=")
}

pub fn cpu_load(field: &str) -> Result<f64, ExtractionFailure> {
    field
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|load| load.is_finite() && *load >= 0.0)
        .ok_or_else(|| ExtractionFailure::new(FieldKind::CpuLoad, field))
}

/// A `MEMORY` or `FREE_MEM` column, in megabytes.
pub fn megabytes(field: &str) -> Result<u64, ExtractionFailure> {
    field
        .trim()
        .parse::<u64>()
        .map_err(|_| ExtractionFailure::new(FieldKind::Memory, field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_state() {
        assert_eq!(
            cpu_state("4/12/0/16").unwrap(),
            CpuState {
                allocated: 4,
                idle: 12,
                other: 0,
                total: 16
            }
        );
        let bare = cpu_state("16").unwrap();
        assert_eq!((bare.allocated, bare.total), (16, 16));

        assert_eq!(cpu_state("4/x/0/16").unwrap_err().field, FieldKind::CpuState);
        assert!(cpu_state("4/12/16").is_err());
        assert!(cpu_state("").is_err());
    }

    #[test]
    fn test_gres_gpu_count() {
        assert_eq!(gres_gpu_count("gpu:titanrtx:8(S:0-1)").unwrap(), 8);
        assert_eq!(gres_gpu_count("gpu:a100:10(S:0-1)").unwrap(), 10);
        assert_eq!(gres_gpu_count("gpu:4").unwrap(), 4);
        assert_eq!(gres_gpu_count("gpu:1080ti:2(S:0)").unwrap(), 2);
        assert_eq!(gres_gpu_count("gpu:a100:2(S:0),gpu:v100:4(S:1)").unwrap(), 6);
        assert_eq!(gres_gpu_count("(null)").unwrap(), 0);
        assert_eq!(gres_gpu_count("").unwrap(), 0);

        let err = gres_gpu_count("gpu:titanrtx:many").unwrap_err();
        assert_eq!(err.field, FieldKind::GenericResource);
        assert_eq!(err.raw, "gpu:titanrtx:many");
    }

    #[test]
    fn test_allocated_gpu_count() {
        assert_eq!(
            allocated_gpu_count("billing=4,cpu=4,gres/gpu:titanrtx=1,gres/gpu=1,mem=10G").unwrap(),
            1
        );
        assert_eq!(allocated_gpu_count("billing=8,cpu=8,gres/gpu=2").unwrap(), 2);
        assert_eq!(
            allocated_gpu_count("billing=4,cpu=4,mem=10G,node=1").unwrap(),
            0
        );
        assert_eq!(allocated_gpu_count("gres/gpu:a100=3").unwrap(), 0);
        // sacct truncates wide TRES lists with a trailing `+`
        assert_eq!(allocated_gpu_count("billing=4,cpu=4,gres/gpu=1+").unwrap(), 1);
        assert!(allocated_gpu_count("billing=4,gres/gpu=x").is_err());
    }

    #[test]
    fn test_is_billing() {
        assert!(is_billing("billing=4,cpu=4"));
        assert!(!is_billing("cpu=4,mem=10G"));
        assert!(!is_billing(""));
    }

    #[test]
    fn test_scalars() {
        assert_eq!(cpu_load("3.52").unwrap(), 3.52);
        assert!(cpu_load("N/A").is_err());
        assert_eq!(megabytes("191000").unwrap(), 191000);
        assert_eq!(megabytes("N/A").unwrap_err().field, FieldKind::Memory);
    }
}
