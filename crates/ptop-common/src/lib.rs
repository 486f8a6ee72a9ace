pub mod diagnostic;
pub mod error;
pub mod job;
pub mod node_status;
pub mod snapshot;
pub mod telemetry;

pub use diagnostic::{Diagnostic, Problem};
pub use error::{CommandFailure, ConfigError, ExtractionFailure, FieldKind, ParseFailure};
pub use job::JobRow;
pub use node_status::{MetricKind, NodeMetric, NodeStatus, Usage};
pub use snapshot::{ClusterSnapshot, Feed, FeedHealth};
