pub mod aggregate;
pub mod record;
pub mod report;
pub mod window;

pub use aggregate::{AggregateRow, MetricValue};
pub use record::{RawRecord, Value};
pub use report::{Report, Snapshot};
pub use window::{ResolvedWindow, TimeWindow};
