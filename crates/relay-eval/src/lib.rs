mod bucket;
mod clause;
mod error;
mod evaluate;
mod reason;

pub use bucket::bucket_value;
pub use clause::{clause_matches, rule_matches, segment_matches, SegmentSource};
pub use error::EvalError;
pub use evaluate::{evaluate, FlagSource};
pub use reason::{EvalDetail, PrerequisiteEvent, Reason};
