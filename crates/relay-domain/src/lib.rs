pub mod error;
pub mod types;

pub use error::DomainError;
pub use types::{
    Clause, ClientSideAvailability, DataKind, Flag, Operator, Prerequisite, Rollout, RolloutKind,
    Rule, Segment, SegmentRule, Target, User, VariationOrRollout, VersionedData, VersionedItem,
    WeightedVariation,
};
