pub mod error;
pub mod publisher;
pub mod schema;

pub use error::PublishError;
pub use publisher::{EventPublisher, PublisherCounters};
pub use schema::upgrade_legacy_event;
