//! Multi-dialect SSE fan-out (§4.6): four flavors of downstream stream,
//! each built on the same [`relay_store::DataStore`] subscription.

pub mod dialect;
pub mod error;
pub mod payload;
pub mod provider;

pub use dialect::Dialect;
pub use error::StreamError;
pub use payload::{item_path, DeletePayload, PatchPayload, PutPayload};
pub use provider::{frame_for_change, initial_frame, snapshot_dataset, StreamConfig, SubscriberStream};
