//! The per-process registry that ties the data engine, ingester, event
//! publisher, and stream fan-out (built in `relay-store`, `relay-ingest`,
//! `relay-events`, `relay-stream`) into one environment per credential set,
//! and multiplexes lookups across all configured environments.

pub mod credential;
pub mod environment;
pub mod error;
pub mod registry;
pub mod status;

pub use credential::Credential;
pub use environment::{Environment, EnvironmentIdentifiers, EnvironmentSettings};
pub use error::RegistryError;
pub use registry::Registry;
pub use status::{obscure_key, ConnectionStatusJson, EnvironmentStatus, StatusReport};
