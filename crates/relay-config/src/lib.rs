pub mod env;
pub mod error;
mod ini;
mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load, load_from_str};
pub use types::{
    EnvironmentConfig, EventsConfig, MainConfig, PersistenceBackend, PersistenceConfig, RelayConfig,
    TlsConfig,
};
