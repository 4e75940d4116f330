pub mod error;
pub mod memory;
pub mod state;
pub mod store;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use state::{ChangeNotification, Dataset, Item};
pub use store::DataStore;
