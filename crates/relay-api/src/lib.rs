pub mod app;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod snapshot;
pub mod state;
pub mod user;

pub use app::build_app;
pub use state::AppState;
