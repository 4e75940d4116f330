use std::sync::Arc;

use relay_registry::Registry;

/// Shared state threaded through every handler via axum's `State` extractor.
/// `version`/`client_version` are the two version strings the status
/// endpoint reports; both are set once at process startup from the crate's
/// own version and have no further meaning here.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub version: Arc<String>,
    pub client_version: Arc<String>,
}
