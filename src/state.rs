use std::sync::Arc;

use crate::auth::session::SessionStore;
use crate::config::Settings;
use crate::storage::Storage;

/// Shared handles every request handler receives.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub sessions: SessionStore,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, sessions: SessionStore, settings: Settings) -> Self {
        Self {
            storage,
            sessions,
            settings: Arc::new(settings),
        }
    }
}
