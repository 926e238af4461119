//! Application state shared by the handlers

use std::sync::Arc;

use crate::domain::ProviderRegistry;

/// Shared, immutable after startup
#[derive(Debug, Clone)]
pub struct AppState {
    pub providers: Arc<ProviderRegistry>,
}

impl AppState {
    pub fn new(providers: ProviderRegistry) -> Self {
        Self {
            providers: Arc::new(providers),
        }
    }
}
