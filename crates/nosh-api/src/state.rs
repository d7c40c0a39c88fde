use std::sync::Arc;

use nosh_core::Platform;

use crate::config::AppConfig;

/// Shared, immutable handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub platform: Platform,
}

impl AppState {
    pub fn new(config: AppConfig, platform: Platform) -> Self {
        Self {
            config: Arc::new(config),
            platform,
        }
    }
}
