//! Application state.

use std::sync::Arc;

use vidx_search::VideoIndex;

use crate::config::ApiConfig;
use crate::services::QueryService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub index: Arc<dyn VideoIndex>,
    pub query: QueryService,
}

impl AppState {
    pub fn new(config: ApiConfig, index: Arc<dyn VideoIndex>) -> Self {
        let query = QueryService::new(
            Arc::clone(&index),
            config.default_page_size,
            config.max_page_size,
        );

        Self {
            config,
            index,
            query,
        }
    }
}
