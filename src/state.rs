use crate::config::settings::AppConfig;
use crate::infrastructure::media::Transcoder;
use crate::infrastructure::process::ProcessRegistry;
use crate::modules::jobs::repository::CatalogStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn CatalogStore>,
    pub transcoder: Arc<dyn Transcoder>,
    pub registry: Arc<ProcessRegistry>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn CatalogStore>,
        transcoder: Arc<dyn Transcoder>,
        registry: Arc<ProcessRegistry>,
    ) -> Self {
        Self {
            config,
            store,
            transcoder,
            registry,
        }
    }
}
