use std::sync::Arc;

use crate::config::Config;
use crate::db::{CreatorStore, PointStore};
use crate::services::image_store::ImageStore;
use crate::services::oauth::IdentityVerifier;
use crate::services::search::SearchConfig;
use crate::services::session_token::SessionTokens;

/// Request-facing policy knobs taken from the configuration
#[derive(Debug, Clone, Default)]
pub struct ApiSettings {
    pub admin_emails: Vec<String>,
    pub require_verified_publishers: bool,
    pub search: SearchConfig,
}

impl From<&Config> for ApiSettings {
    fn from(config: &Config) -> Self {
        Self {
            admin_emails: config.admin_emails.clone(),
            require_verified_publishers: config.require_verified_publishers,
            search: config.search(),
        }
    }
}

/// Shared handles for every request
#[derive(Clone)]
pub struct AppState {
    pub creators: Arc<dyn CreatorStore>,
    pub points: Arc<dyn PointStore>,
    pub images: Arc<ImageStore>,
    pub tokens: Arc<SessionTokens>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub settings: Arc<ApiSettings>,
}
