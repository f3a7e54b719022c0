use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use store::CareStore;

use crate::auth::TokenSigner;
use crate::config::Settings;
use crate::uploads::ImageStore;

/// Shared handles every handler receives.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CareStore>,
    pub tokens: Arc<TokenSigner>,
    pub images: Arc<ImageStore>,
    pub environment: String,
    pub started: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn CareStore>, settings: &Settings) -> Self {
        Self {
            store,
            tokens: Arc::new(TokenSigner::new(
                &settings.auth.secret,
                Duration::hours(settings.auth.ttl),
            )),
            images: Arc::new(ImageStore::new(
                settings.uploads.dir.clone(),
                settings.uploads.url.clone(),
            )),
            environment: settings.server.environment.clone(),
            started: Instant::now(),
        }
    }
}
