pub mod ask;
pub mod config;
pub mod interactive;
pub mod search;

use std::sync::Arc;

use anyhow::{Context, Result};

use cocoa_application::SessionController;
use cocoa_infrastructure::{ConfigStorage, HttpSearchBackend};

/// Builds a controller from the effective configuration.
///
/// # Arguments
///
/// * `backend_url` - Overrides the configured backend URL when given
pub fn connect(backend_url: Option<&str>) -> Result<SessionController> {
    let storage = ConfigStorage::default_location()?;
    let mut config = storage
        .load_effective()
        .with_context(|| format!("Failed to load {}", storage.path().display()))?;
    if let Some(url) = backend_url {
        config.backend_url = url.to_string();
    }
    tracing::debug!(backend = %config.backend_url, "connecting");

    let backend = HttpSearchBackend::new(config.clone()).context("Failed to build HTTP client")?;
    Ok(SessionController::new(Arc::new(backend), config))
}
