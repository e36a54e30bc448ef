//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::{BackendServiceBuilder, BackendServiceConfig};
use crate::error::ConfigError;

/// Parse a backend service from TOML text and validate it.
pub fn parse_backend_service(content: &str) -> Result<BackendServiceConfig, ConfigError> {
    let builder: BackendServiceBuilder = toml::from_str(content)?;
    builder.build()
}

/// Load and validate a backend service from a TOML file.
pub fn load_backend_service(path: &Path) -> Result<BackendServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_backend_service(&content)?;

    tracing::debug!(
        path = %path.display(),
        app_id = %config.id(),
        origins = config.origins().len(),
        "Backend service loaded"
    );
    Ok(config)
}
