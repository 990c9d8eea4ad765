pub mod extract;
pub mod init;
pub mod schema;
pub mod validate;

use partspec_config::AppConfig;
use std::path::Path;

/// Load configuration from `path`, or the default location with
/// environment overrides.
pub(crate) fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    })
}
