//! Platform path resolution for the Cocoa client.
//!
//! # Directory Structure
//!
//! ```text
//! <config_dir>/local-cocoa/     # e.g. ~/.config/local-cocoa on Linux
//! ├── client.toml               # Client configuration
//! └── logs/                     # Rolling CLI logs (with --log-file)
//!     └── cocoa.log.YYYY-MM-DD
//! ```

use std::path::PathBuf;

use cocoa_core::error::{CocoaError, Result};

const APP_DIR: &str = "local-cocoa";
const CONFIG_FILE: &str = "client.toml";

/// Resolves the client's configuration and log locations.
pub struct CocoaPaths;

impl CocoaPaths {
    /// Returns the client configuration directory.
    ///
    /// # Returns
    ///
    /// - `Ok(PathBuf)`: Path to the config directory
    /// - `Err(CocoaError::Config)`: The platform config directory could not be determined
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| CocoaError::config("Cannot determine the platform config directory"))
    }

    /// Returns the path to `client.toml`.
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Returns the path to the logs directory.
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("logs"))
    }
}
