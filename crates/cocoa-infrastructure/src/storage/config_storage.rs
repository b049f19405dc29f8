//! Client config file storage.
//!
//! `client.toml` is written atomically (tmp file + rename) and read-modify-write
//! updates hold an exclusive lock file for their duration.

use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

use cocoa_core::config::ClientConfig;
use cocoa_core::error::{CocoaError, Result};

use crate::paths::CocoaPaths;

/// Environment variables that override file values.
pub const ENV_BACKEND_URL: &str = "LOCAL_COCOA_BACKEND_URL";
pub const ENV_SEARCH_LIMIT: &str = "LOCAL_SEARCH_LIMIT";
pub const ENV_QA_CONTEXT_LIMIT: &str = "LOCAL_QA_CONTEXT_LIMIT";
pub const ENV_DEBOUNCE_MS: &str = "LOCAL_COCOA_DEBOUNCE_MS";

/// Storage handle for one `client.toml`.
pub struct ConfigStorage {
    path: PathBuf,
}

impl ConfigStorage {
    /// Creates a storage handle for `path`.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Storage for the platform default location.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(CocoaPaths::config_file()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the config file.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(ClientConfig))`: Parsed file, missing fields filled with defaults
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err(CocoaError::Serialization)`: The file is not valid TOML for the config
    pub fn load(&self) -> Result<Option<ClientConfig>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let config: ClientConfig = toml::from_str(&content)?;
        Ok(Some(config))
    }

    /// Loads the file, falling back to defaults when it is absent.
    pub fn load_or_default(&self) -> Result<ClientConfig> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// The config the client should run with: file values, then environment overrides.
    pub fn load_effective(&self) -> Result<ClientConfig> {
        let mut config = self.load_or_default()?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Saves `config` atomically.
    pub fn save(&self, config: &ClientConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(config)?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(toml_string.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        tracing::debug!(path = %self.path.display(), "client config saved");
        Ok(())
    }

    /// Read-modify-write under an exclusive lock.
    ///
    /// # Arguments
    ///
    /// * `f` - Update function; nothing is written if it fails
    pub fn update<F>(&self, f: F) -> Result<ClientConfig>
    where
        F: FnOnce(&mut ClientConfig) -> Result<()>,
    {
        let _lock = FileLock::acquire(&self.path)?;

        let mut config = self.load_or_default()?;
        f(&mut config)?;
        self.save(&config)?;
        Ok(config)
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| CocoaError::io("Config path has no parent directory"))?;
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| CocoaError::io("Config path has no file name"))?;
        Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
    }
}

/// Applies environment overrides using `lookup` to read variables.
///
/// Unset or blank variables are skipped; a non-numeric limit is a config error.
pub fn apply_env_overrides<F>(config: &mut ClientConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| lookup(key).map(|value| value.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(url) = read(ENV_BACKEND_URL) {
        config.backend_url = url;
    }
    if let Some(limit) = read(ENV_SEARCH_LIMIT) {
        config.search_limit = parse_number(ENV_SEARCH_LIMIT, &limit)?;
    }
    if let Some(limit) = read(ENV_QA_CONTEXT_LIMIT) {
        config.qa_context_limit = parse_number(ENV_QA_CONTEXT_LIMIT, &limit)?;
    }
    if let Some(debounce) = read(ENV_DEBOUNCE_MS) {
        config.debounce_ms = parse_number(ENV_DEBOUNCE_MS, &debounce)?;
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CocoaError::config(format!("{} must be a non-negative integer, got {:?}", key, value)))
}

/// Exclusive lock file next to the config, removed on drop.
struct FileLock {
    #[allow(dead_code)]
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| CocoaError::io(format!("Failed to acquire config lock: {}", e)))?;
        }

        Ok(FileLock { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_BACKEND_URL, "http://10.0.0.2:9000"),
            (ENV_SEARCH_LIMIT, " 40 "),
            (ENV_DEBOUNCE_MS, ""),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::default();
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.backend_url, "http://10.0.0.2:9000");
        assert_eq!(config.search_limit, 40);
        assert_eq!(config.qa_context_limit, 5);
        assert_eq!(config.debounce_ms, 300);
    }

    #[test]
    fn test_invalid_env_number_is_config_error() {
        let mut config = ClientConfig::default();
        let err = apply_env_overrides(&mut config, |key| {
            (key == ENV_QA_CONTEXT_LIMIT).then(|| "five".to_string())
        })
        .unwrap_err();
        assert!(err.is_config());
    }
}
