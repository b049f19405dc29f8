use anyhow::{Context, Result};

use cocoa_infrastructure::ConfigStorage;

/// Prints the effective configuration (file plus environment) as TOML.
pub fn show() -> Result<()> {
    let storage = ConfigStorage::default_location()?;
    let config = storage.load_effective()?;
    print!("{}", toml::to_string_pretty(&config).context("Failed to render config")?);
    Ok(())
}

pub fn path() -> Result<()> {
    let storage = ConfigStorage::default_location()?;
    println!("{}", storage.path().display());
    Ok(())
}

/// Writes a default `client.toml`, leaving an existing file untouched.
pub fn init() -> Result<()> {
    let storage = ConfigStorage::default_location()?;
    if storage.load()?.is_some() {
        println!("Config already exists: {}", storage.path().display());
        return Ok(());
    }
    let config = storage.load_or_default()?;
    storage.save(&config)?;
    println!("✅ Wrote {}", storage.path().display());
    Ok(())
}

pub fn set(key: &str, value: &str) -> Result<()> {
    let storage = ConfigStorage::default_location()?;
    storage
        .update(|config| config.set(key, value))
        .with_context(|| format!("Failed to set {}", key))?;
    println!("✅ {} = {}", key, value);
    Ok(())
}
