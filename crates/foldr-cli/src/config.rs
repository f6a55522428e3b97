use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use foldr_core::Config;

/// Returns the config directory: `./config` when present, else `~/.config/foldr`.
fn config_dir() -> PathBuf {
    let local = PathBuf::from("config");
    if local.exists() {
        return local;
    }
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
        .join(".config")
        .join("foldr")
}

/// Loads the engine configuration.
///
/// An explicit path must load. The discovered default file is optional and
/// falls back to built-in defaults when missing or unreadable.
pub(crate) fn load(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }
    let path = config_dir().join("default.toml");
    Ok(load_or_default(&path))
}

fn load_or_default(path: &Path) -> Config {
    match Config::load(path) {
        Ok(config) => config,
        Err(foldr_core::CoreError::NotFound(_)) => Config::default(),
        Err(e) => {
            tracing::warn!("ignoring {}: {e}", path.display());
            Config::default()
        }
    }
}
