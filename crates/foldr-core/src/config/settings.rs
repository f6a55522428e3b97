//! Engine configuration loaded from a TOML file.
//!
//! Every field has a default so the engine works without a config file.
//! Components never read [`Config`] directly; they take the narrower
//! runtime settings produced by [`Config::folder_settings`],
//! [`Config::search_settings`] and [`Config::cruise_settings`].

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::collection::FolderSettings;
use crate::cruise::CruiseSettings;
use crate::error::{CoreError, CoreResult};
use crate::item::FolderOrder;
use crate::search::{SearchMode, SearchSettings};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub folder: FolderConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub playlist: PlaylistConfig,
    #[serde(default)]
    pub cruise: CruiseConfig,
}

impl Config {
    /// Loads configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the file does not exist.
    /// - [`CoreError::PermissionDenied`] if the file is not readable.
    /// - [`CoreError::ConfigParse`] if the TOML is malformed.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CoreError::from_io(path, e))?;
        toml::from_str(&content).map_err(|e| CoreError::ConfigParse(e.to_string()))
    }

    /// Settings for folder collections.
    ///
    /// # Errors
    ///
    /// [`CoreError::ConfigParse`] if `folder.exclude_pattern` is not a valid regex.
    pub fn folder_settings(&self) -> CoreResult<FolderSettings> {
        let exclude = match self.folder.exclude_pattern.as_deref() {
            Some(pattern) if !pattern.is_empty() => Some(
                Regex::new(pattern)
                    .map_err(|e| CoreError::ConfigParse(format!("exclude_pattern: {e}")))?,
            ),
            _ => None,
        };
        Ok(FolderSettings {
            show_hidden: self.general.show_hidden,
            insert_sorted: self.folder.insert_sorted,
            first_archive_part_only: self.folder.first_archive_part_only,
            exclude,
            default_order: self.folder.default_order,
            playlist_extensions: self.playlist.extensions.clone(),
        })
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            recursive: self.search.recursive,
            show_hidden: self.general.show_hidden,
            mode: self.search.mode,
            extensions: self.search.extensions.clone(),
        }
    }

    pub fn cruise_settings(&self) -> CruiseSettings {
        CruiseSettings {
            recursive_archive: self.cruise.recursive_archive,
        }
    }
}

/// General browsing preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub show_hidden: bool,
}

/// Folder collection behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderConfig {
    #[serde(default)]
    pub default_order: FolderOrder,
    #[serde(default = "default_true")]
    pub insert_sorted: bool,
    #[serde(default = "default_true")]
    pub first_archive_part_only: bool,
    #[serde(default)]
    pub exclude_pattern: Option<String>,
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            default_order: FolderOrder::default(),
            insert_sorted: true,
            first_archive_part_only: true,
            exclude_pattern: None,
        }
    }
}

/// Live search behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub recursive: bool,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default = "default_search_extensions")]
    pub extensions: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            mode: SearchMode::default(),
            extensions: default_search_extensions(),
        }
    }
}

/// Playlist file recognition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistConfig {
    #[serde(default = "default_playlist_extensions")]
    pub extensions: Vec<String>,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            extensions: default_playlist_extensions(),
        }
    }
}

/// Cruise traversal behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CruiseConfig {
    #[serde(default = "default_true")]
    pub recursive_archive: bool,
}

impl Default for CruiseConfig {
    fn default() -> Self {
        Self {
            recursive_archive: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_search_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_playlist_extensions() -> Vec<String> {
    vec!["nvpls".to_string()]
}
