//! Keyword search over a directory subtree.
//!
//! [`SearchEngineHost`] hands out at most one [`SearchEngine`] at a time,
//! keyed by `(root, recursive)`. Asking for another scope retires the
//! previous engine together with its in-flight search and watcher.

pub mod engine;
pub mod matcher;

use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::source::ArchiveProvider;

pub use engine::{SearchEngine, SearchFilter, SearchResult};
pub use matcher::{matcher_for, FuzzyMatcher, KeywordMatcher, PlainMatcher};

/// How keywords are matched against entry names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Case-insensitive substring terms.
    #[default]
    Plain,
    Fuzzy,
}

/// Runtime search settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    pub recursive: bool,
    pub show_hidden: bool,
    pub mode: SearchMode,
    /// Non-archive file extensions that take part in a search.
    pub extensions: Vec<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        crate::config::settings::Config::default().search_settings()
    }
}

/// Owns the engine for the current search scope.
pub struct SearchEngineHost {
    settings: SearchSettings,
    archives: Arc<dyn ArchiveProvider>,
    current: Mutex<Option<Arc<SearchEngine>>>,
}

impl std::fmt::Debug for SearchEngineHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngineHost")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SearchEngineHost {
    pub fn new(settings: SearchSettings, archives: Arc<dyn ArchiveProvider>) -> Self {
        Self {
            settings,
            archives,
            current: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// The engine for `(root, recursive)`, replacing any engine for another scope.
    pub fn engine_for(&self, root: &Path, recursive: bool) -> Arc<SearchEngine> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(engine) = current.as_ref() {
            if engine.serves(root, recursive) {
                return Arc::clone(engine);
            }
        }
        if let Some(previous) = current.take() {
            tracing::debug!("retiring search engine for {}", previous.root().display());
            previous.reset();
        }
        let engine = Arc::new(SearchEngine::new(
            root,
            recursive,
            self.settings.clone(),
            Arc::clone(&self.archives),
        ));
        *current = Some(Arc::clone(&engine));
        engine
    }

    /// Retires the current engine, if any.
    pub fn clear(&self) {
        if let Some(engine) = self
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            engine.reset();
        }
    }
}
