//! Live directory search.
//!
//! A [`SearchEngine`] walks one root (optionally recursively) on the blocking
//! pool, keeps the matches, and then watches the root so that later
//! creations, deletions and renames of matching entries are re-broadcast as
//! [`FsChange`]s.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use ignore::WalkBuilder;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::matcher::{matcher_for, KeywordMatcher};
use super::SearchSettings;
use crate::error::{CoreError, CoreResult};
use crate::event::FsChange;
use crate::fs::{is_hidden, FolderWatcher};
use crate::source::ArchiveProvider;

const CHANGE_CAPACITY: usize = 256;
const CANCEL_CHECK_INTERVAL: usize = 128;

/// Decides which walked entries are eligible for matching.
#[derive(Clone)]
pub struct SearchFilter {
    show_hidden: bool,
    extensions: HashSet<String>,
    archives: Arc<dyn ArchiveProvider>,
}

impl SearchFilter {
    pub fn new(settings: &SearchSettings, archives: Arc<dyn ArchiveProvider>) -> Self {
        Self {
            show_hidden: settings.show_hidden,
            extensions: settings
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            archives,
        }
    }

    /// Directories always pass; files need a known extension or archive support.
    pub fn accepts(&self, path: &Path, is_dir: bool) -> bool {
        if !self.show_hidden && is_hidden(path) {
            return false;
        }
        if is_dir {
            return true;
        }
        let known = path
            .extension()
            .map(|e| self.extensions.contains(&e.to_string_lossy().to_lowercase()))
            .unwrap_or(false);
        known || self.archives.is_supported(path)
    }
}

/// The matches of one search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub keyword: String,
    pub entries: Vec<PathBuf>,
}

/// A finished search kept current by its watcher.
struct LiveResult {
    keyword: String,
    entries: Arc<Mutex<Vec<PathBuf>>>,
    _watcher: Option<FolderWatcher>,
}

impl LiveResult {
    fn snapshot(&self) -> SearchResult {
        SearchResult {
            keyword: self.keyword.clone(),
            entries: self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        }
    }
}

/// Searches one `(root, recursive)` scope.
pub struct SearchEngine {
    root: PathBuf,
    recursive: bool,
    settings: SearchSettings,
    filter: SearchFilter,
    state: Mutex<Option<LiveResult>>,
    in_flight: Mutex<Option<(u64, CancellationToken)>>,
    generation: AtomicU64,
    changes: broadcast::Sender<FsChange>,
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("root", &self.root)
            .field("recursive", &self.recursive)
            .finish_non_exhaustive()
    }
}

impl SearchEngine {
    pub fn new(
        root: impl Into<PathBuf>,
        recursive: bool,
        settings: SearchSettings,
        archives: Arc<dyn ArchiveProvider>,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        let filter = SearchFilter::new(&settings, archives);
        Self {
            root: root.into(),
            recursive,
            settings,
            filter,
            state: Mutex::new(None),
            in_flight: Mutex::new(None),
            generation: AtomicU64::new(0),
            changes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    /// `true` if this engine serves the given scope.
    pub fn serves(&self, root: &Path, recursive: bool) -> bool {
        self.root == root && self.recursive == recursive
    }

    /// Keyword of the live result, if any.
    pub fn keyword(&self) -> Option<String> {
        self.lock_state().as_ref().map(|s| s.keyword.clone())
    }

    /// Changes to the live result.
    pub fn subscribe(&self) -> broadcast::Receiver<FsChange> {
        self.changes.subscribe()
    }

    /// Runs a search for `keyword`, superseding any search still in flight.
    ///
    /// The same keyword is answered from the live result, which includes
    /// every change its watcher has seen since the walk.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Cancelled`] if `cancel` fires or a newer search starts.
    /// - [`CoreError::NotFound`] / [`CoreError::NotADirectory`] for a bad root.
    /// - [`CoreError::Search`] if the walk itself fails.
    ///
    /// Any error leaves the engine without a live result.
    pub async fn search(
        &self,
        keyword: &str,
        cancel: &CancellationToken,
    ) -> CoreResult<SearchResult> {
        if let Some(live) = self.lock_state().as_ref() {
            if live.keyword == keyword {
                return Ok(live.snapshot());
            }
        }

        let token = cancel.child_token();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        if let Some((_, previous)) = self
            .lock_in_flight()
            .replace((generation, token.clone()))
        {
            previous.cancel();
        }

        let outcome = self.run(keyword, &token).await;
        {
            let mut in_flight = self.lock_in_flight();
            if in_flight.as_ref().is_some_and(|(g, _)| *g == generation) {
                *in_flight = None;
            }
        }

        match outcome {
            Ok(live) => {
                let result = live.snapshot();
                *self.lock_state() = Some(live);
                Ok(result)
            }
            Err(e) => {
                *self.lock_state() = None;
                if !e.is_cancelled() {
                    tracing::warn!("search for {keyword:?} in {} failed: {e}", self.root.display());
                }
                Err(e)
            }
        }
    }

    /// Cancels any in-flight search and drops the live result.
    pub fn reset(&self) {
        if let Some((_, token)) = self.lock_in_flight().take() {
            token.cancel();
        }
        *self.lock_state() = None;
    }

    async fn run(&self, keyword: &str, token: &CancellationToken) -> CoreResult<LiveResult> {
        if !self.root.exists() {
            return Err(CoreError::NotFound(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(CoreError::NotADirectory(self.root.clone()));
        }

        let matcher = matcher_for(self.settings.mode, keyword);
        let walking = {
            let root = self.root.clone();
            let recursive = self.recursive;
            let filter = self.filter.clone();
            let matcher = Arc::clone(&matcher);
            let token = token.clone();
            tokio::task::spawn_blocking(move || walk(&root, recursive, &filter, &*matcher, &token))
        };

        let entries = tokio::select! {
            _ = token.cancelled() => return Err(CoreError::Cancelled),
            joined = walking => joined.map_err(|e| CoreError::Search(e.to_string()))??,
        };
        tracing::debug!(
            "search {keyword:?} in {}: {} matches",
            self.root.display(),
            entries.len()
        );

        let entries = Arc::new(Mutex::new(entries));
        let watcher = match self.watch(matcher, Arc::clone(&entries)) {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::warn!("search result for {} will not update: {e}", self.root.display());
                None
            }
        };

        Ok(LiveResult {
            keyword: keyword.to_string(),
            entries,
            _watcher: watcher,
        })
    }

    fn watch(
        &self,
        matcher: Arc<dyn KeywordMatcher>,
        entries: Arc<Mutex<Vec<PathBuf>>>,
    ) -> CoreResult<FolderWatcher> {
        let changes = self.changes.clone();
        let filter = self.filter.clone();
        FolderWatcher::new(&self.root, self.recursive, move |change| {
            for change in relevant_changes(change, &filter, &*matcher) {
                // Entries first, so a subscriber reacting to the event sees it.
                apply_to_entries(
                    &mut entries.lock().unwrap_or_else(|e| e.into_inner()),
                    &change,
                );
                let _ = changes.send(change);
            }
        })
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, Option<(u64, CancellationToken)>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Option<LiveResult>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn matches(path: &Path, filter: &SearchFilter, matcher: &dyn KeywordMatcher) -> bool {
    let is_dir = path.is_dir();
    filter.accepts(path, is_dir)
        && path
            .file_name()
            .map(|n| matcher.is_match(&n.to_string_lossy()))
            .unwrap_or(false)
}

/// Narrows a raw watcher change to what the live result cares about.
///
/// Deletions always pass through since the collection ignores unknown paths.
/// A rename across directories becomes a deletion plus a creation.
fn relevant_changes(
    change: FsChange,
    filter: &SearchFilter,
    matcher: &dyn KeywordMatcher,
) -> Vec<FsChange> {
    match change {
        FsChange::Created(path) if matches(&path, filter, matcher) => {
            vec![FsChange::Created(path)]
        }
        FsChange::Created(_) => Vec::new(),
        FsChange::Deleted(path) => vec![FsChange::Deleted(path)],
        FsChange::Renamed { from, to } => {
            if !matches(&to, filter, matcher) {
                vec![FsChange::Deleted(from)]
            } else if from.parent() == to.parent() {
                vec![FsChange::Renamed { from, to }]
            } else {
                vec![FsChange::Deleted(from), FsChange::Created(to)]
            }
        }
    }
}

/// Patches the kept matches with one relevant change.
fn apply_to_entries(entries: &mut Vec<PathBuf>, change: &FsChange) {
    match change {
        FsChange::Created(path) => {
            if !entries.contains(path) {
                entries.push(path.clone());
            }
        }
        FsChange::Deleted(path) => entries.retain(|e| !e.starts_with(path)),
        FsChange::Renamed { from, to } => {
            entries.retain(|e| e != to);
            match entries.iter_mut().find(|e| *e == from) {
                Some(entry) => *entry = to.clone(),
                None => entries.push(to.clone()),
            }
        }
    }
}

fn walk(
    root: &Path,
    recursive: bool,
    filter: &SearchFilter,
    matcher: &dyn KeywordMatcher,
    token: &CancellationToken,
) -> CoreResult<Vec<PathBuf>> {
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(!filter.show_hidden)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .follow_links(false);
    if !recursive {
        builder.max_depth(Some(1));
    }

    let mut found = Vec::new();
    for (index, entry) in builder.build().enumerate() {
        if index % CANCEL_CHECK_INTERVAL == 0 && token.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("search walk: {e}");
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }
        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_symlink() {
            continue;
        }
        let path = entry.path();
        if !filter.accepts(path, file_type.is_dir()) {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if matcher.is_match(&name) {
            found.push(path.to_path_buf());
        }
    }

    if token.is_cancelled() {
        return Err(CoreError::Cancelled);
    }
    Ok(found)
}
