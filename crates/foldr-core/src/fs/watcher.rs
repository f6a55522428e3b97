//! Filesystem watcher feeding per-entry changes.
//!
//! Uses [`notify`] to observe a directory and translates raw events into the
//! [`FsChange`] vocabulary. The handler runs on notify's own thread; callers
//! hand it something thread-safe such as a
//! [`crate::collection::ChangeSynchronizer`].

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::CoreResult;
use crate::event::FsChange;

/// Watches one directory and forwards every change to a handler.
///
/// Dropping the watcher unregisters it.
pub struct FolderWatcher {
    _watcher: RecommendedWatcher,
    dir: PathBuf,
}

impl std::fmt::Debug for FolderWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderWatcher").field("dir", &self.dir).finish()
    }
}

impl FolderWatcher {
    /// Starts watching `dir`. Only direct children are reported unless
    /// `recursive` is set.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Watch`] if the watcher cannot be installed.
    pub fn new<F>(dir: &Path, recursive: bool, handler: F) -> CoreResult<Self>
    where
        F: Fn(FsChange) + Send + 'static,
    {
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for change in translate_event(&event) {
                        handler(change);
                    }
                }
                Err(e) => tracing::warn!("watch error: {e}"),
            }
        })?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(dir, mode)?;
        tracing::debug!("watching {} (recursive={recursive})", dir.display());

        Ok(Self {
            _watcher: watcher,
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Translates one notify event into zero or more [`FsChange`]s.
///
/// Access and content modifications are ignored. A rename whose halves
/// arrive separately, or that moves between directories, is reported as a
/// deletion and a creation.
pub fn translate_event(event: &Event) -> Vec<FsChange> {
    match &event.kind {
        EventKind::Create(_) => event.paths.iter().cloned().map(FsChange::Created).collect(),
        EventKind::Remove(_) => event.paths.iter().cloned().map(FsChange::Deleted).collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match (mode, event.paths.as_slice()) {
            (RenameMode::Both, [from, to, ..]) if from.parent() == to.parent() => {
                vec![FsChange::Renamed {
                    from: from.clone(),
                    to: to.clone(),
                }]
            }
            (RenameMode::Both, [from, to, ..]) => vec![
                FsChange::Deleted(from.clone()),
                FsChange::Created(to.clone()),
            ],
            (RenameMode::From, paths) => paths.iter().cloned().map(FsChange::Deleted).collect(),
            (RenameMode::To, paths) => paths.iter().cloned().map(FsChange::Created).collect(),
            (_, paths) => paths
                .iter()
                .map(|p| {
                    if p.exists() {
                        FsChange::Created(p.clone())
                    } else {
                        FsChange::Deleted(p.clone())
                    }
                })
                .collect(),
        },
        _ => Vec::new(),
    }
}
