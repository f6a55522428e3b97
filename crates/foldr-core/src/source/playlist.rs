//! Playlists: ordered lists of paths stored under a playlist file name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{TreeAction, TreeChange};
use crate::error::{CoreError, CoreResult};

const CHANGE_CAPACITY: usize = 64;

/// One member of a playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub id: u64,
    pub path: PathBuf,
    /// Display name; defaults to the file name of `path`.
    pub name: String,
    pub entry_time: Option<SystemTime>,
}

/// Read access to a set of playlists.
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    /// Paths of every known playlist.
    fn playlists(&self) -> Vec<PathBuf>;

    /// Members of the playlist stored at `playlist`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if there is no such playlist.
    async fn load(&self, playlist: &Path) -> CoreResult<Vec<PlaylistEntry>>;

    /// Subscribes to changes. `TreeChange::parent` is the playlist path.
    fn subscribe(&self) -> broadcast::Receiver<TreeChange<PlaylistEntry>>;
}

/// In-memory playlist store.
pub struct PlaylistBook {
    lists: RwLock<BTreeMap<PathBuf, Vec<PlaylistEntry>>>,
    next_id: AtomicU64,
    changes: broadcast::Sender<TreeChange<PlaylistEntry>>,
}

impl std::fmt::Debug for PlaylistBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistBook").finish_non_exhaustive()
    }
}

impl Default for PlaylistBook {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaylistBook {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            lists: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            changes,
        }
    }

    /// Registers an empty playlist. Existing playlists are left alone.
    pub fn create(&self, playlist: impl Into<PathBuf>) {
        self.write().entry(playlist.into()).or_default();
    }

    /// Appends `path` to `playlist`, creating the playlist if needed.
    pub fn add(&self, playlist: &Path, path: impl Into<PathBuf>) -> PlaylistEntry {
        let entry = self.make_entry(path.into());
        self.write()
            .entry(playlist.to_path_buf())
            .or_default()
            .push(entry.clone());
        self.emit(TreeChange::new(TreeAction::Add, playlist, Some(entry.clone())));
        entry
    }

    /// Removes member `id` from `playlist`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if the playlist or member does not exist.
    pub fn remove(&self, playlist: &Path, id: u64) -> CoreResult<PlaylistEntry> {
        let entry = {
            let mut lists = self.write();
            let entries = lists
                .get_mut(playlist)
                .ok_or_else(|| CoreError::NotFound(playlist.to_path_buf()))?;
            let index = entries
                .iter()
                .position(|e| e.id == id)
                .ok_or_else(|| CoreError::NotFound(playlist.join(id.to_string())))?;
            entries.remove(index)
        };
        self.emit(TreeChange::new(TreeAction::Remove, playlist, Some(entry.clone())));
        Ok(entry)
    }

    /// Changes the display name of member `id`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if the playlist or member does not exist.
    pub fn rename(&self, playlist: &Path, id: u64, name: &str) -> CoreResult<PlaylistEntry> {
        let entry = {
            let mut lists = self.write();
            let entry = lists
                .get_mut(playlist)
                .and_then(|entries| entries.iter_mut().find(|e| e.id == id))
                .ok_or_else(|| CoreError::NotFound(playlist.join(id.to_string())))?;
            entry.name = name.to_string();
            entry.clone()
        };
        self.emit(TreeChange::new(TreeAction::Rename, playlist, Some(entry.clone())));
        Ok(entry)
    }

    /// Moves member `id` to a different position inside `playlist`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if the playlist or member does not exist.
    pub fn move_entry(&self, playlist: &Path, id: u64, index: usize) -> CoreResult<()> {
        let entry = {
            let mut lists = self.write();
            let entries = lists
                .get_mut(playlist)
                .ok_or_else(|| CoreError::NotFound(playlist.to_path_buf()))?;
            let from = entries
                .iter()
                .position(|e| e.id == id)
                .ok_or_else(|| CoreError::NotFound(playlist.join(id.to_string())))?;
            let entry = entries.remove(from);
            entries.insert(index.min(entries.len()), entry.clone());
            entry
        };
        let mut change = TreeChange::new(TreeAction::Move, playlist, Some(entry));
        change.old_parent = Some(playlist.to_path_buf());
        self.emit(change);
        Ok(())
    }

    /// Replaces every member of `playlist`.
    pub fn replace(&self, playlist: &Path, paths: Vec<PathBuf>) {
        let entries = paths.into_iter().map(|path| self.make_entry(path)).collect();
        self.write().insert(playlist.to_path_buf(), entries);
        self.emit(TreeChange::new(TreeAction::Replace, playlist, None));
    }

    fn make_entry(&self, path: PathBuf) -> PlaylistEntry {
        PlaylistEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: path
                .file_name()
                .map(|n| crate::nfc_string(&n.to_string_lossy()))
                .unwrap_or_else(|| path.to_string_lossy().into_owned()),
            path,
            entry_time: Some(SystemTime::now()),
        }
    }

    fn emit(&self, change: TreeChange<PlaylistEntry>) {
        let _ = self.changes.send(change);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<PathBuf, Vec<PlaylistEntry>>> {
        self.lists.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<PathBuf, Vec<PlaylistEntry>>> {
        self.lists.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PlaylistSource for PlaylistBook {
    fn playlists(&self) -> Vec<PathBuf> {
        self.read().keys().cloned().collect()
    }

    async fn load(&self, playlist: &Path) -> CoreResult<Vec<PlaylistEntry>> {
        self.read()
            .get(playlist)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(playlist.to_path_buf()))
    }

    fn subscribe(&self) -> broadcast::Receiver<TreeChange<PlaylistEntry>> {
        self.changes.subscribe()
    }
}
