//! Playlists, and the list of playlists at the playlist root.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::broadcast::{self, error::RecvError};

use super::{FolderCollection, LiveLink};
use crate::error::CoreResult;
use crate::item::{Attributes, FolderItem, ItemSource};
use crate::query::{QueryPath, QueryScheme};
use crate::source::{PlaylistEntry, PlaylistSource, TreeAction, TreeChange};

pub(crate) struct PlaylistBacking {
    source: Arc<dyn PlaylistSource>,
    /// Empty for the playlist root.
    playlist: PathBuf,
    changes: Mutex<Option<broadcast::Receiver<TreeChange<PlaylistEntry>>>>,
}

impl PlaylistBacking {
    pub(crate) fn new(source: Arc<dyn PlaylistSource>, playlist: PathBuf) -> Self {
        let changes = source.subscribe();
        Self {
            source,
            playlist,
            changes: Mutex::new(Some(changes)),
        }
    }

    pub(crate) async fn populate(&self, place: &QueryPath) -> CoreResult<Vec<FolderItem>> {
        if self.playlist.as_os_str().is_empty() {
            return Ok(self
                .source
                .playlists()
                .into_iter()
                .map(|path| {
                    let target = QueryPath::new(QueryScheme::Playlist, &path);
                    FolderItem::new(target.name(), place.clone(), target, Attributes::PLAYLIST)
                })
                .collect());
        }

        Ok(self
            .source
            .load(&self.playlist)
            .await?
            .iter()
            .map(|entry| member_item(place, entry))
            .collect())
    }

    pub(crate) fn attach(&self, collection: &Arc<FolderCollection>) -> CoreResult<Option<LiveLink>> {
        if self.playlist.as_os_str().is_empty() {
            return Ok(None);
        }
        let Some(mut changes) = self
            .changes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return Ok(None);
        };
        let weak: Weak<FolderCollection> = Arc::downgrade(collection);
        let playlist = self.playlist.clone();
        let task = tokio::spawn(async move {
            loop {
                let change = match changes.recv().await {
                    Ok(change) => Some(change),
                    Err(RecvError::Lagged(_)) => None,
                    Err(RecvError::Closed) => break,
                };
                let Some(collection) = weak.upgrade() else {
                    break;
                };
                match change {
                    Some(change) if change.parent == playlist => apply(&collection, change),
                    Some(_) => {}
                    None => collection.mark_needs_reload(),
                }
            }
        });
        Ok(Some(LiveLink::default().with_task(task)))
    }
}

fn member_item(place: &QueryPath, entry: &PlaylistEntry) -> FolderItem {
    let mut attributes = Attributes::PLAYLIST_MEMBER;
    if entry.path.is_dir() {
        attributes |= Attributes::DIRECTORY;
    }
    FolderItem::new(
        entry.name.clone(),
        place.clone(),
        QueryPath::file(&entry.path),
        attributes,
    )
    .with_entry_time(entry.entry_time)
    .with_source(ItemSource::Playlist(entry.id))
}

fn apply(collection: &FolderCollection, change: TreeChange<PlaylistEntry>) {
    match change.action {
        TreeAction::Add => {
            if let Some(entry) = change.node {
                collection.insert_item(member_item(collection.place(), &entry));
            }
        }
        TreeAction::Remove => {
            if let Some(entry) = change.node {
                collection.remove_source(&ItemSource::Playlist(entry.id));
            }
        }
        TreeAction::Rename => {
            if let Some(entry) = change.node {
                collection.rename_source(&ItemSource::Playlist(entry.id), entry.name, None);
            }
        }
        TreeAction::Move | TreeAction::Replace | TreeAction::Reset => {
            collection.mark_needs_reload();
        }
    }
}
