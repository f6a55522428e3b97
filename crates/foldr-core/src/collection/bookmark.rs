//! Bookmark folders.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::broadcast::{self, error::RecvError};

use super::{FolderCollection, LiveLink};
use crate::error::CoreResult;
use crate::item::{Attributes, FolderItem, ItemSource};
use crate::query::{QueryPath, QueryScheme};
use crate::source::{BookmarkKind, BookmarkNode, BookmarkSource, TreeAction, TreeChange};

pub(crate) struct BookmarkBacking {
    source: Arc<dyn BookmarkSource>,
    folder: PathBuf,
    // Subscribed at construction so changes made during population are replayed.
    changes: Mutex<Option<broadcast::Receiver<TreeChange<BookmarkNode>>>>,
}

impl BookmarkBacking {
    pub(crate) fn new(source: Arc<dyn BookmarkSource>, folder: PathBuf) -> Self {
        let changes = source.subscribe();
        Self {
            source,
            folder,
            changes: Mutex::new(Some(changes)),
        }
    }

    pub(crate) fn populate(&self, place: &QueryPath) -> CoreResult<Vec<FolderItem>> {
        Ok(self
            .source
            .children(&self.folder)?
            .iter()
            .map(|node| bookmark_item(place, &self.folder, node))
            .collect())
    }

    pub(crate) fn attach(&self, collection: &Arc<FolderCollection>) -> CoreResult<Option<LiveLink>> {
        let Some(mut changes) = self
            .changes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return Ok(None);
        };
        let weak: Weak<FolderCollection> = Arc::downgrade(collection);
        let folder = self.folder.clone();
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
                    Some(change) => apply(&collection, &folder, change),
                    None => collection.mark_needs_reload(),
                }
            }
        });
        Ok(Some(LiveLink::default().with_task(task)))
    }
}

/// Maps a bookmark node to an item of the folder `folder`.
pub(crate) fn bookmark_item(place: &QueryPath, folder: &Path, node: &BookmarkNode) -> FolderItem {
    let item = match &node.kind {
        BookmarkKind::Folder => FolderItem::new(
            node.name.clone(),
            place.clone(),
            QueryPath::new(QueryScheme::Bookmark, folder.join(&node.name)),
            Attributes::DIRECTORY | Attributes::BOOKMARK,
        ),
        BookmarkKind::Bookmark { target } => {
            let mut attributes = Attributes::BOOKMARK | Attributes::SHORTCUT;
            if target.is_dir() {
                attributes |= Attributes::DIRECTORY;
            }
            FolderItem::new(
                node.name.clone(),
                place.clone(),
                QueryPath::file(target),
                attributes,
            )
        }
    };
    item.with_entry_time(node.entry_time)
        .with_source(ItemSource::Bookmark(node.id))
}

/// Applies one tree change to the collection showing `folder`.
fn apply(collection: &FolderCollection, folder: &Path, change: TreeChange<BookmarkNode>) {
    let here = change.parent == folder;
    match change.action {
        TreeAction::Reset => collection.mark_needs_reload(),
        TreeAction::Replace if folder.starts_with(&change.parent) => collection.mark_needs_reload(),
        TreeAction::Move => {
            if here || change.old_parent.as_deref() == Some(folder) {
                collection.mark_needs_reload();
            }
        }
        TreeAction::Add if here => {
            if let Some(node) = change.node {
                collection.insert_item(bookmark_item(collection.place(), folder, &node));
            }
        }
        TreeAction::Remove => {
            let Some(node) = change.node else { return };
            if here {
                collection.remove_source(&ItemSource::Bookmark(node.id));
            } else if node.is_folder() && folder.starts_with(change.parent.join(&node.name)) {
                collection.mark_needs_reload();
            }
        }
        TreeAction::Rename if here => {
            if let Some(node) = change.node {
                let target = node
                    .is_folder()
                    .then(|| QueryPath::new(QueryScheme::Bookmark, folder.join(&node.name)));
                collection.rename_source(&ItemSource::Bookmark(node.id), node.name, target);
            }
        }
        _ => {}
    }
}
