//! Change vocabulary shared by watchers, the search engine and collections.
//!
//! Producers (filesystem watchers, live search results) describe what happened
//! on disk with [`FsChange`]. Collections apply those changes and announce the
//! effect on their item list to consumers with [`CollectionEvent`].

use std::path::PathBuf;
use std::sync::Arc;

use crate::item::FolderItem;

/// A change observed on the filesystem (or in a live search result).
///
/// Changes flow **producer → ChangeSynchronizer → collection**.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsChange {
    /// A new entry appeared at the path.
    Created(PathBuf),
    /// The entry at the path disappeared.
    Deleted(PathBuf),
    /// An entry moved from one name to another.
    Renamed { from: PathBuf, to: PathBuf },
}

/// What a collection did to one of its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Add,
    Remove,
    Rename,
}

/// A notification a collection sends to its consumers.
///
/// Events flow **Core → UI**. `Changing` precedes the mutation so a selection
/// tracker can move to a neighbour before the item disappears.
#[derive(Debug, Clone)]
pub enum CollectionEvent {
    /// The item list is about to change.
    Changing {
        action: ChangeAction,
        item: Arc<FolderItem>,
    },
    /// The item list changed.
    Changed {
        action: ChangeAction,
        item: Arc<FolderItem>,
    },
    /// The backing store was replaced wholesale; the collection must be
    /// rebuilt rather than patched.
    Reset,
}

impl CollectionEvent {
    pub fn action(&self) -> Option<ChangeAction> {
        match self {
            CollectionEvent::Changing { action, .. } | CollectionEvent::Changed { action, .. } => {
                Some(*action)
            }
            CollectionEvent::Reset => None,
        }
    }
}
