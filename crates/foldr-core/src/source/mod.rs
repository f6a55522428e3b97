//! Backing stores the engine reads but does not own.
//!
//! Each store is reached through a trait so a persistence layer or a real
//! archive codec can be plugged in: [`ArchiveProvider`], [`BookmarkSource`],
//! [`PlaylistSource`] and [`QuickAccessSource`]. In-memory implementations
//! ([`BookmarkTree`], [`PlaylistBook`], [`QuickAccessList`]) and a zip-backed
//! [`ZipArchiveProvider`] ship with the crate.

pub mod archive;
pub mod bookmark;
pub mod playlist;
pub mod quick_access;

use std::path::PathBuf;

pub use archive::{ArchiveEntry, ArchiveHandle, ArchiveLocation, ArchiveProvider, ZipArchiveProvider};
pub use bookmark::{BookmarkKind, BookmarkNode, BookmarkSource, BookmarkTree};
pub use playlist::{PlaylistBook, PlaylistEntry, PlaylistSource};
pub use quick_access::{QuickAccessEntry, QuickAccessList, QuickAccessSource};

/// What happened to a persisted tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeAction {
    Add,
    Remove,
    Rename,
    Move,
    /// A subtree was swapped for another one.
    Replace,
    /// The whole tree was reloaded.
    Reset,
}

/// A change event raised by a bookmark tree or playlist book.
///
/// `parent` is the folder (or playlist file) whose direct children changed.
/// For [`TreeAction::Move`], `old_parent` names the folder the node left.
#[derive(Debug, Clone)]
pub struct TreeChange<N> {
    pub action: TreeAction,
    pub parent: PathBuf,
    pub node: Option<N>,
    pub old_parent: Option<PathBuf>,
}

impl<N> TreeChange<N> {
    pub fn new(action: TreeAction, parent: impl Into<PathBuf>, node: Option<N>) -> Self {
        Self {
            action,
            parent: parent.into(),
            node,
            old_parent: None,
        }
    }

    /// `true` for changes that invalidate every view of the tree.
    pub fn is_wholesale(&self) -> bool {
        matches!(self.action, TreeAction::Replace | TreeAction::Reset)
    }
}
