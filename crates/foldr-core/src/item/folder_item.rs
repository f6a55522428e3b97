//! Folder item representation.

use std::path::Path;
use std::sync::RwLock;
use std::time::SystemTime;

use bitflags::bitflags;

use crate::query::QueryPath;

bitflags! {
    /// Flags describing where an item comes from and what it can do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attributes: u32 {
        const DIRECTORY = 1 << 0;
        const DRIVE = 1 << 1;
        const EMPTY = 1 << 2;
        const SHORTCUT = 1 << 3;
        const ARCHIVE_ENTRY = 1 << 4;
        const BOOKMARK = 1 << 5;
        const QUICK_ACCESS = 1 << 6;
        const SYSTEM = 1 << 7;
        const READ_ONLY = 1 << 8;
        const PLAYLIST = 1 << 9;
        const PLAYLIST_MEMBER = 1 << 10;
    }
}

/// Ordering class used as the primary sort partition.
///
/// The declaration order is the sort order: `Empty` first, archive entries last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemType {
    Empty,
    Directory,
    DirectoryShortcut,
    File,
    FileShortcut,
    ArchiveEntry,
}

impl ItemType {
    /// Derives the ordering class from an attribute set.
    pub fn classify(attributes: Attributes) -> Self {
        let is_dir = attributes.contains(Attributes::DIRECTORY);
        let is_shortcut = attributes.contains(Attributes::SHORTCUT);
        if attributes.contains(Attributes::EMPTY) {
            ItemType::Empty
        } else if attributes.contains(Attributes::ARCHIVE_ENTRY) && !is_dir {
            ItemType::ArchiveEntry
        } else if is_dir && is_shortcut {
            ItemType::DirectoryShortcut
        } else if is_dir {
            ItemType::Directory
        } else if is_shortcut {
            ItemType::FileShortcut
        } else {
            ItemType::File
        }
    }

    pub fn is_directory_like(self) -> bool {
        matches!(self, ItemType::Directory | ItemType::DirectoryShortcut)
    }
}

/// Back-reference to the record an item was built from.
///
/// Variant-specific collections use it to find an item again without
/// re-resolving its identity from a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ItemSource {
    #[default]
    None,
    Volume,
    Bookmark(u64),
    Playlist(u64),
    QuickAccess(u64),
    ArchiveEntry(String),
}

/// One entry in a folder collection.
///
/// Items are shared as `Arc<FolderItem>`; the name and target are the only
/// mutable parts so that a rename keeps the same object alive for anyone
/// holding a reference to it.
#[derive(Debug)]
pub struct FolderItem {
    name: RwLock<String>,
    place: QueryPath,
    target: RwLock<QueryPath>,
    item_type: ItemType,
    attributes: Attributes,
    last_write_time: Option<SystemTime>,
    entry_time: Option<SystemTime>,
    length: u64,
    source: ItemSource,
}

impl FolderItem {
    /// Creates an item; the [`ItemType`] is derived from `attributes`.
    pub fn new(
        name: impl Into<String>,
        place: QueryPath,
        target: QueryPath,
        attributes: Attributes,
    ) -> Self {
        Self {
            name: RwLock::new(name.into()),
            place,
            target: RwLock::new(target),
            item_type: ItemType::classify(attributes),
            attributes,
            last_write_time: None,
            entry_time: None,
            length: 0,
            source: ItemSource::None,
        }
    }

    /// The sentinel standing in for "no items" in `place`.
    pub fn empty(place: QueryPath) -> Self {
        Self::new("", place.clone(), place, Attributes::EMPTY)
    }

    pub fn with_last_write_time(self, time: Option<SystemTime>) -> Self {
        Self {
            last_write_time: time,
            ..self
        }
    }

    pub fn with_entry_time(self, time: Option<SystemTime>) -> Self {
        Self {
            entry_time: time,
            ..self
        }
    }

    pub fn with_length(self, length: u64) -> Self {
        Self { length, ..self }
    }

    pub fn with_source(self, source: ItemSource) -> Self {
        Self { source, ..self }
    }

    pub fn name(&self) -> String {
        self.name.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn place(&self) -> &QueryPath {
        &self.place
    }

    /// The resolved location; differs from `place/name` for shortcuts and bookmarks.
    pub fn target(&self) -> QueryPath {
        self.target.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// `true` when the target's path equals `path`.
    pub fn targets(&self, path: &Path) -> bool {
        self.target.read().unwrap_or_else(|e| e.into_inner()).path() == path
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    pub fn attributes(&self) -> Attributes {
        self.attributes
    }

    pub fn last_write_time(&self) -> Option<SystemTime> {
        self.last_write_time
    }

    pub fn entry_time(&self) -> Option<SystemTime> {
        self.entry_time
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn source(&self) -> &ItemSource {
        &self.source
    }

    pub fn is_empty_sentinel(&self) -> bool {
        self.item_type == ItemType::Empty
    }

    pub fn is_directory(&self) -> bool {
        self.attributes.contains(Attributes::DIRECTORY)
    }

    pub fn is_shortcut(&self) -> bool {
        self.attributes.contains(Attributes::SHORTCUT)
    }

    /// Renames in place. Callers validate that the parent is unchanged.
    pub(crate) fn rename(&self, name: String, target: Option<QueryPath>) {
        *self.name.write().unwrap_or_else(|e| e.into_inner()) = name;
        if let Some(target) = target {
            *self.target.write().unwrap_or_else(|e| e.into_inner()) = target;
        }
    }
}
