//! foldr core library: virtual folders over unrelated backing stores.
//!
//! `foldr-core` presents the real filesystem, archive contents, a bookmark
//! tree, playlists, search results and a quick-access list as one kind of
//! folder, kept live as the underlying stores change. It has no UI; the
//! `foldr` binary is one consumer.
//!
//! # Modules
//!
//! - [`query`]: Location descriptors ([`QueryPath`], [`QueryScheme`]).
//! - [`item`]: [`FolderItem`] and the sort orders applied to it.
//! - [`collection`]: [`FolderCollection`], its variants, the [`FolderCollectionFactory`]
//!   and the [`ChangeSynchronizer`] that serializes external changes.
//! - [`search`]: Live keyword search ([`SearchEngine`], [`SearchEngineHost`]).
//! - [`cruise`]: Lazy depth-first traversal ([`CruiseTree`], [`CruiseSession`]).
//! - [`source`]: Stores the engine reads: archives, bookmarks, playlists, quick access.
//! - [`fs`]: Directory reading and the filesystem watcher.
//! - [`config`]: TOML configuration.
//! - [`event`]: Change vocabulary shared by watchers, search and collections.
//! - [`error`]: Unified error type ([`CoreError`]) and result alias ([`CoreResult`]).

pub mod collection;
pub mod config;
pub mod cruise;
pub mod error;
pub mod event;
pub mod fs;
pub mod item;
pub mod query;
pub mod search;
pub mod source;

pub use collection::{
    ChangeSynchronizer, ChangeTarget, CollectionKind, CollectionOptions, FolderCollection,
    FolderCollectionFactory, FolderSettings,
};
pub use config::settings::Config;
pub use cruise::{CruiseNode, CruiseSession, CruiseSettings, CruiseTree, NodeId};
pub use error::{CoreError, CoreResult};
pub use event::{ChangeAction, CollectionEvent, FsChange};
pub use item::{Attributes, FolderItem, FolderOrder, ItemSource, ItemType, OrderClass};
pub use query::{QueryPath, QueryScheme};
pub use search::{SearchEngine, SearchEngineHost, SearchMode, SearchSettings};

/// Normalises a string to NFC (composed) form.
///
/// macOS stores filenames in NFD (decomposed), which causes Korean Hangul
/// characters to appear as individual Jamo. This helper re-composes them.
pub fn nfc_string(s: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    s.nfc().collect()
}
