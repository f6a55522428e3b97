//! Real-filesystem access for foldr.
//!
//! [`ops`] turns directory listings into [`crate::item::FolderItem`]s and
//! hosts the visibility helpers; [`watcher`] reports per-entry changes.

pub mod ops;
pub mod watcher;

pub use ops::{
    is_first_archive_part, is_hidden, item_from_path, list_volumes, nearest_existing_directory,
    read_directory,
};
pub(crate) use ops::run_blocking;
pub use watcher::{translate_event, FolderWatcher};
