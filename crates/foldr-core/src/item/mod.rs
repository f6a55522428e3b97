//! Folder items and the orders they are sorted by.
//!
//! [`FolderItem`] is the unit every collection holds; [`order`] provides the
//! comparators ([`FolderOrder`], [`OrderClass`], [`sort_items`]).

pub mod folder_item;
pub mod order;

pub use folder_item::{Attributes, FolderItem, ItemSource, ItemType};
pub use order::{compare_items, compare_natural, sort_items, FolderOrder, OrderClass};
