//! Sort orders and comparators for folder items.

use std::cmp::Ordering;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::folder_item::FolderItem;

/// The key a collection is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderOrder {
    #[default]
    FileName,
    FileNameDescending,
    Path,
    PathDescending,
    FileType,
    FileTypeDescending,
    TimeStamp,
    TimeStampDescending,
    EntryTime,
    EntryTimeDescending,
    Size,
    SizeDescending,
    Random,
}

impl FolderOrder {
    pub fn is_descending(self) -> bool {
        matches!(
            self,
            FolderOrder::FileNameDescending
                | FolderOrder::PathDescending
                | FolderOrder::FileTypeDescending
                | FolderOrder::TimeStampDescending
                | FolderOrder::EntryTimeDescending
                | FolderOrder::SizeDescending
        )
    }

    /// The ascending twin of a descending order (identity otherwise).
    pub fn ascending(self) -> Self {
        match self {
            FolderOrder::FileNameDescending => FolderOrder::FileName,
            FolderOrder::PathDescending => FolderOrder::Path,
            FolderOrder::FileTypeDescending => FolderOrder::FileType,
            FolderOrder::TimeStampDescending => FolderOrder::TimeStamp,
            FolderOrder::EntryTimeDescending => FolderOrder::EntryTime,
            FolderOrder::SizeDescending => FolderOrder::Size,
            other => other,
        }
    }

    /// Whether the item type partitions the ordering.
    ///
    /// File-type and random orders mix directories and files freely.
    pub fn partitions_by_type(self) -> bool {
        !matches!(self.ascending(), FolderOrder::FileType | FolderOrder::Random)
    }
}

/// Declares which sort keys a collection kind accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderClass {
    /// Name, type, time stamp, size and random.
    Normal,
    /// `Normal` plus full-path ordering.
    WithPath,
    /// `WithPath` plus entry-time ordering (bookmark and playlist backed).
    Full,
}

impl OrderClass {
    pub fn allows(self, order: FolderOrder) -> bool {
        match order.ascending() {
            FolderOrder::Path => self != OrderClass::Normal,
            FolderOrder::EntryTime => self == OrderClass::Full,
            _ => true,
        }
    }

    /// Returns `order` if legal for this class, otherwise [`FolderOrder::FileName`].
    pub fn validate(self, order: FolderOrder) -> FolderOrder {
        if self.allows(order) {
            order
        } else {
            FolderOrder::FileName
        }
    }
}

/// Locale-insensitive natural comparison: digit runs compare numerically so
/// `img2` sorts before `img10`. Case only breaks ties.
pub fn compare_natural(a: &str, b: &str) -> Ordering {
    alphanumeric_sort::compare_str(a.to_lowercase(), b.to_lowercase()).then_with(|| a.cmp(b))
}

fn extension_lower(name: &str) -> String {
    std::path::Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn compare_by_key(a: &FolderItem, b: &FolderItem, order: FolderOrder) -> Ordering {
    let by_name = || compare_natural(&a.name(), &b.name());
    match order.ascending() {
        FolderOrder::FileName | FolderOrder::Random => by_name(),
        FolderOrder::Path => compare_natural(
            &a.target().path().to_string_lossy(),
            &b.target().path().to_string_lossy(),
        ),
        FolderOrder::FileType => compare_natural(&extension_lower(&a.name()), &extension_lower(&b.name()))
            .then_with(by_name)
            .then_with(|| a.item_type().cmp(&b.item_type())),
        FolderOrder::TimeStamp => a
            .last_write_time()
            .cmp(&b.last_write_time())
            .then_with(by_name),
        FolderOrder::EntryTime => a
            .entry_time()
            .or(a.last_write_time())
            .cmp(&b.entry_time().or(b.last_write_time()))
            .then_with(by_name),
        FolderOrder::Size => a.length().cmp(&b.length()).then_with(by_name),
        _ => by_name(),
    }
}

/// Total order over two items for a non-random `order`.
///
/// Items are partitioned by [`super::ItemType`] first (always ascending, so
/// directories precede files even in descending orders) unless the order
/// mixes types.
pub fn compare_items(a: &FolderItem, b: &FolderItem, order: FolderOrder) -> Ordering {
    if order.partitions_by_type() {
        let type_cmp = a.item_type().cmp(&b.item_type());
        if type_cmp != Ordering::Equal {
            return type_cmp;
        }
    }

    let ord = compare_by_key(a, b, order);
    if order.is_descending() {
        ord.reverse()
    } else {
        ord
    }
}

/// Sorts `items` by `order`, returning a **new** vector.
///
/// [`FolderOrder::Random`] first sorts by name and then shuffles with a
/// generator seeded by `seed`, so the same item set always lands in the same
/// order for a given seed.
pub fn sort_items(items: &[Arc<FolderItem>], order: FolderOrder, seed: u64) -> Vec<Arc<FolderItem>> {
    let mut sorted: Vec<Arc<FolderItem>> = items.to_vec();
    sorted.sort_by(|a, b| compare_items(a, b, order));

    if order == FolderOrder::Random {
        let mut rng = StdRng::seed_from_u64(seed);
        sorted.shuffle(&mut rng);
    }

    sorted
}
