//! Quick access: pinned locations.

use std::sync::Arc;

use crate::item::{Attributes, FolderItem, ItemSource};
use crate::query::{QueryPath, QueryScheme};
use crate::source::QuickAccessSource;

pub(crate) struct QuickAccessBacking {
    source: Arc<dyn QuickAccessSource>,
}

impl QuickAccessBacking {
    pub(crate) fn new(source: Arc<dyn QuickAccessSource>) -> Self {
        Self { source }
    }

    pub(crate) fn populate(&self, place: &QueryPath) -> Vec<FolderItem> {
        self.source
            .entries()
            .into_iter()
            .map(|entry| {
                let mut attributes = Attributes::QUICK_ACCESS | Attributes::SHORTCUT;
                let is_folder = entry.target.scheme() != QueryScheme::File
                    || entry.target.is_root()
                    || entry.target.path().is_dir();
                if is_folder {
                    attributes |= Attributes::DIRECTORY;
                }
                FolderItem::new(entry.name, place.clone(), entry.target, attributes)
                    .with_source(ItemSource::QuickAccess(entry.id))
            })
            .collect()
    }
}
