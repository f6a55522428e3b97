//! The top of everything: one entry per browsable scheme.

use crate::item::{Attributes, FolderItem};
use crate::query::{QueryPath, QueryScheme};

const SCHEMES: [QueryScheme; 4] = [
    QueryScheme::QuickAccess,
    QueryScheme::File,
    QueryScheme::Bookmark,
    QueryScheme::Playlist,
];

pub(crate) struct RootBacking;

impl RootBacking {
    pub(crate) fn populate(&self, place: &QueryPath) -> Vec<FolderItem> {
        SCHEMES
            .iter()
            .map(|&scheme| {
                FolderItem::new(
                    scheme.display_name(),
                    place.clone(),
                    QueryPath::scheme_root(scheme),
                    Attributes::DIRECTORY | Attributes::SYSTEM,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_each_scheme_root() {
        let items = RootBacking.populate(&QueryPath::scheme_root(QueryScheme::Root));
        assert_eq!(items.len(), 4);
        assert!(items.iter().all(|i| i.is_directory() && i.target().is_root()));
        assert!(items
            .iter()
            .any(|i| i.target() == QueryPath::scheme_root(QueryScheme::File)));
    }
}
