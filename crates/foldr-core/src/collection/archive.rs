//! Archive folders.

use std::collections::BTreeMap;
use std::path::Component;
use std::sync::Arc;

use super::FolderSettings;
use crate::error::CoreResult;
use crate::item::{Attributes, FolderItem, ItemSource};
use crate::query::QueryPath;
use crate::source::{ArchiveEntry, ArchiveLocation, ArchiveProvider};

pub(crate) struct ArchiveBacking {
    location: ArchiveLocation,
    provider: Arc<dyn ArchiveProvider>,
}

struct Child {
    is_directory: bool,
    entry: Option<ArchiveEntry>,
}

impl ArchiveBacking {
    pub(crate) fn new(location: ArchiveLocation, provider: Arc<dyn ArchiveProvider>) -> Self {
        Self { location, provider }
    }

    /// Lists the direct children of the inner directory. Directories that
    /// only appear as path prefixes of deeper entries are synthesized.
    pub(crate) async fn populate(
        &self,
        place: &QueryPath,
        settings: &FolderSettings,
    ) -> CoreResult<Vec<FolderItem>> {
        let archive = self.location.handle.path();
        let entries = self.provider.list_entries(archive).await?;

        let prefix: Vec<String> = self
            .location
            .inner
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        let mut children: BTreeMap<String, Child> = BTreeMap::new();
        for entry in entries {
            let parts: Vec<&str> = entry.path.split('/').filter(|p| !p.is_empty()).collect();
            if parts.len() <= prefix.len() || parts[..prefix.len()] != prefix[..] {
                continue;
            }
            let name = parts[prefix.len()].to_string();
            let is_leaf = parts.len() == prefix.len() + 1;
            let child = children.entry(name).or_insert(Child {
                is_directory: false,
                entry: None,
            });
            if is_leaf {
                child.is_directory |= entry.is_directory;
                child.entry = Some(entry);
            } else {
                child.is_directory = true;
            }
        }

        let dir = archive.join(&self.location.inner);
        Ok(children
            .into_iter()
            .filter(|(name, child)| settings.accepts(&dir.join(name), child.is_directory))
            .map(|(name, child)| {
                let mut attributes = Attributes::ARCHIVE_ENTRY;
                if child.is_directory {
                    attributes |= Attributes::DIRECTORY;
                }
                let target = QueryPath::file(dir.join(&name));
                let inner_path = child
                    .entry
                    .as_ref()
                    .map(|e| e.path.clone())
                    .unwrap_or_else(|| {
                        let mut parts = prefix.clone();
                        parts.push(name.clone());
                        parts.join("/")
                    });
                let item = FolderItem::new(
                    crate::nfc_string(&name),
                    place.clone(),
                    target,
                    attributes,
                )
                .with_source(ItemSource::ArchiveEntry(inner_path));
                match child.entry {
                    Some(entry) => item
                        .with_length(entry.length)
                        .with_last_write_time(entry.last_write_time),
                    None => item,
                }
            })
            .collect())
    }
}
