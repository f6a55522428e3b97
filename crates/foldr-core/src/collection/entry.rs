//! Real directories and the volume list.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use super::{ChangeSynchronizer, ChangeTarget, FolderCollection, FolderSettings, LiveLink};
use crate::error::CoreResult;
use crate::fs::{list_volumes, read_directory, run_blocking, FolderWatcher};
use crate::item::FolderItem;
use crate::query::QueryPath;

pub(crate) struct EntryBacking {
    dir: PathBuf,
}

impl EntryBacking {
    /// An empty `dir` lists the volumes.
    pub(crate) fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub(crate) async fn populate(
        &self,
        place: &QueryPath,
        settings: &FolderSettings,
    ) -> CoreResult<Vec<FolderItem>> {
        if self.dir.as_os_str().is_empty() {
            return Ok(list_volumes(place));
        }

        let (owner, dir) = (place.clone(), self.dir.clone());
        let items = run_blocking(move || read_directory(&owner, &dir)).await?;
        Ok(items
            .into_iter()
            .filter(|item| settings.accepts(&self.dir.join(item.name()), item.is_directory()))
            .collect())
    }

    /// Watches the directory's direct children.
    pub(crate) fn attach(&self, collection: &Arc<FolderCollection>) -> CoreResult<Option<LiveLink>> {
        if self.dir.as_os_str().is_empty() {
            return Ok(None);
        }
        let weak = Arc::downgrade(collection);
        let target: Weak<dyn ChangeTarget> = weak;
        let (sync, worker) = ChangeSynchronizer::spawn(target);
        let watcher = FolderWatcher::new(&self.dir, false, move |change| sync.request(change))?;
        Ok(Some(
            LiveLink::default().with_watcher(watcher).with_task(worker),
        ))
    }
}
