//! Search results as a folder.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::{ChangeSynchronizer, ChangeTarget, FolderCollection, FolderSettings, LiveLink};
use crate::error::{CoreError, CoreResult};
use crate::fs::{item_from_path, run_blocking};
use crate::item::FolderItem;
use crate::query::QueryPath;
use crate::search::{SearchEngine, SearchEngineHost};

pub(crate) struct SearchBacking {
    host: Arc<SearchEngineHost>,
    root: PathBuf,
    keyword: String,
    engine: std::sync::Mutex<Option<Arc<SearchEngine>>>,
}

impl SearchBacking {
    pub(crate) fn new(host: Arc<SearchEngineHost>, root: PathBuf, keyword: String) -> Self {
        Self {
            host,
            root,
            keyword,
            engine: std::sync::Mutex::new(None),
        }
    }

    pub(crate) async fn populate(
        &self,
        place: &QueryPath,
        settings: &FolderSettings,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<FolderItem>> {
        let engine = self
            .host
            .engine_for(&self.root, self.host.settings().recursive);
        *self.engine.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&engine));

        let result = engine.search(&self.keyword, cancel).await?;
        let owner = place.clone();
        let items = run_blocking(move || {
            Ok(result
                .entries
                .iter()
                .filter_map(|path| item_from_path(&owner, path).ok())
                .collect::<Vec<_>>())
        })
        .await?;
        Ok(items
            .into_iter()
            .filter(|item| {
                let target = item.target();
                settings.accepts(target.path(), item.is_directory())
            })
            .collect())
    }

    /// Forwards the engine's live changes into the collection's synchronizer.
    pub(crate) fn attach(&self, collection: &Arc<FolderCollection>) -> CoreResult<Option<LiveLink>> {
        let engine = self
            .engine
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| CoreError::Search("search has not run".to_string()))?;
        let mut changes = engine.subscribe();

        let weak = Arc::downgrade(collection);
        let target: Weak<dyn ChangeTarget> = weak;
        let (sync, worker) = ChangeSynchronizer::spawn(target);
        let forward = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => sync.request(change),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("search result lost {missed} changes");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Ok(Some(LiveLink::default().with_task(forward).with_task(worker)))
    }
}
