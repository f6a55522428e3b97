//! Folder collections: the live, ordered item list of one location.
//!
//! A [`FolderCollection`] is one struct for every kind of location. What
//! differs between kinds (how items are listed, how the list is kept live)
//! is supplied at construction by [`FolderCollectionFactory`] as a backing
//! value, so sorting and mutation behave the same everywhere.
//!
//! The item list always holds at least one item. When nothing is listed it
//! holds the collection's empty sentinel, which is dropped as soon as a real
//! item arrives and restored when the last one leaves.

mod archive;
mod bookmark;
mod entry;
pub mod factory;
mod playlist;
mod quick_access;
mod root;
mod search;
pub mod sync;

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult};
use crate::event::{ChangeAction, CollectionEvent, FsChange};
use crate::fs::{is_first_archive_part, is_hidden, run_blocking, FolderWatcher};
use crate::item::{sort_items, FolderItem, FolderOrder, ItemSource, OrderClass};
use crate::query::{QueryPath, QueryScheme};

pub use factory::{CollectionOptions, FolderCollectionFactory};
pub use sync::{ChangeSynchronizer, ChangeTarget};

const EVENT_CAPACITY: usize = 256;

/// Runtime settings shared by every collection a factory builds.
#[derive(Debug, Clone)]
pub struct FolderSettings {
    pub show_hidden: bool,
    /// Insert newly observed items at their sorted position instead of appending.
    pub insert_sorted: bool,
    /// Hide the second and later volumes of multi-part archives.
    pub first_archive_part_only: bool,
    /// File names matching this pattern are hidden.
    pub exclude: Option<Regex>,
    pub default_order: FolderOrder,
    /// File extensions recognised as playlists, without the dot.
    pub playlist_extensions: Vec<String>,
}

impl Default for FolderSettings {
    fn default() -> Self {
        Self {
            show_hidden: false,
            insert_sorted: true,
            first_archive_part_only: true,
            exclude: None,
            default_order: FolderOrder::default(),
            playlist_extensions: vec!["nvpls".to_string()],
        }
    }
}

impl FolderSettings {
    /// Visibility policy for a filesystem or archive entry.
    pub fn accepts(&self, path: &Path, is_dir: bool) -> bool {
        if !self.show_hidden && is_hidden(path) {
            return false;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.exclude.as_ref().is_some_and(|re| re.is_match(&name)) {
            return false;
        }
        if self.first_archive_part_only && !is_dir && !is_first_archive_part(&name) {
            return false;
        }
        true
    }

    /// `true` if `path` has one of the playlist extensions.
    pub fn is_playlist_file(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy();
                self.playlist_extensions
                    .iter()
                    .any(|p| p.trim_start_matches('.').eq_ignore_ascii_case(&ext))
            })
            .unwrap_or(false)
    }
}

/// The kind of backing store behind a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Entry,
    Archive,
    Search,
    Bookmark,
    Playlist,
    QuickAccess,
    Root,
}

impl CollectionKind {
    /// Which sort keys are legal for this kind.
    pub fn order_class(self) -> OrderClass {
        match self {
            CollectionKind::Entry | CollectionKind::Archive | CollectionKind::Root => {
                OrderClass::Normal
            }
            CollectionKind::Search | CollectionKind::QuickAccess => OrderClass::WithPath,
            CollectionKind::Bookmark | CollectionKind::Playlist => OrderClass::Full,
        }
    }
}

/// Kind-specific population and live-update strategy.
pub(crate) enum Backing {
    Entry(entry::EntryBacking),
    Archive(archive::ArchiveBacking),
    Search(search::SearchBacking),
    Bookmark(bookmark::BookmarkBacking),
    Playlist(playlist::PlaylistBacking),
    QuickAccess(quick_access::QuickAccessBacking),
    Root(root::RootBacking),
}

impl Backing {
    fn kind(&self) -> CollectionKind {
        match self {
            Backing::Entry(_) => CollectionKind::Entry,
            Backing::Archive(_) => CollectionKind::Archive,
            Backing::Search(_) => CollectionKind::Search,
            Backing::Bookmark(_) => CollectionKind::Bookmark,
            Backing::Playlist(_) => CollectionKind::Playlist,
            Backing::QuickAccess(_) => CollectionKind::QuickAccess,
            Backing::Root(_) => CollectionKind::Root,
        }
    }

    async fn populate(
        &self,
        place: &QueryPath,
        settings: &FolderSettings,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<FolderItem>> {
        match self {
            Backing::Entry(b) => b.populate(place, settings).await,
            Backing::Archive(b) => b.populate(place, settings).await,
            Backing::Search(b) => b.populate(place, settings, cancel).await,
            Backing::Bookmark(b) => b.populate(place),
            Backing::Playlist(b) => b.populate(place).await,
            Backing::QuickAccess(b) => Ok(b.populate(place)),
            Backing::Root(b) => Ok(b.populate(place)),
        }
    }

    /// Builds the item for a newly observed path, or `None` if it is hidden.
    async fn create_item(
        &self,
        place: &QueryPath,
        path: &Path,
        settings: &FolderSettings,
    ) -> CoreResult<Option<FolderItem>> {
        match self {
            Backing::Entry(_) | Backing::Search(_) => {
                let (owner, target) = (place.clone(), path.to_path_buf());
                let item =
                    run_blocking(move || crate::fs::item_from_path(&owner, &target)).await?;
                Ok(settings.accepts(path, item.is_directory()).then_some(item))
            }
            other => Err(CoreError::Unsupported(format!(
                "{:?} collections are not fed by path",
                other.kind()
            ))),
        }
    }

    fn attach(&self, collection: &Arc<FolderCollection>) -> CoreResult<Option<LiveLink>> {
        match self {
            Backing::Entry(b) => b.attach(collection),
            Backing::Search(b) => b.attach(collection),
            Backing::Bookmark(b) => b.attach(collection),
            Backing::Playlist(b) => b.attach(collection),
            Backing::Archive(_) | Backing::QuickAccess(_) | Backing::Root(_) => Ok(None),
        }
    }
}

/// What keeps a collection live: a watcher and the tasks feeding it changes.
///
/// Dropping the link stops everything it holds.
#[derive(Default)]
pub(crate) struct LiveLink {
    watcher: Option<FolderWatcher>,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveLink {
    pub(crate) fn with_watcher(mut self, watcher: FolderWatcher) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub(crate) fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.tasks.push(task);
        self
    }
}

impl Drop for LiveLink {
    fn drop(&mut self) {
        self.watcher.take();
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// The ordered item list of one location.
pub struct FolderCollection {
    place: QueryPath,
    backing: Backing,
    settings: Arc<FolderSettings>,
    order: FolderOrder,
    seed: u64,
    watch: bool,
    items: Mutex<Vec<Arc<FolderItem>>>,
    empty: Arc<FolderItem>,
    initialized: AtomicBool,
    disposed: AtomicBool,
    needs_reload: AtomicBool,
    events: broadcast::Sender<CollectionEvent>,
    live: Mutex<Option<LiveLink>>,
}

impl std::fmt::Debug for FolderCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderCollection")
            .field("place", &self.place)
            .field("kind", &self.kind())
            .field("order", &self.order)
            .field("len", &self.lock_items().len())
            .finish_non_exhaustive()
    }
}

impl FolderCollection {
    pub(crate) fn new(
        place: QueryPath,
        backing: Backing,
        settings: Arc<FolderSettings>,
        order: FolderOrder,
        seed: u64,
        watch: bool,
    ) -> Arc<Self> {
        let order = backing.kind().order_class().validate(order);
        let empty = Arc::new(FolderItem::empty(place.clone()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            place,
            backing,
            settings,
            order,
            seed,
            watch,
            items: Mutex::new(vec![Arc::clone(&empty)]),
            empty,
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            needs_reload: AtomicBool::new(false),
            events,
            live: Mutex::new(None),
        })
    }

    pub fn place(&self) -> &QueryPath {
        &self.place
    }

    pub fn kind(&self) -> CollectionKind {
        self.backing.kind()
    }

    pub fn order(&self) -> FolderOrder {
        self.order
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn order_class(&self) -> OrderClass {
        self.kind().order_class()
    }

    /// Snapshot of the current items. Never empty.
    pub fn items(&self) -> Vec<Arc<FolderItem>> {
        self.lock_items().clone()
    }

    /// Number of items, counting the empty sentinel.
    pub fn len(&self) -> usize {
        self.lock_items().len()
    }

    /// `true` when only the empty sentinel is present.
    pub fn is_empty(&self) -> bool {
        self.lock_items().iter().all(|i| i.is_empty_sentinel())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// `true` once the backing store was replaced and patches no longer apply.
    pub fn needs_reload(&self) -> bool {
        self.needs_reload.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CollectionEvent> {
        self.events.subscribe()
    }

    /// Whether a request for `place` with `order`/`seed` needs a new collection.
    pub fn is_dirty(&self, place: &QueryPath, order: FolderOrder, seed: u64) -> bool {
        self.place != *place
            || self.order != self.order_class().validate(order)
            || (self.order == FolderOrder::Random && self.seed != seed)
            || self.needs_reload()
    }

    /// The location one level up, or `None` at the root of everything.
    pub fn parent_query(&self) -> Option<QueryPath> {
        match self.kind() {
            CollectionKind::Root => None,
            _ if self.place.is_root() => Some(QueryPath::scheme_root(QueryScheme::Root)),
            CollectionKind::Search => Some(self.place.clone().without_search()),
            CollectionKind::Archive => self
                .place
                .parent()
                .map(|p| QueryPath::file(p.path())),
            _ => self.place.parent(),
        }
    }

    /// Populates the item list.
    ///
    /// Population failures leave the collection holding only the empty
    /// sentinel. A collection disposed meanwhile discards the result.
    /// Live updates start afterwards when the collection was built with
    /// watching enabled.
    ///
    /// # Errors
    ///
    /// [`CoreError::Cancelled`] when `cancel` fires; nothing else escapes.
    pub async fn initialize_items(self: &Arc<Self>, cancel: &CancellationToken) -> CoreResult<()> {
        let populated = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CoreError::Cancelled),
            result = self.backing.populate(&self.place, &self.settings, cancel) => result,
        };
        let items = match populated {
            Ok(items) => items,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                tracing::warn!("{}: could not list items: {e}", self.place);
                Vec::new()
            }
        };
        if self.is_disposed() {
            tracing::debug!("{}: disposed during population, result dropped", self.place);
            return Ok(());
        }

        let mut targets = HashSet::new();
        let items: Vec<Arc<FolderItem>> = items
            .into_iter()
            .filter(|i| targets.insert(i.target()))
            .map(Arc::new)
            .collect();
        let sorted = sort_items(&items, self.order, self.seed);
        tracing::debug!("{}: {} items", self.place, sorted.len());
        {
            let mut list = self.lock_items();
            *list = if sorted.is_empty() {
                vec![Arc::clone(&self.empty)]
            } else {
                sorted
            };
        }
        self.initialized.store(true, Ordering::Release);

        if self.watch {
            self.attach_live();
        }
        Ok(())
    }

    fn attach_live(self: &Arc<Self>) {
        match self.backing.attach(self) {
            Ok(Some(link)) => {
                let mut live = self.lock_live();
                if self.is_disposed() {
                    drop(live);
                    drop(link);
                    tracing::debug!("{}: disposed before live updates started", self.place);
                } else {
                    *live = Some(link);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("{}: live updates unavailable: {e}", self.place),
        }
    }

    /// Stops live updates. Safe while population is still running.
    pub fn dispose(&self) {
        let link = {
            let mut live = self.lock_live();
            self.disposed.store(true, Ordering::Release);
            live.take()
        };
        if link.is_some() {
            tracing::debug!("{}: detached", self.place);
        }
    }

    /// The item whose target (or own location) is `path`.
    pub fn find(&self, path: &Path) -> Option<Arc<FolderItem>> {
        self.lock_items()
            .iter()
            .find(|i| !i.is_empty_sentinel() && located_at(i, path))
            .cloned()
    }

    /// The item built from `source`.
    pub fn find_source(&self, source: &ItemSource) -> Option<Arc<FolderItem>> {
        self.lock_items()
            .iter()
            .find(|i| !i.is_empty_sentinel() && i.source() == source)
            .cloned()
    }

    /// Adds the entry at `path` unless an item already targets it.
    ///
    /// Returns the inserted item, or `None` when nothing was added.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the path vanished before it could be read.
    /// - [`CoreError::Unsupported`] for collections not fed by paths.
    pub async fn add_item(&self, path: &Path) -> CoreResult<Option<Arc<FolderItem>>> {
        if self.find(path).is_some() {
            return Ok(None);
        }
        let Some(item) = self
            .backing
            .create_item(&self.place, path, &self.settings)
            .await?
        else {
            return Ok(None);
        };
        Ok(self.insert_item(item))
    }

    /// Inserts a ready-made item. A second item with the same target is refused.
    pub fn insert_item(&self, item: FolderItem) -> Option<Arc<FolderItem>> {
        let item = Arc::new(item);
        {
            let mut items = self.lock_items();
            let target = item.target();
            if items
                .iter()
                .any(|i| !i.is_empty_sentinel() && i.target() == target)
            {
                return None;
            }
            items.retain(|i| !i.is_empty_sentinel());
            let index = self.insertion_index(&items, &item);
            items.insert(index, Arc::clone(&item));
        }
        tracing::debug!("{}: added {}", self.place, item.name());
        self.emit(CollectionEvent::Changed {
            action: ChangeAction::Add,
            item: Arc::clone(&item),
        });
        Some(item)
    }

    fn insertion_index(&self, items: &[Arc<FolderItem>], item: &Arc<FolderItem>) -> usize {
        if self.order == FolderOrder::Random || !self.settings.insert_sorted {
            return items.len();
        }
        let mut candidates = items.to_vec();
        candidates.push(Arc::clone(item));
        sort_items(&candidates, self.order, self.seed)
            .iter()
            .position(|i| Arc::ptr_eq(i, item))
            .map_or(items.len(), |index| index.min(items.len()))
    }

    /// Removes the item at `path`. Returns it if something was removed.
    pub fn delete_item(&self, path: &Path) -> Option<Arc<FolderItem>> {
        let item = self.find(path)?;
        self.remove_item(&item).then_some(item)
    }

    /// Removes `item`, announcing the removal before and after it happens.
    pub fn remove_item(&self, item: &Arc<FolderItem>) -> bool {
        if item.is_empty_sentinel() || !self.lock_items().iter().any(|i| Arc::ptr_eq(i, item)) {
            return false;
        }
        self.emit(CollectionEvent::Changing {
            action: ChangeAction::Remove,
            item: Arc::clone(item),
        });
        let removed = {
            let mut items = self.lock_items();
            match items.iter().position(|i| Arc::ptr_eq(i, item)) {
                Some(index) => {
                    items.remove(index);
                    if items.is_empty() {
                        items.push(Arc::clone(&self.empty));
                    }
                    true
                }
                None => false,
            }
        };
        if removed {
            tracing::debug!("{}: removed {}", self.place, item.name());
            self.emit(CollectionEvent::Changed {
                action: ChangeAction::Remove,
                item: Arc::clone(item),
            });
        }
        removed
    }

    /// Removes the item built from `source`.
    pub fn remove_source(&self, source: &ItemSource) -> bool {
        match self.find_source(source) {
            Some(item) => self.remove_item(&item),
            None => false,
        }
    }

    /// Renames the item at `old` to the name of `new`, keeping the same object.
    ///
    /// An unknown `old` is treated as the appearance of `new`. A new name
    /// that the visibility policy hides removes the item. An item already
    /// at `new` is replaced.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArgument`] if `new` lies in another directory.
    pub async fn rename_item(&self, old: &Path, new: &Path) -> CoreResult<()> {
        if old.parent() != new.parent() {
            return Err(CoreError::InvalidArgument(format!(
                "rename of {} to {} changes directory",
                old.display(),
                new.display()
            )));
        }
        let Some(item) = self.find(old) else {
            self.add_item(new).await?;
            return Ok(());
        };
        let name = new
            .file_name()
            .map(|n| crate::nfc_string(&n.to_string_lossy()))
            .ok_or_else(|| CoreError::InvalidName(new.display().to_string()))?;

        if !self.settings.accepts(new, item.is_directory()) {
            self.remove_item(&item);
            return Ok(());
        }

        self.displace(&item, |other| located_at(other, new));
        let target = (!item.is_shortcut()).then(|| QueryPath::new(item.target().scheme(), new));
        self.rename_in_place(&item, name, target);
        Ok(())
    }

    /// Renames the item built from `source`.
    pub fn rename_source(&self, source: &ItemSource, name: String, target: Option<QueryPath>) -> bool {
        match self.find_source(source) {
            Some(item) => {
                self.rename_in_place(&item, name, target);
                true
            }
            None => false,
        }
    }

    fn rename_in_place(&self, item: &Arc<FolderItem>, name: String, target: Option<QueryPath>) {
        if let Some(target) = &target {
            self.displace(item, |other| other.target() == *target);
        }
        {
            let _items = self.lock_items();
            item.rename(name, target);
        }
        tracing::debug!("{}: renamed to {}", self.place, item.name());
        self.emit(CollectionEvent::Changed {
            action: ChangeAction::Rename,
            item: Arc::clone(item),
        });
    }

    /// Removes every item other than `keep` that `clashes`.
    fn displace(&self, keep: &Arc<FolderItem>, clashes: impl Fn(&FolderItem) -> bool) {
        let displaced: Vec<Arc<FolderItem>> = self
            .lock_items()
            .iter()
            .filter(|i| !i.is_empty_sentinel() && !Arc::ptr_eq(i, keep) && clashes(i))
            .cloned()
            .collect();
        for other in displaced {
            self.remove_item(&other);
        }
    }

    /// Flags the collection for a full rebuild and tells subscribers.
    pub fn mark_needs_reload(&self) {
        if !self.needs_reload.swap(true, Ordering::AcqRel) {
            tracing::debug!("{}: backing store replaced", self.place);
        }
        self.emit(CollectionEvent::Reset);
    }

    fn emit(&self, event: CollectionEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn lock_items(&self) -> MutexGuard<'_, Vec<Arc<FolderItem>>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_live(&self) -> MutexGuard<'_, Option<LiveLink>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ChangeTarget for FolderCollection {
    async fn apply_change(&self, change: FsChange) -> CoreResult<()> {
        if self.is_disposed() {
            return Ok(());
        }
        match change {
            FsChange::Created(path) => self.add_item(&path).await.map(|_| ()),
            FsChange::Deleted(path) => {
                self.delete_item(&path);
                Ok(())
            }
            FsChange::Renamed { from, to } => self.rename_item(&from, &to).await,
        }
    }
}

fn located_at(item: &FolderItem, path: &Path) -> bool {
    item.targets(path) || item.place().path().join(item.name()) == path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Attributes, ItemType};
    use std::fs;
    use tempfile::TempDir;

    fn entry_collection(dir: &Path, settings: FolderSettings) -> Arc<FolderCollection> {
        FolderCollection::new(
            QueryPath::file(dir),
            Backing::Entry(entry::EntryBacking::new(dir)),
            Arc::new(settings),
            FolderOrder::FileName,
            0,
            false,
        )
    }

    async fn populated(dir: &Path) -> Arc<FolderCollection> {
        let collection = entry_collection(dir, FolderSettings::default());
        collection
            .initialize_items(&CancellationToken::new())
            .await
            .unwrap();
        collection
    }

    fn names(collection: &FolderCollection) -> Vec<String> {
        collection.items().iter().map(|i| i.name()).collect()
    }

    #[test]
    fn new_collection_holds_empty_sentinel() {
        let tmp = TempDir::new().unwrap();
        let collection = entry_collection(tmp.path(), FolderSettings::default());
        assert_eq!(collection.len(), 1);
        assert!(collection.is_empty());
        assert!(!collection.is_initialized());
    }

    #[tokio::test]
    async fn population_sorts_directories_first() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.zip"), "").unwrap();
        fs::write(tmp.path().join("a.jpg"), "").unwrap();
        fs::create_dir(tmp.path().join("c")).unwrap();

        let collection = populated(tmp.path()).await;
        assert_eq!(names(&collection), vec!["c", "a.jpg", "b.zip"]);
        assert!(collection.is_initialized());
    }

    #[tokio::test]
    async fn population_failure_degrades_to_empty() {
        let tmp = TempDir::new().unwrap();
        let collection = populated(&tmp.path().join("missing")).await;
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.items()[0].item_type(), ItemType::Empty);
    }

    #[tokio::test]
    async fn cancellation_propagates() {
        let tmp = TempDir::new().unwrap();
        let collection = entry_collection(tmp.path(), FolderSettings::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = collection.initialize_items(&cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(!collection.is_initialized());
    }

    #[tokio::test]
    async fn disposed_collection_discards_population() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.jpg"), "").unwrap();
        let collection = entry_collection(tmp.path(), FolderSettings::default());
        collection.dispose();
        collection
            .initialize_items(&CancellationToken::new())
            .await
            .unwrap();
        assert!(collection.is_empty());
    }

    #[tokio::test]
    async fn hidden_and_excluded_entries_are_filtered() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".hidden"), "").unwrap();
        fs::write(tmp.path().join("keep.jpg"), "").unwrap();
        fs::write(tmp.path().join("skip.tmp"), "").unwrap();
        fs::write(tmp.path().join("book.part1.rar"), "").unwrap();
        fs::write(tmp.path().join("book.part2.rar"), "").unwrap();

        let settings = FolderSettings {
            exclude: Some(Regex::new(r"\.tmp$").unwrap()),
            ..FolderSettings::default()
        };
        let collection = entry_collection(tmp.path(), settings);
        collection
            .initialize_items(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(names(&collection), vec!["book.part1.rar", "keep.jpg"]);
    }

    #[tokio::test]
    async fn add_item_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let collection = populated(tmp.path()).await;
        let path = tmp.path().join("new.jpg");
        fs::write(&path, "").unwrap();

        assert!(collection.add_item(&path).await.unwrap().is_some());
        assert!(collection.add_item(&path).await.unwrap().is_none());
        assert_eq!(names(&collection), vec!["new.jpg"]);
    }

    #[tokio::test]
    async fn add_item_inserts_sorted() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.jpg"), "").unwrap();
        fs::write(tmp.path().join("c.jpg"), "").unwrap();
        let collection = populated(tmp.path()).await;

        let path = tmp.path().join("b.jpg");
        fs::write(&path, "").unwrap();
        collection.add_item(&path).await.unwrap();
        let dir = tmp.path().join("d");
        fs::create_dir(&dir).unwrap();
        collection.add_item(&dir).await.unwrap();

        assert_eq!(names(&collection), vec!["d", "a.jpg", "b.jpg", "c.jpg"]);
    }

    #[tokio::test]
    async fn add_item_appends_when_unsorted() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.jpg"), "").unwrap();
        let settings = FolderSettings {
            insert_sorted: false,
            ..FolderSettings::default()
        };
        let collection = entry_collection(tmp.path(), settings);
        collection
            .initialize_items(&CancellationToken::new())
            .await
            .unwrap();

        let path = tmp.path().join("a.jpg");
        fs::write(&path, "").unwrap();
        collection.add_item(&path).await.unwrap();
        assert_eq!(names(&collection), vec!["b.jpg", "a.jpg"]);
    }

    #[tokio::test]
    async fn add_item_ignores_hidden() {
        let tmp = TempDir::new().unwrap();
        let collection = populated(tmp.path()).await;
        let path = tmp.path().join(".secret");
        fs::write(&path, "").unwrap();
        assert!(collection.add_item(&path).await.unwrap().is_none());
        assert!(collection.is_empty());
    }

    #[tokio::test]
    async fn deleting_last_item_restores_sentinel() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("only.jpg");
        fs::write(&path, "").unwrap();
        let collection = populated(tmp.path()).await;
        let mut events = collection.subscribe();

        let removed = collection.delete_item(&path).unwrap();
        assert_eq!(removed.name(), "only.jpg");
        assert_eq!(collection.len(), 1);
        assert!(collection.items()[0].is_empty_sentinel());

        let changing = events.try_recv().unwrap();
        assert!(matches!(changing, CollectionEvent::Changing { action: ChangeAction::Remove, .. }));
        let changed = events.try_recv().unwrap();
        assert!(matches!(changed, CollectionEvent::Changed { action: ChangeAction::Remove, .. }));
    }

    #[tokio::test]
    async fn delete_then_add_restores_contents() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.jpg"), "").unwrap();
        fs::write(tmp.path().join("b.jpg"), "").unwrap();
        let collection = populated(tmp.path()).await;
        let before = names(&collection);

        collection.delete_item(&tmp.path().join("a.jpg"));
        collection.add_item(&tmp.path().join("a.jpg")).await.unwrap();
        assert_eq!(names(&collection), before);
    }

    #[tokio::test]
    async fn rename_preserves_identity() {
        let tmp = TempDir::new().unwrap();
        let old = tmp.path().join("old.jpg");
        fs::write(&old, "").unwrap();
        let collection = populated(tmp.path()).await;
        let held = collection.find(&old).unwrap();

        let new = tmp.path().join("new.jpg");
        collection.rename_item(&old, &new).await.unwrap();

        assert_eq!(held.name(), "new.jpg");
        assert!(held.targets(&new));
        assert!(Arc::ptr_eq(&held, &collection.find(&new).unwrap()));
    }

    #[tokio::test]
    async fn rename_across_directories_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let old = tmp.path().join("a.jpg");
        fs::write(&old, "").unwrap();
        let collection = populated(tmp.path()).await;

        let err = collection
            .rename_item(&old, &tmp.path().join("sub").join("a.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
        assert_eq!(names(&collection), vec!["a.jpg"]);
    }

    #[tokio::test]
    async fn rename_over_existing_item_replaces_it() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.jpg");
        let b = tmp.path().join("b.jpg");
        fs::write(&a, "").unwrap();
        fs::write(&b, "").unwrap();
        let collection = populated(tmp.path()).await;
        let moved = collection.find(&a).unwrap();
        let mut events = collection.subscribe();

        collection.rename_item(&a, &b).await.unwrap();

        assert_eq!(names(&collection), vec!["b.jpg"]);
        assert!(Arc::ptr_eq(&moved, &collection.find(&b).unwrap()));
        assert!(matches!(
            events.try_recv().unwrap(),
            CollectionEvent::Changing { action: ChangeAction::Remove, .. }
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            CollectionEvent::Changed { action: ChangeAction::Remove, .. }
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            CollectionEvent::Changed { action: ChangeAction::Rename, .. }
        ));
    }

    #[tokio::test]
    async fn rename_of_unknown_item_into_other_directory_is_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub").join("x.jpg"), "").unwrap();
        let collection = populated(tmp.path()).await;

        let err = collection
            .rename_item(&tmp.path().join("ghost.jpg"), &tmp.path().join("sub").join("x.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
        assert_eq!(names(&collection), vec!["sub"]);
    }

    #[tokio::test]
    async fn population_keeps_one_item_per_target() {
        let tmp = TempDir::new().unwrap();
        let list = tmp.path().join("list.nvpls");
        let book = crate::source::PlaylistBook::new();
        let pic = tmp.path().join("p.jpg");
        fs::write(&pic, "").unwrap();
        book.add(&list, &pic);
        book.add(&list, &pic);

        let collection = FolderCollection::new(
            QueryPath::new(QueryScheme::Playlist, &list),
            Backing::Playlist(playlist::PlaylistBacking::new(Arc::new(book), list.clone())),
            Arc::new(FolderSettings::default()),
            FolderOrder::FileName,
            0,
            false,
        );
        collection
            .initialize_items(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(names(&collection), vec!["p.jpg"]);
    }

    #[tokio::test]
    async fn live_link_is_not_kept_after_dispose() {
        let tmp = TempDir::new().unwrap();
        let collection = entry_collection(tmp.path(), FolderSettings::default());
        collection.dispose();
        collection.attach_live();
        assert!(collection.lock_live().is_none());

        let fresh = entry_collection(tmp.path(), FolderSettings::default());
        fresh.attach_live();
        assert!(fresh.lock_live().is_some());
        fresh.dispose();
        assert!(fresh.lock_live().is_none());
    }

    #[tokio::test]
    async fn rename_of_unknown_item_adds_it() {
        let tmp = TempDir::new().unwrap();
        let collection = populated(tmp.path()).await;
        let new = tmp.path().join("appeared.jpg");
        fs::write(&new, "").unwrap();
        collection
            .rename_item(&tmp.path().join("never_seen.jpg"), &new)
            .await
            .unwrap();
        assert_eq!(names(&collection), vec!["appeared.jpg"]);
    }

    #[tokio::test]
    async fn rename_to_hidden_name_removes() {
        let tmp = TempDir::new().unwrap();
        let old = tmp.path().join("a.jpg");
        fs::write(&old, "").unwrap();
        let collection = populated(tmp.path()).await;
        collection
            .rename_item(&old, &tmp.path().join(".a.jpg"))
            .await
            .unwrap();
        assert!(collection.is_empty());
    }

    #[test]
    fn dirty_predicate() {
        let tmp = TempDir::new().unwrap();
        let collection = entry_collection(tmp.path(), FolderSettings::default());
        let place = QueryPath::file(tmp.path());

        assert!(!collection.is_dirty(&place, FolderOrder::FileName, 7));
        assert!(collection.is_dirty(&place, FolderOrder::Size, 0));
        assert!(collection.is_dirty(&place.clone().with_search("x"), FolderOrder::FileName, 0));
        assert!(collection.is_dirty(&QueryPath::file("/elsewhere"), FolderOrder::FileName, 0));
        // Entry time is not legal here and falls back to file name.
        assert!(!collection.is_dirty(&place, FolderOrder::EntryTime, 0));
    }

    #[test]
    fn illegal_order_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let collection = FolderCollection::new(
            QueryPath::file(tmp.path()),
            Backing::Entry(entry::EntryBacking::new(tmp.path())),
            Arc::new(FolderSettings::default()),
            FolderOrder::Path,
            0,
            false,
        );
        assert_eq!(collection.order(), FolderOrder::FileName);
    }

    #[test]
    fn insert_item_refuses_duplicate_target() {
        let tmp = TempDir::new().unwrap();
        let collection = entry_collection(tmp.path(), FolderSettings::default());
        let place = QueryPath::file(tmp.path());
        let make = || {
            FolderItem::new(
                "x",
                place.clone(),
                place.join("x"),
                Attributes::empty(),
            )
        };
        assert!(collection.insert_item(make()).is_some());
        assert!(collection.insert_item(make()).is_none());
        assert_eq!(collection.len(), 1);
        assert!(!collection.is_empty());
    }

    #[test]
    fn parent_queries() {
        let tmp = TempDir::new().unwrap();
        let collection = entry_collection(tmp.path(), FolderSettings::default());
        assert_eq!(
            collection.parent_query(),
            Some(QueryPath::file(tmp.path().parent().unwrap()))
        );

        let root = FolderCollection::new(
            QueryPath::scheme_root(QueryScheme::Root),
            Backing::Root(root::RootBacking),
            Arc::new(FolderSettings::default()),
            FolderOrder::FileName,
            0,
            false,
        );
        assert_eq!(root.parent_query(), None);
    }

    #[test]
    fn playlist_extension_detection() {
        let settings = FolderSettings::default();
        assert!(settings.is_playlist_file(Path::new("/a/list.NVPLS")));
        assert!(!settings.is_playlist_file(Path::new("/a/list.zip")));
    }

    #[tokio::test]
    async fn apply_change_routes_to_mutations() {
        let tmp = TempDir::new().unwrap();
        let collection = populated(tmp.path()).await;
        let a = tmp.path().join("a.jpg");
        fs::write(&a, "").unwrap();

        collection
            .apply_change(FsChange::Created(a.clone()))
            .await
            .unwrap();
        assert_eq!(names(&collection), vec!["a.jpg"]);

        collection
            .apply_change(FsChange::Renamed {
                from: a.clone(),
                to: tmp.path().join("b.jpg"),
            })
            .await
            .unwrap();
        assert_eq!(names(&collection), vec!["b.jpg"]);

        collection
            .apply_change(FsChange::Deleted(tmp.path().join("b.jpg")))
            .await
            .unwrap();
        assert!(collection.is_empty());
    }
}
