//! Building collections from locations.
//!
//! [`FolderCollectionFactory`] is the one place that knows which kind of
//! collection serves which [`QueryPath`], and the one place that falls back
//! to a real directory when an archive or playlist cannot be opened.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::archive::ArchiveBacking;
use super::bookmark::BookmarkBacking;
use super::entry::EntryBacking;
use super::playlist::PlaylistBacking;
use super::quick_access::QuickAccessBacking;
use super::root::RootBacking;
use super::search::SearchBacking;
use super::{Backing, FolderCollection, FolderSettings};
use crate::error::{CoreError, CoreResult};
use crate::fs::{item_from_path, nearest_existing_directory, run_blocking};
use crate::item::{Attributes, FolderItem, FolderOrder};
use crate::query::{QueryPath, QueryScheme};
use crate::search::{SearchEngineHost, SearchSettings};
use crate::source::{
    ArchiveHandle, ArchiveProvider, BookmarkSource, BookmarkTree, PlaylistBook, PlaylistSource,
    QuickAccessList, QuickAccessSource, ZipArchiveProvider,
};

/// How a collection is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOptions {
    /// `None` uses the configured default order.
    pub order: Option<FolderOrder>,
    /// Seed for [`FolderOrder::Random`].
    pub seed: u64,
    /// Keep the collection live (watcher, change subscriptions).
    pub watch: bool,
    /// Fall back to a real directory when the location cannot be opened.
    pub fallback: bool,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            order: None,
            seed: 0,
            watch: true,
            fallback: true,
        }
    }
}

impl CollectionOptions {
    /// A one-shot listing: no watching, no fallback.
    pub fn snapshot() -> Self {
        Self {
            watch: false,
            fallback: false,
            ..Self::default()
        }
    }

    pub fn with_order(self, order: FolderOrder) -> Self {
        Self {
            order: Some(order),
            ..self
        }
    }

    pub fn with_seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }
}

/// Maps locations to collections.
pub struct FolderCollectionFactory {
    settings: Arc<FolderSettings>,
    search_settings: SearchSettings,
    archives: Arc<dyn ArchiveProvider>,
    bookmarks: Arc<dyn BookmarkSource>,
    playlists: Arc<dyn PlaylistSource>,
    quick_access: Arc<dyn QuickAccessSource>,
    search: Arc<SearchEngineHost>,
}

impl std::fmt::Debug for FolderCollectionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderCollectionFactory")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl FolderCollectionFactory {
    /// A factory with zip support and empty in-memory bookmark, playlist
    /// and quick-access stores.
    pub fn new(settings: FolderSettings, search_settings: SearchSettings) -> Self {
        let archives: Arc<dyn ArchiveProvider> = Arc::new(ZipArchiveProvider::new());
        let search = Arc::new(SearchEngineHost::new(
            search_settings.clone(),
            Arc::clone(&archives),
        ));
        Self {
            settings: Arc::new(settings),
            search_settings,
            archives,
            bookmarks: Arc::new(BookmarkTree::new()),
            playlists: Arc::new(PlaylistBook::new()),
            quick_access: Arc::new(QuickAccessList::new()),
            search,
        }
    }

    /// Replaces the archive provider. The search host is rebuilt to match.
    pub fn with_archives(self, archives: Arc<dyn ArchiveProvider>) -> Self {
        let search = Arc::new(SearchEngineHost::new(
            self.search_settings.clone(),
            Arc::clone(&archives),
        ));
        Self {
            archives,
            search,
            ..self
        }
    }

    pub fn with_bookmarks(self, bookmarks: Arc<dyn BookmarkSource>) -> Self {
        Self { bookmarks, ..self }
    }

    pub fn with_playlists(self, playlists: Arc<dyn PlaylistSource>) -> Self {
        Self { playlists, ..self }
    }

    pub fn with_quick_access(self, quick_access: Arc<dyn QuickAccessSource>) -> Self {
        Self {
            quick_access,
            ..self
        }
    }

    pub fn settings(&self) -> &FolderSettings {
        &self.settings
    }

    pub fn archives(&self) -> &Arc<dyn ArchiveProvider> {
        &self.archives
    }

    pub fn search_host(&self) -> &Arc<SearchEngineHost> {
        &self.search
    }

    /// Builds and populates the collection for `query`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Cancelled`] if `cancel` fires during population.
    /// - Any error from [`FolderCollectionFactory::open`].
    pub async fn create(
        &self,
        query: &QueryPath,
        options: &CollectionOptions,
        cancel: &CancellationToken,
    ) -> CoreResult<Arc<FolderCollection>> {
        let collection = self.open(query, options)?;
        collection.initialize_items(cancel).await?;
        Ok(collection)
    }

    /// Chooses and constructs the collection for `query` without populating it.
    ///
    /// A search keyword always selects a search collection. A filesystem
    /// path is tried as a directory, then as a playlist file, then as an
    /// archive.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidArgument`] for a search without a directory.
    /// - [`CoreError::NotFound`] / [`CoreError::Unsupported`] when the
    ///   location cannot be opened and `options.fallback` is off.
    pub fn open(
        &self,
        query: &QueryPath,
        options: &CollectionOptions,
    ) -> CoreResult<Arc<FolderCollection>> {
        if let Some(keyword) = query.search() {
            return self.open_search(query, keyword, options);
        }

        match query.scheme() {
            QueryScheme::File | QueryScheme::Search => self.open_path(query, options),
            QueryScheme::Archive => self
                .open_archive(query, options)
                .or_else(|e| self.fall_back(query.path(), options, e)),
            QueryScheme::Bookmark => Ok(self.build(
                query,
                Backing::Bookmark(BookmarkBacking::new(
                    Arc::clone(&self.bookmarks),
                    query.path().to_path_buf(),
                )),
                options,
            )),
            QueryScheme::Playlist if query.is_root() => Ok(self.build(
                query,
                Backing::Playlist(PlaylistBacking::new(
                    Arc::clone(&self.playlists),
                    Default::default(),
                )),
                options,
            )),
            QueryScheme::Playlist => self
                .open_playlist(query, options)
                .or_else(|e| self.fall_back(query.path(), options, e)),
            QueryScheme::QuickAccess => Ok(self.build(
                query,
                Backing::QuickAccess(QuickAccessBacking::new(Arc::clone(&self.quick_access))),
                options,
            )),
            QueryScheme::Root => Ok(self.build(query, Backing::Root(RootBacking), options)),
        }
    }

    /// Resolves the item `query` points at.
    ///
    /// Real filesystem entries are read directly; anything else is looked
    /// up by name in a snapshot of its parent location.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if nothing by that name exists.
    /// - [`CoreError::Cancelled`] if `cancel` fires.
    pub async fn create_item(
        &self,
        query: &QueryPath,
        cancel: &CancellationToken,
    ) -> CoreResult<Arc<FolderItem>> {
        let Some(parent) = query.parent() else {
            return Ok(Arc::new(FolderItem::new(
                query.name(),
                QueryPath::scheme_root(QueryScheme::Root),
                query.clone(),
                Attributes::DIRECTORY | Attributes::SYSTEM,
            )));
        };

        if query.scheme() == QueryScheme::File && query.path().exists() {
            let path = query.path().to_path_buf();
            let item = run_blocking(move || item_from_path(&parent, &path)).await?;
            return Ok(Arc::new(item));
        }

        let name = query.name();
        let collection = self
            .create(&parent, &CollectionOptions::snapshot(), cancel)
            .await?;
        let found = collection
            .items()
            .into_iter()
            .find(|i| !i.is_empty_sentinel() && i.name() == name);
        collection.dispose();
        found.ok_or_else(|| CoreError::NotFound(query.path().to_path_buf()))
    }

    fn open_search(
        &self,
        query: &QueryPath,
        keyword: &str,
        options: &CollectionOptions,
    ) -> CoreResult<Arc<FolderCollection>> {
        if !matches!(query.scheme(), QueryScheme::File | QueryScheme::Search) || query.is_root() {
            return Err(CoreError::InvalidArgument(format!(
                "cannot search {query}: not a directory"
            )));
        }
        Ok(self.build(
            query,
            Backing::Search(SearchBacking::new(
                Arc::clone(&self.search),
                query.path().to_path_buf(),
                keyword.to_string(),
            )),
            options,
        ))
    }

    fn open_path(
        &self,
        query: &QueryPath,
        options: &CollectionOptions,
    ) -> CoreResult<Arc<FolderCollection>> {
        let path = query.path();
        if query.is_root() || path.is_dir() {
            return self.open_entry(query, options);
        }
        let opened = if self.settings.is_playlist_file(path) {
            self.open_playlist(query, options)
        } else {
            self.open_archive(query, options)
        };
        opened.or_else(|e| self.fall_back(path, options, e))
    }

    fn open_entry(
        &self,
        query: &QueryPath,
        options: &CollectionOptions,
    ) -> CoreResult<Arc<FolderCollection>> {
        let dir = query.path();
        if query.is_root() {
            return Ok(self.build(query, Backing::Entry(EntryBacking::new(dir)), options));
        }
        match std::fs::read_dir(dir) {
            Ok(_) => Ok(self.build(query, Backing::Entry(EntryBacking::new(dir)), options)),
            Err(e) if options.fallback => {
                let cwd = std::env::current_dir()?;
                if cwd == dir {
                    return Err(CoreError::from_io(dir, e));
                }
                tracing::warn!(
                    "cannot open {}: {e}; using {}",
                    dir.display(),
                    cwd.display()
                );
                let place = QueryPath::file(&cwd);
                Ok(self.build(&place, Backing::Entry(EntryBacking::new(cwd)), options))
            }
            Err(e) => Err(CoreError::from_io(dir, e)),
        }
    }

    fn open_archive(
        &self,
        query: &QueryPath,
        options: &CollectionOptions,
    ) -> CoreResult<Arc<FolderCollection>> {
        let location = ArchiveHandle::resolve(query.path(), &*self.archives)?;
        Ok(self.build(
            query,
            Backing::Archive(ArchiveBacking::new(location, Arc::clone(&self.archives))),
            options,
        ))
    }

    fn open_playlist(
        &self,
        query: &QueryPath,
        options: &CollectionOptions,
    ) -> CoreResult<Arc<FolderCollection>> {
        let path = query.path();
        if !self.playlists.playlists().iter().any(|p| p == path) {
            return Err(CoreError::NotFound(path.to_path_buf()));
        }
        let place = QueryPath::new(QueryScheme::Playlist, path);
        Ok(self.build(
            &place,
            Backing::Playlist(PlaylistBacking::new(
                Arc::clone(&self.playlists),
                path.to_path_buf(),
            )),
            options,
        ))
    }

    fn fall_back(
        &self,
        path: &Path,
        options: &CollectionOptions,
        error: CoreError,
    ) -> CoreResult<Arc<FolderCollection>> {
        if !options.fallback || error.is_cancelled() {
            return Err(error);
        }
        let Some(dir) = nearest_existing_directory(path) else {
            return Err(error);
        };
        tracing::warn!(
            "cannot open {}: {error}; showing {}",
            path.display(),
            dir.display()
        );
        self.open_entry(&QueryPath::file(&dir), options)
    }

    fn build(
        &self,
        place: &QueryPath,
        backing: Backing,
        options: &CollectionOptions,
    ) -> Arc<FolderCollection> {
        FolderCollection::new(
            place.clone(),
            backing,
            Arc::clone(&self.settings),
            options.order.unwrap_or(self.settings.default_order),
            options.seed,
            options.watch,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::CollectionKind;
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn factory() -> FolderCollectionFactory {
        FolderCollectionFactory::new(FolderSettings::default(), SearchSettings::default())
    }

    fn write_zip(path: &Path, files: &[&str]) {
        let mut zip = zip::ZipWriter::new(fs::File::create(path).unwrap());
        for name in files {
            zip.start_file(*name, zip::write::FileOptions::default())
                .unwrap();
            zip.write_all(b"x").unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn directory_opens_entry_collection() {
        let tmp = TempDir::new().unwrap();
        let collection = factory()
            .open(&QueryPath::file(tmp.path()), &CollectionOptions::default())
            .unwrap();
        assert_eq!(collection.kind(), CollectionKind::Entry);
        assert_eq!(collection.place(), &QueryPath::file(tmp.path()));
    }

    #[test]
    fn keyword_always_routes_to_search() {
        let tmp = TempDir::new().unwrap();
        let query = QueryPath::file(tmp.path()).with_search("cat");
        let collection = factory()
            .open(&query, &CollectionOptions::default())
            .unwrap();
        assert_eq!(collection.kind(), CollectionKind::Search);
        assert_eq!(collection.order_class(), crate::item::OrderClass::WithPath);
    }

    #[test]
    fn search_needs_a_directory() {
        let query = QueryPath::scheme_root(QueryScheme::Bookmark).with_search("x");
        let err = factory()
            .open(&query, &CollectionOptions::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn zip_file_opens_archive_collection() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("book.zip");
        write_zip(&archive, &["p2.jpg", "p10.jpg", "ch/p1.jpg"]);

        let collection = factory()
            .create(
                &QueryPath::file(&archive),
                &CollectionOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(collection.kind(), CollectionKind::Archive);
        let names: Vec<String> = collection.items().iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["ch", "p2.jpg", "p10.jpg"]);
        assert_eq!(
            collection.parent_query(),
            Some(QueryPath::file(tmp.path()))
        );
    }

    #[test]
    fn unopenable_file_falls_back_to_directory() {
        let tmp = TempDir::new().unwrap();
        let text = tmp.path().join("notes.txt");
        fs::write(&text, "").unwrap();

        let collection = factory()
            .open(&QueryPath::file(&text), &CollectionOptions::default())
            .unwrap();
        assert_eq!(collection.kind(), CollectionKind::Entry);
        assert_eq!(collection.place(), &QueryPath::file(tmp.path()));
    }

    #[test]
    fn missing_archive_falls_back_to_nearest_directory() {
        let tmp = TempDir::new().unwrap();
        let ghost = tmp.path().join("gone.zip").join("inner");
        let collection = factory()
            .open(&QueryPath::file(&ghost), &CollectionOptions::default())
            .unwrap();
        assert_eq!(collection.kind(), CollectionKind::Entry);
        assert_eq!(collection.place(), &QueryPath::file(tmp.path()));
    }

    #[test]
    fn no_fallback_reports_error() {
        let tmp = TempDir::new().unwrap();
        let text = tmp.path().join("notes.txt");
        fs::write(&text, "").unwrap();
        let err = factory()
            .open(&QueryPath::file(&text), &CollectionOptions::snapshot())
            .unwrap_err();
        assert!(matches!(err, CoreError::Unsupported(_)));
    }

    #[test]
    fn registered_playlist_file_opens_playlist() {
        let tmp = TempDir::new().unwrap();
        let list = tmp.path().join("fav.nvpls");
        fs::write(&list, "").unwrap();
        let book = Arc::new(PlaylistBook::new());
        book.create(&list);

        let factory = factory().with_playlists(book);
        let collection = factory
            .open(&QueryPath::file(&list), &CollectionOptions::default())
            .unwrap();
        assert_eq!(collection.kind(), CollectionKind::Playlist);
        assert_eq!(collection.place().scheme(), QueryScheme::Playlist);
    }

    #[test]
    fn unknown_playlist_falls_back() {
        let tmp = TempDir::new().unwrap();
        let list = tmp.path().join("fav.nvpls");
        fs::write(&list, "").unwrap();
        let collection = factory()
            .open(&QueryPath::file(&list), &CollectionOptions::default())
            .unwrap();
        assert_eq!(collection.kind(), CollectionKind::Entry);
    }

    #[test]
    fn unreadable_directory_falls_back_to_cwd() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing_dir");
        let factory = factory();
        let collection = factory
            .open_entry(&QueryPath::file(&missing), &CollectionOptions::default())
            .unwrap();
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(collection.place(), &QueryPath::file(cwd));

        let err = factory
            .open_entry(&QueryPath::file(&missing), &CollectionOptions::snapshot())
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn other_schemes_map_to_their_kinds() {
        let factory = factory();
        let options = CollectionOptions::default();
        let kind = |scheme| {
            factory
                .open(&QueryPath::scheme_root(scheme), &options)
                .unwrap()
                .kind()
        };
        assert_eq!(kind(QueryScheme::Bookmark), CollectionKind::Bookmark);
        assert_eq!(kind(QueryScheme::Playlist), CollectionKind::Playlist);
        assert_eq!(kind(QueryScheme::QuickAccess), CollectionKind::QuickAccess);
        assert_eq!(kind(QueryScheme::Root), CollectionKind::Root);
        assert_eq!(kind(QueryScheme::File), CollectionKind::Entry);
    }

    #[test]
    fn options_choose_order() {
        let tmp = TempDir::new().unwrap();
        let options = CollectionOptions::default()
            .with_order(FolderOrder::Random)
            .with_seed(42);
        let collection = factory()
            .open(&QueryPath::file(tmp.path()), &options)
            .unwrap();
        assert_eq!(collection.order(), FolderOrder::Random);
        assert_eq!(collection.seed(), 42);
        assert!(!collection.is_dirty(&QueryPath::file(tmp.path()), FolderOrder::Random, 42));
        assert!(collection.is_dirty(&QueryPath::file(tmp.path()), FolderOrder::Random, 43));
    }

    #[tokio::test]
    async fn create_item_reads_real_entries() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("A")).unwrap();
        let item = factory()
            .create_item(&QueryPath::file(tmp.path().join("A")), &CancellationToken::new())
            .await
            .unwrap();
        assert!(item.is_directory());
        assert_eq!(item.place(), &QueryPath::file(tmp.path()));
    }

    #[tokio::test]
    async fn create_item_finds_archive_entries() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("book.zip");
        write_zip(&archive, &["ch/p1.jpg"]);
        let item = factory()
            .create_item(&QueryPath::file(archive.join("ch")), &CancellationToken::new())
            .await
            .unwrap();
        assert!(item.is_directory());
        assert!(item.attributes().contains(Attributes::ARCHIVE_ENTRY));

        let err = factory()
            .create_item(&QueryPath::file(archive.join("nope")), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
