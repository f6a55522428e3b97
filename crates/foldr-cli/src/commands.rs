//! The subcommands, each writing its report to `out`.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use foldr_core::{
    CollectionEvent, CollectionOptions, Config, CruiseSession, CruiseSettings, CruiseTree,
    FolderCollectionFactory, FolderItem, FolderOrder, ItemType, QueryPath, QueryScheme,
};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

pub(crate) struct Engine {
    factory: Arc<FolderCollectionFactory>,
    cruise: CruiseSettings,
}

impl Engine {
    pub(crate) fn from_config(config: &Config) -> Result<Self> {
        let factory =
            FolderCollectionFactory::new(config.folder_settings()?, config.search_settings());
        Ok(Self {
            factory: Arc::new(factory),
            cruise: config.cruise_settings(),
        })
    }

    pub(crate) async fn ls(
        &self,
        location: &str,
        order: Option<FolderOrder>,
        seed: u64,
        out: &mut impl Write,
    ) -> Result<()> {
        let query = parse_location(location)?;
        let options = CollectionOptions {
            order,
            seed,
            watch: false,
            ..CollectionOptions::default()
        };
        let collection = self
            .factory
            .create(&query, &options, &CancellationToken::new())
            .await
            .with_context(|| format!("cannot list {query}"))?;

        writeln!(out, "{}  [{:?}, {:?}]", collection.place(), collection.kind(), collection.order())?;
        for item in collection.items() {
            writeln!(out, "{}", format_item(&item))?;
        }
        collection.dispose();
        Ok(())
    }

    pub(crate) async fn search(&self, dir: &Path, keyword: &str, out: &mut impl Write) -> Result<()> {
        let query = QueryPath::file(absolute(dir)?).with_search(keyword);
        let options = CollectionOptions {
            watch: false,
            fallback: false,
            ..CollectionOptions::default()
        };
        let collection = self
            .factory
            .create(&query, &options, &CancellationToken::new())
            .await
            .with_context(|| format!("search failed in {}", dir.display()))?;

        let hits: Vec<_> = collection
            .items()
            .into_iter()
            .filter(|i| !i.is_empty_sentinel())
            .collect();
        for item in &hits {
            writeln!(out, "{}", item.target().path().display())?;
        }
        writeln!(out, "{} match(es) for {keyword:?}", hits.len())?;
        collection.dispose();
        Ok(())
    }

    pub(crate) async fn cruise(
        &self,
        location: &str,
        steps: usize,
        backwards: bool,
        root: Option<&str>,
        out: &mut impl Write,
    ) -> Result<()> {
        let mut tree = CruiseTree::new(Arc::clone(&self.factory), self.cruise);
        if let Some(root) = root {
            tree = tree.with_root(parse_location(root)?);
        }
        let session = CruiseSession::new(Arc::new(tree));
        let start = parse_location(location)?;
        let id = session
            .start(&start)
            .await
            .with_context(|| format!("cannot start at {start}"))?;
        writeln!(out, "  {}", describe(&session, id))?;

        for _ in 0..steps {
            let step = if backwards {
                session.prev().await?
            } else {
                session.next().await?
            };
            match step {
                Some(id) => writeln!(out, "> {}", describe(&session, id))?,
                None => {
                    writeln!(out, "(end)")?;
                    break;
                }
            }
        }
        Ok(())
    }

    pub(crate) async fn watch(&self, dir: &Path, out: &mut impl Write) -> Result<()> {
        let query = QueryPath::file(absolute(dir)?);
        let collection = self
            .factory
            .create(&query, &CollectionOptions::default(), &CancellationToken::new())
            .await
            .with_context(|| format!("cannot watch {}", dir.display()))?;
        let mut events = collection.subscribe();
        writeln!(out, "watching {} ({} items), Ctrl-C to stop", collection.place(), collection.len())?;
        out.flush()?;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = events.recv() => match event {
                    Ok(event) => {
                        if let Some(line) = format_event(&event) {
                            writeln!(out, "{line}")?;
                            out.flush()?;
                        }
                    }
                    Err(RecvError::Lagged(n)) => tracing::warn!("missed {n} events"),
                    Err(RecvError::Closed) => break,
                },
            }
        }
        collection.dispose();
        Ok(())
    }
}

fn describe(session: &CruiseSession, id: foldr_core::NodeId) -> String {
    match session.tree().node(id) {
        Some(node) => node.query().to_string(),
        None => format!("<node {id:?}>"),
    }
}

/// Parses a location argument; relative filesystem paths are taken from the
/// working directory.
pub(crate) fn parse_location(text: &str) -> Result<QueryPath> {
    let query: QueryPath = text.parse()?;
    if query.scheme() != QueryScheme::File || query.is_root() || query.path().is_absolute() {
        return Ok(query);
    }
    let resolved = QueryPath::file(absolute(query.path())?);
    Ok(match query.search() {
        Some(keyword) => resolved.with_search(keyword),
        None => resolved,
    })
}

fn absolute(path: &Path) -> Result<std::path::PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to determine working directory")?;
    Ok(cwd.join(path))
}

fn type_marker(item_type: ItemType) -> char {
    match item_type {
        ItemType::Empty => ' ',
        ItemType::Directory => 'd',
        ItemType::DirectoryShortcut => 'D',
        ItemType::File => '-',
        ItemType::FileShortcut => 'l',
        ItemType::ArchiveEntry => 'a',
    }
}

pub(crate) fn format_item(item: &FolderItem) -> String {
    if item.is_empty_sentinel() {
        return "   (empty)".to_string();
    }
    format!("{}  {}", type_marker(item.item_type()), item.name())
}

fn format_event(event: &CollectionEvent) -> Option<String> {
    match event {
        CollectionEvent::Changed { action, item } => {
            Some(format!("{action:?}: {}", format_item(item).trim_start()))
        }
        CollectionEvent::Changing { .. } => None,
        CollectionEvent::Reset => Some("Reset: reload required".to_string()),
    }
}
