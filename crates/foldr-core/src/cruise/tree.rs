use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::node::{CruiseNode, NodeId};
use super::CruiseSettings;
use crate::collection::{CollectionOptions, FolderCollectionFactory};
use crate::error::{CoreError, CoreResult};
use crate::item::{Attributes, FolderItem};
use crate::query::{QueryPath, QueryScheme};

#[derive(Default)]
struct Arena {
    nodes: Vec<Arc<CruiseNode>>,
    index: HashMap<QueryPath, NodeId>,
}

/// The lazily grown traversal tree.
///
/// Every location maps to exactly one node, so a node reached going down
/// and the same node reached going up are the same object.
pub struct CruiseTree {
    factory: Arc<FolderCollectionFactory>,
    settings: CruiseSettings,
    root: Option<QueryPath>,
    arena: Mutex<Arena>,
}

impl std::fmt::Debug for CruiseTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CruiseTree")
            .field("settings", &self.settings)
            .field("root", &self.root)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl CruiseTree {
    pub fn new(factory: Arc<FolderCollectionFactory>, settings: CruiseSettings) -> Self {
        Self {
            factory,
            settings,
            root: None,
            arena: Mutex::new(Arena::default()),
        }
    }

    /// Bounds upward traversal: `root` has no parent.
    pub fn with_root(self, root: QueryPath) -> Self {
        Self {
            root: Some(root.without_search()),
            ..self
        }
    }

    pub fn root(&self) -> Option<&QueryPath> {
        self.root.as_ref()
    }

    /// Number of nodes materialised so far.
    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node(&self, id: NodeId) -> Option<Arc<CruiseNode>> {
        self.lock().nodes.get(id.0).cloned()
    }

    /// The node for `query`, resolving its content through the factory the
    /// first time the location is seen.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if nothing exists at `query`.
    /// - [`CoreError::Cancelled`] if `cancel` fires.
    pub async fn node_at(&self, query: &QueryPath, cancel: &CancellationToken) -> CoreResult<NodeId> {
        let query = query.clone().without_search();
        let known = self.lock().index.get(&query).copied();
        if let Some(id) = known {
            if self.get(id)?.content().is_some() {
                return Ok(id);
            }
        }
        let item = self.factory.create_item(&query, cancel).await?;
        Ok(self.intern(query, Some(item), None))
    }

    /// The children of `id`, resolved once and cached.
    ///
    /// A cancelled resolution caches nothing.
    pub async fn get_children(&self, id: NodeId, cancel: &CancellationToken) -> CoreResult<Vec<NodeId>> {
        let node = self.get(id)?;
        let children = node
            .children
            .get_or_try_init(|| self.resolve_children(&node, cancel))
            .await?;
        Ok(children.clone())
    }

    /// The parent of `id`, or `None` at the top of the traversal.
    pub async fn get_parent(&self, id: NodeId, cancel: &CancellationToken) -> CoreResult<Option<NodeId>> {
        let node = self.get(id)?;
        let parent = node
            .parent
            .get_or_try_init(|| self.resolve_parent(&node, cancel))
            .await?;
        Ok(*parent)
    }

    /// The node after `id` in pre-order, or `None` past the last node.
    pub async fn cruise_next(&self, id: NodeId, cancel: &CancellationToken) -> CoreResult<Option<NodeId>> {
        if let Some(&first) = self.get_children(id, cancel).await?.first() {
            return Ok(Some(first));
        }
        let mut current = id;
        loop {
            let Some(parent) = self.get_parent(current, cancel).await? else {
                return Ok(None);
            };
            let siblings = self.get_children(parent, cancel).await?;
            let next = siblings
                .iter()
                .position(|&s| s == current)
                .and_then(|pos| siblings.get(pos + 1));
            if let Some(&next) = next {
                return Ok(Some(next));
            }
            current = parent;
        }
    }

    /// The node before `id` in pre-order, or `None` at the first node.
    pub async fn cruise_prev(&self, id: NodeId, cancel: &CancellationToken) -> CoreResult<Option<NodeId>> {
        let Some(parent) = self.get_parent(id, cancel).await? else {
            return Ok(None);
        };
        let siblings = self.get_children(parent, cancel).await?;
        match siblings.iter().position(|&s| s == id) {
            Some(pos) if pos > 0 => {
                let last = self.last_descendant(siblings[pos - 1], cancel).await?;
                Ok(Some(last))
            }
            _ => Ok(Some(parent)),
        }
    }

    /// Follows last children down to a leaf.
    pub async fn last_descendant(&self, id: NodeId, cancel: &CancellationToken) -> CoreResult<NodeId> {
        let mut current = id;
        while let Some(&last) = self.get_children(current, cancel).await?.last() {
            current = last;
        }
        Ok(current)
    }

    /// Whether a node's content can be listed as a folder.
    ///
    /// Directories (including shortcut and bookmark folders) and playlists
    /// always can; archive files can unless they sit inside another archive
    /// and nested archives are turned off.
    pub fn is_openable(&self, node: &CruiseNode) -> bool {
        let Some(item) = node.content() else {
            return true;
        };
        if item.is_empty_sentinel() {
            return false;
        }
        if item.is_directory() || item.attributes().contains(Attributes::PLAYLIST) {
            return true;
        }
        let target = item.target();
        if target.scheme() != QueryScheme::File || !self.factory.archives().is_supported(target.path()) {
            return false;
        }
        self.settings.recursive_archive || !item.attributes().contains(Attributes::ARCHIVE_ENTRY)
    }

    async fn resolve_children(&self, node: &CruiseNode, cancel: &CancellationToken) -> CoreResult<Vec<NodeId>> {
        if !self.is_openable(node) {
            return Ok(Vec::new());
        }
        let query = node.collection_query();
        let collection = match self
            .factory
            .create(&query, &CollectionOptions::snapshot(), cancel)
            .await
        {
            Ok(collection) => collection,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                debug!("cruise: {query} has no children: {e}");
                return Ok(Vec::new());
            }
        };
        let items: Vec<Arc<FolderItem>> = collection
            .items()
            .into_iter()
            .filter(|i| !i.is_empty_sentinel())
            .collect();
        collection.dispose();

        let mut taken: HashSet<String> = items.iter().map(|i| i.name()).collect();
        let mut seen: HashMap<String, usize> = HashMap::new();
        let children = items
            .into_iter()
            .map(|item| {
                let name = item.name();
                let count = seen.entry(name.clone()).or_default();
                *count += 1;
                let key = if *count == 1 {
                    name
                } else {
                    sibling_key(&name, *count, &mut taken)
                };
                self.intern(node.query().join(key), Some(item), Some(node.id()))
            })
            .collect::<Vec<_>>();
        debug!("cruise: {} children under {}", children.len(), node.query());
        Ok(children)
    }

    async fn resolve_parent(&self, node: &CruiseNode, cancel: &CancellationToken) -> CoreResult<Option<NodeId>> {
        if let Some(root) = &self.root {
            if node.query().same_place(root) || !node.query().is_descendant_of(root) {
                return Ok(None);
            }
        }
        let Some(parent_query) = node.query().parent() else {
            return Ok(None);
        };
        let parent = self.intern(parent_query, None, None);
        // Listing the parent splices this node's content and identity.
        let siblings = self.get_children(parent, cancel).await?;
        if !siblings.contains(&node.id()) {
            debug!("cruise: {} is not listed by its parent", node.query());
        }
        Ok(Some(parent))
    }

    /// Returns the node for `query`, creating it if needed. Content and
    /// parent fill in gaps on an existing node but never replace them.
    fn intern(&self, query: QueryPath, content: Option<Arc<FolderItem>>, parent: Option<NodeId>) -> NodeId {
        let mut arena = self.lock();
        if let Some(&id) = arena.index.get(&query) {
            let node = &arena.nodes[id.0];
            if let Some(item) = content {
                node.splice_content(item);
            }
            if let Some(parent) = parent {
                node.splice_parent(parent);
            }
            return id;
        }

        let id = NodeId(arena.nodes.len());
        let node = CruiseNode::new(id, query.clone(), content);
        if let Some(parent) = parent {
            node.splice_parent(parent);
        }
        arena.nodes.push(Arc::new(node));
        arena.index.insert(query, id);
        id
    }

    fn get(&self, id: NodeId) -> CoreResult<Arc<CruiseNode>> {
        self.node(id)
            .ok_or_else(|| CoreError::InvalidArgument(format!("unknown cruise node {}", id.0)))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Arena> {
        self.arena.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A key for the `n`th sibling named `name`, distinct from every other
/// sibling's name and from keys already handed out.
fn sibling_key(name: &str, mut n: usize, taken: &mut HashSet<String>) -> String {
    loop {
        let key = format!("{name} ({n})");
        if taken.insert(key.clone()) {
            return key;
        }
        n += 1;
    }
}
