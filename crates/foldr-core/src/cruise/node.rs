use std::sync::{Arc, RwLock};

use tokio::sync::OnceCell;

use crate::item::FolderItem;
use crate::query::QueryPath;

/// Handle of a node inside its [`super::CruiseTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(super) usize);

/// One position in the traversal.
///
/// `content` is the item the node stands for; it is absent for a node
/// created purely from a path (an ancestor reached by walking upward).
/// Parent and children are resolved lazily and cached for the node's life.
#[derive(Debug)]
pub struct CruiseNode {
    id: NodeId,
    query: QueryPath,
    content: RwLock<Option<Arc<FolderItem>>>,
    pub(super) parent: OnceCell<Option<NodeId>>,
    pub(super) children: OnceCell<Vec<NodeId>>,
}

impl CruiseNode {
    pub(super) fn new(id: NodeId, query: QueryPath, content: Option<Arc<FolderItem>>) -> Self {
        Self {
            id,
            query,
            content: RwLock::new(content),
            parent: OnceCell::new(),
            children: OnceCell::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> String {
        match self.content() {
            Some(item) => item.name(),
            None => self.query.name(),
        }
    }

    /// The node's own location in the traversal.
    pub fn query(&self) -> &QueryPath {
        &self.query
    }

    /// The location containing this node.
    pub fn place(&self) -> Option<QueryPath> {
        self.query.parent()
    }

    pub fn content(&self) -> Option<Arc<FolderItem>> {
        self.content
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Where the node's children are listed from: the content's target when
    /// there is one (so shortcuts are followed), else the node's own path.
    pub fn collection_query(&self) -> QueryPath {
        match self.content() {
            Some(item) => item.target(),
            None => self.query.clone(),
        }
    }

    pub fn is_children_resolved(&self) -> bool {
        self.children.initialized()
    }

    pub fn is_parent_resolved(&self) -> bool {
        self.parent.initialized()
    }

    /// Fills in the content of a path-only node. Existing content is kept.
    pub(super) fn splice_content(&self, item: Arc<FolderItem>) {
        let mut content = self.content.write().unwrap_or_else(|e| e.into_inner());
        if content.is_none() {
            *content = Some(item);
        }
    }

    /// Records the parent if it has not been resolved yet.
    pub(super) fn splice_parent(&self, parent: NodeId) {
        // No-op while this node's own parent resolution runs; it yields the same id.
        let _ = self.parent.set(Some(parent));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Attributes;

    #[test]
    fn path_only_node_takes_content_once() {
        let query = QueryPath::file("/a/b.jpg");
        let node = CruiseNode::new(NodeId(0), query.clone(), None);
        assert!(node.content().is_none());
        assert_eq!(node.name(), "b.jpg");
        assert_eq!(node.place(), Some(QueryPath::file("/a")));

        let first = Arc::new(FolderItem::new(
            "b.jpg",
            QueryPath::file("/a"),
            query.clone(),
            Attributes::empty(),
        ));
        node.splice_content(Arc::clone(&first));
        let second = Arc::new(FolderItem::new(
            "b.jpg",
            QueryPath::file("/a"),
            query,
            Attributes::empty(),
        ));
        node.splice_content(second);
        let content = node.content().unwrap();
        assert!(Arc::ptr_eq(&content, &first));
    }

    #[test]
    fn shortcut_content_redirects_listing() {
        let target = QueryPath::file("/real/dir");
        let item = Arc::new(FolderItem::new(
            "link",
            QueryPath::file("/links"),
            target.clone(),
            Attributes::DIRECTORY | Attributes::SHORTCUT,
        ));
        let node = CruiseNode::new(NodeId(3), QueryPath::file("/links/link"), Some(item));
        assert_eq!(node.collection_query(), target);
        assert_eq!(node.query(), &QueryPath::file("/links/link"));
    }

    #[test]
    fn parent_splices_only_once() {
        let node = CruiseNode::new(NodeId(1), QueryPath::file("/x"), None);
        assert!(!node.is_parent_resolved());
        node.splice_parent(NodeId(7));
        node.splice_parent(NodeId(8));
        assert_eq!(node.parent.get(), Some(&Some(NodeId(7))));
        assert!(!node.is_children_resolved());
    }
}
