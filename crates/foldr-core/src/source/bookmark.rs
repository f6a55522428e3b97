//! Bookmark tree.
//!
//! Bookmarks are organised in folders. A folder is addressed by its path of
//! folder names from the tree root (`""` is the root, `"comics/weekly"` a
//! nested folder). Every mutation raises a [`TreeChange`] on a broadcast
//! channel so open collections can follow along.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::SystemTime;

use tokio::sync::broadcast;

use super::{TreeAction, TreeChange};
use crate::error::{CoreError, CoreResult};

const CHANGE_CAPACITY: usize = 64;

/// What a bookmark node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkKind {
    Folder,
    /// A bookmark pointing at a real location.
    Bookmark { target: PathBuf },
}

/// One node of the bookmark tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkNode {
    pub id: u64,
    pub name: String,
    pub kind: BookmarkKind,
    /// When the node was added to the tree.
    pub entry_time: Option<SystemTime>,
}

impl BookmarkNode {
    pub fn is_folder(&self) -> bool {
        matches!(self.kind, BookmarkKind::Folder)
    }
}

/// Read access to a bookmark tree.
pub trait BookmarkSource: Send + Sync {
    /// Direct children of `folder`, in tree order.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if `folder` does not exist.
    fn children(&self, folder: &Path) -> CoreResult<Vec<BookmarkNode>>;

    /// Subscribes to tree changes.
    fn subscribe(&self) -> broadcast::Receiver<TreeChange<BookmarkNode>>;
}

/// In-memory bookmark tree.
pub struct BookmarkTree {
    folders: RwLock<BTreeMap<PathBuf, Vec<BookmarkNode>>>,
    next_id: AtomicU64,
    changes: broadcast::Sender<TreeChange<BookmarkNode>>,
}

impl std::fmt::Debug for BookmarkTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookmarkTree").finish_non_exhaustive()
    }
}

impl Default for BookmarkTree {
    fn default() -> Self {
        Self::new()
    }
}

impl BookmarkTree {
    /// Creates a tree holding only the empty root folder.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        let mut folders = BTreeMap::new();
        folders.insert(PathBuf::new(), Vec::new());
        Self {
            folders: RwLock::new(folders),
            next_id: AtomicU64::new(1),
            changes,
        }
    }

    /// Creates a tree with a `home` bookmark when `HOME` is set.
    pub fn with_default_bookmarks() -> Self {
        let tree = Self::new();
        if let Ok(home) = std::env::var("HOME") {
            let _ = tree.add_bookmark(Path::new(""), "home", home);
        }
        tree
    }

    /// Adds a sub-folder named `name` under `parent`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if `parent` does not exist.
    /// - [`CoreError::InvalidName`] if the name is empty, contains a
    ///   separator or is already taken by another folder.
    pub fn add_folder(&self, parent: &Path, name: &str) -> CoreResult<BookmarkNode> {
        validate_name(name)?;
        let path = parent.join(name);
        {
            let folders = self.read();
            if folders.contains_key(&path) {
                return Err(CoreError::InvalidName(format!(
                    "folder already exists: {}",
                    path.display()
                )));
            }
        }
        let node = self.make_node(name, BookmarkKind::Folder);
        {
            let mut folders = self.write();
            let children = folders
                .get_mut(parent)
                .ok_or_else(|| CoreError::NotFound(parent.to_path_buf()))?;
            children.push(node.clone());
            folders.insert(path, Vec::new());
        }
        self.emit(TreeChange::new(TreeAction::Add, parent, Some(node.clone())));
        Ok(node)
    }

    /// Adds a bookmark to `target` under `parent`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if `parent` does not exist.
    /// - [`CoreError::InvalidName`] if the name is empty or contains a separator.
    pub fn add_bookmark(
        &self,
        parent: &Path,
        name: &str,
        target: impl Into<PathBuf>,
    ) -> CoreResult<BookmarkNode> {
        validate_name(name)?;
        let node = self.make_node(
            name,
            BookmarkKind::Bookmark {
                target: target.into(),
            },
        );
        {
            let mut folders = self.write();
            folders
                .get_mut(parent)
                .ok_or_else(|| CoreError::NotFound(parent.to_path_buf()))?
                .push(node.clone());
        }
        self.emit(TreeChange::new(TreeAction::Add, parent, Some(node.clone())));
        Ok(node)
    }

    /// Removes the node `id` from `parent`, with its subtree for folders.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if no such node lives in `parent`.
    pub fn remove(&self, parent: &Path, id: u64) -> CoreResult<BookmarkNode> {
        let node = {
            let mut folders = self.write();
            let node = take_child(&mut folders, parent, id)?;
            if node.is_folder() {
                let path = parent.join(&node.name);
                folders.retain(|p, _| !p.starts_with(&path));
            }
            node
        };
        self.emit(TreeChange::new(TreeAction::Remove, parent, Some(node.clone())));
        Ok(node)
    }

    /// Renames the node `id` in `parent`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if no such node lives in `parent`.
    /// - [`CoreError::InvalidName`] if the new name is invalid.
    pub fn rename(&self, parent: &Path, id: u64, name: &str) -> CoreResult<BookmarkNode> {
        validate_name(name)?;
        let node = {
            let mut folders = self.write();
            let children = folders
                .get_mut(parent)
                .ok_or_else(|| CoreError::NotFound(parent.to_path_buf()))?;
            let node = children
                .iter_mut()
                .find(|n| n.id == id)
                .ok_or_else(|| CoreError::NotFound(parent.join(id.to_string())))?;
            let old_name = std::mem::replace(&mut node.name, name.to_string());
            let node = node.clone();
            if node.is_folder() {
                rebase_folders(&mut folders, &parent.join(old_name), &parent.join(name));
            }
            node
        };
        self.emit(TreeChange::new(TreeAction::Rename, parent, Some(node.clone())));
        Ok(node)
    }

    /// Moves the node `id` from `from` to the end of `to`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the node or either folder is missing.
    /// - [`CoreError::InvalidArgument`] if a folder would move into itself.
    pub fn move_node(&self, from: &Path, id: u64, to: &Path) -> CoreResult<BookmarkNode> {
        let node = {
            let mut folders = self.write();
            if !folders.contains_key(to) {
                return Err(CoreError::NotFound(to.to_path_buf()));
            }
            let node = take_child(&mut folders, from, id)?;
            let old_path = from.join(&node.name);
            if node.is_folder() && to.starts_with(&old_path) {
                if let Some(children) = folders.get_mut(from) {
                    children.push(node.clone());
                }
                return Err(CoreError::InvalidArgument(format!(
                    "cannot move {} into itself",
                    old_path.display()
                )));
            }
            if node.is_folder() {
                rebase_folders(&mut folders, &old_path, &to.join(&node.name));
            }
            if let Some(children) = folders.get_mut(to) {
                children.push(node.clone());
            }
            node
        };
        let mut change = TreeChange::new(TreeAction::Move, to, Some(node.clone()));
        change.old_parent = Some(from.to_path_buf());
        self.emit(change);
        Ok(node)
    }

    /// Replaces the contents of `folder` wholesale.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if `folder` does not exist.
    pub fn replace(&self, folder: &Path, nodes: Vec<(String, BookmarkKind)>) -> CoreResult<()> {
        let fresh: Vec<BookmarkNode> = nodes
            .into_iter()
            .map(|(name, kind)| self.make_node(&name, kind))
            .collect();
        {
            let mut folders = self.write();
            if !folders.contains_key(folder) {
                return Err(CoreError::NotFound(folder.to_path_buf()));
            }
            folders.retain(|p, _| p == folder || !p.starts_with(folder));
            for node in fresh.iter().filter(|n| n.is_folder()) {
                folders.insert(folder.join(&node.name), Vec::new());
            }
            folders.insert(folder.to_path_buf(), fresh);
        }
        self.emit(TreeChange::new(TreeAction::Replace, folder, None));
        Ok(())
    }

    /// Clears the whole tree.
    pub fn reset(&self) {
        {
            let mut folders = self.write();
            folders.clear();
            folders.insert(PathBuf::new(), Vec::new());
        }
        self.emit(TreeChange::new(TreeAction::Reset, PathBuf::new(), None));
    }

    fn make_node(&self, name: &str, kind: BookmarkKind) -> BookmarkNode {
        BookmarkNode {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            kind,
            entry_time: Some(SystemTime::now()),
        }
    }

    fn emit(&self, change: TreeChange<BookmarkNode>) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<PathBuf, Vec<BookmarkNode>>> {
        self.folders.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<PathBuf, Vec<BookmarkNode>>> {
        self.folders.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl BookmarkSource for BookmarkTree {
    fn children(&self, folder: &Path) -> CoreResult<Vec<BookmarkNode>> {
        self.read()
            .get(folder)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(folder.to_path_buf()))
    }

    fn subscribe(&self) -> broadcast::Receiver<TreeChange<BookmarkNode>> {
        self.changes.subscribe()
    }
}

fn validate_name(name: &str) -> CoreResult<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') {
        return Err(CoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn take_child(
    folders: &mut BTreeMap<PathBuf, Vec<BookmarkNode>>,
    parent: &Path,
    id: u64,
) -> CoreResult<BookmarkNode> {
    let children = folders
        .get_mut(parent)
        .ok_or_else(|| CoreError::NotFound(parent.to_path_buf()))?;
    let index = children
        .iter()
        .position(|n| n.id == id)
        .ok_or_else(|| CoreError::NotFound(parent.join(id.to_string())))?;
    Ok(children.remove(index))
}

fn rebase_folders(folders: &mut BTreeMap<PathBuf, Vec<BookmarkNode>>, from: &Path, to: &Path) {
    let moved: Vec<PathBuf> = folders
        .keys()
        .filter(|p| p.starts_with(from))
        .cloned()
        .collect();
    for old in moved {
        if let Some(children) = folders.remove(&old) {
            let rest = old.strip_prefix(from).unwrap_or(Path::new(""));
            folders.insert(to.join(rest), children);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> &'static Path {
        Path::new("")
    }

    #[test]
    fn new_tree_has_empty_root() {
        let tree = BookmarkTree::new();
        assert!(tree.children(root()).unwrap().is_empty());
    }

    #[test]
    fn missing_folder_is_not_found() {
        let tree = BookmarkTree::new();
        let err = tree.children(Path::new("nope")).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn add_folder_and_bookmark() {
        let tree = BookmarkTree::new();
        tree.add_folder(root(), "comics").unwrap();
        tree.add_bookmark(Path::new("comics"), "weekly", "/books/weekly")
            .unwrap();

        let top = tree.children(root()).unwrap();
        assert_eq!(top.len(), 1);
        assert!(top[0].is_folder());
        let inner = tree.children(Path::new("comics")).unwrap();
        assert_eq!(inner[0].name, "weekly");
        assert_eq!(
            inner[0].kind,
            BookmarkKind::Bookmark {
                target: PathBuf::from("/books/weekly")
            }
        );
        assert!(inner[0].entry_time.is_some());
    }

    #[test]
    fn duplicate_folder_rejected() {
        let tree = BookmarkTree::new();
        tree.add_folder(root(), "a").unwrap();
        assert!(matches!(
            tree.add_folder(root(), "a"),
            Err(CoreError::InvalidName(_))
        ));
    }

    #[test]
    fn invalid_names_rejected() {
        let tree = BookmarkTree::new();
        assert!(tree.add_bookmark(root(), "", "/x").is_err());
        assert!(tree.add_bookmark(root(), "a/b", "/x").is_err());
    }

    #[test]
    fn rename_folder_moves_its_subtree() {
        let tree = BookmarkTree::new();
        let folder = tree.add_folder(root(), "old").unwrap();
        tree.add_bookmark(Path::new("old"), "x", "/x").unwrap();

        tree.rename(root(), folder.id, "new").unwrap();
        assert!(tree.children(Path::new("old")).is_err());
        assert_eq!(tree.children(Path::new("new")).unwrap().len(), 1);
    }

    #[test]
    fn remove_folder_drops_subtree() {
        let tree = BookmarkTree::new();
        let folder = tree.add_folder(root(), "a").unwrap();
        tree.add_folder(Path::new("a"), "b").unwrap();
        tree.remove(root(), folder.id).unwrap();
        assert!(tree.children(Path::new("a/b")).is_err());
        assert!(tree.children(root()).unwrap().is_empty());
    }

    #[test]
    fn move_into_self_is_rejected_and_restored() {
        let tree = BookmarkTree::new();
        let folder = tree.add_folder(root(), "a").unwrap();
        tree.add_folder(Path::new("a"), "b").unwrap();
        let err = tree
            .move_node(root(), folder.id, Path::new("a/b"))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
        assert_eq!(tree.children(root()).unwrap().len(), 1);
    }

    #[test]
    fn changes_are_broadcast() {
        let tree = BookmarkTree::new();
        let mut rx = tree.subscribe();
        let node = tree.add_bookmark(root(), "x", "/x").unwrap();
        tree.rename(root(), node.id, "y").unwrap();
        let folder = tree.add_folder(root(), "f").unwrap();
        tree.move_node(root(), node.id, Path::new("f")).unwrap();
        tree.reset();

        assert_eq!(rx.try_recv().unwrap().action, TreeAction::Add);
        let renamed = rx.try_recv().unwrap();
        assert_eq!(renamed.action, TreeAction::Rename);
        assert_eq!(renamed.node.unwrap().name, "y");
        assert_eq!(rx.try_recv().unwrap().node.unwrap().id, folder.id);
        let moved = rx.try_recv().unwrap();
        assert_eq!(moved.action, TreeAction::Move);
        assert_eq!(moved.parent, PathBuf::from("f"));
        assert_eq!(moved.old_parent, Some(PathBuf::new()));
        assert!(rx.try_recv().unwrap().is_wholesale());
    }

    #[test]
    fn replace_swaps_folder_contents() {
        let tree = BookmarkTree::new();
        tree.add_bookmark(root(), "old", "/old").unwrap();
        tree.replace(
            root(),
            vec![
                ("f".to_string(), BookmarkKind::Folder),
                (
                    "b".to_string(),
                    BookmarkKind::Bookmark {
                        target: PathBuf::from("/b"),
                    },
                ),
            ],
        )
        .unwrap();
        let names: Vec<String> = tree
            .children(root())
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["f", "b"]);
        assert!(tree.children(Path::new("f")).unwrap().is_empty());
    }
}
