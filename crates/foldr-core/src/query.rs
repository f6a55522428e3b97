//! Location descriptors.
//!
//! A [`QueryPath`] names a place in the virtual hierarchy: a scheme, a
//! normalised path inside that scheme and an optional search keyword.
//! Two descriptors that differ only in their keyword refer to the same
//! place viewed differently (see [`QueryPath::same_place`]).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use path_clean::PathClean;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The backing store a location belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryScheme {
    /// The real filesystem (archives are reached through file paths too).
    File,
    /// An explicit archive-entry location.
    Archive,
    /// The persisted bookmark tree.
    Bookmark,
    /// A saved playlist.
    Playlist,
    /// A search-result view.
    Search,
    /// The curated quick-access list.
    QuickAccess,
    /// The synthetic top level listing every other scheme.
    Root,
}

impl QueryScheme {
    const ALL: [QueryScheme; 7] = [
        QueryScheme::File,
        QueryScheme::Archive,
        QueryScheme::Bookmark,
        QueryScheme::Playlist,
        QueryScheme::Search,
        QueryScheme::QuickAccess,
        QueryScheme::Root,
    ];

    /// The textual prefix used by [`QueryPath`]'s `Display` form.
    pub fn prefix(self) -> &'static str {
        match self {
            QueryScheme::File => "file",
            QueryScheme::Archive => "archive",
            QueryScheme::Bookmark => "bookmark",
            QueryScheme::Playlist => "playlist",
            QueryScheme::Search => "search",
            QueryScheme::QuickAccess => "quickaccess",
            QueryScheme::Root => "root",
        }
    }

    /// Human-readable name for the scheme's top-level node.
    pub fn display_name(self) -> &'static str {
        match self {
            QueryScheme::File => "This PC",
            QueryScheme::Archive => "Archive",
            QueryScheme::Bookmark => "Bookmark",
            QueryScheme::Playlist => "Playlist",
            QueryScheme::Search => "Search",
            QueryScheme::QuickAccess => "Quick Access",
            QueryScheme::Root => "Root",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.prefix() == prefix)
    }
}

/// A normalised location descriptor.
///
/// Equality compares the normalised form, so `"/a/b/"` and `"/a/./b"` are the
/// same place. The empty path denotes the scheme's root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryPath {
    scheme: QueryScheme,
    path: PathBuf,
    search: Option<String>,
}

impl QueryPath {
    /// Creates a descriptor, normalising `path`.
    pub fn new(scheme: QueryScheme, path: impl AsRef<Path>) -> Self {
        Self {
            scheme,
            path: normalize(path.as_ref()),
            search: None,
        }
    }

    /// Shorthand for a filesystem location.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::new(QueryScheme::File, path)
    }

    /// The root of `scheme`.
    pub fn scheme_root(scheme: QueryScheme) -> Self {
        Self::new(scheme, "")
    }

    /// Returns a copy carrying `keyword`. Blank keywords clear the search.
    pub fn with_search(self, keyword: impl Into<String>) -> Self {
        let keyword = keyword.into();
        let trimmed = keyword.trim();
        Self {
            search: (!trimmed.is_empty()).then(|| trimmed.to_string()),
            ..self
        }
    }

    /// Returns a copy without a search keyword.
    pub fn without_search(self) -> Self {
        Self {
            search: None,
            ..self
        }
    }

    pub fn scheme(&self) -> QueryScheme {
        self.scheme
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// `true` for the empty path of a scheme.
    pub fn is_root(&self) -> bool {
        self.path.as_os_str().is_empty()
    }

    /// Same scheme and path; the keyword is ignored.
    pub fn same_place(&self, other: &QueryPath) -> bool {
        self.scheme == other.scheme && self.path == other.path
    }

    /// The last path component, or the scheme's display name at the root.
    pub fn name(&self) -> String {
        match self.path.file_name() {
            Some(name) => crate::nfc_string(&name.to_string_lossy()),
            None if self.is_root() => self.scheme.display_name().to_string(),
            None => self.path.to_string_lossy().into_owned(),
        }
    }

    /// The containing location, or `None` at the scheme root.
    ///
    /// A filesystem root such as `/` has the empty path (the volume list) as
    /// its parent.
    pub fn parent(&self) -> Option<QueryPath> {
        if self.is_root() {
            return None;
        }
        let parent = match self.path.parent() {
            Some(p) => p.to_path_buf(),
            None => PathBuf::new(),
        };
        Some(Self {
            scheme: self.scheme,
            path: parent,
            search: None,
        })
    }

    /// A child location of this one.
    pub fn join(&self, name: impl AsRef<Path>) -> QueryPath {
        Self::new(self.scheme, self.path.join(name))
    }

    /// `true` when `self` is a strict descendant of `ancestor` in the same scheme.
    pub fn is_descendant_of(&self, ancestor: &QueryPath) -> bool {
        self.scheme == ancestor.scheme
            && self.path != ancestor.path
            && (ancestor.is_root() || self.path.starts_with(&ancestor.path))
    }
}

fn normalize(path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() {
        return PathBuf::new();
    }
    let cleaned = path.clean();
    if cleaned == Path::new(".") {
        PathBuf::new()
    } else {
        cleaned
    }
}

impl fmt::Display for QueryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme.prefix(), self.path.display())?;
        if let Some(keyword) = &self.search {
            write!(f, "?search={keyword}")?;
        }
        Ok(())
    }
}

impl FromStr for QueryPath {
    type Err = CoreError;

    /// Parses `scheme:path?search=keyword`. A missing or unknown scheme prefix
    /// is read as a plain filesystem path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (body, search) = match s.split_once("?search=") {
            Some((body, keyword)) => (body, Some(keyword)),
            None => (s, None),
        };

        let query = match body.split_once(':') {
            Some((prefix, rest)) => match QueryScheme::from_prefix(prefix) {
                Some(scheme) => QueryPath::new(scheme, rest),
                None => QueryPath::file(body),
            },
            None => QueryPath::file(body),
        };

        Ok(match search {
            Some(keyword) => query.with_search(keyword),
            None => query,
        })
    }
}
