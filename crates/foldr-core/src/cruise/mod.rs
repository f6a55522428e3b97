//! Depth-first "cruise" traversal across folders and archives.
//!
//! A [`CruiseTree`] is an arena of [`CruiseNode`]s keyed by location. Nodes
//! are created on demand as traversal moves downward (children) or upward
//! (parents), and each node resolves its children and parent at most once.
//! [`CruiseSession`] drives a tree one step at a time, cancelling whatever
//! step was still running when a new one starts.

pub mod node;
pub mod session;
pub mod tree;

pub use node::{CruiseNode, NodeId};
pub use session::CruiseSession;
pub use tree::CruiseTree;

/// Runtime cruise settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CruiseSettings {
    /// Descend into archives found inside other archives.
    pub recursive_archive: bool,
}

impl Default for CruiseSettings {
    fn default() -> Self {
        crate::config::settings::Config::default().cruise_settings()
    }
}
