use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::url_info::UrlInfo;

/// Shared handle to the URL graph.
///
/// Cloning is cheap; all clones see the same nodes. Every public operation
/// takes the lock once, so a single call is atomic with respect to other
/// callers and mutations to one node are serialized.
#[derive(Debug, Clone, Default)]
pub struct UrlGraph {
    pub(crate) inner: Arc<RwLock<GraphInner>>,
}

#[derive(Debug, Default)]
pub(crate) struct GraphInner {
    pub(crate) nodes: FxHashMap<String, UrlInfo>,
    pub(crate) entry_points: IndexSet<String>,
}

impl UrlGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }
}
