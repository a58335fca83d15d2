//! In-memory URL graph.
//!
//! An arena of [`UrlInfo`](crate::UrlInfo) nodes keyed by canonical URL.
//! Edges are stored as URL key sets on both ends, so cycles (`A -> B -> A`)
//! never create ownership cycles and node lifetime is owned by the map alone.

mod mutations;
mod queries;
mod store;
mod traversal;

pub use mutations::ContentUpdate;
pub use store::UrlGraph;

// These wildcard imports are intentional - they add impl blocks to UrlGraph
#[allow(unused_imports)]
use mutations::*;
#[allow(unused_imports)]
use queries::*;
#[allow(unused_imports)]
use traversal::*;
