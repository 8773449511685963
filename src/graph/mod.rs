//! Graph data model: validation, bounding and the data-source boundary.

pub mod export;
mod model;
mod sanitize;
pub mod source;
mod subset;
pub mod synthetic;

pub use model::{Edge, Graph, GraphIndex, Node, NodeId};
pub use sanitize::{
    DEFAULT_LINK_KIND, DEFAULT_NODE_KIND, Endpoint, IntegrityReport, RawGraph, RawId, RawLink,
    RawNode, build_indices, integrity_check, sanitize,
};
pub use subset::select_connected_subset;
