//! # Result Assembly
//!
//! Turns raw engine output into the shapes the explorer views consume.
//! Every operation here is read-only; the only mutable state is the
//! accumulator a single call builds for itself.
//!
//! | Operation | Module |
//! |-----------|--------|
//! | Neighborhood assembly | `neighborhood` |
//! | Set operations over origin groups | `set_ops` |
//! | All-pairs shortest paths | `shortest_paths` |
//! | Eager / lazy hierarchy | `hierarchy` |
//! | Search grouping | `search` |

pub(crate) mod dispatch;
pub mod hierarchy;
pub mod neighborhood;
pub mod search;
pub mod set_ops;
pub mod shortest_paths;

pub use hierarchy::{EagerRequest, HierarchyLevel, HierarchyNode, LevelRequest, RootLevel};
pub use neighborhood::{NeighborhoodRequest, NeighborhoodResult, NodeEntry};
pub use search::{group_by_collection, GroupedSearchResults};
pub use set_ops::{GraphView, SetOperation};
pub use shortest_paths::{PathNode, ShortestPathRequest, ShortestPathResult};
