//! # graph-explorer: Graph Result Assembly
//!
//! Turns raw traversal output from an external graph engine into the shapes
//! an exploration UI consumes: origin-grouped neighborhoods, all-pairs
//! shortest-path subgraphs, drill-down hierarchies and collection-grouped
//! search hits.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `TraversalBackend` is the contract between assembly and the engine
//! 2. **Clean DTOs**: `Entity`, `Relation`, `Path`, `Value` cross all boundaries
//! 3. **Parameter objects, never query text**: a `TraversalRequest` says what to walk
//! 4. **Failures are values**: one failed sub-request never sinks its siblings
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use graph_explorer::{Direction, EntityId, Explorer, NeighborhoodRequest};
//!
//! # async fn example() -> graph_explorer::Result<()> {
//! let explorer = Explorer::open_memory().await?;
//!
//! let request = NeighborhoodRequest::new(
//!     vec![EntityId::parse("CL/0000001")?],
//!     1,
//!     Direction::Outbound,
//! );
//! let result = explorer.assemble_neighborhood(&request).await?;
//!
//! for (origin, entries) in &result.nodes_by_origin {
//!     println!("{origin}: {} nodes", entries.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! | Backend | Description |
//! |---------|-------------|
//! | `MemoryGateway` | In-memory engine for testing/embedding |

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::assembly::dispatch::call_with_timeout;

// ============================================================================
// Modules
// ============================================================================

pub mod assembly;
pub mod config;
pub mod gateway;
pub mod model;
pub mod policy;
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use model::{
    Direction, Entity, EntityId, Path, PropertyMap, Relation, RelationId, StoreSelector,
    TraversalDirection, Value,
};

pub use gateway::{MemoryGateway, TraversalBackend, TraversalOrder, TraversalRequest, TraversalStep};

pub use policy::{EntityFilter, PruningPolicy};

pub use assembly::{
    EagerRequest, GraphView, GroupedSearchResults, HierarchyLevel, HierarchyNode, LevelRequest,
    NeighborhoodRequest, NeighborhoodResult, NodeEntry, PathNode, SetOperation,
    ShortestPathRequest, ShortestPathResult,
};

pub use config::{ExplorerConfig, HierarchyConfig};

// ============================================================================
// Top-level Explorer handle
// ============================================================================

/// The primary entry point. An `Explorer` wraps a traversal backend and
/// exposes the assembly operations.
pub struct Explorer<B: TraversalBackend> {
    backend: B,
    config: ExplorerConfig,
}

impl<B: TraversalBackend> Explorer<B> {
    /// Create an Explorer with the given backend and default configuration.
    pub fn with_backend(backend: B) -> Self {
        Self { backend, config: ExplorerConfig::default() }
    }

    pub fn with_config(backend: B, config: ExplorerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    /// Neighborhood of the request's seeds.
    ///
    /// Fails with `AllRequestsFailed` when every traversal failed; partial
    /// failures are recorded in `failed_origins`.
    pub async fn assemble_neighborhood(&self, request: &NeighborhoodRequest) -> Result<NeighborhoodResult> {
        assembly::neighborhood::assemble_neighborhood(&self.backend, request, &self.config).await
    }

    /// Like [`assemble_neighborhood`](Self::assemble_neighborhood), but an
    /// engine failure yields an empty neighborhood. Only a malformed request
    /// is an error.
    pub async fn assemble_neighborhood_or_empty(&self, request: &NeighborhoodRequest) -> Result<NeighborhoodResult> {
        match self.assemble_neighborhood(request).await {
            Err(Error::MalformedRequest(msg)) => Err(Error::MalformedRequest(msg)),
            Err(err) => {
                warn!(error = %err, "neighborhood assembly failed; returning empty result");
                Ok(NeighborhoodResult::default())
            }
            ok => ok,
        }
    }

    pub async fn aggregate_shortest_paths(&self, request: &ShortestPathRequest) -> Result<ShortestPathResult> {
        assembly::shortest_paths::aggregate_shortest_paths(&self.backend, request, &self.config).await
    }

    pub async fn build_hierarchy_eager(&self, request: &EagerRequest) -> Result<HierarchyNode> {
        assembly::hierarchy::build_hierarchy_eager(&self.backend, request, &self.config).await
    }

    pub async fn expand_hierarchy_level(&self, request: &LevelRequest) -> Result<HierarchyLevel> {
        assembly::hierarchy::expand_hierarchy_level(&self.backend, request, &self.config).await
    }

    pub async fn group_search_results(&self, term: &str, store: StoreSelector) -> Result<GroupedSearchResults> {
        assembly::search::group_search_results(&self.backend, term, store, &self.config).await
    }

    /// Fetch one entity by collection and key.
    pub async fn document(&self, collection: &str, key: &str, store: StoreSelector) -> Result<Arc<Entity>> {
        let id = EntityId::new(collection, key)?;
        let lookup = self.backend.get_by_id(id.collection(), id.key(), store);
        call_with_timeout(self.config.request_timeout(), "get_by_id", lookup)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Entity {id}")))
    }

    /// Document collections of a store, sorted, system collections hidden.
    pub async fn collections(&self, store: StoreSelector) -> Result<Vec<String>> {
        let listing = self.backend.collections(store);
        let names = call_with_timeout(self.config.request_timeout(), "collections", listing).await?;
        info!(store = %store, collections = names.len(), "listed collections");
        Ok(names)
    }

    /// Every document of one collection. An unknown collection is `NotFound`.
    pub async fn documents_in(&self, collection: &str, store: StoreSelector) -> Result<Vec<Arc<Entity>>> {
        if collection.is_empty() || collection.contains('/') {
            return Err(Error::MalformedRequest(format!("invalid collection name '{collection}'")));
        }
        let listing = self.backend.documents_in(collection, store);
        call_with_timeout(self.config.request_timeout(), "documents_in", listing)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Collection {collection}")))
    }

    /// Relations touching `id`: `Outbound` for those leaving it, `Inbound`
    /// for those arriving, `Any` for both.
    pub async fn edges_of(
        &self,
        id: &EntityId,
        direction: TraversalDirection,
        store: StoreSelector,
    ) -> Result<Vec<Relation>> {
        let lookup = self.backend.edges_of(id, direction, store);
        let edges = call_with_timeout(self.config.request_timeout(), "edges_of", lookup).await?;
        debug!(entity = %id, ?direction, edges = edges.len(), "related edges fetched");
        Ok(edges)
    }

    /// Every document of every listed collection, grouped by collection.
    pub async fn all_documents(&self, store: StoreSelector) -> Result<IndexMap<String, Vec<Arc<Entity>>>> {
        let mut all = IndexMap::new();
        for collection in self.collections(store).await? {
            let documents = self.documents_in(&collection, store).await?;
            all.insert(collection, documents);
        }
        info!(store = %store, collections = all.len(), "listed all documents");
        Ok(all)
    }

    /// Access the underlying backend (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }
}

/// In-memory explorer for testing and embedding.
impl Explorer<MemoryGateway> {
    pub async fn open_memory() -> Result<Self> {
        let backend = MemoryGateway::new();
        Ok(Self::with_backend(backend))
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Engine call {operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Query error: {0}")]
    Query(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("All {attempted} engine requests failed; last error: {last}")]
    AllRequestsFailed { attempted: usize, last: Box<Error> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Connection loss or timeout talking to the engine.
    pub fn is_engine_failure(&self) -> bool {
        match self {
            Error::EngineUnavailable(_) | Error::Timeout { .. } => true,
            Error::AllRequestsFailed { last, .. } => last.is_engine_failure(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
