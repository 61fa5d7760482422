//! # Traversal Gateway
//!
//! This is THE contract between the assembly engine and the external graph
//! engine. The engine does the traversing, path finding and ranking; the
//! assembly engine only ever sees what comes back through this trait.
//!
//! Requests are parameter objects, never query text. A backend translates a
//! [`TraversalRequest`] into whatever its engine speaks.
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryGateway` | `memory` | In-memory reference engine for testing/embedding |

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::policy::EntityFilter;
use crate::{Error, Result};

pub use memory::MemoryGateway;

// ============================================================================
// Traversal request
// ============================================================================

/// Order in which the engine yields traversal steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraversalOrder {
    #[default]
    BreadthFirst,
    DepthFirst,
}

/// A bounded-depth traversal, fully parameterized.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalRequest {
    pub seeds: Vec<EntityId>,
    /// Steps shallower than this are not yielded (but are still walked).
    pub min_depth: usize,
    pub max_depth: usize,
    pub direction: TraversalDirection,
    /// Only vertices in these collections are visited. `None` means all.
    pub allowed_collections: Option<Vec<String>>,
    /// Only relations with one of these labels are followed. `None` means all.
    pub relation_labels: Option<Vec<String>>,
    /// The engine does not descend past entities matching this filter.
    pub prune: EntityFilter,
    pub order: TraversalOrder,
    /// Cap on yielded steps for the whole request.
    pub limit: Option<usize>,
    pub store: StoreSelector,
}

impl TraversalRequest {
    /// Breadth-first traversal `0..=max_depth` from the given seeds.
    pub fn new(seeds: Vec<EntityId>, max_depth: usize, direction: TraversalDirection) -> Self {
        Self {
            seeds,
            min_depth: 0,
            max_depth,
            direction,
            allowed_collections: None,
            relation_labels: None,
            prune: EntityFilter::default(),
            order: TraversalOrder::BreadthFirst,
            limit: None,
            store: StoreSelector::default(),
        }
    }

    pub fn min_depth(mut self, min_depth: usize) -> Self {
        self.min_depth = min_depth;
        self
    }

    pub fn allowed_collections(mut self, collections: Option<Vec<String>>) -> Self {
        self.allowed_collections = collections;
        self
    }

    pub fn relation_label(mut self, label: impl Into<String>) -> Self {
        self.relation_labels = Some(vec![label.into()]);
        self
    }

    pub fn prune(mut self, prune: EntityFilter) -> Self {
        self.prune = prune;
        self
    }

    pub fn order(mut self, order: TraversalOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn store(mut self, store: StoreSelector) -> Self {
        self.store = store;
        self
    }
}

/// One engine-yielded traversal tuple.
///
/// `edge` is `None` only for the depth-zero seed itself.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalStep {
    pub vertex: Arc<Entity>,
    pub edge: Option<Relation>,
    pub path: Path,
    /// Number of edges between the origin and `vertex`.
    pub depth: usize,
    pub origin: EntityId,
}

// ============================================================================
// TraversalBackend Trait
// ============================================================================

/// The engine contract.
///
/// All operations are read-only. Errors are reported as values; the
/// assembly engine decides whether a failure is contained or surfaced.
#[async_trait]
pub trait TraversalBackend: Send + Sync + 'static {
    /// Bounded-depth traversal. Yields one step per visited path tip.
    async fn traverse(&self, request: &TraversalRequest) -> Result<Vec<TraversalStep>>;

    /// Every minimal-length path between two entities, ties included.
    async fn all_shortest_paths(
        &self,
        from: &EntityId,
        to: &EntityId,
        direction: TraversalDirection,
        store: StoreSelector,
    ) -> Result<Vec<Path>>;

    /// Ranked search. The returned order is the engine's rank order.
    async fn search(&self, term: &str, store: StoreSelector) -> Result<Vec<Arc<Entity>>>;

    /// Fetch a single entity. `Ok(None)` when it does not exist.
    async fn get_by_id(
        &self,
        collection: &str,
        key: &str,
        store: StoreSelector,
    ) -> Result<Option<Arc<Entity>>>;

    /// Document collections of a store.
    ///
    /// Default returns an error; override for engines that can list them.
    async fn collections(&self, _store: StoreSelector) -> Result<Vec<String>> {
        Err(Error::Query("collection listing not supported".into()))
    }

    /// Every document of a collection, `Ok(None)` when the collection does
    /// not exist.
    async fn documents_in(&self, _collection: &str, _store: StoreSelector) -> Result<Option<Vec<Arc<Entity>>>> {
        Err(Error::Query("collection scan not supported".into()))
    }

    /// Relations with `id` as their source (`Outbound`), target
    /// (`Inbound`) or either (`Any`).
    async fn edges_of(
        &self,
        _id: &EntityId,
        _direction: TraversalDirection,
        _store: StoreSelector,
    ) -> Result<Vec<Relation>> {
        Err(Error::Query("edge lookup not supported".into()))
    }
}

#[async_trait]
impl<B: TraversalBackend> TraversalBackend for Arc<B> {
    async fn traverse(&self, request: &TraversalRequest) -> Result<Vec<TraversalStep>> {
        (**self).traverse(request).await
    }

    async fn all_shortest_paths(
        &self,
        from: &EntityId,
        to: &EntityId,
        direction: TraversalDirection,
        store: StoreSelector,
    ) -> Result<Vec<Path>> {
        (**self).all_shortest_paths(from, to, direction, store).await
    }

    async fn search(&self, term: &str, store: StoreSelector) -> Result<Vec<Arc<Entity>>> {
        (**self).search(term, store).await
    }

    async fn get_by_id(
        &self,
        collection: &str,
        key: &str,
        store: StoreSelector,
    ) -> Result<Option<Arc<Entity>>> {
        (**self).get_by_id(collection, key, store).await
    }

    async fn collections(&self, store: StoreSelector) -> Result<Vec<String>> {
        (**self).collections(store).await
    }

    async fn documents_in(&self, collection: &str, store: StoreSelector) -> Result<Option<Vec<Arc<Entity>>>> {
        (**self).documents_in(collection, store).await
    }

    async fn edges_of(
        &self,
        id: &EntityId,
        direction: TraversalDirection,
        store: StoreSelector,
    ) -> Result<Vec<Relation>> {
        (**self).edges_of(id, direction, store).await
    }
}
