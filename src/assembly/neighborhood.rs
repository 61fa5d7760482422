//! Neighborhood assembly.
//!
//! Turns per-seed traversal output into a deduplicated, depth-bounded,
//! origin-grouped neighborhood.
//!
//! ```text
//! seeds × legs ──► traverse(depth + 1) ──► merge ──► per-origin cap ──► link closure
//! ```
//!
//! Each seed is traversed one level past the requested depth. That extra
//! level only exists to surface relations between retained nodes that the
//! walk discovers late (e.g. between two final-layer nodes); vertices at that
//! level are never retained.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ExplorerConfig;
use crate::gateway::{TraversalBackend, TraversalOrder, TraversalRequest, TraversalStep};
use crate::model::*;
use crate::policy::PruningPolicy;
use crate::{Error, Result};
use super::dispatch::{dispatch_bounded, DispatchLimits, Tally};

/// A neighborhood request.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborhoodRequest {
    pub seeds: Vec<EntityId>,
    pub depth: usize,
    pub direction: Direction,
    pub policy: PruningPolicy,
    /// Cap on retained entries per origin.
    pub node_limit: usize,
    /// Only vertices in these collections are visited. `None` means all.
    pub allowed_collections: Option<Vec<String>>,
    pub store: StoreSelector,
}

impl NeighborhoodRequest {
    pub fn new(seeds: Vec<EntityId>, depth: usize, direction: Direction) -> Self {
        Self {
            seeds,
            depth,
            direction,
            policy: PruningPolicy::none(),
            node_limit: ExplorerConfig::default().default_node_limit,
            allowed_collections: None,
            store: StoreSelector::default(),
        }
    }

    pub fn policy(mut self, policy: PruningPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn node_limit(mut self, node_limit: usize) -> Self {
        self.node_limit = node_limit;
        self
    }

    pub fn allowed_collections<I, S>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_collections = Some(collections.into_iter().map(Into::into).collect());
        self
    }

    pub fn store(mut self, store: StoreSelector) -> Self {
        self.store = store;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.seeds.is_empty() {
            return Err(Error::MalformedRequest("neighborhood needs at least one seed".into()));
        }
        if self.node_limit == 0 {
            return Err(Error::MalformedRequest("node_limit must be at least 1".into()));
        }
        if let Some(allowed) = &self.allowed_collections {
            if allowed.iter().any(|c| c.is_empty() || c.contains('/')) {
                return Err(Error::MalformedRequest(format!(
                    "invalid collection name in allowed_collections: {allowed:?}"
                )));
            }
        }
        Ok(())
    }

    /// Seeds in first-seen order, duplicates dropped.
    fn distinct_seeds(&self) -> Vec<EntityId> {
        let mut seen = HashSet::new();
        self.seeds.iter().filter(|s| seen.insert(*s)).cloned().collect()
    }
}

/// A retained node together with the path that first reached it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeEntry {
    pub node: Arc<Entity>,
    pub path: Path,
}

/// Origin-grouped neighborhood.
///
/// A node reached from several origins appears once under each of them, but
/// every entry shares the same `Arc<Entity>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NeighborhoodResult {
    #[serde(rename = "nodes")]
    pub nodes_by_origin: IndexMap<EntityId, Vec<NodeEntry>>,
    pub links: Vec<Relation>,
    /// Origins with at least one failed traversal; their group may be
    /// incomplete or empty.
    #[serde(skip)]
    pub failed_origins: Vec<EntityId>,
}

impl NeighborhoodResult {
    /// Every retained node once, in first-seen order.
    pub fn unique_nodes(&self) -> Vec<Arc<Entity>> {
        let mut seen = HashSet::new();
        self.nodes_by_origin
            .values()
            .flatten()
            .filter(|entry| seen.insert(entry.node.id.clone()))
            .map(|entry| Arc::clone(&entry.node))
            .collect()
    }

    pub fn node_ids(&self) -> HashSet<EntityId> {
        self.nodes_by_origin
            .values()
            .flatten()
            .map(|entry| entry.node.id.clone())
            .collect()
    }

    pub fn contains_node(&self, id: &EntityId) -> bool {
        self.nodes_by_origin.values().flatten().any(|entry| entry.node.id == *id)
    }

    pub fn entries_for(&self, origin: &EntityId) -> &[NodeEntry] {
        self.nodes_by_origin.get(origin).map_or(&[], Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.nodes_by_origin.values().all(Vec::is_empty)
    }
}

/// Assemble the neighborhood of `request.seeds`.
///
/// Per-unit engine failures are contained and recorded in
/// `failed_origins`; the call fails only when every traversal failed.
pub async fn assemble_neighborhood<B: TraversalBackend>(
    backend: &B,
    request: &NeighborhoodRequest,
    config: &ExplorerConfig,
) -> Result<NeighborhoodResult> {
    request.validate()?;
    let seeds = request.distinct_seeds();
    let safety_limit = config.traversal_safety_limit.max(request.node_limit);

    let units: Vec<(EntityId, TraversalDirection)> = seeds
        .iter()
        .flat_map(|seed| request.direction.legs().iter().map(move |leg| (seed.clone(), *leg)))
        .collect();

    debug!(
        seeds = seeds.len(),
        depth = request.depth,
        direction = ?request.direction,
        units = units.len(),
        "assembling neighborhood"
    );

    let outcomes = dispatch_bounded(
        units.clone(),
        DispatchLimits::from_config(config),
        "traverse",
        |(seed, leg)| {
            let traversal = TraversalRequest::new(vec![seed], request.depth + 1, leg)
                .allowed_collections(request.allowed_collections.clone())
                .prune(request.policy.prune.clone())
                .order(TraversalOrder::BreadthFirst)
                .limit(safety_limit)
                .store(request.store);
            async move { backend.traverse(&traversal).await }
        },
    )
    .await;

    let mut merge = Merge::new(&seeds, request.depth, &request.policy);
    let mut tally = Tally::default();
    let mut failed_origins: Vec<EntityId> = Vec::new();

    for ((seed, leg), outcome) in units.iter().zip(outcomes) {
        match outcome {
            Ok(steps) => {
                tally.success();
                merge.absorb(steps);
            }
            Err(err) => {
                warn!(seed = %seed, leg = ?leg, error = %err, "traversal failed; origin contributes nothing from this leg");
                if !failed_origins.contains(seed) {
                    failed_origins.push(seed.clone());
                }
                tally.failure(err);
            }
        }
    }

    let failures = tally.failed();
    tally.finish()?;

    let mut result = merge.finish(request.node_limit);
    result.failed_origins = failed_origins;

    info!(
        seeds = seeds.len(),
        nodes = result.node_ids().len(),
        links = result.links.len(),
        failures,
        "neighborhood assembled"
    );
    Ok(result)
}

/// Single-threaded accumulator over traversal outcomes.
struct Merge<'a> {
    boundary: usize,
    policy: &'a PruningPolicy,
    /// One shared copy of each entity, first arrival wins.
    shared: HashMap<EntityId, Arc<Entity>>,
    /// origin → node id → first (shallowest) entry
    groups: IndexMap<EntityId, IndexMap<EntityId, NodeEntry>>,
    links: IndexMap<RelationKey, Relation>,
}

impl<'a> Merge<'a> {
    fn new(seeds: &[EntityId], depth: usize, policy: &'a PruningPolicy) -> Self {
        Self {
            boundary: depth + 1,
            policy,
            shared: HashMap::new(),
            groups: seeds.iter().map(|s| (s.clone(), IndexMap::new())).collect(),
            links: IndexMap::new(),
        }
    }

    fn absorb(&mut self, steps: Vec<TraversalStep>) {
        for step in steps {
            if let Some(edge) = &step.edge {
                self.links.entry(edge.key()).or_insert_with(|| edge.clone());
            }
            // Boundary sentinels only ever contribute their edge.
            if step.depth >= self.boundary {
                continue;
            }
            if self.policy.should_exclude(&step.vertex) {
                continue;
            }

            let id = step.vertex.id.clone();
            let node = Arc::clone(
                self.shared
                    .entry(id.clone())
                    .or_insert_with(|| Arc::clone(&step.vertex)),
            );
            self.groups
                .entry(step.origin)
                .or_default()
                .entry(id)
                .or_insert(NodeEntry { node, path: step.path });
        }
    }

    fn finish(self, node_limit: usize) -> NeighborhoodResult {
        let nodes_by_origin: IndexMap<EntityId, Vec<NodeEntry>> = self
            .groups
            .into_iter()
            .map(|(origin, entries)| (origin, entries.into_values().take(node_limit).collect()))
            .collect();

        let retained: HashSet<EntityId> = nodes_by_origin
            .values()
            .flatten()
            .map(|entry| entry.node.id.clone())
            .collect();

        // Link closure: both endpoints must have survived every filter.
        let links: Vec<Relation> = self
            .links
            .into_values()
            .filter(|rel| retained.contains(&rel.from) && retained.contains(&rel.to))
            .collect();

        NeighborhoodResult { nodes_by_origin, links, failed_origins: Vec::new() }
    }
}
