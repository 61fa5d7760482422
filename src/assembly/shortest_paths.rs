//! All-pairs shortest-path aggregation.
//!
//! For seeds `s0..sn` every unordered pair `(si, sj)`, `i < j`, is sent to
//! the engine as one independent all-shortest-paths request. That is
//! `n·(n−1)/2` engine calls, so the seed count is checked against
//! `max_shortest_path_seeds` before anything is dispatched.
//!
//! Nodes are grouped under the pair's target (`sj`); links are unioned
//! globally.

use std::sync::Arc;

use hashbrown::HashSet;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ExplorerConfig;
use crate::gateway::TraversalBackend;
use crate::model::*;
use crate::{Error, Result};
use super::dispatch::{dispatch_bounded, DispatchLimits, Tally};

#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPathRequest {
    pub seeds: Vec<EntityId>,
    pub direction: Direction,
    pub store: StoreSelector,
}

impl ShortestPathRequest {
    pub fn new(seeds: Vec<EntityId>, direction: Direction) -> Self {
        Self { seeds, direction, store: StoreSelector::default() }
    }

    pub fn store(mut self, store: StoreSelector) -> Self {
        self.store = store;
        self
    }

    /// Distinct seeds in first-seen order, after the pre-flight checks.
    pub fn validated_seeds(&self, config: &ExplorerConfig) -> Result<Vec<EntityId>> {
        let mut seen = HashSet::new();
        let seeds: Vec<EntityId> = self.seeds.iter().filter(|s| seen.insert(*s)).cloned().collect();
        if seeds.len() < 2 {
            return Err(Error::MalformedRequest(format!(
                "shortest paths need at least two distinct seeds, got {}",
                seeds.len()
            )));
        }
        if seeds.len() > config.max_shortest_path_seeds {
            return Err(Error::MalformedRequest(format!(
                "{} seeds would need {} path requests; at most {} seeds are accepted",
                seeds.len(),
                seeds.len() * (seeds.len() - 1) / 2,
                config.max_shortest_path_seeds
            )));
        }
        Ok(seeds)
    }
}

/// One node found on a shortest path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathNode {
    pub node: Arc<Entity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShortestPathResult {
    #[serde(rename = "nodes")]
    pub nodes_by_target: IndexMap<EntityId, Vec<PathNode>>,
    pub links: Vec<Relation>,
    /// Pairs whose request failed; they contribute nothing.
    #[serde(skip)]
    pub failed_pairs: Vec<(EntityId, EntityId)>,
}

impl ShortestPathResult {
    pub fn nodes_for(&self, target: &EntityId) -> &[PathNode] {
        self.nodes_by_target.get(target).map_or(&[], Vec::as_slice)
    }

    pub fn node_ids(&self) -> HashSet<EntityId> {
        self.nodes_by_target.values().flatten().map(|n| n.node.id.clone()).collect()
    }
}

pub async fn aggregate_shortest_paths<B: TraversalBackend>(
    backend: &B,
    request: &ShortestPathRequest,
    config: &ExplorerConfig,
) -> Result<ShortestPathResult> {
    let seeds = request.validated_seeds(config)?;

    let mut pairs = Vec::with_capacity(seeds.len() * (seeds.len() - 1) / 2);
    for (i, from) in seeds.iter().enumerate() {
        for to in &seeds[i + 1..] {
            pairs.push((from.clone(), to.clone()));
        }
    }
    debug!(seeds = seeds.len(), pairs = pairs.len(), direction = ?request.direction, "aggregating shortest paths");

    let store = request.store;
    let legs = request.direction.legs();
    let outcomes = dispatch_bounded(
        pairs.clone(),
        DispatchLimits::from_config(config),
        "all_shortest_paths",
        |(from, to)| async move {
            let mut best: Vec<Path> = Vec::new();
            for leg in legs {
                let paths = backend.all_shortest_paths(&from, &to, *leg, store).await?;
                keep_minimal(&mut best, paths);
            }
            Ok::<_, Error>(best)
        },
    )
    .await;

    let mut nodes_by_target: IndexMap<EntityId, IndexMap<EntityId, Arc<Entity>>> = IndexMap::new();
    let mut links: IndexMap<RelationKey, Relation> = IndexMap::new();
    let mut failed_pairs = Vec::new();
    let mut tally = Tally::default();

    for ((from, to), outcome) in pairs.into_iter().zip(outcomes) {
        match outcome {
            Ok(paths) => {
                tally.success();
                let group = nodes_by_target.entry(to).or_default();
                for path in paths {
                    for vertex in path.vertices {
                        group.entry(vertex.id.clone()).or_insert(vertex);
                    }
                    for edge in path.edges {
                        links.entry(edge.key()).or_insert(edge);
                    }
                }
            }
            Err(err) => {
                warn!(from = %from, to = %to, error = %err, "shortest path request failed; pair skipped");
                tally.failure(err);
                failed_pairs.push((from, to));
            }
        }
    }
    tally.finish()?;

    let result = ShortestPathResult {
        nodes_by_target: nodes_by_target
            .into_iter()
            .map(|(target, nodes)| (target, nodes.into_values().map(|node| PathNode { node }).collect()))
            .collect(),
        links: links.into_values().collect(),
        failed_pairs,
    };
    info!(
        targets = result.nodes_by_target.len(),
        links = result.links.len(),
        failed_pairs = result.failed_pairs.len(),
        "shortest paths aggregated"
    );
    Ok(result)
}

/// Merge `candidates` into `best`, keeping only paths of the smallest length.
fn keep_minimal(best: &mut Vec<Path>, candidates: Vec<Path>) {
    let Some(shortest) = candidates.iter().map(Path::len).min() else {
        return;
    };
    match best.first().map(Path::len) {
        Some(current) if current < shortest => {}
        Some(current) if current == shortest => best.extend(candidates),
        _ => *best = candidates.into_iter().filter(|p| p.len() == shortest).collect(),
    }
}
