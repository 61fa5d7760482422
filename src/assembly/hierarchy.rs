//! Hierarchy (drill-down) building over the hierarchical relation.
//!
//! Two modes:
//!
//! - **Eager**: one traversal from a root, then the tree is rebuilt from the
//!   flat step list in two passes (collect parent → children, then walk
//!   down from the root). The request always asks for breadth-first order;
//!   the build itself does not depend on arrival order.
//! - **Lazy**: one level at a time. Each child gets a one-step, one-result
//!   existence probe so `has_children` is known without fetching
//!   grandchildren.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ExplorerConfig;
use crate::gateway::{TraversalBackend, TraversalOrder, TraversalRequest, TraversalStep};
use crate::model::*;
use crate::{Error, Result};
use super::dispatch::{call_with_timeout, dispatch_bounded, DispatchLimits, Tally};

// ============================================================================
// Output
// ============================================================================

/// A node as the sunburst/tree views consume it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    #[serde(rename = "_id")]
    pub id: String,
    pub label: String,
    /// Size weight; always 1.
    pub value: u64,
    #[serde(rename = "_hasChildren")]
    pub has_children: bool,
    /// `None` when the children have not been loaded.
    pub children: Option<Vec<HierarchyNode>>,
}

impl HierarchyNode {
    pub fn from_entity(entity: &Entity, has_children: bool) -> Self {
        Self {
            id: entity.id.to_string(),
            label: entity.display_label(),
            value: 1,
            has_children,
            children: None,
        }
    }

    /// Number of nodes in this subtree, self included.
    pub fn size(&self) -> usize {
        1 + self.children.iter().flatten().map(HierarchyNode::size).sum::<usize>()
    }

    pub fn find(&self, id: &str) -> Option<&HierarchyNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().flatten().find_map(|child| child.find(id))
    }
}

/// Synthetic super-root wrapping the configured roots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootLevel {
    #[serde(flatten)]
    pub root: HierarchyNode,
    /// Roots whose lookup failed.
    #[serde(skip)]
    pub failed_roots: Vec<EntityId>,
}

/// Result of expanding one level.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HierarchyLevel {
    Children(Vec<HierarchyNode>),
    Root(RootLevel),
}

impl HierarchyLevel {
    pub fn children(&self) -> &[HierarchyNode] {
        match self {
            HierarchyLevel::Children(children) => children,
            HierarchyLevel::Root(level) => level.root.children.as_deref().unwrap_or_default(),
        }
    }

    pub fn root(&self) -> Option<&HierarchyNode> {
        match self {
            HierarchyLevel::Root(level) => Some(&level.root),
            HierarchyLevel::Children(_) => None,
        }
    }
}

// ============================================================================
// Eager
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct EagerRequest {
    pub root: EntityId,
    pub depth: usize,
    pub relation_label: String,
    /// Direction walked from a parent to its children.
    pub direction: TraversalDirection,
    pub store: StoreSelector,
}

impl EagerRequest {
    pub fn new(root: EntityId, depth: usize, relation_label: impl Into<String>, direction: TraversalDirection) -> Self {
        Self {
            root,
            depth,
            relation_label: relation_label.into(),
            direction,
            store: StoreSelector::default(),
        }
    }

    pub fn store(mut self, store: StoreSelector) -> Self {
        self.store = store;
        self
    }
}

/// Materialize the subtree under `request.root`, `request.depth` levels
/// deep. Nodes on the last level carry `has_children` but no `children`.
pub async fn build_hierarchy_eager<B: TraversalBackend>(
    backend: &B,
    request: &EagerRequest,
    config: &ExplorerConfig,
) -> Result<HierarchyNode> {
    if request.relation_label.trim().is_empty() {
        return Err(Error::MalformedRequest("hierarchical relation label must not be empty".into()));
    }

    // One level past the requested depth tells whether the frontier has children.
    let traversal = TraversalRequest::new(vec![request.root.clone()], request.depth + 1, request.direction)
        .relation_label(request.relation_label.clone())
        .order(TraversalOrder::BreadthFirst)
        .limit(config.traversal_safety_limit)
        .store(request.store);

    let steps = call_with_timeout(config.request_timeout(), "traverse", backend.traverse(&traversal)).await?;
    if steps.windows(2).any(|w| w[0].depth > w[1].depth) {
        warn!(root = %request.root, "traversal steps arrived out of breadth-first order");
    }

    let tree = TreeIndex::collect(&steps, &request.relation_label);
    let root = tree
        .entities
        .get(&request.root)
        .ok_or_else(|| Error::NotFound(format!("hierarchy root {}", request.root)))?;

    // A walk cut short by the step limit has complete child lists only
    // above the last level it started, so the tree stops there.
    let reached = steps.iter().map(|step| step.depth).max().unwrap_or(0);
    let truncated = steps.len() >= config.traversal_safety_limit;
    let depth = if truncated {
        let depth = request.depth.min(reached.saturating_sub(1));
        warn!(
            root = %request.root,
            limit = config.traversal_safety_limit,
            requested = request.depth,
            built = depth,
            "hierarchy traversal hit the step limit; tree cut short"
        );
        depth
    } else {
        request.depth
    };

    let mut on_path = Vec::new();
    let mut built = tree.build(root, 0, depth, &mut on_path);
    if truncated && depth + 1 >= reached {
        confirm_frontier(backend, &mut built, request, config).await?;
    }
    info!(root = %request.root, depth, nodes = built.size(), "hierarchy built");
    Ok(built)
}

/// Re-probe frontier nodes the truncated walk reported as leaves.
async fn confirm_frontier<B: TraversalBackend>(
    backend: &B,
    tree: &mut HierarchyNode,
    request: &EagerRequest,
    config: &ExplorerConfig,
) -> Result<()> {
    let mut frontier = Vec::new();
    collect_frontier(tree, &mut frontier);
    let unconfirmed: Vec<&mut HierarchyNode> = frontier.into_iter().filter(|node| !node.has_children).collect();
    let ids = unconfirmed
        .iter()
        .map(|node| EntityId::parse(&node.id))
        .collect::<Result<Vec<_>>>()?;

    let flags = dispatch_bounded(
        ids.clone(),
        DispatchLimits::from_config(config),
        "probe",
        |id| async move { probe(backend, &id, &request.relation_label, request.direction, request.store).await },
    )
    .await;

    for ((node, id), flag) in unconfirmed.into_iter().zip(&ids).zip(flags) {
        node.has_children = probe_outcome(id, flag);
    }
    Ok(())
}

/// Nodes whose children were never loaded.
fn collect_frontier<'a>(node: &'a mut HierarchyNode, out: &mut Vec<&'a mut HierarchyNode>) {
    if node.children.is_none() {
        out.push(node);
        return;
    }
    for child in node.children.iter_mut().flatten() {
        collect_frontier(child, out);
    }
}

/// Pass one: every entity by id and every parent's children in arrival order.
struct TreeIndex {
    entities: HashMap<EntityId, Arc<Entity>>,
    children: HashMap<EntityId, IndexSet<EntityId>>,
}

impl TreeIndex {
    fn collect(steps: &[TraversalStep], relation_label: &str) -> Self {
        let mut entities = HashMap::new();
        let mut children: HashMap<EntityId, IndexSet<EntityId>> = HashMap::new();

        for step in steps {
            entities
                .entry(step.vertex.id.clone())
                .or_insert_with(|| Arc::clone(&step.vertex));

            let Some(edge) = &step.edge else { continue };
            if edge.label != relation_label {
                continue;
            }
            let Some(parent) = edge.other_end(&step.vertex.id) else { continue };
            children
                .entry(parent.clone())
                .or_default()
                .insert(step.vertex.id.clone());
        }
        Self { entities, children }
    }

    fn children_of(&self, id: &EntityId) -> impl Iterator<Item = &Arc<Entity>> + '_ {
        self.children
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|child| self.entities.get(child))
    }

    /// Pass two.
    fn build(&self, entity: &Arc<Entity>, level: usize, depth: usize, on_path: &mut Vec<EntityId>) -> HierarchyNode {
        on_path.push(entity.id.clone());
        let candidates: Vec<&Arc<Entity>> = self
            .children_of(&entity.id)
            .filter(|child| !on_path.contains(&child.id))
            .collect();

        let mut node = HierarchyNode::from_entity(entity, !candidates.is_empty());
        if level < depth {
            let children = candidates
                .into_iter()
                .map(|child| self.build(child, level + 1, depth, on_path))
                .collect();
            node.children = Some(children);
        }
        on_path.pop();
        node
    }
}

// ============================================================================
// Lazy
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct LevelRequest {
    /// `None` asks for the configured roots under the super-root.
    pub parent: Option<EntityId>,
    pub relation_label: String,
    pub direction: TraversalDirection,
    pub root_ids: Vec<EntityId>,
    pub store: StoreSelector,
}

impl LevelRequest {
    /// A request filled from the hierarchy configuration.
    pub fn from_config(parent: Option<EntityId>, config: &ExplorerConfig) -> Self {
        Self {
            parent,
            relation_label: config.hierarchy.relation_label.clone(),
            direction: config.hierarchy.direction,
            root_ids: config.hierarchy.root_ids.clone(),
            store: StoreSelector::default(),
        }
    }

    pub fn relation_label(mut self, label: impl Into<String>) -> Self {
        self.relation_label = label.into();
        self
    }

    pub fn root_ids(mut self, root_ids: Vec<EntityId>) -> Self {
        self.root_ids = root_ids;
        self
    }

    pub fn store(mut self, store: StoreSelector) -> Self {
        self.store = store;
        self
    }
}

/// Expand one level: the children of `parent`, or the configured roots
/// wrapped under the synthetic super-root.
pub async fn expand_hierarchy_level<B: TraversalBackend>(
    backend: &B,
    request: &LevelRequest,
    config: &ExplorerConfig,
) -> Result<HierarchyLevel> {
    if request.relation_label.trim().is_empty() {
        return Err(Error::MalformedRequest("hierarchical relation label must not be empty".into()));
    }
    match &request.parent {
        Some(parent) => expand_children(backend, parent, request, config).await.map(HierarchyLevel::Children),
        None => expand_roots(backend, request, config).await.map(HierarchyLevel::Root),
    }
}

async fn expand_children<B: TraversalBackend>(
    backend: &B,
    parent: &EntityId,
    request: &LevelRequest,
    config: &ExplorerConfig,
) -> Result<Vec<HierarchyNode>> {
    if !config.hierarchy.covers(parent) {
        return Err(Error::MalformedRequest(format!(
            "{parent} is not in a hierarchical collection"
        )));
    }

    let traversal = TraversalRequest::new(vec![parent.clone()], 1, request.direction)
        .min_depth(1)
        .relation_label(request.relation_label.clone())
        .limit(config.traversal_safety_limit)
        .store(request.store);
    let steps = call_with_timeout(config.request_timeout(), "traverse", backend.traverse(&traversal)).await?;

    let mut seen = HashSet::new();
    let children: Vec<Arc<Entity>> = steps
        .into_iter()
        .filter(|step| seen.insert(step.vertex.id.clone()))
        .map(|step| step.vertex)
        .collect();

    let flags = dispatch_bounded(
        children.iter().map(|c| c.id.clone()).collect(),
        DispatchLimits::from_config(config),
        "probe",
        |id| async move { probe(backend, &id, &request.relation_label, request.direction, request.store).await },
    )
    .await;

    let nodes: Vec<HierarchyNode> = children
        .iter()
        .zip(flags)
        .map(|(child, flag)| HierarchyNode::from_entity(child, probe_outcome(&child.id, flag)))
        .collect();
    debug!(parent = %parent, children = nodes.len(), "hierarchy level expanded");
    Ok(nodes)
}

async fn expand_roots<B: TraversalBackend>(
    backend: &B,
    request: &LevelRequest,
    config: &ExplorerConfig,
) -> Result<RootLevel> {
    let roots: Vec<EntityId> = request
        .root_ids
        .iter()
        .filter(|id| {
            let covered = config.hierarchy.covers(id);
            if !covered {
                debug!(root = %id, "root outside hierarchical collections skipped");
            }
            covered
        })
        .cloned()
        .collect();

    let store = request.store;
    let outcomes = dispatch_bounded(
        roots.clone(),
        DispatchLimits::from_config(config),
        "get_by_id",
        |id| async move {
            let Some(entity) = backend.get_by_id(id.collection(), id.key(), store).await? else {
                return Ok(None);
            };
            let flag = probe(backend, &id, &request.relation_label, request.direction, store).await;
            Ok::<_, Error>(Some(HierarchyNode::from_entity(&entity, probe_outcome(&id, flag))))
        },
    )
    .await;

    let mut children = Vec::new();
    let mut failed_roots = Vec::new();
    let mut tally = Tally::default();
    for (id, outcome) in roots.into_iter().zip(outcomes) {
        match outcome {
            Ok(Some(node)) => {
                tally.success();
                children.push(node);
            }
            Ok(None) => {
                tally.success();
                debug!(root = %id, "root not found; skipped");
            }
            Err(err) => {
                warn!(root = %id, error = %err, "root lookup failed; skipped");
                tally.failure(err);
                failed_roots.push(id);
            }
        }
    }
    tally.finish()?;

    let root = HierarchyNode {
        id: config.hierarchy.super_root_id.clone(),
        label: config.hierarchy.super_root_label.clone(),
        value: 1,
        has_children: !children.is_empty(),
        children: Some(children),
    };
    Ok(RootLevel { root, failed_roots })
}

/// Does `id` have at least one child? Fetches at most one step.
async fn probe<B: TraversalBackend>(
    backend: &B,
    id: &EntityId,
    relation_label: &str,
    direction: TraversalDirection,
    store: StoreSelector,
) -> Result<bool> {
    let traversal = TraversalRequest::new(vec![id.clone()], 1, direction)
        .min_depth(1)
        .relation_label(relation_label)
        .limit(1)
        .store(store);
    Ok(!backend.traverse(&traversal).await?.is_empty())
}

/// A failed probe still offers drill-down.
fn probe_outcome(id: &EntityId, outcome: Result<bool>) -> bool {
    outcome.unwrap_or_else(|err| {
        warn!(node = %id, error = %err, "existence probe failed; assuming children");
        true
    })
}
