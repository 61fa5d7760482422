//! In-memory traversal engine.
//!
//! This is the reference implementation of `TraversalBackend`.
//! It keeps one adjacency-list graph per store behind a RwLock.
//!
//! ## Semantics
//!
//! - **Traversal uniqueness is per path**: a vertex never repeats within one
//!   path, but the same vertex may be yielded again through a different
//!   path. Output is therefore redundant, the way a real engine's is.
//! - **Pruned vertices are yielded**; the walk just stops there.
//! - **Search** ranks an exact (case-insensitive) field match above bigram
//!   similarity, and returns hits sorted by score. Ties keep insertion order.
//!
//! Use this backend for:
//! - Testing the assembly engine
//! - Embedding the explorer over a small, fully loaded graph

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::model::*;
use crate::{Error, Result};
use super::{TraversalBackend, TraversalOrder, TraversalRequest, TraversalStep};

/// Score given to an exact field match.
pub const EXACT_MATCH_BOOST: f64 = 10.0;
/// Minimum bigram similarity for a fuzzy hit.
pub const NGRAM_THRESHOLD: f64 = 0.7;

/// Fields searched by default.
pub const DEFAULT_SEARCH_FIELDS: &[&str] = &[
    "label",
    "name",
    "Name",
    "Symbol",
    "Label",
    "PMID",
    "Phase",
    "Genotype_annotation",
];

// ============================================================================
// MemoryGateway
// ============================================================================

/// In-memory graph engine.
#[derive(Clone)]
pub struct MemoryGateway {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    stores: RwLock<HashMap<StoreSelector, MemoryGraph>>,
    search_fields: Vec<String>,
}

#[derive(Default)]
struct MemoryGraph {
    entities: IndexMap<EntityId, Arc<Entity>>,
    relations: Vec<Relation>,
    /// entity id → indices into `relations` touching it
    adjacency: HashMap<EntityId, Vec<usize>>,
}

impl MemoryGraph {
    fn relations_of<'a>(&'a self, id: &EntityId) -> impl Iterator<Item = &'a Relation> + use<'a> {
        self.adjacency
            .get(id)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.relations[idx])
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::with_search_fields(DEFAULT_SEARCH_FIELDS.iter().copied())
    }

    pub fn with_search_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Arc::new(MemoryInner {
                stores: RwLock::new(HashMap::new()),
                search_fields: fields.into_iter().map(Into::into).collect(),
            }),
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Insert (or replace) an entity.
    pub fn insert_entity(&self, store: StoreSelector, entity: Entity) -> Arc<Entity> {
        let entity = Arc::new(entity);
        let mut stores = self.inner.stores.write();
        let graph = stores.entry(store).or_default();
        graph.adjacency.entry(entity.id.clone()).or_default();
        graph.entities.insert(entity.id.clone(), Arc::clone(&entity));
        entity
    }

    /// Insert a relation. Both endpoints must already exist.
    pub fn insert_relation(&self, store: StoreSelector, relation: Relation) -> Result<()> {
        let mut stores = self.inner.stores.write();
        let graph = stores.entry(store).or_default();

        for end in [&relation.from, &relation.to] {
            if !graph.entities.contains_key(end) {
                return Err(Error::NotFound(format!("Relation endpoint {end}")));
            }
        }

        let idx = graph.relations.len();
        graph.adjacency.entry(relation.from.clone()).or_default().push(idx);
        if relation.from != relation.to {
            graph.adjacency.entry(relation.to.clone()).or_default().push(idx);
        }
        graph.relations.push(relation);
        Ok(())
    }

    /// Load engine-shaped JSON documents: objects carrying `_from`/`_to` are
    /// relations, everything else is an entity. Returns the number loaded.
    pub fn load_documents(&self, store: StoreSelector, documents: serde_json::Value) -> Result<usize> {
        let serde_json::Value::Array(documents) = documents else {
            return Err(Error::MalformedRequest("expected a JSON array of documents".into()));
        };

        let (relations, entities): (Vec<_>, Vec<_>) = documents
            .into_iter()
            .partition(|doc| doc.get("_from").is_some() && doc.get("_to").is_some());

        let mut loaded = 0;
        for doc in entities {
            self.insert_entity(store, serde_json::from_value::<Entity>(doc)?);
            loaded += 1;
        }
        for doc in relations {
            self.insert_relation(store, serde_json::from_value::<Relation>(doc)?)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn entity_count(&self, store: StoreSelector) -> usize {
        self.inner.stores.read().get(&store).map_or(0, |g| g.entities.len())
    }

    pub fn relation_count(&self, store: StoreSelector) -> usize {
        self.inner.stores.read().get(&store).map_or(0, |g| g.relations.len())
    }

    // ========================================================================
    // Engine operations (synchronous core)
    // ========================================================================

    fn with_graph<T>(&self, store: StoreSelector, f: impl FnOnce(&MemoryGraph) -> Result<T>) -> Result<T> {
        let stores = self.inner.stores.read();
        let graph = stores
            .get(&store)
            .ok_or_else(|| Error::Query(format!("graph '{store}' is not loaded")))?;
        f(graph)
    }

    fn traverse_sync(&self, req: &TraversalRequest) -> Result<Vec<TraversalStep>> {
        self.with_graph(req.store, |graph| {
            let limit = req.limit.unwrap_or(usize::MAX);
            let mut steps = Vec::new();
            if limit == 0 {
                return Ok(steps);
            }

            for seed in &req.seeds {
                let Some(start) = graph.entities.get(seed) else {
                    debug!(seed = %seed, "traversal seed not found");
                    continue;
                };

                let root = Path::single(Arc::clone(start));
                if req.min_depth == 0 {
                    steps.push(TraversalStep {
                        vertex: Arc::clone(start),
                        edge: None,
                        path: root.clone(),
                        depth: 0,
                        origin: seed.clone(),
                    });
                    if steps.len() >= limit {
                        return Ok(steps);
                    }
                }

                let mut pending = VecDeque::new();
                if !req.prune.matches(seed) {
                    pending.push_back(root);
                }

                loop {
                    let next = match req.order {
                        TraversalOrder::BreadthFirst => pending.pop_front(),
                        TraversalOrder::DepthFirst => pending.pop_back(),
                    };
                    let Some(path) = next else { break };
                    let depth = path.len();
                    if depth >= req.max_depth {
                        continue;
                    }
                    let Some(tip) = path.end().map(|v| v.id.clone()) else { continue };

                    for rel in graph.relations_of(&tip) {
                        if !rel.walkable_from(&tip, req.direction) {
                            continue;
                        }
                        if let Some(labels) = &req.relation_labels {
                            if !labels.iter().any(|l| *l == rel.label) {
                                continue;
                            }
                        }
                        let Some(next_id) = rel.other_end(&tip) else { continue };
                        // Avoid cycles
                        if path.contains(next_id) {
                            continue;
                        }
                        if let Some(allowed) = &req.allowed_collections {
                            if !allowed.iter().any(|c| c == next_id.collection()) {
                                continue;
                            }
                        }
                        let Some(vertex) = graph.entities.get(next_id) else { continue };

                        let mut extended = path.clone();
                        extended.append(rel.clone(), Arc::clone(vertex));

                        if depth + 1 >= req.min_depth {
                            steps.push(TraversalStep {
                                vertex: Arc::clone(vertex),
                                edge: Some(rel.clone()),
                                path: extended.clone(),
                                depth: depth + 1,
                                origin: seed.clone(),
                            });
                            if steps.len() >= limit {
                                return Ok(steps);
                            }
                        }
                        if depth + 1 < req.max_depth && !req.prune.matches(next_id) {
                            pending.push_back(extended);
                        }
                    }
                }
            }

            Ok(steps)
        })
    }

    fn shortest_paths_sync(
        &self,
        from: &EntityId,
        to: &EntityId,
        direction: TraversalDirection,
        store: StoreSelector,
    ) -> Result<Vec<Path>> {
        self.with_graph(store, |graph| {
            let (Some(start), Some(_)) = (graph.entities.get(from), graph.entities.get(to)) else {
                return Ok(Vec::new());
            };
            if from == to {
                return Ok(vec![Path::single(Arc::clone(start))]);
            }

            // BFS layering, keeping every predecessor on a minimal layer.
            let mut dist: HashMap<&EntityId, usize> = HashMap::new();
            let mut preds: HashMap<&EntityId, Vec<(&EntityId, &Relation)>> = HashMap::new();
            let mut queue = VecDeque::new();
            dist.insert(from, 0);
            queue.push_back(from);

            while let Some(current) = queue.pop_front() {
                let d = dist[current];
                if dist.get(to).is_some_and(|&target| d >= target) {
                    break;
                }
                for rel in graph.relations_of(current) {
                    if !rel.walkable_from(current, direction) {
                        continue;
                    }
                    let Some(next) = rel.other_end(current) else { continue };
                    if next == current {
                        continue;
                    }
                    match dist.get(next) {
                        None => {
                            dist.insert(next, d + 1);
                            preds.entry(next).or_default().push((current, rel));
                            queue.push_back(next);
                        }
                        Some(&nd) if nd == d + 1 => {
                            preds.entry(next).or_default().push((current, rel));
                        }
                        Some(_) => {}
                    }
                }
            }

            if !dist.contains_key(to) {
                return Ok(Vec::new());
            }

            // Walk predecessor lists back from the target.
            let mut paths = Vec::new();
            let mut stack: Vec<(&EntityId, Vec<&EntityId>, Vec<&Relation>)> =
                vec![(to, vec![to], Vec::new())];
            while let Some((node, vertices, edges)) = stack.pop() {
                if node == from {
                    let mut path = Path::single(Arc::clone(start));
                    for (vid, rel) in vertices.iter().rev().skip(1).zip(edges.iter().rev()) {
                        if let Some(vertex) = graph.entities.get(*vid) {
                            path.append((*rel).clone(), Arc::clone(vertex));
                        }
                    }
                    paths.push(path);
                    continue;
                }
                for &(pred, rel) in preds.get(node).into_iter().flatten() {
                    let mut vertices = vertices.clone();
                    let mut edges = edges.clone();
                    vertices.push(pred);
                    edges.push(rel);
                    stack.push((pred, vertices, edges));
                }
            }
            paths.reverse();
            Ok(paths)
        })
    }

    fn search_sync(&self, term: &str, store: StoreSelector) -> Result<Vec<Arc<Entity>>> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let first_token = needle.split_whitespace().next().unwrap_or(&needle).to_owned();

        self.with_graph(store, |graph| {
            let mut hits: Vec<(f64, Arc<Entity>)> = Vec::new();
            for entity in graph.entities.values() {
                let mut score = fuzzy_score(&needle, &entity.id.to_string().to_lowercase());
                for field in &self.inner.search_fields {
                    let Some(value) = entity.get(field) else { continue };
                    for text in value.text_leaves() {
                        let text = text.to_lowercase();
                        if text == needle || text == first_token {
                            score = score.max(EXACT_MATCH_BOOST);
                        } else {
                            score = score.max(fuzzy_score(&needle, &text));
                        }
                    }
                }
                if score > 0.0 {
                    hits.push((score, Arc::clone(entity)));
                }
            }
            // Stable: ties keep insertion order.
            hits.sort_by(|a, b| b.0.total_cmp(&a.0));
            Ok(hits.into_iter().map(|(_, e)| e).collect())
        })
    }

    fn get_by_id_sync(&self, collection: &str, key: &str, store: StoreSelector) -> Result<Option<Arc<Entity>>> {
        let id = EntityId::new(collection, key)?;
        self.with_graph(store, |graph| Ok(graph.entities.get(&id).cloned()))
    }

    fn collections_sync(&self, store: StoreSelector) -> Result<Vec<String>> {
        self.with_graph(store, |graph| {
            let mut names: Vec<String> = graph
                .entities
                .keys()
                .map(|id| id.collection())
                .filter(|c| !c.starts_with('_'))
                .collect::<HashSet<_>>()
                .into_iter()
                .map(str::to_owned)
                .collect();
            names.sort_by_key(|n| n.to_lowercase());
            Ok(names)
        })
    }

    fn documents_in_sync(&self, collection: &str, store: StoreSelector) -> Result<Option<Vec<Arc<Entity>>>> {
        self.with_graph(store, |graph| {
            let documents: Vec<Arc<Entity>> = graph
                .entities
                .values()
                .filter(|e| e.collection() == collection)
                .cloned()
                .collect();
            Ok((!documents.is_empty()).then_some(documents))
        })
    }

    fn edges_of_sync(&self, id: &EntityId, direction: TraversalDirection, store: StoreSelector) -> Result<Vec<Relation>> {
        self.with_graph(store, |graph| {
            let edges: Vec<Relation> = graph
                .relations_of(id)
                .filter(|rel| rel.walkable_from(id, direction))
                .cloned()
                .collect();
            Ok(edges)
        })
    }
}

/// Bigram similarity of `candidate` to `needle`, or 0.0 under the threshold.
fn fuzzy_score(needle: &str, candidate: &str) -> f64 {
    let sim = bigram_similarity(needle, candidate);
    if sim >= NGRAM_THRESHOLD { sim } else { 0.0 }
}

/// Fraction of `needle`'s character bigrams that also occur in `candidate`.
pub fn bigram_similarity(needle: &str, candidate: &str) -> f64 {
    let n: Vec<char> = needle.chars().collect();
    if n.len() < 2 {
        return if !needle.is_empty() && candidate.contains(needle) { 1.0 } else { 0.0 };
    }
    let c: Vec<char> = candidate.chars().collect();
    let have: HashSet<(char, char)> = c.windows(2).map(|w| (w[0], w[1])).collect();
    let wanted: Vec<(char, char)> = n.windows(2).map(|w| (w[0], w[1])).collect();
    let found = wanted.iter().filter(|b| have.contains(*b)).count();
    found as f64 / wanted.len() as f64
}

// ============================================================================
// TraversalBackend impl
// ============================================================================

#[async_trait]
impl TraversalBackend for MemoryGateway {
    async fn traverse(&self, request: &TraversalRequest) -> Result<Vec<TraversalStep>> {
        self.traverse_sync(request)
    }

    async fn all_shortest_paths(
        &self,
        from: &EntityId,
        to: &EntityId,
        direction: TraversalDirection,
        store: StoreSelector,
    ) -> Result<Vec<Path>> {
        self.shortest_paths_sync(from, to, direction, store)
    }

    async fn search(&self, term: &str, store: StoreSelector) -> Result<Vec<Arc<Entity>>> {
        self.search_sync(term, store)
    }

    async fn get_by_id(
        &self,
        collection: &str,
        key: &str,
        store: StoreSelector,
    ) -> Result<Option<Arc<Entity>>> {
        self.get_by_id_sync(collection, key, store)
    }

    async fn collections(&self, store: StoreSelector) -> Result<Vec<String>> {
        self.collections_sync(store)
    }

    async fn documents_in(&self, collection: &str, store: StoreSelector) -> Result<Option<Vec<Arc<Entity>>>> {
        self.documents_in_sync(collection, store)
    }

    async fn edges_of(
        &self,
        id: &EntityId,
        direction: TraversalDirection,
        store: StoreSelector,
    ) -> Result<Vec<Relation>> {
        self.edges_of_sync(id, direction, store)
    }
}

// ============================================================================
// Tests
// ============================================================================
