//! End-to-end tests for failure containment.
//!
//! A wrapper gateway injects engine failures and slow calls for chosen
//! entities so partial failure, total failure and timeouts can be told apart.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use graph_explorer::{
    Direction, Entity, EntityId, Error, Explorer, ExplorerConfig, LevelRequest, MemoryGateway, NeighborhoodRequest,
    Path, ShortestPathRequest, StoreSelector, TraversalBackend, TraversalDirection, TraversalRequest, TraversalStep,
};

// ============================================================================
// Failure-injecting gateway
// ============================================================================

#[derive(Default)]
struct Faults {
    /// Any call touching these ids fails.
    failing: HashSet<EntityId>,
    /// Traversals in this direction fail.
    failing_direction: Option<TraversalDirection>,
    /// Traversals from these seeds are delayed.
    slow: HashSet<EntityId>,
    /// Collection listing is delayed.
    slow_listing: bool,
    delay: Duration,
}

struct FlakyGateway {
    inner: MemoryGateway,
    faults: Faults,
}

impl FlakyGateway {
    fn unavailable(id: &EntityId) -> Error {
        Error::EngineUnavailable(format!("connection reset while reading {id}"))
    }
}

#[async_trait]
impl TraversalBackend for FlakyGateway {
    async fn traverse(&self, request: &TraversalRequest) -> graph_explorer::Result<Vec<TraversalStep>> {
        if let Some(bad) = request.seeds.iter().find(|s| self.faults.failing.contains(*s)) {
            return Err(Self::unavailable(bad));
        }
        if self.faults.failing_direction == Some(request.direction) {
            return Err(Error::EngineUnavailable(format!("{:?} traversal refused", request.direction)));
        }
        if request.seeds.iter().any(|s| self.faults.slow.contains(s)) {
            tokio::time::sleep(self.faults.delay).await;
        }
        self.inner.traverse(request).await
    }

    async fn all_shortest_paths(
        &self,
        from: &EntityId,
        to: &EntityId,
        direction: TraversalDirection,
        store: StoreSelector,
    ) -> graph_explorer::Result<Vec<Path>> {
        for end in [from, to] {
            if self.faults.failing.contains(end) {
                return Err(Self::unavailable(end));
            }
        }
        self.inner.all_shortest_paths(from, to, direction, store).await
    }

    async fn search(&self, term: &str, store: StoreSelector) -> graph_explorer::Result<Vec<Arc<Entity>>> {
        self.inner.search(term, store).await
    }

    async fn get_by_id(
        &self,
        collection: &str,
        key: &str,
        store: StoreSelector,
    ) -> graph_explorer::Result<Option<Arc<Entity>>> {
        let id = EntityId::new(collection, key)?;
        if self.faults.failing.contains(&id) {
            return Err(Self::unavailable(&id));
        }
        self.inner.get_by_id(collection, key, store).await
    }

    async fn collections(&self, store: StoreSelector) -> graph_explorer::Result<Vec<String>> {
        if self.faults.slow_listing {
            tokio::time::sleep(self.faults.delay).await;
        }
        self.inner.collections(store).await
    }
}

// ============================================================================
// Fixture
// ============================================================================

fn id(raw: &str) -> EntityId {
    EntityId::parse(raw).unwrap()
}

fn flaky(faults: Faults, config: ExplorerConfig) -> Explorer<FlakyGateway> {
    let inner = MemoryGateway::new();
    inner
        .load_documents(
            StoreSelector::Ontologies,
            serde_json::json!([
                {"_id": "CL/0000000", "label": "cell"},
                {"_id": "CL/0000001", "label": "primary cultured cell"},
                {"_id": "CL/0007002", "label": "cementoblast lineage cell"},
                {"_id": "CL/0000061", "label": "cementoblast"},
                {"_id": "CL/0002553", "label": "fibroblast of lung"},
                {"_id": "CL-CL/0000001-0000000", "_from": "CL/0000001", "_to": "CL/0000000", "label": "subClassOf"},
                {"_id": "CL-CL/0007002-0000000", "_from": "CL/0007002", "_to": "CL/0000000", "label": "subClassOf"},
                {"_id": "CL-CL/0000061-0007002", "_from": "CL/0000061", "_to": "CL/0007002", "label": "subClassOf"},
                {"_id": "CL-CL/0002553-0000001", "_from": "CL/0002553", "_to": "CL/0000001", "label": "subClassOf"}
            ]),
        )
        .unwrap();
    Explorer::with_config(FlakyGateway { inner, faults }, config).unwrap()
}

fn failing(ids: &[&str]) -> Faults {
    Faults { failing: ids.iter().map(|raw| id(raw)).collect(), ..Faults::default() }
}

// ============================================================================
// 1. Neighborhood
// ============================================================================

#[tokio::test]
async fn test_partial_neighborhood_failure_is_contained() {
    let explorer = flaky(failing(&["CL/0000061"]), ExplorerConfig::default());
    let req = NeighborhoodRequest::new(vec![id("CL/0000001"), id("CL/0000061")], 1, Direction::Outbound);
    let result = explorer.assemble_neighborhood(&req).await.unwrap();

    assert_eq!(result.failed_origins, vec![id("CL/0000061")]);
    assert!(result.entries_for(&id("CL/0000061")).is_empty());
    assert_eq!(result.entries_for(&id("CL/0000001")).len(), 2);
}

#[tokio::test]
async fn test_total_neighborhood_failure_is_explicit() {
    let explorer = flaky(failing(&["CL/0000001", "CL/0000061"]), ExplorerConfig::default());
    let req = NeighborhoodRequest::new(vec![id("CL/0000001"), id("CL/0000061")], 1, Direction::Outbound);

    match explorer.assemble_neighborhood(&req).await {
        Err(err @ Error::AllRequestsFailed { attempted: 2, .. }) => assert!(err.is_engine_failure()),
        other => panic!("expected AllRequestsFailed, got {other:?}"),
    }

    // The lenient entry point degrades to an empty neighborhood instead.
    let empty = explorer.assemble_neighborhood_or_empty(&req).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_lenient_entry_point_still_rejects_malformed_input() {
    let explorer = flaky(Faults::default(), ExplorerConfig::default());
    let req = NeighborhoodRequest::new(Vec::new(), 1, Direction::Any);
    assert!(matches!(
        explorer.assemble_neighborhood_or_empty(&req).await,
        Err(Error::MalformedRequest(_))
    ));
}

#[tokio::test]
async fn test_dual_with_one_failed_leg() {
    let faults = Faults { failing_direction: Some(TraversalDirection::Inbound), ..Faults::default() };
    let explorer = flaky(faults, ExplorerConfig::default());
    let req = NeighborhoodRequest::new(vec![id("CL/0000001")], 1, Direction::Dual);
    let result = explorer.assemble_neighborhood(&req).await.unwrap();

    assert_eq!(result.failed_origins, vec![id("CL/0000001")]);
    assert!(result.contains_node(&id("CL/0000000")));
    assert!(!result.contains_node(&id("CL/0002553")));
}

#[tokio::test]
async fn test_timeout_counts_as_unit_failure() {
    let faults = Faults {
        slow: [id("CL/0000061")].into_iter().collect(),
        delay: Duration::from_millis(500),
        ..Faults::default()
    };
    let config = ExplorerConfig { request_timeout_ms: 50, ..ExplorerConfig::default() };
    let explorer = flaky(faults, config);
    let req = NeighborhoodRequest::new(vec![id("CL/0000001"), id("CL/0000061")], 1, Direction::Outbound);
    let result = explorer.assemble_neighborhood(&req).await.unwrap();

    assert_eq!(result.failed_origins, vec![id("CL/0000061")]);
    assert!(result.contains_node(&id("CL/0000000")));
}

// ============================================================================
// 2. Shortest paths
// ============================================================================

#[tokio::test]
async fn test_failed_pairs_are_skipped() {
    let explorer = flaky(failing(&["CL/0002553"]), ExplorerConfig::default());
    let req = ShortestPathRequest::new(
        vec![id("CL/0000061"), id("CL/0000000"), id("CL/0002553")],
        Direction::Any,
    );
    let result = explorer.aggregate_shortest_paths(&req).await.unwrap();

    assert_eq!(result.failed_pairs.len(), 2);
    assert!(!result.nodes_by_target.contains_key(&id("CL/0002553")));
    assert_eq!(result.nodes_for(&id("CL/0000000")).len(), 3);
}

#[tokio::test]
async fn test_all_pairs_failing_is_explicit() {
    let explorer = flaky(failing(&["CL/0000061"]), ExplorerConfig::default());
    let req = ShortestPathRequest::new(vec![id("CL/0000061"), id("CL/0000000")], Direction::Any);
    assert!(matches!(
        explorer.aggregate_shortest_paths(&req).await,
        Err(Error::AllRequestsFailed { attempted: 1, .. })
    ));
}

// ============================================================================
// 3. Hierarchy
// ============================================================================

#[tokio::test]
async fn test_failed_probe_assumes_children() {
    // CL/0002553 is a leaf, but its probe fails.
    let explorer = flaky(failing(&["CL/0002553"]), ExplorerConfig::default());
    let req = LevelRequest::from_config(Some(id("CL/0000001")), explorer.config());
    let level = explorer.expand_hierarchy_level(&req).await.unwrap();

    assert_eq!(level.children().len(), 1);
    assert!(level.children()[0].has_children);
}

#[tokio::test]
async fn test_root_failures() {
    let explorer = flaky(failing(&["CL/0000000"]), ExplorerConfig::default());

    let only_failing = LevelRequest::from_config(None, explorer.config()).root_ids(vec![id("CL/0000000")]);
    assert!(matches!(
        explorer.expand_hierarchy_level(&only_failing).await,
        Err(Error::AllRequestsFailed { .. })
    ));

    let mixed = LevelRequest::from_config(None, explorer.config())
        .root_ids(vec![id("CL/0000000"), id("CL/0007002")]);
    match explorer.expand_hierarchy_level(&mixed).await.unwrap() {
        graph_explorer::HierarchyLevel::Root(level) => {
            assert_eq!(level.failed_roots, vec![id("CL/0000000")]);
            let children = level.root.children.unwrap_or_default();
            assert_eq!(children.len(), 1);
            assert_eq!(children[0].id, "CL/0007002");
        }
        other => panic!("expected the super-root, got {other:?}"),
    }
}

// ============================================================================
// 4. Lookups
// ============================================================================

#[tokio::test]
async fn test_slow_collection_listing_times_out() {
    let faults = Faults { slow_listing: true, delay: Duration::from_millis(500), ..Faults::default() };
    let config = ExplorerConfig { request_timeout_ms: 50, ..ExplorerConfig::default() };
    let explorer = flaky(faults, config);

    let started = std::time::Instant::now();
    let result = explorer.collections(StoreSelector::Ontologies).await;
    assert!(started.elapsed() < Duration::from_millis(400));
    match result {
        Err(err @ Error::Timeout { .. }) => assert!(err.is_engine_failure()),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unsupported_lookups_are_query_errors() {
    // The flaky gateway keeps the trait's defaults for collection scans and edge lookups.
    let explorer = flaky(Faults::default(), ExplorerConfig::default());
    assert!(matches!(
        explorer.documents_in("CL", StoreSelector::Ontologies).await,
        Err(Error::Query(_))
    ));
    assert!(matches!(
        explorer.edges_of(&id("CL/0000001"), TraversalDirection::Any, StoreSelector::Ontologies).await,
        Err(Error::Query(_))
    ));
}
