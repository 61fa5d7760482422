//! Wire-level request shapes.
//!
//! These are what a transport layer deserializes from a request body. Each
//! one converts into a typed request, and the conversion is where malformed
//! input (bad ids, negative depth, unknown direction) is rejected, before
//! any engine call is made.

use serde::{Deserialize, Serialize};

use crate::assembly::{EagerRequest, LevelRequest, NeighborhoodRequest, ShortestPathRequest};
use crate::config::ExplorerConfig;
use crate::model::{Direction, EntityId, StoreSelector};
use crate::policy::{EntityFilter, PruningPolicy};
use crate::{Error, Result};

/// Neighborhood request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQuery {
    pub node_ids: Vec<String>,
    pub depth: i64,
    pub edge_direction: String,
    #[serde(default)]
    pub allowed_collections: Option<Vec<String>>,
    #[serde(default)]
    pub node_limit: Option<i64>,
    #[serde(default)]
    pub graph: Option<String>,
    #[serde(default)]
    pub collections_to_prune: Vec<String>,
    #[serde(default)]
    pub nodes_to_prune: Vec<String>,
    #[serde(default)]
    pub collections_to_exclude: Vec<String>,
    #[serde(default)]
    pub nodes_to_exclude: Vec<String>,
}

impl GraphQuery {
    pub fn into_request(self, config: &ExplorerConfig) -> Result<NeighborhoodRequest> {
        let seeds = parse_ids(&self.node_ids)?;
        if seeds.is_empty() {
            return Err(Error::MalformedRequest("node_ids must not be empty".into()));
        }
        let depth = non_negative("depth", self.depth)?;
        let direction: Direction = self.edge_direction.parse()?;
        let node_limit = match self.node_limit {
            Some(limit) if limit <= 0 => {
                return Err(Error::MalformedRequest(format!("node_limit must be positive, got {limit}")));
            }
            Some(limit) => non_negative("node_limit", limit)?,
            None => config.default_node_limit,
        };

        let policy = PruningPolicy::none()
            .with_prune(
                EntityFilter::new()
                    .with_collections(self.collections_to_prune)
                    .with_ids(parse_ids(&self.nodes_to_prune)?),
            )
            .with_exclude(
                EntityFilter::new()
                    .with_collections(self.collections_to_exclude)
                    .with_ids(parse_ids(&self.nodes_to_exclude)?),
            );

        let mut request = NeighborhoodRequest::new(seeds, depth, direction)
            .policy(policy)
            .node_limit(node_limit)
            .store(store_from_wire(self.graph.as_deref()));
        if let Some(allowed) = self.allowed_collections {
            request = request.allowed_collections(allowed);
        }
        request.validate()?;
        Ok(request)
    }
}

/// Shortest-path request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortestPathQuery {
    pub node_ids: Vec<String>,
    pub edge_direction: String,
    #[serde(default)]
    pub graph: Option<String>,
}

impl ShortestPathQuery {
    pub fn into_request(self, config: &ExplorerConfig) -> Result<ShortestPathRequest> {
        let direction: Direction = self.edge_direction.parse()?;
        let request = ShortestPathRequest::new(parse_ids(&self.node_ids)?, direction)
            .store(store_from_wire(self.graph.as_deref()));
        request.validated_seeds(config)?;
        Ok(request)
    }
}

/// Lazy hierarchy request body. No `parent_id` means "the roots".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyQuery {
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub graph: Option<String>,
}

impl HierarchyQuery {
    pub fn into_request(self, config: &ExplorerConfig) -> Result<LevelRequest> {
        let parent = match self.parent_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(EntityId::parse(raw)?),
        };
        Ok(LevelRequest::from_config(parent, config).store(store_from_wire(self.graph.as_deref())))
    }
}

/// Eager hierarchy request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeQuery {
    pub root_id: String,
    pub depth: i64,
    #[serde(default)]
    pub relation_label: Option<String>,
    #[serde(default)]
    pub graph: Option<String>,
}

impl TreeQuery {
    pub fn into_request(self, config: &ExplorerConfig) -> Result<EagerRequest> {
        let root = EntityId::parse(self.root_id.trim())?;
        let depth = non_negative("depth", self.depth)?;
        let label = self
            .relation_label
            .unwrap_or_else(|| config.hierarchy.relation_label.clone());
        Ok(EagerRequest::new(root, depth, label, config.hierarchy.direction)
            .store(store_from_wire(self.graph.as_deref())))
    }
}

/// Search request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub search_term: String,
    #[serde(default)]
    pub graph: Option<String>,
}

impl SearchQuery {
    pub fn into_parts(self) -> Result<(String, StoreSelector)> {
        let term = self.search_term.trim().to_owned();
        if term.is_empty() {
            return Err(Error::MalformedRequest("search_term must not be blank".into()));
        }
        Ok((term, store_from_wire(self.graph.as_deref())))
    }
}

/// `"phenotypes"` selects the phenotype store; anything else, or nothing,
/// selects the ontology store.
pub fn store_from_wire(graph: Option<&str>) -> StoreSelector {
    match graph.map(str::trim) {
        Some(g) if g.eq_ignore_ascii_case("phenotypes") => StoreSelector::Phenotypes,
        _ => StoreSelector::Ontologies,
    }
}

fn parse_ids(raw: &[String]) -> Result<Vec<EntityId>> {
    raw.iter().map(|id| EntityId::parse(id.trim())).collect()
}

fn non_negative(field: &str, value: i64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| Error::MalformedRequest(format!("{field} must not be negative, got {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn graph_query(body: serde_json::Value) -> Result<NeighborhoodRequest> {
        serde_json::from_value::<GraphQuery>(body)?.into_request(&ExplorerConfig::default())
    }

    #[test]
    fn test_graph_query_defaults() {
        let req = graph_query(serde_json::json!({
            "node_ids": ["CL/0000001"],
            "depth": 1,
            "edge_direction": "OUTBOUND"
        }))
        .unwrap();
        assert_eq!(req.node_limit, 100);
        assert_eq!(req.direction, Direction::Outbound);
        assert_eq!(req.store, StoreSelector::Ontologies);
        assert!(req.policy.prune.is_empty());
        assert_eq!(req.allowed_collections, None);
    }

    #[test]
    fn test_graph_query_full() {
        let req = graph_query(serde_json::json!({
            "node_ids": ["CL/0000001", "GO/0000002"],
            "depth": 2,
            "edge_direction": "dual",
            "allowed_collections": ["CL", "GO"],
            "node_limit": 10,
            "graph": "phenotypes",
            "collections_to_prune": ["UBERON"],
            "nodes_to_exclude": ["CL/0000003"]
        }))
        .unwrap();
        assert_eq!(req.direction, Direction::Dual);
        assert_eq!(req.store, StoreSelector::Phenotypes);
        assert_eq!(req.node_limit, 10);
        assert!(req.policy.prune.collections.contains("UBERON"));
        assert!(req.policy.exclude.ids.contains(&EntityId::parse("CL/0000003").unwrap()));
    }

    #[test]
    fn test_graph_query_rejections() {
        let base = |patch: serde_json::Value| {
            let mut body = serde_json::json!({
                "node_ids": ["CL/0000001"],
                "depth": 1,
                "edge_direction": "ANY"
            });
            if let (Some(obj), Some(extra)) = (body.as_object_mut(), patch.as_object()) {
                obj.extend(extra.clone());
            }
            graph_query(body)
        };
        for patch in [
            serde_json::json!({"depth": -1}),
            serde_json::json!({"edge_direction": "SIDEWAYS"}),
            serde_json::json!({"node_ids": []}),
            serde_json::json!({"node_ids": ["not-an-id"]}),
            serde_json::json!({"node_limit": 0}),
        ] {
            assert!(
                matches!(base(patch.clone()), Err(Error::MalformedRequest(_))),
                "expected rejection for {patch}"
            );
        }
    }

    #[test]
    fn test_shortest_path_query_needs_two_seeds() {
        let query = ShortestPathQuery {
            node_ids: vec!["CL/0000061".into()],
            edge_direction: "ANY".into(),
            graph: None,
        };
        assert!(matches!(
            query.into_request(&ExplorerConfig::default()),
            Err(Error::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_hierarchy_query() {
        let config = ExplorerConfig::default();
        let roots = HierarchyQuery::default().into_request(&config).unwrap();
        assert_eq!(roots.parent, None);
        assert_eq!(roots.root_ids.len(), 7);

        let children = HierarchyQuery { parent_id: Some("CL/0000000".into()), graph: None }
            .into_request(&config)
            .unwrap();
        assert_eq!(children.parent, Some(EntityId::parse("CL/0000000").unwrap()));
        assert_eq!(children.relation_label, "subClassOf");
    }

    #[test]
    fn test_tree_query_and_search_query() {
        let config = ExplorerConfig::default();
        let tree = TreeQuery { root_id: "CL/0000000".into(), depth: 2, relation_label: None, graph: None }
            .into_request(&config)
            .unwrap();
        assert_eq!(tree.depth, 2);
        assert_eq!(tree.relation_label, "subClassOf");

        let negative = TreeQuery { root_id: "CL/0000000".into(), depth: -2, relation_label: None, graph: None };
        assert!(negative.into_request(&config).is_err());

        let (term, store) = SearchQuery { search_term: " neuron ".into(), graph: Some("phenotypes".into()) }
            .into_parts()
            .unwrap();
        assert_eq!(term, "neuron");
        assert_eq!(store, StoreSelector::Phenotypes);
    }
}
