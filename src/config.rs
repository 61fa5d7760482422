//! Explorer configuration.
//!
//! Everything here has a working default; hosts typically override a few
//! fields from a JSON file with [`ExplorerConfig::from_json`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{EntityId, TraversalDirection};
use crate::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Maximum engine calls in flight for one operation.
    pub max_concurrency: usize,
    /// Timeout applied to every individual engine call.
    pub request_timeout_ms: u64,
    /// Raw step bound for a single traversal request. Kept well above any
    /// node limit so boundary detection has data to work with.
    pub traversal_safety_limit: usize,
    /// Node limit when the caller gives none.
    pub default_node_limit: usize,
    /// Largest seed set accepted for all-pairs shortest paths.
    pub max_shortest_path_seeds: usize,
    pub hierarchy: HierarchyConfig,
}

/// Hierarchy (drill-down) defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Relation label that defines parent/child.
    pub relation_label: String,
    /// Direction walked from a parent to reach its children.
    pub direction: TraversalDirection,
    /// Roots shown when no parent is given.
    pub root_ids: Vec<EntityId>,
    /// Collections that carry a hierarchy.
    pub collections: Vec<String>,
    pub super_root_id: String,
    pub super_root_label: String,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            request_timeout_ms: 30_000,
            traversal_safety_limit: 10_000,
            default_node_limit: 100,
            max_shortest_path_seeds: 16,
            hierarchy: HierarchyConfig::default(),
        }
    }
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        let root_ids = [
            ("CL", "0000000"),
            ("GO", "0008150"), // biological_process
            ("GO", "0003674"), // molecular_function
            ("GO", "0005575"), // cellular_component
            ("PATO", "0000001"),
            ("MONDO", "0000001"),
            ("UBERON", "0000000"),
        ]
        .into_iter()
        .filter_map(|(c, k)| EntityId::new(c, k).ok())
        .collect();

        Self {
            relation_label: "subClassOf".into(),
            direction: TraversalDirection::Inbound,
            root_ids,
            collections: ["CL", "GO", "PATO", "MONDO", "UBERON"].map(String::from).to_vec(),
            super_root_id: "root_nlm".into(),
            super_root_label: "NLM Cell Knowledge Network".into(),
        }
    }
}

impl ExplorerConfig {
    /// Parse from JSON (missing fields take their defaults) and validate.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::Config("max_concurrency must be at least 1".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::Config("request_timeout_ms must be positive".into()));
        }
        if self.default_node_limit == 0 {
            return Err(Error::Config("default_node_limit must be at least 1".into()));
        }
        if self.traversal_safety_limit < self.default_node_limit {
            return Err(Error::Config(format!(
                "traversal_safety_limit ({}) must not be below default_node_limit ({})",
                self.traversal_safety_limit, self.default_node_limit
            )));
        }
        if self.max_shortest_path_seeds < 2 {
            return Err(Error::Config("max_shortest_path_seeds must be at least 2".into()));
        }
        if self.hierarchy.relation_label.trim().is_empty() {
            return Err(Error::Config("hierarchy.relation_label must not be empty".into()));
        }
        if self.hierarchy.super_root_id.trim().is_empty() {
            return Err(Error::Config("hierarchy.super_root_id must not be empty".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl HierarchyConfig {
    /// Whether entities of this collection carry a hierarchy.
    pub fn covers(&self, id: &EntityId) -> bool {
        self.collections.iter().any(|c| c == id.collection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ExplorerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.hierarchy.root_ids.len(), 7);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ExplorerConfig::from_json(
            r#"{"max_concurrency": 2, "hierarchy": {"relation_label": "is_a"}}"#,
        )
        .unwrap();
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.hierarchy.relation_label, "is_a");
        assert_eq!(config.hierarchy.super_root_id, "root_nlm");
        assert_eq!(config.default_node_limit, 100);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ExplorerConfig::from_json(r#"{"max_concurrency": 0}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ExplorerConfig::from_json(r#"{"traversal_safety_limit": 10, "default_node_limit": 50}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ExplorerConfig::from_json(r#"{"hierarchy": {"root_ids": ["not-an-id"]}}"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_hierarchy_covers() {
        let h = HierarchyConfig::default();
        assert!(h.covers(&EntityId::parse("MONDO/0005148").unwrap()));
        assert!(!h.covers(&EntityId::parse("publication/1").unwrap()));
    }
}
