//! Path: a sequence of alternating entities and relations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Entity, EntityId, Relation};

/// A path in the graph: entity -[rel]- entity -[rel]- entity ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// Entities along the path. Always has one more element than `edges`.
    pub vertices: Vec<Arc<Entity>>,
    /// Relations connecting consecutive vertices.
    pub edges: Vec<Relation>,
}

impl Path {
    pub fn single(vertex: Arc<Entity>) -> Self {
        Self { vertices: vec![vertex], edges: Vec::new() }
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn end(&self) -> Option<&Arc<Entity>> {
        self.vertices.last()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.vertices.iter().any(|v| v.id == *id)
    }

    /// Extend path with a relation and the entity it leads to.
    pub fn append(&mut self, rel: Relation, vertex: Arc<Entity>) {
        self.edges.push(rel);
        self.vertices.push(vertex);
    }
}
