//! Set operations across the origin groups of a neighborhood.
//!
//! A neighborhood keeps one node group per origin. Combining those groups
//! with a set operation yields a flat graph view for display.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::model::{Entity, EntityId, Relation};
use crate::{Error, Result};
use super::neighborhood::NeighborhoodResult;

/// How origin groups are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SetOperation {
    #[default]
    Union,
    Intersection,
    #[serde(rename = "Symmetric Difference")]
    SymmetricDifference,
}

impl fmt::Display for SetOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetOperation::Union => write!(f, "Union"),
            SetOperation::Intersection => write!(f, "Intersection"),
            SetOperation::SymmetricDifference => write!(f, "Symmetric Difference"),
        }
    }
}

impl FromStr for SetOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], " ").as_str() {
            "union" => Ok(SetOperation::Union),
            "intersection" => Ok(SetOperation::Intersection),
            "symmetric difference" => Ok(SetOperation::SymmetricDifference),
            other => Err(Error::MalformedRequest(format!("unknown set operation '{other}'"))),
        }
    }
}

/// Flat nodes and links, ready for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphView {
    pub nodes: Vec<Arc<Entity>>,
    pub links: Vec<Relation>,
}

impl NeighborhoodResult {
    /// Combine the per-origin node sets with `op`.
    ///
    /// A link survives when both endpoints are in the combined set; links
    /// are deduplicated by `(from, to)`. A node is kept when it is an
    /// endpoint of a surviving link or is itself an origin. With fewer than
    /// two origins, intersection and symmetric difference return the first
    /// group unchanged.
    pub fn combine(&self, op: SetOperation) -> GraphView {
        let groups: Vec<HashSet<&EntityId>> = self
            .nodes_by_origin
            .values()
            .map(|entries| entries.iter().map(|e| &e.node.id).collect())
            .collect();

        let selected = combine_sets(&groups, op);

        let mut seen_links = HashSet::new();
        let links: Vec<Relation> = self
            .links
            .iter()
            .filter(|rel| selected.contains(&rel.from) && selected.contains(&rel.to))
            .filter(|rel| seen_links.insert((rel.from.clone(), rel.to.clone())))
            .cloned()
            .collect();

        let mut keep: HashSet<EntityId> = links
            .iter()
            .flat_map(|rel| [rel.from.clone(), rel.to.clone()])
            .collect();
        keep.extend(self.nodes_by_origin.keys().cloned());

        let mut added = HashSet::new();
        let nodes = self
            .nodes_by_origin
            .values()
            .flatten()
            .filter(|entry| keep.contains(&entry.node.id) && added.insert(&entry.node.id))
            .map(|entry| Arc::clone(&entry.node))
            .collect();

        GraphView { nodes, links }
    }
}

fn combine_sets<'a>(groups: &[HashSet<&'a EntityId>], op: SetOperation) -> HashSet<&'a EntityId> {
    let Some((first, rest)) = groups.split_first() else {
        return HashSet::new();
    };
    match op {
        SetOperation::Union => groups.iter().flatten().copied().collect(),
        SetOperation::Intersection => rest.iter().fold(first.clone(), |acc, next| {
            acc.into_iter().filter(|id| next.contains(id)).collect()
        }),
        SetOperation::SymmetricDifference => rest.iter().fold(first.clone(), |acc, next| {
            acc.symmetric_difference(next).copied().collect()
        }),
    }
}
