//! Relation (edge) in the graph store, and traversal directions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{EntityId, PropertyMap};
use crate::{Error, Result};

/// Opaque relation identifier (e.g. `CL-CL/0000061-0000151`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationId(pub String);

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction as a single engine traversal understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraversalDirection {
    Inbound,
    Outbound,
    Any,
}

/// Direction as a caller asks for it.
///
/// `Dual` is not an engine direction: it is an inbound and an outbound
/// traversal run independently and merged by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Inbound,
    Outbound,
    Any,
    Dual,
}

impl Direction {
    /// The engine traversals this direction expands into.
    pub fn legs(self) -> &'static [TraversalDirection] {
        match self {
            Direction::Inbound => &[TraversalDirection::Inbound],
            Direction::Outbound => &[TraversalDirection::Outbound],
            Direction::Any => &[TraversalDirection::Any],
            Direction::Dual => &[TraversalDirection::Inbound, TraversalDirection::Outbound],
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INBOUND" => Ok(Direction::Inbound),
            "OUTBOUND" => Ok(Direction::Outbound),
            "ANY" => Ok(Direction::Any),
            "DUAL" => Ok(Direction::Dual),
            other => Err(Error::MalformedRequest(format!("unknown direction '{other}'"))),
        }
    }
}

impl From<TraversalDirection> for Direction {
    fn from(d: TraversalDirection) -> Self {
        match d {
            TraversalDirection::Inbound => Direction::Inbound,
            TraversalDirection::Outbound => Direction::Outbound,
            TraversalDirection::Any => Direction::Any,
        }
    }
}

/// A relation between two entities.
///
/// Relations are stored directed (`from` → `to`); whether direction matters
/// is decided per traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RelationId>,
    #[serde(rename = "_from")]
    pub from: EntityId,
    #[serde(rename = "_to")]
    pub to: EntityId,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub attributes: PropertyMap,
}

/// Identity used to deduplicate relations: the id when there is one,
/// otherwise the `(from, to, label)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationKey {
    Id(RelationId),
    Structural { from: EntityId, to: EntityId, label: String },
}

impl Relation {
    pub fn new(from: EntityId, to: EntityId, label: impl Into<String>) -> Self {
        Self {
            id: None,
            from,
            to,
            label: label.into(),
            attributes: PropertyMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(RelationId(id.into()));
        self
    }

    /// The "other" end of the relation from the given entity.
    pub fn other_end(&self, from: &EntityId) -> Option<&EntityId> {
        if *from == self.from { Some(&self.to) }
        else if *from == self.to { Some(&self.from) }
        else { None }
    }

    /// Whether this relation leaves `node` when walked in direction `dir`.
    pub fn walkable_from(&self, node: &EntityId, dir: TraversalDirection) -> bool {
        match dir {
            TraversalDirection::Outbound => self.from == *node,
            TraversalDirection::Inbound => self.to == *node,
            TraversalDirection::Any => self.from == *node || self.to == *node,
        }
    }

    pub fn key(&self) -> RelationKey {
        match &self.id {
            Some(id) => RelationKey::Id(id.clone()),
            None => RelationKey::Structural {
                from: self.from.clone(),
                to: self.to.clone(),
                label: self.label.clone(),
            },
        }
    }

    pub fn touches(&self, id: &EntityId) -> bool {
        self.from == *id || self.to == *id
    }
}
