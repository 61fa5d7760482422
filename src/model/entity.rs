//! Entity (document vertex) in the graph store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{PropertyMap, Value};
use crate::{Error, Result};

/// Entity identifier: a `(collection, key)` pair rendered as `collection/key`.
///
/// The collection is the entity's type; pruning and grouping decisions only
/// ever look at it and at the full id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    collection: String,
    key: String,
}

impl EntityId {
    /// Build an id from its parts. Neither part may be empty or contain `/`.
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        let collection = collection.into();
        let key = key.into();
        if collection.is_empty() || key.is_empty() {
            return Err(Error::MalformedRequest(format!(
                "entity id needs a collection and a key, got '{collection}/{key}'"
            )));
        }
        if collection.contains('/') || key.contains('/') {
            return Err(Error::MalformedRequest(format!(
                "entity id '{collection}/{key}' has more than one '/'"
            )));
        }
        Ok(Self { collection, key })
    }

    /// Parse a `collection/key` string.
    pub fn parse(raw: &str) -> Result<Self> {
        let (collection, key) = raw.split_once('/').ok_or_else(|| {
            Error::MalformedRequest(format!("entity id '{raw}' is not of the form collection/key"))
        })?;
        Self::new(collection, key)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.key)
    }
}

impl FromStr for EntityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EntityId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

/// A document in the graph store. Immutable once handed out by the engine;
/// results share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "_id")]
    pub id: EntityId,
    #[serde(flatten)]
    pub attributes: PropertyMap,
}

impl Entity {
    pub fn new(id: EntityId) -> Self {
        Self { id, attributes: PropertyMap::new() }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn collection(&self) -> &str {
        self.id.collection()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Human-facing label: `label`, then `name`, then the raw key.
    /// First non-empty wins.
    pub fn display_label(&self) -> String {
        ["label", "name"]
            .iter()
            .filter_map(|field| self.get(field))
            .find_map(Value::to_display_text)
            .unwrap_or_else(|| self.id.key().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        let id = EntityId::parse("CL/0000001").unwrap();
        assert_eq!(id.collection(), "CL");
        assert_eq!(id.key(), "0000001");
        assert_eq!(id.to_string(), "CL/0000001");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["CL", "/0001", "CL/", "CL/00/01", ""] {
            assert!(
                matches!(EntityId::parse(raw), Err(Error::MalformedRequest(_))),
                "expected '{raw}' to be rejected"
            );
        }
    }

    #[test]
    fn test_serde_as_string() {
        let id = EntityId::parse("GO/0008150").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"GO/0008150\"");
        assert!(serde_json::from_str::<EntityId>("\"nope\"").is_err());
    }

    #[test]
    fn test_entity_json_shape() {
        let e: Entity = serde_json::from_value(serde_json::json!({
            "_id": "CL/0000061", "label": "cementoblast"
        }))
        .unwrap();
        assert_eq!(e.id.key(), "0000061");
        assert_eq!(e.display_label(), "cementoblast");
        let back = serde_json::to_value(&e).unwrap();
        assert_eq!(back["_id"], "CL/0000061");
    }

    #[test]
    fn test_display_label_fallbacks() {
        let id = EntityId::parse("CL/0000062").unwrap();
        let bare = Entity::new(id.clone());
        assert_eq!(bare.display_label(), "0000062");

        let named = Entity::new(id.clone()).with_attribute("label", "").with_attribute("name", "osteoblast");
        assert_eq!(named.display_label(), "osteoblast");

        let labelled = Entity::new(id).with_attribute("label", "bone cell").with_attribute("name", "x");
        assert_eq!(labelled.display_label(), "bone cell");
    }
}
