//! Pruning and exclusion policy.
//!
//! Two independent knobs over the same kind of filter:
//!
//! - **prune**: the engine stops descending past a matching entity. The
//!   entity itself is still visited; its subtree is not. The filter travels
//!   to the engine on `TraversalRequest::prune` and is applied there.
//! - **exclude**: a matching entity is dropped from the assembled result,
//!   but traversal may still pass through it.
//!
//! Both only look at the entity id: its collection (leading segment) and
//! the full id.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::model::{Entity, EntityId};

/// A set of collections plus a set of specific entity ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFilter {
    #[serde(default)]
    pub collections: HashSet<String>,
    #[serde(default)]
    pub ids: HashSet<EntityId>,
}

impl EntityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collections<I, S>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collections.extend(collections.into_iter().map(Into::into));
        self
    }

    pub fn with_ids(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.ids.extend(ids);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty() && self.ids.is_empty()
    }

    pub fn matches(&self, id: &EntityId) -> bool {
        self.collections.contains(id.collection()) || self.ids.contains(id)
    }
}

/// The pair of filters applied to a neighborhood assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruningPolicy {
    #[serde(default)]
    pub prune: EntityFilter,
    #[serde(default)]
    pub exclude: EntityFilter,
}

impl PruningPolicy {
    /// A policy that neither prunes nor excludes.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_prune(mut self, prune: EntityFilter) -> Self {
        self.prune = prune;
        self
    }

    pub fn with_exclude(mut self, exclude: EntityFilter) -> Self {
        self.exclude = exclude;
        self
    }

    /// This entity must not appear in the result.
    pub fn should_exclude(&self, entity: &Entity) -> bool {
        self.exclude.matches(&entity.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(raw: &str) -> Entity {
        Entity::new(EntityId::parse(raw).unwrap())
    }

    #[test]
    fn test_empty_policy_is_inert() {
        let policy = PruningPolicy::none();
        assert!(policy.prune.is_empty());
        assert!(!policy.should_exclude(&entity("CL/0000001")));
    }

    #[test]
    fn test_collection_and_id_matching() {
        let filter = EntityFilter::new()
            .with_collections(["publication"])
            .with_ids([EntityId::parse("CL/0000062").unwrap()]);
        assert!(filter.matches(&EntityId::parse("publication/123").unwrap()));
        assert!(filter.matches(&EntityId::parse("CL/0000062").unwrap()));
        assert!(!filter.matches(&EntityId::parse("CL/0000061").unwrap()));
    }

    #[test]
    fn test_prune_and_exclude_are_independent() {
        let policy = PruningPolicy::none()
            .with_prune(EntityFilter::new().with_collections(["GO"]))
            .with_exclude(EntityFilter::new().with_collections(["UBERON"]));
        let go = entity("GO/0008150");
        let uberon = entity("UBERON/0000000");
        assert!(policy.prune.matches(&go.id) && !policy.should_exclude(&go));
        assert!(policy.should_exclude(&uberon) && !policy.prune.matches(&uberon.id));
    }
}
