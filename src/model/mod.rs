//! # Graph Model
//!
//! Plain DTOs shared by the gateway, the assembly engine and callers.
//!
//! Design rule: this module is pure data. No I/O, no state, no async.

pub mod entity;
pub mod relation;
pub mod path;
pub mod value;
pub mod property_map;

use serde::{Deserialize, Serialize};

pub use entity::{Entity, EntityId};
pub use relation::{Direction, Relation, RelationId, RelationKey, TraversalDirection};
pub use path::Path;
pub use value::Value;
pub use property_map::PropertyMap;

/// Which named graph a call runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreSelector {
    #[default]
    Ontologies,
    Phenotypes,
}

impl StoreSelector {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreSelector::Ontologies => "ontologies",
            StoreSelector::Phenotypes => "phenotypes",
        }
    }
}

impl std::fmt::Display for StoreSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
