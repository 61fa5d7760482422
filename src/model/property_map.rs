//! PropertyMap: the attribute bag on entities and relations.

use std::collections::HashMap;

use super::Value;

/// A map of attribute names to values.
pub type PropertyMap = HashMap<String, Value>;
