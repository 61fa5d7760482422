//! Search result grouping.
//!
//! The engine ranks; this module only buckets the ranked list by collection
//! (the leading segment of each id). Order within a bucket is the engine's
//! order; buckets appear in order of their first hit.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::config::ExplorerConfig;
use crate::gateway::TraversalBackend;
use crate::model::{Entity, StoreSelector};
use crate::{Error, Result};
use super::dispatch::call_with_timeout;

/// collection → hits in rank order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GroupedSearchResults(pub IndexMap<String, Vec<Arc<Entity>>>);

impl GroupedSearchResults {
    pub fn get(&self, collection: &str) -> &[Arc<Entity>] {
        self.0.get(collection).map_or(&[], Vec::as_slice)
    }

    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn total(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Bucket an already-ranked list.
pub fn group_by_collection(ranked: Vec<Arc<Entity>>) -> GroupedSearchResults {
    let mut groups: IndexMap<String, Vec<Arc<Entity>>> = IndexMap::new();
    for entity in ranked {
        groups.entry(entity.collection().to_owned()).or_default().push(entity);
    }
    GroupedSearchResults(groups)
}

pub async fn group_search_results<B: TraversalBackend>(
    backend: &B,
    term: &str,
    store: StoreSelector,
    config: &ExplorerConfig,
) -> Result<GroupedSearchResults> {
    if term.trim().is_empty() {
        return Err(Error::MalformedRequest("search term must not be blank".into()));
    }
    let ranked = call_with_timeout(config.request_timeout(), "search", backend.search(term, store)).await?;
    let grouped = group_by_collection(ranked);
    debug!(term, hits = grouped.total(), collections = grouped.0.len(), "search results grouped");
    Ok(grouped)
}
