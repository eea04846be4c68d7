//! External interfaces the core consumes (spec.md §6.1, §6.2).
//!
//! The LLM extraction front end, the authoring UI, and persistence are out
//! of scope (spec.md §1); what remains is a minimal trait boundary so the
//! core can be driven without committing to a storage engine or
//! terminology service. Each trait ships an in-memory reference
//! implementation for tests, fixtures, and `qmf-cli`.

use crate::model::{CodeEntry, Measure};
use std::collections::HashMap;
use std::sync::RwLock;

/// A measure's identity and a few fields useful for listing, without
/// materializing the whole tree (spec.md §6.1 `list`).
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureSummary {
    pub measure_id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PutOutcome {
    Ok { id: String },
    Error { reason: String },
}

/// spec.md §6.1: `get(measureId) -> Measure?`, `put(measure) -> {ok,id} |
/// {error,reason}`, `list(filter) -> [MeasureSummary]`. The core only
/// requires idempotent `put` and strongly consistent `get` within a
/// process.
pub trait MeasureStore: Send + Sync {
    fn get(&self, measure_id: &str) -> Option<Measure>;
    fn put(&self, measure: Measure) -> PutOutcome;
    fn list(&self, title_contains: Option<&str>) -> Vec<MeasureSummary>;
}

/// In-process, single-writer reference implementation of [`MeasureStore`].
#[derive(Default)]
pub struct InMemoryMeasureStore {
    measures: RwLock<HashMap<String, Measure>>,
}

impl MeasureStore for InMemoryMeasureStore {
    fn get(&self, measure_id: &str) -> Option<Measure> {
        self.measures.read().unwrap().get(measure_id).cloned()
    }

    fn put(&self, measure: Measure) -> PutOutcome {
        let id = measure.metadata.measure_id.clone();
        if id.trim().is_empty() {
            return PutOutcome::Error {
                reason: "metadata.measureId must not be empty".to_string(),
            };
        }
        self.measures.write().unwrap().insert(id.clone(), measure);
        PutOutcome::Ok { id }
    }

    fn list(&self, title_contains: Option<&str>) -> Vec<MeasureSummary> {
        self.measures
            .read()
            .unwrap()
            .values()
            .filter(|m| {
                title_contains
                    .map(|needle| m.metadata.title.contains(needle))
                    .unwrap_or(true)
            })
            .map(|m| MeasureSummary {
                measure_id: m.metadata.measure_id.clone(),
                title: m.metadata.title.clone(),
            })
            .collect()
    }
}

/// spec.md §6.2: `resolve(oid, version?) -> [{code, system, display?}]`,
/// tolerating an empty expansion.
pub trait ValueSetResolver: Send + Sync {
    fn resolve(&self, oid: &str, version: Option<&str>) -> Vec<CodeEntry>;
}

/// A resolver backed by a fixed `OID -> codes` map, for tests and for
/// authoring flows where codes were already expanded inline.
#[derive(Debug, Clone, Default)]
pub struct StaticValueSetResolver {
    expansions: HashMap<String, Vec<CodeEntry>>,
}

impl StaticValueSetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expansion(mut self, oid: impl Into<String>, codes: Vec<CodeEntry>) -> Self {
        self.expansions.insert(oid.into(), codes);
        self
    }
}

impl ValueSetResolver for StaticValueSetResolver {
    fn resolve(&self, oid: &str, _version: Option<&str>) -> Vec<CodeEntry> {
        self.expansions.get(oid).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::minimal_measure;

    #[test]
    fn in_memory_store_round_trips() {
        let store = InMemoryMeasureStore::default();
        let measure = minimal_measure();
        let id = measure.metadata.measure_id.clone();
        match store.put(measure.clone()) {
            PutOutcome::Ok { id: put_id } => assert_eq!(put_id, id),
            PutOutcome::Error { reason } => panic!("unexpected error: {reason}"),
        }
        assert_eq!(store.get(&id), Some(measure));
        assert_eq!(store.list(None).len(), 1);
    }

    #[test]
    fn resolver_tolerates_missing_oid() {
        let resolver = StaticValueSetResolver::new();
        assert!(resolver.resolve("2.16.unknown", None).is_empty());
    }
}
