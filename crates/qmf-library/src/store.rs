//! The component library's persistence seam, mirroring
//! `qmf_ums::interfaces::MeasureStore`/`InMemoryMeasureStore`: a trait
//! object external systems can back with a real database, plus a simple
//! in-memory reference implementation for tests and single-process use.

use crate::error::{LibraryError, Result};
use crate::model::{ComponentBody, CompositeComponent, LibraryComponent};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

pub trait LibraryStore: Send + Sync {
    fn get(&self, id: &str) -> Option<LibraryComponent>;
    fn all(&self) -> Vec<LibraryComponent>;
    fn put(&self, component: LibraryComponent);
}

/// The write gate for composite components (spec.md §9 "DAG of
/// composites"): walks the child graph post-order with a visiting-set
/// before delegating to [`LibraryStore::put`], rejecting a write that would
/// introduce a cycle or dangle a child reference. Atomic components have no
/// children to validate and are put through unconditionally.
pub fn upsert_composite(store: &dyn LibraryStore, component: LibraryComponent) -> Result<()> {
    if let ComponentBody::Composite(composite) = &component.body {
        let mut visiting = HashSet::new();
        let mut visited = HashSet::new();
        check_composite(&component.id, composite, store, &mut visiting, &mut visited)?;
    }
    store.put(component);
    Ok(())
}

fn check_composite(
    id: &str,
    composite: &CompositeComponent,
    store: &dyn LibraryStore,
    visiting: &mut HashSet<String>,
    visited: &mut HashSet<String>,
) -> Result<()> {
    visiting.insert(id.to_string());
    for child_id in &composite.children {
        if visiting.contains(child_id) {
            return Err(LibraryError::Cycle(child_id.clone()));
        }
        if visited.contains(child_id) {
            continue;
        }
        let child = store.get(child_id).ok_or_else(|| LibraryError::DanglingChild {
            parent: id.to_string(),
            child: child_id.clone(),
        })?;
        if let ComponentBody::Composite(child_composite) = &child.body {
            check_composite(child_id, child_composite, store, visiting, visited)?;
        } else {
            visited.insert(child_id.clone());
        }
    }
    visiting.remove(id);
    visited.insert(id.to_string());
    Ok(())
}

#[derive(Default)]
pub struct InMemoryLibraryStore {
    components: RwLock<HashMap<String, LibraryComponent>>,
}

impl InMemoryLibraryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LibraryStore for InMemoryLibraryStore {
    fn get(&self, id: &str) -> Option<LibraryComponent> {
        self.components.read().expect("library store lock poisoned").get(id).cloned()
    }

    fn all(&self) -> Vec<LibraryComponent> {
        self.components.read().expect("library store lock poisoned").values().cloned().collect()
    }

    fn put(&self, component: LibraryComponent) {
        self.components.write().expect("library store lock poisoned").insert(component.id.clone(), component);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ComponentBody, CompositeComponent, CompositeOperator};

    fn sample(id: &str) -> LibraryComponent {
        LibraryComponent::new(id, "Sample", ComponentBody::Composite(CompositeComponent { operator: CompositeOperator::And, children: vec![] }), "Composite Logic")
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = InMemoryLibraryStore::new();
        store.put(sample("c1"));
        assert_eq!(store.get("c1").unwrap().id, "c1");
    }

    #[test]
    fn missing_component_returns_none() {
        let store = InMemoryLibraryStore::new();
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn all_lists_every_stored_component() {
        let store = InMemoryLibraryStore::new();
        store.put(sample("c1"));
        store.put(sample("c2"));
        assert_eq!(store.all().len(), 2);
    }

    fn composite(id: &str, children: Vec<&str>) -> LibraryComponent {
        LibraryComponent::new(
            id,
            id,
            ComponentBody::Composite(CompositeComponent {
                operator: CompositeOperator::And,
                children: children.into_iter().map(String::from).collect(),
            }),
            "Composite Logic",
        )
    }

    #[test]
    fn upsert_composite_rejects_unknown_child() {
        let store = InMemoryLibraryStore::new();
        let err = upsert_composite(&store, composite("c1", vec!["missing"])).unwrap_err();
        assert_eq!(err, LibraryError::DanglingChild { parent: "c1".to_string(), child: "missing".to_string() });
        assert!(store.get("c1").is_none());
    }

    #[test]
    fn upsert_composite_rejects_self_reference() {
        let store = InMemoryLibraryStore::new();
        let err = upsert_composite(&store, composite("c1", vec!["c1"])).unwrap_err();
        assert_eq!(err, LibraryError::Cycle("c1".to_string()));
    }

    #[test]
    fn upsert_composite_rejects_transitive_cycle() {
        let store = InMemoryLibraryStore::new();
        store.put(composite("c1", vec!["c2"]));
        let err = upsert_composite(&store, composite("c2", vec!["c1"])).unwrap_err();
        assert_eq!(err, LibraryError::Cycle("c1".to_string()));
    }

    #[test]
    fn upsert_composite_accepts_a_valid_dag_with_a_shared_child() {
        let store = InMemoryLibraryStore::new();
        store.put(sample("a1"));
        upsert_composite(&store, composite("c1", vec!["a1"])).unwrap();
        upsert_composite(&store, composite("c2", vec!["a1", "c1"])).unwrap();
        assert!(store.get("c2").is_some());
    }
}
