//! Derived component complexity (spec.md §3.2, §9): atomic complexity is
//! `1 + timing complexity + negation`; composite complexity is `1 + Σ child
//! complexity`, computed by memoized post-order traversal over the same
//! child-id graph [`crate::store::upsert_composite`] validates as a DAG.

use crate::model::{ComponentBody, TimingDescriptor};
use crate::store::LibraryStore;
use std::collections::HashMap;

fn timing_complexity(timing: &TimingDescriptor) -> u32 {
    [
        timing.operator.is_some(),
        timing.quantity.is_some(),
        timing.unit.is_some(),
        timing.position.is_some(),
        timing.reference.is_some(),
    ]
    .into_iter()
    .filter(|set| *set)
    .count() as u32
}

/// Complexity of the component named `id`, or `None` if it or a transitive
/// child isn't present in `library`.
pub fn compute_complexity(id: &str, library: &dyn LibraryStore) -> Option<u32> {
    let mut memo = HashMap::new();
    complexity_memo(id, library, &mut memo)
}

fn complexity_memo(id: &str, library: &dyn LibraryStore, memo: &mut HashMap<String, u32>) -> Option<u32> {
    if let Some(cached) = memo.get(id) {
        return Some(*cached);
    }
    let component = library.get(id)?;
    let value = match &component.body {
        ComponentBody::Atomic(atomic) => 1 + timing_complexity(&atomic.timing) + atomic.negation as u32,
        ComponentBody::Composite(composite) => {
            let mut total = 1;
            for child_id in &composite.children {
                total += complexity_memo(child_id, library, memo)?;
            }
            total
        }
    };
    memo.insert(id.to_string(), value);
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AtomicComponent, ComponentBody, CompositeComponent, CompositeOperator, LibraryComponent, TimingDescriptor};
    use crate::store::InMemoryLibraryStore;

    fn atomic(id: &str, negation: bool, timed: bool) -> LibraryComponent {
        let timing = if timed {
            TimingDescriptor { operator: Some("during".to_string()), ..TimingDescriptor::default() }
        } else {
            TimingDescriptor::default()
        };
        LibraryComponent::new(
            id,
            id,
            ComponentBody::Atomic(AtomicComponent { value_set_oid: Some("oid".to_string()), value_set_name: None, timing, negation }),
            "Structural Criteria",
        )
    }

    #[test]
    fn atomic_complexity_adds_timing_and_negation() {
        let store = InMemoryLibraryStore::new();
        store.put(atomic("a1", true, true));
        assert_eq!(compute_complexity("a1", &store), Some(3));
    }

    #[test]
    fn plain_atomic_complexity_is_one() {
        let store = InMemoryLibraryStore::new();
        store.put(atomic("a1", false, false));
        assert_eq!(compute_complexity("a1", &store), Some(1));
    }

    #[test]
    fn composite_complexity_sums_children() {
        let store = InMemoryLibraryStore::new();
        store.put(atomic("a1", false, false));
        store.put(atomic("a2", false, true));
        store.put(LibraryComponent::new(
            "c1",
            "c1",
            ComponentBody::Composite(CompositeComponent { operator: CompositeOperator::And, children: vec!["a1".to_string(), "a2".to_string()] }),
            "Composite Logic",
        ));
        assert_eq!(compute_complexity("c1", &store), Some(1 + 1 + 2));
    }

    #[test]
    fn missing_child_yields_none() {
        let store = InMemoryLibraryStore::new();
        store.put(LibraryComponent::new(
            "c1",
            "c1",
            ComponentBody::Composite(CompositeComponent { operator: CompositeOperator::And, children: vec!["missing".to_string()] }),
            "Composite Logic",
        ));
        assert_eq!(compute_complexity("c1", &store), None);
    }
}
