//! Component library invariants from spec.md §8: hash equality iff
//! identity equality, `findExactMatch` self-return, and diff-emptiness
//! iff identity.

use qmf_library::{generate_hash, ComponentBody, TimingDescriptor};
use qmf_library::{find_exact_match, AtomicComponent, InMemoryLibraryStore, LibraryComponent, LibraryStore};
use qmf_library::compute_component_diff;

fn atomic(oid: &str) -> AtomicComponent {
    AtomicComponent {
        value_set_oid: Some(oid.to_string()),
        value_set_name: None,
        timing: TimingDescriptor { operator: Some("during".to_string()), quantity: None, unit: None, position: Some("MeasurementPeriod".to_string()), reference: None },
        negation: false,
    }
}

#[test]
fn hash_equal_iff_identity_equal() {
    let library = InMemoryLibraryStore::new();
    let same_a = ComponentBody::Atomic(atomic("oid-1"));
    let same_b = ComponentBody::Atomic(atomic("oid-1"));
    let different = ComponentBody::Atomic(atomic("oid-2"));

    assert_eq!(generate_hash(&same_a, &library), generate_hash(&same_b, &library));
    assert_ne!(generate_hash(&same_a, &library), generate_hash(&different, &library));
}

#[test]
fn find_exact_match_returns_the_same_stored_component() {
    let library = InMemoryLibraryStore::new();
    let component = LibraryComponent::new("c1", "Diabetes diagnosis", ComponentBody::Atomic(atomic("oid-1")), "Timed Criteria");
    library.put(component.clone());

    let found = find_exact_match(&component.body, &library).expect("exact match");
    assert_eq!(found, component);
}

#[test]
fn diff_is_empty_iff_components_share_identity() {
    let a = LibraryComponent::new("c1", "A", ComponentBody::Atomic(atomic("oid-1")), "Timed Criteria");
    let identical_body = ComponentBody::Atomic(atomic("oid-1"));
    let different_body = ComponentBody::Atomic(atomic("oid-2"));

    assert!(compute_component_diff(&a, &identical_body).is_empty());
    assert!(!compute_component_diff(&a, &different_body).is_empty());
}
