//! Identity, matching, and diffing for library components (spec.md §4.6).
//!
//! Hashing uses a hand-rolled FNV-1a over a normalized key string rather
//! than `std::collections::hash_map::DefaultHasher`: the standard library
//! explicitly does not promise its internal algorithm stays the same
//! across releases, and the identity hash here must be byte-stable.

use crate::model::{AtomicComponent, ComponentBody, Diff, LibraryComponent};
use crate::store::LibraryStore;
use serde::Serialize;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn value_set_key(oid: &Option<String>, name: &Option<String>) -> String {
    oid.clone().or_else(|| name.clone()).unwrap_or_default()
}

fn atomic_key(atomic: &AtomicComponent) -> String {
    format!(
        "atomic|{}|{}|{}|{}|{}|{}|{}",
        value_set_key(&atomic.value_set_oid, &atomic.value_set_name),
        atomic.timing.operator.as_deref().unwrap_or(""),
        atomic.timing.quantity.map(|q| q.to_string()).unwrap_or_default(),
        atomic.timing.unit.as_deref().unwrap_or(""),
        atomic.timing.position.as_deref().unwrap_or(""),
        atomic.timing.reference.as_deref().unwrap_or(""),
        atomic.negation,
    )
}

/// Recursively hashes a component body, resolving composite children
/// through `library` to their own atomic/composite identities.
pub fn generate_hash(body: &ComponentBody, library: &dyn LibraryStore) -> u64 {
    match body {
        ComponentBody::Atomic(atomic) => fnv1a64(atomic_key(atomic).as_bytes()),
        ComponentBody::Composite(composite) => {
            let mut child_hashes: Vec<u64> = composite
                .children
                .iter()
                .filter_map(|child_id| library.get(child_id))
                .map(|child| generate_hash(&child.body, library))
                .collect();
            child_hashes.sort_unstable();
            let key = format!("composite|{:?}|{:?}", composite.operator, child_hashes);
            fnv1a64(key.as_bytes())
        }
    }
}

/// Hash equality across atomic and composite bodies; composites resolve
/// child references to their atomic identities before comparing.
pub fn find_exact_match(incoming: &ComponentBody, library: &dyn LibraryStore) -> Option<LibraryComponent> {
    let target = generate_hash(incoming, library);
    library.all().into_iter().find(|candidate| generate_hash(&candidate.body, library) == target)
}

/// Fallback used only when the incoming atomic has no OID: compares
/// normalized value-set name, timing operator, reference, and negation.
pub fn find_name_match(incoming: &AtomicComponent, library: &dyn LibraryStore) -> Option<LibraryComponent> {
    if incoming.value_set_oid.is_some() {
        return None;
    }
    library.all().into_iter().find(|candidate| {
        let ComponentBody::Atomic(existing) = &candidate.body else {
            return false;
        };
        existing.value_set_name.as_deref().map(str::to_ascii_lowercase) == incoming.value_set_name.as_deref().map(str::to_ascii_lowercase)
            && existing.timing.operator == incoming.timing.operator
            && existing.timing.reference == incoming.timing.reference
            && existing.negation == incoming.negation
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityMatch {
    pub component: LibraryComponent,
    pub score: f64,
}

fn similarity_score(incoming: &AtomicComponent, existing: &AtomicComponent) -> f64 {
    if incoming.value_set_oid.is_none() || incoming.value_set_oid != existing.value_set_oid {
        return 0.0;
    }
    let mut score = 0.7;
    if incoming.timing.operator == existing.timing.operator {
        score += 0.15;
    }
    if incoming.timing.reference == existing.timing.reference {
        score += 0.15;
    }
    score
}

/// Near-matches for authoring suggestions, scored by shared OID plus
/// matching timing operator/reference. Exact matches (score 1.0 by hash)
/// are excluded — they belong to [`find_exact_match`].
pub fn find_similar_components(incoming: &AtomicComponent, library: &dyn LibraryStore, threshold: f64) -> Vec<SimilarityMatch> {
    let incoming_body = ComponentBody::Atomic(incoming.clone());
    let exact_hash = generate_hash(&incoming_body, library);

    let mut matches: Vec<SimilarityMatch> = library
        .all()
        .into_iter()
        .filter_map(|candidate| {
            let ComponentBody::Atomic(existing) = &candidate.body else {
                return None;
            };
            if generate_hash(&candidate.body, library) == exact_hash {
                return None;
            }
            let score = similarity_score(incoming, existing);
            (score >= threshold).then_some(SimilarityMatch { component: candidate.clone(), score })
        })
        .collect();

    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    matches
}

/// Field-by-field differences between an existing component and an
/// incoming body, with human-readable explanations.
pub fn compute_component_diff(existing: &LibraryComponent, incoming: &ComponentBody) -> Vec<Diff> {
    let mut diffs = Vec::new();

    match (&existing.body, incoming) {
        (ComponentBody::Atomic(old), ComponentBody::Atomic(new)) => {
            if old.value_set_oid != new.value_set_oid {
                diffs.push(Diff {
                    field: "valueSetOid".to_string(),
                    existing: old.value_set_oid.clone().unwrap_or_default(),
                    incoming: new.value_set_oid.clone().unwrap_or_default(),
                    message: "value set OID changed".to_string(),
                });
            }
            if old.timing.quantity != new.timing.quantity || old.timing.unit != new.timing.unit {
                diffs.push(Diff {
                    field: "timing".to_string(),
                    existing: format!("{:?} {:?}", old.timing.quantity, old.timing.unit),
                    incoming: format!("{:?} {:?}", new.timing.quantity, new.timing.unit),
                    message: "timing quantity/unit changed".to_string(),
                });
            }
            if old.timing.position != new.timing.position {
                diffs.push(Diff {
                    field: "timing.position".to_string(),
                    existing: old.timing.position.clone().unwrap_or_default(),
                    incoming: new.timing.position.clone().unwrap_or_default(),
                    message: "timing anchor position changed".to_string(),
                });
            }
            if old.timing.reference != new.timing.reference {
                diffs.push(Diff {
                    field: "timing.reference".to_string(),
                    existing: old.timing.reference.clone().unwrap_or_default(),
                    incoming: new.timing.reference.clone().unwrap_or_default(),
                    message: "timing reference changed".to_string(),
                });
            }
            if old.negation != new.negation {
                diffs.push(Diff {
                    field: "negation".to_string(),
                    existing: old.negation.to_string(),
                    incoming: new.negation.to_string(),
                    message: "negation changed".to_string(),
                });
            }
        }
        (ComponentBody::Composite(old), ComponentBody::Composite(new)) => {
            if old.operator != new.operator {
                diffs.push(Diff {
                    field: "operator".to_string(),
                    existing: format!("{:?}", old.operator),
                    incoming: format!("{:?}", new.operator),
                    message: "composite operator changed".to_string(),
                });
            }
            if old.children.len() != new.children.len() {
                diffs.push(Diff {
                    field: "childCount".to_string(),
                    existing: old.children.len().to_string(),
                    incoming: new.children.len().to_string(),
                    message: "number of child components changed".to_string(),
                });
            }
        }
        _ => diffs.push(Diff {
            field: "kind".to_string(),
            existing: "atomic/composite".to_string(),
            incoming: "atomic/composite".to_string(),
            message: "component kind changed between atomic and composite".to_string(),
        }),
    }

    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ComponentMetadata, ComponentStatus, HistoryEntry, LibraryComponent, TimingDescriptor};
    use crate::store::InMemoryLibraryStore;
    use chrono::NaiveDate;

    fn atomic(oid: &str, operator: &str) -> AtomicComponent {
        AtomicComponent {
            value_set_oid: Some(oid.to_string()),
            value_set_name: Some("Diabetes Mellitus".to_string()),
            timing: TimingDescriptor {
                operator: Some(operator.to_string()),
                quantity: None,
                unit: None,
                position: Some("MeasurementPeriod".to_string()),
                reference: None,
            },
            negation: false,
        }
    }

    fn stored(id: &str, oid: &str, operator: &str) -> LibraryComponent {
        LibraryComponent {
            id: id.to_string(),
            name: "Diabetes diagnosis".to_string(),
            body: ComponentBody::Atomic(atomic(oid, operator)),
            status: ComponentStatus::Approved,
            version: "1.0".to_string(),
            metadata: ComponentMetadata { category: "Timed Criteria".to_string(), category_auto_assigned: true },
            history: vec![HistoryEntry {
                version_id: "1.0".to_string(),
                status: ComponentStatus::Approved,
                created_at: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
                created_by: "author".to_string(),
                change_description: "initial".to_string(),
            }],
            approved_by: Some("reviewer".to_string()),
            approved_at: None,
            usage: crate::model::Usage::default(),
        }
    }

    #[test]
    fn identical_atomics_hash_equal() {
        let library = InMemoryLibraryStore::default();
        let a = ComponentBody::Atomic(atomic("oid-1", "during"));
        let b = ComponentBody::Atomic(atomic("oid-1", "during"));
        assert_eq!(generate_hash(&a, &library), generate_hash(&b, &library));
    }

    #[test]
    fn find_exact_match_locates_identical_component() {
        let library = InMemoryLibraryStore::default();
        library.put(stored("c1", "oid-1", "during"));
        let incoming = ComponentBody::Atomic(atomic("oid-1", "during"));
        let found = find_exact_match(&incoming, &library).unwrap();
        assert_eq!(found.id, "c1");
    }

    #[test]
    fn find_similar_components_scores_matching_timing_operator() {
        let library = InMemoryLibraryStore::default();
        library.put(stored("c1", "oid-1", "before_end"));
        let incoming = atomic("oid-1", "during");
        let matches = find_similar_components(&incoming, &library, 0.5);
        assert_eq!(matches.len(), 1);
        assert!((matches[0].score - 0.85).abs() < 1e-9);
    }

    #[test]
    fn different_oid_scores_zero_and_is_excluded() {
        let library = InMemoryLibraryStore::default();
        library.put(stored("c1", "oid-2", "during"));
        let incoming = atomic("oid-1", "during");
        assert!(find_similar_components(&incoming, &library, 0.5).is_empty());
    }

    #[test]
    fn diff_reports_changed_oid() {
        let existing = stored("c1", "oid-1", "during");
        let incoming = ComponentBody::Atomic(atomic("oid-2", "during"));
        let diffs = compute_component_diff(&existing, &incoming);
        assert!(diffs.iter().any(|d| d.field == "valueSetOid"));
    }
}
