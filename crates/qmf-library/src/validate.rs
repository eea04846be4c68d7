//! `validateMeasureComponents` (spec.md §4.6): cross-checks a measure's
//! value-set references against the component library's draft/approved/
//! archived state and surfaces advisory warnings.

use crate::model::{ComponentBody, ComponentStatus, LibraryComponent};
use crate::store::LibraryStore;
use qmf_ums::{ClauseChild, LogicalClause, Measure};

fn component_oid(component: &LibraryComponent) -> Option<&str> {
    match &component.body {
        ComponentBody::Atomic(atomic) => atomic.value_set_oid.as_deref(),
        ComponentBody::Composite(_) => None,
    }
}

fn walk_clause(clause: &LogicalClause, measure: &Measure, library: &dyn LibraryStore, warnings: &mut Vec<String>) {
    for child in &clause.children {
        match child {
            ClauseChild::Clause(nested) => walk_clause(nested, measure, library, warnings),
            ClauseChild::Element(element) => {
                let Some(reference) = &element.value_set else {
                    continue;
                };
                let Some(value_set) = measure.resolve_value_set(reference) else {
                    continue;
                };
                check_reference(element.id.as_str(), value_set.oid.as_deref(), library, warnings);
            }
        }
    }
}

fn check_reference(element_id: &str, oid: Option<&str>, library: &dyn LibraryStore, warnings: &mut Vec<String>) {
    let Some(oid) = oid else {
        return;
    };

    let components = library.all();
    let matches: Vec<&LibraryComponent> = components.iter().filter(|c| component_oid(c) == Some(oid)).collect();

    if matches.is_empty() {
        warnings.push(format!("data element '{element_id}' references value set OID '{oid}' with no matching library component"));
        return;
    }

    let has_approved = matches.iter().any(|c| c.status == ComponentStatus::Approved);
    let has_archived_only = matches.iter().all(|c| c.status == ComponentStatus::Archived);

    if has_archived_only {
        warnings.push(format!("data element '{element_id}' references value set OID '{oid}', whose only library component is archived"));
    } else if !has_approved {
        warnings.push(format!("data element '{element_id}' references value set OID '{oid}', which only has a draft library component"));
    }
}

/// Walks every population's criteria tree and returns advisory warnings
/// about library components backing the measure's value-set references.
pub fn validate_measure_components(measure: &Measure, library: &dyn LibraryStore) -> Vec<String> {
    let mut warnings = Vec::new();
    for population in &measure.populations {
        walk_clause(&population.criteria, measure, library, &mut warnings);
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AtomicComponent, ComponentBody, TimingDescriptor};
    use crate::store::InMemoryLibraryStore;
    use qmf_ums::fixtures::diabetes_with_exclusion_measure;

    fn component(id: &str, oid: &str, status: ComponentStatus) -> LibraryComponent {
        let mut component = LibraryComponent::new(
            id,
            "Diabetes diagnosis",
            ComponentBody::Atomic(AtomicComponent { value_set_oid: Some(oid.to_string()), value_set_name: None, timing: TimingDescriptor::default(), negation: false }),
            "Structural Criteria",
        );
        component.status = status;
        component
    }

    #[test]
    fn warns_when_no_library_component_matches() {
        let measure = diabetes_with_exclusion_measure();
        let library = InMemoryLibraryStore::new();
        let warnings = validate_measure_components(&measure, &library);
        assert!(!warnings.is_empty());
    }

    #[test]
    fn silent_when_approved_component_backs_the_reference() {
        let measure = diabetes_with_exclusion_measure();
        let oid = measure.value_sets.first().and_then(|vs| vs.oid.clone()).expect("fixture has an oid");
        let library = InMemoryLibraryStore::new();
        library.put(component("c1", &oid, ComponentStatus::Approved));
        let warnings = validate_measure_components(&measure, &library);
        assert!(warnings.iter().all(|w| !w.contains(&oid)));
    }

    #[test]
    fn warns_when_only_archived_component_backs_the_reference() {
        let measure = diabetes_with_exclusion_measure();
        let oid = measure.value_sets.first().and_then(|vs| vs.oid.clone()).expect("fixture has an oid");
        let library = InMemoryLibraryStore::new();
        library.put(component("c1", &oid, ComponentStatus::Archived));
        let warnings = validate_measure_components(&measure, &library);
        assert!(warnings.iter().any(|w| w.contains("archived")));
    }
}
