//! Composition harness (spec.md §8): wires the six seed scenarios in
//! `qmf_ums::fixtures` through validation, canonicalization, CQL/SQL
//! generation, and the patient-trace evaluator together, so regressions
//! that only show up when the crates are used in concert get caught.
//!
//! This crate has no public API surface of its own beyond a handful of
//! composition helpers; the actual checks live in `tests/`.

use qmf_evaluator::patient::PatientRecord;
use qmf_ums::interfaces::{StaticValueSetResolver, ValueSetResolver};
use qmf_ums::{CodeEntry, Measure, ValueSetReference};

/// Canonicalizes and validates a fixture measure, panicking (test-only
/// helper) if validation finds a fatal error — every seed scenario is
/// expected to be well-formed.
pub fn canonical(measure: Measure) -> Measure {
    let canonical = qmf_ums::canonicalize(measure);
    let report = qmf_ums::validate(&canonical);
    assert!(report.is_valid(), "fixture failed validation: {:?}", report.errors);
    canonical
}

/// Builds a resolver that expands every `measure.value_sets` entry to a
/// single fixed code, sufficient for exercising the evaluator/SQL paths
/// against fixtures that don't care about real terminology content.
pub fn resolver_for(measure: &Measure, code_by_oid: impl Fn(&ValueSetReference) -> CodeEntry) -> impl ValueSetResolver {
    let mut resolver = StaticValueSetResolver::new();
    for value_set in &measure.value_sets {
        if let Some(oid) = &value_set.oid {
            resolver = resolver.with_expansion(oid.clone(), vec![code_by_oid(value_set)]);
        }
    }
    resolver
}

/// A patient with no clinical facts at all — useful as a "misses every
/// population" baseline for outcome-shape assertions.
pub fn empty_patient(empi_id: impl Into<String>) -> PatientRecord {
    PatientRecord {
        empi_id: empi_id.into(),
        ..Default::default()
    }
}
