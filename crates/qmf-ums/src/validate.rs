//! UMS validation (spec.md §4.1).
//!
//! Validation never mutates the tree — it only classifies problems as
//! fatal errors (block codegen) or warnings (carried through to output).
//! Canonicalization, which does rewrite the tree, lives separately in
//! [`crate::canonicalize`].

use crate::model::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, code: &'static str, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            code,
            message: message.into(),
        });
    }

    fn warn(&mut self, code: &'static str, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            code,
            message: message.into(),
        });
    }
}

/// Validates a [`Measure`] against the structural, reference, and semantic
/// checks of spec.md §4.1.
pub fn validate(measure: &Measure) -> ValidationReport {
    let mut report = ValidationReport::default();

    structural_checks(measure, &mut report);
    reference_checks(measure, &mut report);
    semantic_checks(measure, &mut report);

    report
}

fn structural_checks(measure: &Measure, report: &mut ValidationReport) {
    if measure.metadata.measure_id.trim().is_empty() {
        report.error("STRUCT_MEASURE_ID", "metadata.measureId must not be empty");
    }
    if measure.metadata.title.trim().is_empty() {
        report.error("STRUCT_TITLE", "metadata.title must not be empty");
    }
    if measure.populations.is_empty() {
        report.error("STRUCT_NO_POPULATIONS", "measure must declare at least one population");
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut seen_population_types: HashSet<PopulationType> = HashSet::new();
    for population in &measure.populations {
        if !seen_population_types.insert(population.population_type) {
            report.error(
                "STRUCT_DUP_POPULATION",
                format!(
                    "duplicate population of type {:?}",
                    population.population_type
                ),
            );
        }
        check_clause_ids(&population.criteria, &mut seen_ids, report);
    }
}

fn check_clause_ids<'a>(
    clause: &'a LogicalClause,
    seen: &mut HashSet<&'a str>,
    report: &mut ValidationReport,
) {
    if !seen.insert(clause.id.as_str()) {
        report.error("STRUCT_DUP_ID", format!("duplicate node id '{}'", clause.id));
    }
    if clause.operator == ClauseOperator::Not && clause.children.len() != 1 {
        report.error(
            "STRUCT_NOT_ARITY",
            format!(
                "NOT clause '{}' must have exactly one child, found {}",
                clause.id,
                clause.children.len()
            ),
        );
    }
    for child in &clause.children {
        match child {
            ClauseChild::Clause(inner) => check_clause_ids(inner, seen, report),
            ClauseChild::Element(element) => {
                if !seen.insert(element.id.as_str()) {
                    report.error(
                        "STRUCT_DUP_ID",
                        format!("duplicate node id '{}'", element.id),
                    );
                }
            }
        }
    }
}

fn reference_checks(measure: &Measure, report: &mut ValidationReport) {
    let mut oid_counts: HashMap<&str, usize> = HashMap::new();
    for value_set in &measure.value_sets {
        if let Some(oid) = &value_set.oid {
            *oid_counts.entry(oid.as_str()).or_default() += 1;
        }
    }
    for (oid, count) in oid_counts {
        if count > 1 {
            report.warn(
                "REF_DUP_OID",
                format!("OID '{oid}' is referenced by {count} value sets; they will be merged during canonicalization"),
            );
        }
    }

    for population in &measure.populations {
        walk_elements(&population.criteria, &mut |element| {
            if let Some(reference) = &element.value_set {
                if measure.resolve_value_set(reference).is_none() {
                    report.warn(
                        "REF_UNRESOLVED_VALUESET",
                        format!(
                            "data element '{}' references unresolved value set '{}'",
                            element.id, reference
                        ),
                    );
                }
            }
            if element.value_set.is_some() {
                if let Some(reference) = &element.value_set {
                    if let Some(vs) = measure.resolve_value_set(reference) {
                        if vs.oid.is_some() && vs.codes.is_some() {
                            report.warn(
                                "REF_CODE_SOURCE_CONFLICT",
                                format!(
                                    "value set '{}' (oid {}) has both inline codes and an OID; inline codes take precedence",
                                    vs.name,
                                    vs.oid.as_deref().unwrap_or("?")
                                ),
                            );
                        }
                    }
                }
            }
            if !element.timing_requirements.is_empty() && element.timing_override.is_some() {
                report.warn(
                    "REF_TIMING_BOTH_FORMS",
                    format!(
                        "data element '{}' has both legacy and structured timing; structured takes precedence",
                        element.id
                    ),
                );
            }
        });
    }
}

fn walk_elements<'a>(clause: &'a LogicalClause, visit: &mut impl FnMut(&'a DataElement)) {
    for child in &clause.children {
        match child {
            ClauseChild::Clause(inner) => walk_elements(inner, visit),
            ClauseChild::Element(element) => visit(element),
        }
    }
}

fn semantic_checks(measure: &Measure, report: &mut ValidationReport) {
    if let Some(constraints) = &measure.global_constraints {
        if let Some(age_range) = &constraints.age_range {
            if age_range.min > age_range.max {
                report.error("SEM_AGE_RANGE", "globalConstraints.ageRange.min must be <= max");
            }
            if age_range.max > 150 {
                report.error("SEM_AGE_MAX", "globalConstraints.ageRange.max must be <= 150");
            }
        }
    }

    if !measure.metadata.measurement_period.is_well_formed() {
        report.error(
            "SEM_MEASUREMENT_PERIOD",
            "metadata.measurementPeriod.start must be <= end",
        );
    }

    for population in &measure.populations {
        walk_elements(&population.criteria, &mut |element| {
            if let Some(thresholds) = &element.thresholds {
                if thresholds.comparator == Some(Comparator::Between) {
                    match (thresholds.value_min, thresholds.value_max) {
                        (Some(min), Some(max)) if min > max => {
                            report.error(
                                "SEM_THRESHOLD_BETWEEN",
                                format!(
                                    "data element '{}' has comparator 'between' with valueMin > valueMax",
                                    element.id
                                ),
                            );
                        }
                        (None, _) | (_, None) => {
                            report.error(
                                "SEM_THRESHOLD_BETWEEN",
                                format!(
                                    "data element '{}' has comparator 'between' but is missing valueMin or valueMax",
                                    element.id
                                ),
                            );
                        }
                        _ => {}
                    }
                }
                if let (Some(min), Some(max)) = (thresholds.age_min, thresholds.age_max) {
                    if min > max {
                        report.error(
                            "SEM_THRESHOLD_AGE",
                            format!("data element '{}' has ageMin > ageMax", element.id),
                        );
                    }
                }
            }
        });
    }

    for required in [
        PopulationType::InitialPopulation,
        PopulationType::Denominator,
        PopulationType::Numerator,
    ] {
        if measure.population(required).is_none() {
            report.warn(
                "SEM_MISSING_REQUIRED_POPULATION",
                format!("missing {required:?}; it will be synthesized with an empty AND clause during canonicalization"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::minimal_measure;

    #[test]
    fn minimal_measure_is_valid() {
        let measure = minimal_measure();
        let report = validate(&measure);
        assert!(report.is_valid(), "unexpected errors: {:?}", report.errors);
    }

    #[test]
    fn bad_age_range_is_fatal() {
        let mut measure = minimal_measure();
        measure.global_constraints = Some(GlobalConstraints {
            age_range: Some(AgeRange { min: 80, max: 10 }),
            age_calculation: None,
            gender: None,
        });
        let report = validate(&measure);
        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| e.code == "SEM_AGE_RANGE"));
    }

    #[test]
    fn unresolved_value_set_is_a_warning_not_an_error() {
        let mut measure = minimal_measure();
        if let ClauseChild::Element(element) =
            &mut measure.populations[0].criteria.children[0]
        {
            element.value_set = Some("missing-vs".to_string());
        }
        let report = validate(&measure);
        assert!(report.is_valid());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.code == "REF_UNRESOLVED_VALUESET"));
    }
}
