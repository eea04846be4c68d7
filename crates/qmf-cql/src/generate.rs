//! Lowers a UMS [`Measure`] into textual CQL (spec.md §4.2) for a downstream
//! CQL-to-ELM translator. Generation never fails outright for recoverable
//! issues (unknown code system); it warns and emits as-is. Only a missing
//! measurement period is fatal.

use crate::ident::sanitize_identifier;
use qmf_ums::{
    Anchor, ClauseChild, ClauseOperator, Comparator, DataElement, DataElementType, Direction, LogicalClause, Measure, Side, SiblingOperator,
    Thresholds, TimeUnit,
};
use std::collections::BTreeSet;

const TRANSLATOR_FHIR_VERSION: &str = "4.0.1";
const LIBRARY_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CqlGeneration {
    pub success: bool,
    pub cql: String,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub library_name: String,
}

/// Canonical name and system URI for a `codesystem` declaration. Mirrors
/// `qmf-evaluator::codematch::canonicalize_system`'s vocabulary, kept as a
/// separate, smaller table here since this crate only needs declaration
/// text, not a matching rule.
fn codesystem_uri(system: &str) -> (String, String) {
    let key: String = system.chars().filter(|c| c.is_ascii_alphanumeric()).map(|c| c.to_ascii_uppercase()).collect();
    match key.as_str() {
        "ICD10CM" | "ICD10" => ("ICD10".to_string(), "urn:oid:2.16.840.1.113883.6.90".to_string()),
        "ICD9CM" | "ICD9" => ("ICD9".to_string(), "urn:oid:2.16.840.1.113883.6.103".to_string()),
        "SNOMEDCT" | "SNOMED" => ("SNOMED".to_string(), "http://snomed.info/sct".to_string()),
        "RXNORM" => ("RxNorm".to_string(), "http://www.nlm.nih.gov/research/umls/rxnorm".to_string()),
        "CPT4" | "CPT" => ("CPT".to_string(), "http://www.ama-assn.org/go/cpt".to_string()),
        "LOINC" => ("LOINC".to_string(), "http://loinc.org".to_string()),
        "CVX" => ("CVX".to_string(), "http://hl7.org/fhir/sid/cvx".to_string()),
        "HCPCS" => ("HCPCS".to_string(), "urn:oid:2.16.840.1.113883.6.285".to_string()),
        "NDC" => ("NDC".to_string(), "http://hl7.org/fhir/sid/ndc".to_string()),
        other => (other.to_string(), format!("urn:oid:{}", system.trim())),
    }
}

fn resource_type(element_type: DataElementType) -> &'static str {
    match element_type {
        DataElementType::Diagnosis => "Condition",
        DataElementType::Encounter => "Encounter",
        DataElementType::Procedure => "Procedure",
        DataElementType::Observation | DataElementType::Assessment => "Observation",
        DataElementType::Medication => "MedicationRequest",
        DataElementType::Immunization => "Immunization",
        DataElementType::Device => "Device",
        DataElementType::Allergy => "AllergyIntolerance",
        DataElementType::Communication => "Communication",
        DataElementType::Goal => "Goal",
        DataElementType::Demographic => "Patient",
    }
}

struct GenCtx<'a> {
    measure: &'a Measure,
    warnings: Vec<String>,
    errors: Vec<String>,
}

/// The CQL reference name for a `DataElement`'s coded criteria: either the
/// resolved value set's name, or a synthesized `code` declaration name for
/// directly-coded criteria (spec.md §4.2 "directly coded criteria").
fn reference_name(element: &DataElement, ctx: &mut GenCtx) -> Option<String> {
    if !element.direct_codes.is_empty() {
        return Some(format!("{}Code", sanitize_identifier(&element.id)));
    }
    let reference = element.value_set.as_ref()?;
    match ctx.measure.resolve_value_set(reference) {
        Some(vs) => Some(vs.name.clone()),
        None => {
            ctx.warnings.push(format!("data element {} references unknown value set '{reference}'", element.id));
            None
        }
    }
}

fn collect_codesystems(measure: &Measure) -> BTreeSet<(String, String)> {
    let mut systems = BTreeSet::new();
    for population in &measure.populations {
        collect_codesystems_clause(&population.criteria, &mut systems);
    }
    systems
}

fn collect_codesystems_clause(clause: &LogicalClause, systems: &mut BTreeSet<(String, String)>) {
    for child in &clause.children {
        match child {
            ClauseChild::Clause(inner) => collect_codesystems_clause(inner, systems),
            ClauseChild::Element(element) => {
                for code in &element.direct_codes {
                    systems.insert(codesystem_uri(&code.system));
                }
            }
        }
    }
}

fn collect_value_sets(measure: &Measure) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for population in &measure.populations {
        collect_value_sets_clause(&population.criteria, measure, &mut names);
    }
    names
}

fn collect_value_sets_clause(clause: &LogicalClause, measure: &Measure, names: &mut BTreeSet<String>) {
    for child in &clause.children {
        match child {
            ClauseChild::Clause(inner) => collect_value_sets_clause(inner, measure, names),
            ClauseChild::Element(element) => {
                if element.direct_codes.is_empty() {
                    if let Some(reference) = &element.value_set {
                        if let Some(vs) = measure.resolve_value_set(reference) {
                            if let Some(oid) = &vs.oid {
                                names.insert(format!("valueset \"{}\": 'urn:oid:{oid}'", vs.name));
                            }
                        }
                    }
                }
            }
        }
    }
}

fn lower_timing(element: &DataElement, var: &str) -> String {
    if let Some(constraint) = &element.timing_override {
        let anchor = match constraint.anchor {
            Anchor::MeasurementPeriod => "\"Measurement Period\"".to_string(),
            Anchor::Ipsd => "\"Initial Population Start Date\"".to_string(),
            Anchor::EventDate => "E".to_string(),
        };
        return match (constraint.side, &constraint.offset) {
            (Side::During, _) => format!("{var} during {anchor}"),
            (Side::BeforeEnd, Some(offset)) => {
                format!("{var} {} {} or less before end of {anchor}", offset.value, unit_word(offset.unit))
            }
            (Side::BeforeEnd, None) => format!("{var} before end of {anchor}"),
            (Side::AfterStart, Some(offset)) => {
                format!("{var} {} {} or less after start of {anchor}", offset.value, unit_word(offset.unit))
            }
            (Side::AfterStart, None) => format!("{var} after start of {anchor}"),
            (Side::BeforeStart, Some(offset)) => {
                format!("{var} {} {} or less before start of {anchor}", offset.value, unit_word(offset.unit))
            }
            (Side::BeforeStart, None) => format!("{var} before start of {anchor}"),
            (Side::AfterEnd, Some(offset)) => {
                format!("{var} {} {} or less after end of {anchor}", offset.value, unit_word(offset.unit))
            }
            (Side::AfterEnd, None) => format!("{var} after end of {anchor}"),
        };
    }

    if let Some(requirement) = element.timing_requirements.first() {
        let point = if requirement.relative_to.contains("start") {
            "start of \"Measurement Period\""
        } else {
            "end of \"Measurement Period\""
        };
        return match &requirement.window {
            Some(window) => match window.direction {
                Direction::Before => format!("{var} {} {} or less before {point}", window.value, unit_word(window.unit)),
                Direction::After => format!("{var} {} {} or less after {point}", window.value, unit_word(window.unit)),
                Direction::Within => format!("{var} within {} {} of {point}", window.value, unit_word(window.unit)),
            },
            None => format!("{var} during \"Measurement Period\""),
        };
    }

    format!("{var} during \"Measurement Period\"")
}

fn unit_word(unit: TimeUnit) -> &'static str {
    match unit {
        TimeUnit::Days => "days",
        TimeUnit::Weeks => "weeks",
        TimeUnit::Months => "months",
        TimeUnit::Years => "years",
        TimeUnit::Hours => "hours",
    }
}

fn lower_thresholds(thresholds: &Thresholds, var: &str) -> Option<String> {
    let value_expr = format!("{var}.value");
    match thresholds.comparator {
        Some(Comparator::Gt) => thresholds.value_min.map(|v| format!("{value_expr} > {v}")),
        Some(Comparator::Gte) => thresholds.value_min.map(|v| format!("{value_expr} >= {v}")),
        Some(Comparator::Lt) => thresholds.value_max.map(|v| format!("{value_expr} < {v}")),
        Some(Comparator::Lte) => thresholds.value_max.map(|v| format!("{value_expr} <= {v}")),
        Some(Comparator::Eq) => thresholds.value_min.map(|v| format!("{value_expr} = {v}")),
        Some(Comparator::Neq) => thresholds.value_min.map(|v| format!("{value_expr} != {v}")),
        Some(Comparator::Between) => match (thresholds.value_min, thresholds.value_max) {
            (Some(min), Some(max)) => Some(format!("{value_expr} >= {min} and {value_expr} <= {max}")),
            _ => None,
        },
        None => None,
    }
}

fn lower_dose_count(element: &DataElement) -> u32 {
    let lower = element.description.to_ascii_lowercase();
    let words = [("one", 1), ("two", 2), ("three", 3), ("four", 4), ("five", 5)];
    for token in lower.split_whitespace() {
        if let Ok(n) = token.trim_end_matches(|c: char| !c.is_ascii_digit()).parse::<u32>() {
            if n > 0 {
                return n;
            }
        }
        if let Some((_, n)) = words.iter().find(|(word, _)| *word == token) {
            return *n;
        }
    }
    element.thresholds.and_then(|t| t.value_min).map(|v| v as u32).unwrap_or(1)
}

fn lower_demographic(element: &DataElement) -> String {
    if let Some(thresholds) = &element.thresholds {
        if thresholds.age_min.is_some() || thresholds.age_max.is_some() {
            let at_start = "AgeInYearsAt(start of \"Measurement Period\")";
            let at_end = "AgeInYearsAt(end of \"Measurement Period\")";
            return match element.age_calculation {
                Some(qmf_ums::AgeCalculation::TurnsDuring) => {
                    let target = thresholds.age_min.or(thresholds.age_max).unwrap_or(0);
                    format!("{at_start} < {target} and {at_end} >= {target}")
                }
                Some(qmf_ums::AgeCalculation::AtEnd) => age_bounds(at_end, thresholds),
                _ => age_bounds(at_start, thresholds),
            };
        }
    }
    let lower = element.description.to_ascii_lowercase();
    if lower.contains("female") {
        "Patient.gender = 'female'".to_string()
    } else if lower.contains("male") {
        "Patient.gender = 'male'".to_string()
    } else {
        "true".to_string()
    }
}

fn age_bounds(age_expr: &str, thresholds: &Thresholds) -> String {
    match (thresholds.age_min, thresholds.age_max) {
        (Some(min), Some(max)) => format!("{age_expr} >= {min} and {age_expr} <= {max}"),
        (Some(min), None) => format!("{age_expr} >= {min}"),
        (None, Some(max)) => format!("{age_expr} <= {max}"),
        (None, None) => "true".to_string(),
    }
}

fn lower_element(element: &DataElement, ctx: &mut GenCtx) -> String {
    let name = reference_name(element, ctx);
    let var = element.element_type_var();
    let expr = match element.element_type {
        DataElementType::Diagnosis => {
            let vs = name.unwrap_or_default();
            let timing = lower_timing(element, &format!("{var}.onset"));
            format!("exists [\"Condition\": \"{vs}\"] {var} where {var}.clinicalStatus ~ \"active\" and {timing}")
        }
        DataElementType::Encounter => {
            let vs = name.unwrap_or_default();
            let timing = lower_timing(element, &format!("{var}.period"));
            format!("exists [\"Encounter\": \"{vs}\"] {var} where {timing}")
        }
        DataElementType::Procedure => {
            let vs = name.unwrap_or_default();
            let timing = lower_timing(element, &format!("{var}.performed"));
            format!("exists [\"Procedure\": \"{vs}\"] {var} where {var}.status = 'completed' and {timing}")
        }
        DataElementType::Observation => {
            let vs = name.unwrap_or_default();
            let timing = lower_timing(element, &format!("{var}.effective"));
            let mut clause = format!(
                "exists [\"Observation\": \"{vs}\"] {var} where {var}.status in {{'final','amended'}} and {var}.value is not null and {timing}"
            );
            if let Some(thresholds) = &element.thresholds {
                if let Some(predicate) = lower_thresholds(thresholds, var) {
                    clause.push_str(&format!(" and {predicate}"));
                }
            }
            clause
        }
        DataElementType::Medication => {
            let vs = name.unwrap_or_default();
            format!("exists [\"MedicationRequest\": \"{vs}\"] {var} where {var}.status = 'active' and {var}.authoredOn during \"Measurement Period\"")
        }
        DataElementType::Immunization => {
            let vs = name.unwrap_or_default();
            let timing = lower_timing(element, &format!("{var}.occurrence"));
            let doses = lower_dose_count(element);
            format!("Count([\"Immunization\": \"{vs}\"] {var} where {var}.status = 'completed' and {timing}) >= {doses}")
        }
        DataElementType::Demographic => lower_demographic(element),
        DataElementType::Assessment | DataElementType::Device | DataElementType::Allergy | DataElementType::Communication | DataElementType::Goal => {
            let vs = name.unwrap_or_default();
            let timing = lower_timing(element, var);
            format!("exists [\"{}\": \"{vs}\"] {var} where {timing}", resource_type(element.element_type))
        }
    };

    if element.is_negated() {
        format!("not ({expr})")
    } else {
        expr
    }
}

fn lower_clause(clause: &LogicalClause, ctx: &mut GenCtx) -> String {
    if clause.operator == ClauseOperator::Not {
        let Some(only_child) = clause.children.first() else {
            return "true".to_string();
        };
        return format!("not ({})", lower_child(only_child, ctx));
    }

    if clause.children.is_empty() {
        return "true".to_string();
    }

    let mut out = lower_child(&clause.children[0], ctx);
    for i in 1..clause.children.len() {
        let connector = match clause.operator_between(i - 1) {
            SiblingOperator::And => "and",
            SiblingOperator::Or => "or",
        };
        out = format!("({out} {connector} {})", lower_child(&clause.children[i], ctx));
    }
    out
}

fn lower_child(child: &ClauseChild, ctx: &mut GenCtx) -> String {
    match child {
        ClauseChild::Clause(inner) => lower_clause(inner, ctx),
        ClauseChild::Element(element) => lower_element(element, ctx),
    }
}

fn collect_inline_codes(measure: &Measure) -> Vec<(String, String, String)> {
    let mut out = Vec::new();
    for population in &measure.populations {
        collect_inline_codes_clause(&population.criteria, &mut out);
    }
    out
}

fn collect_inline_codes_clause(clause: &LogicalClause, out: &mut Vec<(String, String, String)>) {
    for child in &clause.children {
        match child {
            ClauseChild::Clause(inner) => collect_inline_codes_clause(inner, out),
            ClauseChild::Element(element) => {
                if let Some(first) = element.direct_codes.first() {
                    let (system_name, _) = codesystem_uri(&first.system);
                    out.push((format!("{}Code", sanitize_identifier(&element.id)), first.code.clone(), system_name));
                }
            }
        }
    }
}

/// Lowers a validated [`Measure`] into CQL (spec.md §4.2).
pub fn generate(measure: &Measure) -> CqlGeneration {
    let mut ctx = GenCtx {
        measure,
        warnings: Vec::new(),
        errors: Vec::new(),
    };

    if !measure.metadata.measurement_period.is_well_formed() {
        return CqlGeneration {
            success: false,
            cql: String::new(),
            warnings: Vec::new(),
            errors: vec!["measurement period is missing or malformed; CQL generation requires it".to_string()],
            library_name: sanitize_identifier(&measure.metadata.measure_id),
        };
    }

    let library_name = sanitize_identifier(&measure.metadata.measure_id);
    let mut lines = Vec::new();
    lines.push(format!("library {library_name} version '{LIBRARY_VERSION}'"));
    lines.push(format!("using FHIR version '{TRANSLATOR_FHIR_VERSION}'"));
    lines.push(String::new());

    for (name, uri) in collect_codesystems(measure) {
        lines.push(format!("codesystem \"{name}\": '{uri}'"));
    }
    for code in collect_inline_codes(measure) {
        lines.push(format!("code \"{}\": '{}' from \"{}\"", code.0, code.1, code.2));
    }
    for declaration in collect_value_sets(measure) {
        lines.push(declaration);
    }
    lines.push(String::new());
    lines.push("context Patient".to_string());
    lines.push(String::new());

    for population in &measure.populations {
        let expr = lower_clause(&population.criteria, &mut ctx);
        lines.push(format!("define \"{}\":", population.population_type.display_name()));
        lines.push(format!("  {expr}"));
        lines.push(String::new());
    }

    CqlGeneration {
        success: true,
        cql: lines.join("\n"),
        warnings: ctx.warnings,
        errors: ctx.errors,
        library_name,
    }
}

trait ElementVar {
    fn element_type_var(&self) -> &'static str;
}

impl ElementVar for DataElement {
    fn element_type_var(&self) -> &'static str {
        match self.element_type {
            DataElementType::Diagnosis => "C",
            DataElementType::Encounter => "E",
            DataElementType::Procedure => "P",
            DataElementType::Observation | DataElementType::Assessment => "O",
            DataElementType::Medication => "M",
            DataElementType::Immunization => "I",
            DataElementType::Device => "D",
            DataElementType::Allergy => "A",
            DataElementType::Communication => "Comm",
            DataElementType::Goal => "G",
            DataElementType::Demographic => "Patient",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qmf_ums::fixtures::{childhood_immunization_measure, colonoscopy_lookback_measure, diabetes_with_exclusion_measure, hba1c_threshold_measure, minimal_measure};

    #[test]
    fn declares_required_header_sections() {
        let result = generate(&minimal_measure());
        assert!(result.success);
        assert!(result.cql.contains("library demographics_only version"));
        assert!(result.cql.contains("using FHIR version '4.0.1'"));
        assert!(result.cql.contains("context Patient"));
    }

    #[test]
    fn declares_one_codesystem_and_valueset_per_reference() {
        let result = generate(&diabetes_with_exclusion_measure());
        assert!(result.cql.contains("valueset \"Diabetes Mellitus\""));
        assert!(result.cql.contains("valueset \"Malignant Neoplasm\""));
        assert!(result.cql.contains("define \"Initial Population\":"));
        assert!(result.cql.contains("define \"Denominator Exclusion\":"));
    }

    #[test]
    fn immunization_lowers_to_count_with_required_doses() {
        let result = generate(&childhood_immunization_measure());
        assert!(result.cql.contains("Count([\"Immunization\": \"DTaP Vaccine\"]"));
        assert!(result.cql.contains(">= 4"));
    }

    #[test]
    fn observation_threshold_lowers_comparator() {
        let result = generate(&hba1c_threshold_measure());
        assert!(result.cql.contains("O.value < 8"));
    }

    #[test]
    fn legacy_timing_window_lowers_directionally() {
        let result = generate(&colonoscopy_lookback_measure());
        assert!(result.cql.contains("10 years or less before"));
    }

    #[test]
    fn missing_measurement_period_is_fatal() {
        let mut measure = minimal_measure();
        measure.metadata.measurement_period.start = measure.metadata.measurement_period.end.succ_opt().unwrap();
        let result = generate(&measure);
        assert!(!result.success);
        assert!(!result.errors.is_empty());
    }
}
