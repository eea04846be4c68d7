//! `DataElement` leaf evaluation (spec.md §4.7): dispatches on
//! [`DataElementType`] to the matching patient-record fact list, applying
//! code matching, timing, thresholds, and negation.

use crate::codematch::codes_match;
use crate::patient::ClinicalFact;
use crate::timing::resolve_window;
use crate::trace::{Fact, TraceNode};
use crate::EvalContext;
use chrono::{Datelike, NaiveDate};
use qmf_ums::{Comparator, DataElement, DataElementType, Thresholds};
use regex::Regex;

/// Resolves the codes an element matches against: inline `directCodes` take
/// precedence; otherwise the referenced value set's own inline codes,
/// layered with whatever the resolver expands for its OID (spec.md §3.1
/// invariant 2, §9).
fn resolve_codes(element: &DataElement, ctx: &EvalContext) -> Vec<(String, String)> {
    if !element.direct_codes.is_empty() {
        return element
            .direct_codes
            .iter()
            .map(|c| (c.code.clone(), c.system.clone()))
            .collect();
    }

    let Some(reference) = &element.value_set else {
        return Vec::new();
    };
    let Some(vs) = ctx.measure.resolve_value_set(reference) else {
        return Vec::new();
    };

    let mut codes: Vec<(String, String)> = vs
        .codes
        .iter()
        .flatten()
        .map(|c| (c.code.clone(), c.system.clone()))
        .collect();

    if let Some(oid) = &vs.oid {
        for entry in ctx.resolver.resolve(oid, vs.version.as_deref()) {
            if !codes.iter().any(|(c, s)| codes_match(c, s, &entry.code, &entry.system)) {
                codes.push((entry.code, entry.system));
            }
        }
    }
    codes
}

fn scan<'a>(
    facts: &'a [ClinicalFact],
    codes: &[(String, String)],
    window: (NaiveDate, NaiveDate),
    extra: impl Fn(&ClinicalFact) -> bool,
) -> Vec<&'a ClinicalFact> {
    facts
        .iter()
        .filter(|f| {
            codes.iter().any(|(c, s)| codes_match(&f.code, &f.system, c, s))
                && crate::timing::in_window(f.date, window)
                && extra(f)
        })
        .collect()
}

fn apply_threshold(value: f64, thresholds: &Thresholds) -> bool {
    match thresholds.comparator {
        Some(Comparator::Gt) => thresholds.value_min.map(|m| value > m).unwrap_or(true),
        Some(Comparator::Gte) => thresholds.value_min.map(|m| value >= m).unwrap_or(true),
        Some(Comparator::Lt) => thresholds.value_max.map(|m| value < m).unwrap_or(true),
        Some(Comparator::Lte) => thresholds.value_max.map(|m| value <= m).unwrap_or(true),
        Some(Comparator::Eq) => thresholds.value_min.map(|m| (value - m).abs() < f64::EPSILON).unwrap_or(true),
        Some(Comparator::Neq) => thresholds.value_min.map(|m| (value - m).abs() >= f64::EPSILON).unwrap_or(true),
        Some(Comparator::Between) => {
            thresholds.value_min.map(|m| value >= m).unwrap_or(true)
                && thresholds.value_max.map(|m| value <= m).unwrap_or(true)
        }
        None => true,
    }
}

fn facts_to_trace(facts: &[&ClinicalFact], source: &str) -> Vec<Fact> {
    facts
        .iter()
        .map(|f| Fact {
            code: f.code.clone(),
            display: f.display.clone(),
            date: Some(f.date),
            source: source.to_string(),
        })
        .collect()
}

fn describe(element: &DataElement) -> String {
    if element.description.is_empty() {
        format!("{:?}", element.element_type)
    } else {
        element.description.clone()
    }
}

fn evaluate_clinical(element: &DataElement, ctx: &EvalContext, facts: &[ClinicalFact], source: &str) -> (bool, TraceNode) {
    let codes = resolve_codes(element, ctx);
    if codes.is_empty() {
        return (
            false,
            TraceNode::leaf(element.id.clone(), describe(element), false, format!("exists [{source}]")),
        );
    }
    let Ok(window) = resolve_window(element, &ctx.mp, ctx.ipsd) else {
        return (
            false,
            TraceNode::leaf(element.id.clone(), describe(element), false, format!("exists [{source}] (timing unresolved)")),
        );
    };

    let thresholds = element.thresholds;
    let value_ok = move |f: &ClinicalFact| match (thresholds, f.value) {
        (Some(t), Some(v)) => apply_threshold(v, &t),
        (Some(_), None) => false,
        (None, _) => true,
    };
    let status_ok = |f: &ClinicalFact| match &f.status {
        Some(s) => matches!(s.as_str(), "final" | "amended" | "active" | "completed"),
        None => true,
    };

    let matched_facts = scan(facts, &codes, window, |f| value_ok(f) && status_ok(f));
    let present = !matched_facts.is_empty();
    let matched = if element.is_negated() { !present } else { present };
    let cql = if element.is_negated() {
        format!("not exists [{source}: \"value set\"]")
    } else {
        format!("exists [{source}: \"value set\"]")
    };
    let node = TraceNode::leaf(element.id.clone(), describe(element), matched, cql).with_facts(facts_to_trace(&matched_facts, source));
    (matched, node)
}

fn parse_gender_keyword(description: &str) -> Option<qmf_ums::GenderConstraint> {
    let lower = description.to_ascii_lowercase();
    if lower.contains("female") {
        Some(qmf_ums::GenderConstraint::Female)
    } else if lower.contains("male") {
        Some(qmf_ums::GenderConstraint::Male)
    } else {
        None
    }
}

fn age_in_range(age: Option<u32>, min: Option<u32>, max: Option<u32>) -> bool {
    let Some(age) = age else { return false };
    min.map(|m| age >= m).unwrap_or(true) && max.map(|m| age <= m).unwrap_or(true)
}

fn evaluate_demographic(element: &DataElement, ctx: &EvalContext) -> (bool, TraceNode) {
    if let Some(thresholds) = &element.thresholds {
        if thresholds.age_min.is_some() || thresholds.age_max.is_some() {
            let calc = element.age_calculation.unwrap_or(qmf_ums::AgeCalculation::AtStart);
            let matched = age_check(calc, thresholds, ctx);
            return (
                matched,
                TraceNode::leaf(element.id.clone(), describe(element), matched, "age check"),
            );
        }
    }

    if let Some(gender) = parse_gender_keyword(&element.description) {
        let matched = ctx
            .patient
            .demographics
            .as_ref()
            .map(|d| d.gender.satisfies(gender))
            .unwrap_or(false);
        return (
            matched,
            TraceNode::leaf(element.id.clone(), describe(element), matched, "gender check"),
        );
    }

    (true, TraceNode::leaf(element.id.clone(), describe(element), true, "true"))
}

fn age_check(calc: qmf_ums::AgeCalculation, thresholds: &Thresholds, ctx: &EvalContext) -> bool {
    use qmf_ums::AgeCalculation::*;
    match calc {
        AtStart => age_in_range(ctx.patient.age_on(ctx.mp.start), thresholds.age_min, thresholds.age_max),
        AtEnd => age_in_range(ctx.patient.age_on(ctx.mp.end), thresholds.age_min, thresholds.age_max),
        During => {
            match (ctx.patient.age_on(ctx.mp.start), ctx.patient.age_on(ctx.mp.end)) {
                (Some(a0), Some(a1)) => {
                    thresholds.age_max.map(|m| a0 <= m).unwrap_or(true) && thresholds.age_min.map(|m| a1 >= m).unwrap_or(true)
                }
                _ => false,
            }
        }
        TurnsDuring => {
            let target = thresholds.age_min.or(thresholds.age_max);
            match (target, ctx.patient.demographics.as_ref()) {
                (Some(target_age), Some(demographics)) => {
                    let birth = demographics.birth_date;
                    NaiveDate::from_ymd_opt(birth.year() + target_age as i32, birth.month(), birth.day())
                        .map(|d| crate::timing::in_window(d, (ctx.mp.start, ctx.mp.end)))
                        .unwrap_or(false)
                }
                _ => false,
            }
        }
    }
}

/// Extracts the required dose count from a description: a leading digit
/// ("4 doses") or a spelled-out number ("four doses"), else
/// `thresholds.valueMin`, else 1.
fn required_dose_count(description: &str, thresholds: Option<&Thresholds>) -> u32 {
    let lower = description.to_ascii_lowercase();
    let digit_re = Regex::new(r"(\d+)\s*doses?").expect("static pattern");
    if let Some(captures) = digit_re.captures(&lower) {
        if let Ok(n) = captures[1].parse::<u32>() {
            return n;
        }
    }
    let words = [("one", 1), ("two", 2), ("three", 3), ("four", 4), ("five", 5)];
    let word_re = Regex::new(r"(one|two|three|four|five)\s*doses?").expect("static pattern");
    if let Some(captures) = word_re.captures(&lower) {
        if let Some((_, n)) = words.iter().find(|(word, _)| *word == &captures[1]) {
            return *n;
        }
    }
    thresholds.and_then(|t| t.value_min).map(|v| v as u32).unwrap_or(1)
}

/// Parses "before the second birthday" style phrasing into an ordinal.
fn before_nth_birthday(description: &str) -> Option<u32> {
    let lower = description.to_ascii_lowercase();
    let re = Regex::new(r"(first|second|third|fourth|fifth)\s+birthday").expect("static pattern");
    let captures = re.captures(&lower)?;
    let ordinals = [("first", 1), ("second", 2), ("third", 3), ("fourth", 4), ("fifth", 5)];
    ordinals.iter().find(|(word, _)| *word == &captures[1]).map(|(_, n)| *n)
}

fn evaluate_immunization(element: &DataElement, ctx: &EvalContext) -> (bool, TraceNode) {
    let codes = resolve_codes(element, ctx);
    if codes.is_empty() {
        return (
            false,
            TraceNode::leaf(element.id.clone(), describe(element), false, "exists [Immunization]"),
        );
    }

    let window = match before_nth_birthday(&element.description) {
        Some(ordinal) => match ctx.patient.demographics.as_ref() {
            Some(d) => {
                let nth = NaiveDate::from_ymd_opt(d.birth_date.year() + ordinal as i32, d.birth_date.month(), d.birth_date.day())
                    .unwrap_or(ctx.mp.end);
                (d.birth_date, nth)
            }
            None => return (false, TraceNode::leaf(element.id.clone(), describe(element), false, "exists [Immunization]")),
        },
        None => match resolve_window(element, &ctx.mp, ctx.ipsd) {
            Ok(w) => w,
            Err(_) => return (false, TraceNode::leaf(element.id.clone(), describe(element), false, "exists [Immunization]")),
        },
    };

    let matched_facts = scan(&ctx.patient.immunizations, &codes, window, |_| true);
    let count = matched_facts.len() as u32;
    let required = required_dose_count(&element.description, element.thresholds.as_ref());
    let matched = if element.is_negated() { count < required } else { count >= required };

    let node = TraceNode::leaf(element.id.clone(), describe(element), matched, "exists [Immunization]").with_facts(vec![Fact {
        code: "DOSE_COUNT".to_string(),
        display: Some(format!("{count} of {required}")),
        date: None,
        source: "Immunization".to_string(),
    }]);
    (matched, node)
}

/// `assessment` (and other data sources the patient record does not model
/// directly — `device`/`allergy`/`communication`/`goal`) are polymorphic:
/// try each concrete clinical category in a fixed order and take the first
/// whose fact list actually produces a match (spec.md §4.2's `assessment`
/// dispatch order, extended here to cover the evaluator rather than only
/// CQL generation).
const ASSESSMENT_DISPATCH_ORDER: [DataElementType; 6] = [
    DataElementType::Diagnosis,
    DataElementType::Encounter,
    DataElementType::Procedure,
    DataElementType::Observation,
    DataElementType::Immunization,
    DataElementType::Medication,
];

fn evaluate_polymorphic(element: &DataElement, ctx: &EvalContext) -> (bool, TraceNode) {
    if resolve_codes(element, ctx).is_empty() {
        return (false, TraceNode::leaf(element.id.clone(), describe(element), false, "exists [unresolved]"));
    }
    for candidate_type in ASSESSMENT_DISPATCH_ORDER {
        let (matched, node) = dispatch_clinical(candidate_type, element, ctx);
        if matched || !node.facts.is_empty() {
            return (matched, node);
        }
    }
    (false, TraceNode::leaf(element.id.clone(), describe(element), false, "exists [unresolved]"))
}

fn dispatch_clinical(element_type: DataElementType, element: &DataElement, ctx: &EvalContext) -> (bool, TraceNode) {
    match element_type {
        DataElementType::Diagnosis => evaluate_clinical(element, ctx, &ctx.patient.diagnoses, "Condition"),
        DataElementType::Encounter => evaluate_clinical(element, ctx, &ctx.patient.encounters, "Encounter"),
        DataElementType::Procedure => evaluate_clinical(element, ctx, &ctx.patient.procedures, "Procedure"),
        DataElementType::Observation => evaluate_clinical(element, ctx, &ctx.patient.observations, "Observation"),
        DataElementType::Medication => evaluate_clinical(element, ctx, &ctx.patient.medications, "MedicationRequest"),
        DataElementType::Immunization => evaluate_immunization(element, ctx),
        _ => unreachable!("dispatch_clinical only called with clinical element types"),
    }
}

pub fn evaluate_element(element: &DataElement, ctx: &EvalContext) -> (bool, TraceNode) {
    match element.element_type {
        DataElementType::Diagnosis
        | DataElementType::Encounter
        | DataElementType::Procedure
        | DataElementType::Observation
        | DataElementType::Medication => dispatch_clinical(element.element_type, element, ctx),
        DataElementType::Immunization => evaluate_immunization(element, ctx),
        DataElementType::Demographic => evaluate_demographic(element, ctx),
        DataElementType::Assessment
        | DataElementType::Device
        | DataElementType::Allergy
        | DataElementType::Communication
        | DataElementType::Goal => evaluate_polymorphic(element, ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::{Demographics, PatientGender, PatientRecord};
    use qmf_ums::fixtures::diabetes_with_exclusion_measure;
    use qmf_ums::StaticValueSetResolver;

    fn ctx_for<'a>(measure: &'a qmf_ums::Measure, patient: &'a PatientRecord, resolver: &'a StaticValueSetResolver) -> EvalContext<'a> {
        EvalContext {
            measure,
            mp: measure.metadata.measurement_period,
            ipsd: None,
            patient,
            resolver,
        }
    }

    #[test]
    fn diagnosis_matches_by_direct_code() {
        let measure = diabetes_with_exclusion_measure();
        let resolver = StaticValueSetResolver::default();
        let mut patient = PatientRecord {
            empi_id: "p1".to_string(),
            demographics: Some(Demographics {
                birth_date: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
                gender: PatientGender::Female,
            }),
            ..Default::default()
        };
        patient.diagnoses.push(ClinicalFact::new("E11.9", "ICD-10-CM", NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()));
        let ctx = ctx_for(&measure, &patient, &resolver);
        let ip = measure.population(qmf_ums::PopulationType::InitialPopulation).unwrap();
        let (matched, _) = crate::clause::evaluate_clause(&ip.criteria, &ctx);
        assert!(matched);
    }

    #[test]
    fn element_with_no_resolvable_codes_fails_closed() {
        let measure = diabetes_with_exclusion_measure();
        let resolver = StaticValueSetResolver::default();
        let patient = PatientRecord {
            empi_id: "p2".to_string(),
            demographics: Some(Demographics {
                birth_date: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
                gender: PatientGender::Female,
            }),
            ..Default::default()
        };
        let ctx = ctx_for(&measure, &patient, &resolver);
        let element = DataElement {
            id: "x".to_string(),
            element_type: DataElementType::Diagnosis,
            description: "unresolvable".to_string(),
            value_set: None,
            direct_codes: Vec::new(),
            thresholds: None,
            timing_requirements: Vec::new(),
            timing_override: None,
            negation: None,
            age_calculation: None,
            review_status: Default::default(),
        };
        let (matched, node) = evaluate_element(&element, &ctx);
        assert!(!matched);
        assert!(node.facts.is_empty());
    }

    #[test]
    fn required_dose_count_parses_spelled_out_numbers() {
        assert_eq!(required_dose_count("four doses of DTaP", None), 4);
        assert_eq!(required_dose_count("DTaP series", None), 1);
    }

    #[test]
    fn before_nth_birthday_parses_ordinal() {
        assert_eq!(before_nth_birthday("4 doses of DTaP before the second birthday"), Some(2));
        assert_eq!(before_nth_birthday("4 doses of DTaP"), None);
    }

    #[test]
    fn direct_code_on_reference_is_used_before_resolver_expansion() {
        let mut measure = diabetes_with_exclusion_measure();
        measure.value_sets.push(qmf_ums::ValueSetReference {
            id: "vs-inline".to_string(),
            oid: Some("1.2.3".to_string()),
            name: "Inline Test".to_string(),
            version: None,
            codes: Some(vec![qmf_ums::CodeEntry {
                code: "99999".to_string(),
                system: "LOINC".to_string(),
                display: None,
            }]),
        });
        let resolver = StaticValueSetResolver::default().with_expansion(
            "1.2.3",
            vec![qmf_ums::CodeEntry {
                code: "00000".to_string(),
                system: "LOINC".to_string(),
                display: None,
            }],
        );
        let element = DataElement {
            id: "x".to_string(),
            element_type: DataElementType::Observation,
            description: String::new(),
            value_set: Some("vs-inline".to_string()),
            direct_codes: Vec::new(),
            thresholds: None,
            timing_requirements: Vec::new(),
            timing_override: None,
            negation: None,
            age_calculation: None,
            review_status: Default::default(),
        };
        let patient = PatientRecord::default();
        let ctx = ctx_for(&measure, &patient, &resolver);
        let codes = resolve_codes(&element, &ctx);
        assert!(codes.contains(&("99999".to_string(), "LOINC".to_string())));
        assert!(codes.contains(&("00000".to_string(), "LOINC".to_string())));
    }
}
