//! UMS canonicalization (spec.md §4.1).
//!
//! Canonicalization normalizes a [`Measure`] for stable downstream
//! generation: it remaps node IDs to be unique, promotes recognizable
//! legacy timing windows to [`TimingConstraint`], merges value sets sharing
//! an OID, and synthesizes any of the three required populations that are
//! missing. It never drops the legacy timing form (spec.md §9).

use crate::model::*;
use std::collections::{HashMap, HashSet};

/// Canonicalizes `measure` in place, consuming and returning it.
pub fn canonicalize(mut measure: Measure) -> Measure {
    merge_value_sets(&mut measure);
    remap_ids(&mut measure);
    promote_timing(&mut measure);
    detect_equals_initial_population(&mut measure);
    ensure_required_populations(&mut measure);
    measure
}

fn merge_value_sets(measure: &mut Measure) {
    let mut earliest_by_oid: HashMap<String, String> = HashMap::new();
    let mut kept: Vec<ValueSetReference> = Vec::new();

    for vs in measure.value_sets.drain(..) {
        match &vs.oid {
            Some(oid) if earliest_by_oid.contains_key(oid) => {
                // Duplicate OID: coalesce into the earliest-listed reference
                // by simply dropping this later one.
            }
            Some(oid) => {
                earliest_by_oid.insert(oid.clone(), vs.id.clone());
                kept.push(vs);
            }
            None => kept.push(vs),
        }
    }
    measure.value_sets = kept;
}

fn remap_ids(measure: &mut Measure) {
    let prefix = sanitize_for_id(&measure.metadata.measure_id);
    let mut counter: usize = 0;
    let mut seen: HashSet<String> = HashSet::new();

    for population in &mut measure.populations {
        remap_clause_ids(&mut population.criteria, &prefix, &mut counter, &mut seen);
    }
}

fn remap_clause_ids(
    clause: &mut LogicalClause,
    prefix: &str,
    counter: &mut usize,
    seen: &mut HashSet<String>,
) {
    clause.id = next_unique_id(prefix, "clause", counter, seen, &clause.id);
    for child in &mut clause.children {
        match child {
            ClauseChild::Clause(inner) => remap_clause_ids(inner, prefix, counter, seen),
            ClauseChild::Element(element) => {
                element.id = next_unique_id(prefix, "elem", counter, seen, &element.id);
            }
        }
    }
}

fn next_unique_id(
    prefix: &str,
    kind: &str,
    counter: &mut usize,
    seen: &mut HashSet<String>,
    original: &str,
) -> String {
    if !original.is_empty() && seen.insert(original.to_string()) {
        return original.to_string();
    }
    loop {
        let candidate = format!("{prefix}-{kind}-{counter}");
        *counter += 1;
        if seen.insert(candidate.clone()) {
            return candidate;
        }
    }
}

fn sanitize_for_id(measure_id: &str) -> String {
    measure_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Recognizable legacy windows that promote to a structured
/// [`TimingConstraint`] (spec.md §4.1's worked example: a 10-year "before"
/// window against the measurement period end).
fn promote_timing(measure: &mut Measure) {
    for population in &mut measure.populations {
        promote_clause_timing(&mut population.criteria);
    }
}

fn promote_clause_timing(clause: &mut LogicalClause) {
    for child in &mut clause.children {
        match child {
            ClauseChild::Clause(inner) => promote_clause_timing(inner),
            ClauseChild::Element(element) => promote_element_timing(element),
        }
    }
}

fn promote_element_timing(element: &mut DataElement) {
    if element.timing_override.is_some() {
        return;
    }
    if let Some(promoted) = try_promote(&element.timing_requirements) {
        // The legacy form stays on the node; only `timing_override` gains
        // the structured shape (never silently dropped, per spec.md §9).
        element.timing_override = Some(promoted);
    }
}

fn try_promote(requirements: &[TimingRequirement]) -> Option<TimingConstraint> {
    let requirement = requirements.first()?;
    let window = requirement.window.as_ref()?;

    let anchor = match requirement.relative_to.as_str() {
        "measurement_period_start" | "measurement_period_end" | "measurement_period" => {
            Anchor::MeasurementPeriod
        }
        "ipsd" | "initial_population_start_date" => Anchor::Ipsd,
        _ => return None,
    };

    let side = match (requirement.relative_to.as_str(), window.direction) {
        ("measurement_period_end", Direction::Before) => Side::BeforeEnd,
        ("measurement_period_end", Direction::After) => Side::AfterEnd,
        ("measurement_period_start", Direction::Before) => Side::BeforeStart,
        ("measurement_period_start", Direction::After) => Side::AfterStart,
        (_, Direction::Within) => Side::During,
        _ => return None,
    };

    Some(TimingConstraint {
        anchor,
        side,
        offset: Some(Offset {
            value: window.value,
            unit: window.unit,
        }),
        reference_anchor: None,
    })
}

/// Flags an authored (non-synthesized) population as "equals Initial
/// Population" when its description says so or its criteria is empty
/// (spec.md §9: keyword- or empty-criteria-driven, promoted here to an
/// explicit field set once at canonicalization rather than re-sniffed by
/// every downstream consumer).
fn detect_equals_initial_population(measure: &mut Measure) {
    for population in &mut measure.populations {
        if population.population_type == PopulationType::InitialPopulation {
            continue;
        }
        if population.equals_initial_population {
            continue;
        }
        let keyword_match = population.description.to_ascii_lowercase().contains("initial population")
            && ["equal", "same as"].iter().any(|marker| population.description.to_ascii_lowercase().contains(marker));
        let empty_criteria = population.criteria.children.is_empty();
        if keyword_match || empty_criteria {
            population.equals_initial_population = true;
        }
    }
}

fn ensure_required_populations(measure: &mut Measure) {
    for (population_type, clause_id) in [
        (PopulationType::InitialPopulation, "initial-population"),
        (PopulationType::Denominator, "denominator"),
        (PopulationType::Numerator, "numerator"),
    ] {
        if measure.population(population_type).is_none() {
            measure.populations.push(Population {
                population_type,
                description: format!("{} (synthesized)", population_type.display_name()),
                narrative: String::new(),
                additional_requirements: None,
                criteria: LogicalClause::empty_and(clause_id),
                equals_initial_population: population_type != PopulationType::InitialPopulation,
            });
        }
    }
}
