//! Top-level patient-trace evaluation (spec.md §4.7): population
//! pre-checks, the population chain, and the five outcome rules.

use crate::clause::{collect_unmet_leaf_descriptions, evaluate_clause};
use crate::trace::{FinalOutcome, PatientTrace, TraceNode};
use crate::EvalContext;
use qmf_ums::{GenderConstraint, PopulationType};

const HOW_CLOSE_LIMIT: usize = 3;

fn effective_age_range(ctx: &EvalContext) -> Option<(u32, u32)> {
    ctx.measure
        .global_constraints
        .as_ref()
        .and_then(|c| c.age_range)
        .map(|r| (r.min, r.max))
}

fn effective_gender(ctx: &EvalContext) -> Option<GenderConstraint> {
    ctx.measure.global_constraints.as_ref().and_then(|c| c.gender)
}

fn not_in_population(empi_id: &str, reason: impl Into<String>) -> PatientTrace {
    let reason = reason.into();
    PatientTrace {
        empi_id: empi_id.to_string(),
        final_outcome: FinalOutcome::NotInPopulation,
        reason: reason.clone(),
        population_traces: Vec::new(),
        how_close: Vec::new(),
        narrative: reason,
    }
}

/// Walks the measure's populations in order, short-circuiting per spec.md
/// §4.7's rule set: IP → Denominator → DenominatorExclusion → Numerator.
pub fn evaluate(ctx: &EvalContext) -> PatientTrace {
    let empi_id = ctx.patient.empi_id.clone();

    if let Some((min, max)) = effective_age_range(ctx) {
        let calc = ctx
            .measure
            .global_constraints
            .as_ref()
            .and_then(|c| c.age_calculation)
            .unwrap_or(qmf_ums::AgeCalculation::AtStart);
        let as_of = match calc {
            qmf_ums::AgeCalculation::AtEnd => ctx.mp.end,
            _ => ctx.mp.start,
        };
        let age = ctx.patient.age_on(as_of);
        let in_range = age.map(|a| a >= min && a <= max).unwrap_or(false);
        if !in_range {
            let reason = match age {
                Some(a) => format!("patient age {a} is outside the required range {min}-{max}"),
                None => "patient has no birth date on record".to_string(),
            };
            return not_in_population(&empi_id, reason);
        }
    }

    if let Some(required) = effective_gender(ctx) {
        if !matches!(required, GenderConstraint::Any | GenderConstraint::All) {
            let satisfies = ctx.patient.demographics.as_ref().map(|d| d.gender.satisfies(required)).unwrap_or(false);
            if !satisfies {
                return not_in_population(&empi_id, format!("patient gender does not satisfy the required constraint {required:?}"));
            }
        }
    }

    let mut population_traces: Vec<(PopulationType, TraceNode)> = Vec::new();

    let Some(ip) = ctx.measure.population(PopulationType::InitialPopulation) else {
        return not_in_population(&empi_id, "measure defines no Initial Population");
    };
    let (ip_match, ip_trace) = evaluate_clause(&ip.criteria, ctx);
    population_traces.push((PopulationType::InitialPopulation, ip_trace));
    if !ip_match {
        return finalize(empi_id, FinalOutcome::NotInPopulation, "initial population criteria not met".to_string(), population_traces, Vec::new());
    }

    let (den_match, den_trace) = match ctx.measure.population(PopulationType::Denominator) {
        Some(den) if den.equals_initial_population => (ip_match, population_traces[0].1.clone()),
        Some(den) => evaluate_clause(&den.criteria, ctx),
        None => (true, TraceNode::leaf("denominator", "Denominator", true, "true")),
    };
    population_traces.push((PopulationType::Denominator, den_trace));
    if !den_match {
        return finalize(empi_id, FinalOutcome::NotInPopulation, "denominator criteria not met".to_string(), population_traces, Vec::new());
    }

    if let Some(dex) = ctx.measure.population(PopulationType::DenominatorExclusion) {
        let (dex_match, dex_trace) = evaluate_clause(&dex.criteria, ctx);
        population_traces.push((PopulationType::DenominatorExclusion, dex_trace));
        if dex_match {
            return finalize(empi_id, FinalOutcome::Excluded, "patient meets a denominator exclusion".to_string(), population_traces, Vec::new());
        }
    }

    let Some(num) = ctx.measure.population(PopulationType::Numerator) else {
        return finalize(empi_id, FinalOutcome::NotInNumerator, "measure defines no Numerator".to_string(), population_traces, Vec::new());
    };
    let (num_match, num_trace) = evaluate_clause(&num.criteria, ctx);
    population_traces.push((PopulationType::Numerator, num_trace.clone()));

    if num_match {
        finalize(empi_id, FinalOutcome::InNumerator, "patient meets the numerator".to_string(), population_traces, Vec::new())
    } else {
        let mut how_close = Vec::new();
        collect_unmet_leaf_descriptions(&num_trace, &mut how_close);
        how_close.truncate(HOW_CLOSE_LIMIT);
        finalize(empi_id, FinalOutcome::NotInNumerator, "patient does not meet the numerator".to_string(), population_traces, how_close)
    }
}

fn finalize(
    empi_id: String,
    outcome: FinalOutcome,
    reason: String,
    population_traces: Vec<(PopulationType, TraceNode)>,
    how_close: Vec<String>,
) -> PatientTrace {
    let narrative = format!("{empi_id}: {reason}");
    PatientTrace {
        empi_id,
        final_outcome: outcome,
        reason,
        population_traces,
        how_close,
        narrative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::{ClinicalFact, Demographics, PatientGender, PatientRecord};
    use crate::EvalContext;
    use chrono::NaiveDate;
    use qmf_ums::fixtures::{diabetes_with_exclusion_measure, hba1c_threshold_measure, minimal_measure};
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
    fn age_gate_excludes_before_clause_evaluation() {
        let measure = minimal_measure();
        let resolver = StaticValueSetResolver::default();
        let patient = PatientRecord {
            empi_id: "too-young".to_string(),
            demographics: Some(Demographics {
                birth_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                gender: PatientGender::Female,
            }),
            ..Default::default()
        };
        let ctx = ctx_for(&measure, &patient, &resolver);
        let trace = evaluate(&ctx);
        assert_eq!(trace.final_outcome, FinalOutcome::NotInPopulation);
        assert!(trace.population_traces.is_empty());
    }

    #[test]
    fn exclusion_overrides_numerator_when_both_match() {
        let measure = diabetes_with_exclusion_measure();
        let resolver = StaticValueSetResolver::default();
        let mut patient = PatientRecord {
            empi_id: "excluded-patient".to_string(),
            demographics: Some(Demographics {
                birth_date: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
                gender: PatientGender::Female,
            }),
            ..Default::default()
        };
        patient.diagnoses.push(ClinicalFact::new("E11.9", "ICD-10-CM", NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()));
        patient.diagnoses.push(ClinicalFact::new("C80.1", "ICD-10-CM", NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()));
        let ctx = ctx_for(&measure, &patient, &resolver);
        let trace = evaluate(&ctx);
        assert_eq!(trace.final_outcome, FinalOutcome::Excluded);
    }

    #[test]
    fn not_in_numerator_collects_how_close_descriptions() {
        let measure = hba1c_threshold_measure();
        let resolver = StaticValueSetResolver::default();
        let patient = PatientRecord {
            empi_id: "no-hba1c".to_string(),
            demographics: Some(Demographics {
                birth_date: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
                gender: PatientGender::Female,
            }),
            ..Default::default()
        };
        let ctx = ctx_for(&measure, &patient, &resolver);
        let trace = evaluate(&ctx);
        assert_eq!(trace.final_outcome, FinalOutcome::NotInNumerator);
        assert!(!trace.how_close.is_empty());
    }
}
