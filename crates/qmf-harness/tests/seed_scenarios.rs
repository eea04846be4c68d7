//! The six literal seed scenarios and the cross-crate invariants from
//! spec.md §8, run against the real `qmf-cql`, `qmf-sql`, and
//! `qmf-evaluator` crates together.

use chrono::NaiveDate;
use qmf_evaluator::patient::{ClinicalFact, Demographics, PatientGender, PatientRecord};
use qmf_evaluator::trace::FinalOutcome;
use qmf_evaluator::evaluate;
use qmf_harness::{canonical, empty_patient};
use qmf_sql::Dialect;
use qmf_ums::fixtures::{
    cervical_cancer_screening_measure, childhood_immunization_measure, colonoscopy_lookback_measure, diabetes_with_exclusion_measure, hba1c_threshold_measure, minimal_measure,
};
use qmf_ums::interfaces::StaticValueSetResolver;
use qmf_ums::CodeEntry;

#[test]
fn scenario_1_demographics_only() {
    let measure = canonical(minimal_measure());
    let cql = qmf_cql::generate(&measure);
    assert!(cql.success, "{:?}", cql.errors);
    assert!(cql.cql.contains("AgeInYearsAt"));
    assert!(cql.cql.contains("define \"Initial Population\":"));

    let sql = qmf_sql::generate(&measure, Dialect::PostgreSql);
    assert!(sql.success, "{:?}", sql.errors);
    assert!(sql.sql.contains("DEMOG as"));
    assert!(sql.sql.contains("ph_d_person.birth_date"));
}

#[test]
fn scenario_2_condition_with_exclusion() {
    let measure = canonical(diabetes_with_exclusion_measure());
    let cql = qmf_cql::generate(&measure);
    assert!(cql.success, "{:?}", cql.errors);
    assert!(cql.cql.contains("\"Diabetes Mellitus\""));
    assert!(cql.cql.contains("clinicalStatus"));
    assert!(cql.cql.contains("define \"Denominator Exclusion\":"));

    let sql = qmf_sql::generate(&measure, Dialect::SqlServer);
    assert!(sql.success, "{:?}", sql.errors);
    assert!(sql.sql.contains("ph_f_condition"));
    assert!(sql.sql.contains("valueset_codes"));
}

#[test]
fn scenario_3_procedure_with_lookback() {
    let measure = canonical(colonoscopy_lookback_measure());
    let cql = qmf_cql::generate(&measure);
    assert!(cql.success, "{:?}", cql.errors);
    assert!(cql.cql.contains("10 years or less before end of"));

    let sql = qmf_sql::generate(&measure, Dialect::SqlServer);
    assert!(sql.success, "{:?}", sql.errors);
    assert!(sql.sql.contains("DATEADD"));
}

#[test]
fn scenario_4_observation_thresholds() {
    let measure = canonical(hba1c_threshold_measure());
    let cql = qmf_cql::generate(&measure);
    assert!(cql.success, "{:?}", cql.errors);
    assert!(cql.cql.contains("value is not null"));
    assert!(cql.cql.contains("< 8"));

    let oid = measure.value_sets[0].oid.clone().unwrap();
    let resolver = StaticValueSetResolver::new().with_expansion(oid.clone(), vec![CodeEntry { code: "4548-4".to_string(), system: "LOINC".to_string(), display: None }]);

    let controlled = patient_with_observation("pt-controlled", &oid, 6.8);
    let trace = evaluate(&measure, &controlled, &resolver);
    assert_eq!(trace.final_outcome, FinalOutcome::InNumerator);

    let uncontrolled = patient_with_observation("pt-uncontrolled", &oid, 10.2);
    let trace = evaluate(&measure, &uncontrolled, &resolver);
    assert_eq!(trace.final_outcome, FinalOutcome::NotInNumerator);
    assert!(trace.how_close.iter().any(|d| d.to_ascii_lowercase().contains("hba1c")));
}

fn patient_with_observation(empi_id: &str, oid_as_code: &str, value: f64) -> PatientRecord {
    let mut patient = empty_patient(empi_id);
    patient.demographics = Some(Demographics { birth_date: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(), gender: PatientGender::Female });
    patient.observations.push(
        ClinicalFact::new("4548-4", "LOINC", NaiveDate::from_ymd_opt(2026, 6, 1).unwrap())
            .with_value(value)
            .with_status("final"),
    );
    let _ = oid_as_code;
    patient
}

#[test]
fn scenario_5_multi_population_with_gender() {
    let measure = canonical(cervical_cancer_screening_measure());
    let cql = qmf_cql::generate(&measure);
    assert!(cql.success, "{:?}", cql.errors);
    for population in ["Initial Population", "Denominator", "Denominator Exclusion", "Numerator"] {
        assert!(cql.cql.contains(&format!("define \"{population}\":")), "missing population {population}");
    }

    let sql = qmf_sql::generate(&measure, Dialect::Synapse);
    assert!(sql.success, "{:?}", sql.errors);
    for cte in ["DEMOG", "IP", "DEN", "DEX", "NUM"] {
        assert!(sql.sql.contains(&format!("{cte} as")), "missing CTE {cte}");
    }

    let pap_oid = measure.value_sets.iter().find(|vs| vs.name == "Pap Test").unwrap().oid.clone().unwrap();
    let hyst_oid = measure.value_sets.iter().find(|vs| vs.name == "Hysterectomy with No Residual Cervix").unwrap().oid.clone().unwrap();
    let resolver = StaticValueSetResolver::new()
        .with_expansion(pap_oid.clone(), vec![CodeEntry { code: "pap-code".to_string(), system: "CPT".to_string(), display: None }])
        .with_expansion(hyst_oid.clone(), vec![CodeEntry { code: "hyst-code".to_string(), system: "CPT".to_string(), display: None }]);

    let mut excluded = empty_patient("pt-excluded");
    excluded.demographics = Some(Demographics { birth_date: NaiveDate::from_ymd_opt(1980, 1, 1).unwrap(), gender: PatientGender::Female });
    excluded.procedures.push(ClinicalFact::new("hyst-code", "CPT", NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()));
    assert_eq!(evaluate(&measure, &excluded, &resolver).final_outcome, FinalOutcome::Excluded);

    let mut recent_pap = empty_patient("pt-recent-pap");
    recent_pap.demographics = Some(Demographics { birth_date: NaiveDate::from_ymd_opt(1980, 1, 1).unwrap(), gender: PatientGender::Female });
    recent_pap.procedures.push(ClinicalFact::new("pap-code", "CPT", NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
    assert_eq!(evaluate(&measure, &recent_pap, &resolver).final_outcome, FinalOutcome::InNumerator);

    let mut stale_pap = empty_patient("pt-stale-pap");
    stale_pap.demographics = Some(Demographics { birth_date: NaiveDate::from_ymd_opt(1980, 1, 1).unwrap(), gender: PatientGender::Female });
    stale_pap.procedures.push(ClinicalFact::new("pap-code", "CPT", NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()));
    assert_eq!(evaluate(&measure, &stale_pap, &resolver).final_outcome, FinalOutcome::NotInNumerator);
}

#[test]
fn scenario_6_childhood_immunization() {
    let measure = canonical(childhood_immunization_measure());
    let cql = qmf_cql::generate(&measure);
    assert!(cql.success, "{:?}", cql.errors);
    assert!(cql.cql.contains("Count("));

    let dtap_oid = measure.value_sets[0].oid.clone().unwrap();
    let resolver = StaticValueSetResolver::new().with_expansion(dtap_oid.clone(), vec![CodeEntry { code: "dtap".to_string(), system: "CVX".to_string(), display: None }]);

    let birth_date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

    let mut short_patient = empty_patient("pt-short");
    short_patient.demographics = Some(Demographics { birth_date, gender: PatientGender::Male });
    for month in [4, 6, 8] {
        short_patient.immunizations.push(ClinicalFact::new("dtap", "CVX", NaiveDate::from_ymd_opt(2024, month, 1).unwrap()));
    }
    let trace = evaluate(&measure, &short_patient, &resolver);
    assert_eq!(trace.final_outcome, FinalOutcome::NotInNumerator);
    let dose_fact_found = trace.population_traces.iter().any(|(_, node)| node_contains_dose_count(node, "3 of 4"));
    assert!(dose_fact_found, "expected a DOSE_COUNT fact reporting 3 of 4");

    let mut full_patient = empty_patient("pt-full");
    full_patient.demographics = Some(Demographics { birth_date, gender: PatientGender::Male });
    for month in [4, 6, 8, 12] {
        full_patient.immunizations.push(ClinicalFact::new("dtap", "CVX", NaiveDate::from_ymd_opt(2024, month, 1).unwrap()));
    }
    let trace = evaluate(&measure, &full_patient, &resolver);
    assert_eq!(trace.final_outcome, FinalOutcome::InNumerator);
}

fn node_contains_dose_count(node: &qmf_evaluator::trace::TraceNode, needle: &str) -> bool {
    if node.facts.iter().any(|f| f.code == "DOSE_COUNT" && f.display.as_deref() == Some(needle)) {
        return true;
    }
    node.children.iter().any(|c| node_contains_dose_count(c, needle))
}

#[test]
fn cql_generation_is_deterministic() {
    for measure in [
        minimal_measure(),
        diabetes_with_exclusion_measure(),
        colonoscopy_lookback_measure(),
        hba1c_threshold_measure(),
        cervical_cancer_screening_measure(),
        childhood_immunization_measure(),
    ] {
        let measure = canonical(measure);
        let first = qmf_cql::generate(&measure);
        let second = qmf_cql::generate(&measure);
        assert_eq!(first.cql, second.cql);
    }
}

#[test]
fn cql_valueset_and_codesystem_declarations_round_trip_oids() {
    let measure = canonical(diabetes_with_exclusion_measure());
    let cql = qmf_cql::generate(&measure);
    for value_set in &measure.value_sets {
        let oid = value_set.oid.as_deref().unwrap();
        assert!(cql.cql.contains(oid), "valueset declaration missing oid {oid}");
    }
}
