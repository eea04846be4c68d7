use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn qmf_cmd() -> Command {
    let bin_path = env!("CARGO_BIN_EXE_qmf");
    Command::new(PathBuf::from(bin_path))
}

const MINIMAL_MEASURE: &str = r#"{
    "metadata": {
        "measureId": "demo-1",
        "title": "Demographics Only",
        "program": "eCQM",
        "measureType": "process",
        "scoring": "proportion",
        "measurementPeriod": {"start": "2026-01-01", "end": "2026-12-31", "inclusive": true}
    },
    "populations": [
        {
            "type": "initial_population",
            "description": "Patients 18-75",
            "criteria": {
                "id": "ip-clause",
                "operator": "AND",
                "children": [
                    {
                        "id": "ip-age-elem",
                        "type": "demographic",
                        "description": "Age between 18 and 75",
                        "thresholds": {"ageMin": 18, "ageMax": 75},
                        "ageCalculation": "at_start"
                    }
                ]
            }
        }
    ],
    "valueSets": []
}"#;

#[test]
fn compile_cql_contains_age_check() {
    qmf_cmd()
        .args(["compile", "--measure", "-", "--target", "cql"])
        .write_stdin(MINIMAL_MEASURE)
        .assert()
        .success()
        .stdout(predicate::str::contains("AgeInYearsAt"));
}

#[test]
fn compile_sql_contains_person_table() {
    qmf_cmd()
        .args(["compile", "--measure", "-", "--target", "sql", "--dialect", "postgres"])
        .write_stdin(MINIMAL_MEASURE)
        .assert()
        .success()
        .stdout(predicate::str::contains("ph_d_person"));
}

#[test]
fn compile_json_format_includes_warnings_field() {
    qmf_cmd()
        .args(["compile", "--measure", "-", "--target", "cql", "--format", "json"])
        .write_stdin(MINIMAL_MEASURE)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"warnings\""));
}

#[test]
fn validate_accepts_well_formed_measure() {
    qmf_cmd()
        .args(["validate", "--measure", "-"])
        .write_stdin(MINIMAL_MEASURE)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 error(s)"));
}

#[test]
fn validate_rejects_missing_measure_id() {
    let broken = MINIMAL_MEASURE.replace("\"measureId\": \"demo-1\",", "\"measureId\": \"\",");
    qmf_cmd()
        .args(["validate", "--measure", "-"])
        .write_stdin(broken)
        .assert()
        .failure();
}

#[test]
fn eval_reports_not_in_population_for_an_empty_patient() {
    let temp_dir = TempDir::new().unwrap();
    let measure_path = temp_dir.path().join("measure.json");
    fs::write(&measure_path, MINIMAL_MEASURE).unwrap();

    let patient = r#"{"empiId": "pt-1", "demographics": {"birthDate": "1970-01-01", "gender": "female"}}"#;
    let patient_path = temp_dir.path().join("patient.json");
    fs::write(&patient_path, patient).unwrap();

    qmf_cmd()
        .args(["eval", "--measure", measure_path.to_str().unwrap(), "--patient", patient_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"finalOutcome\""));
}

#[test]
fn library_round_trips_approve_and_check_refs() {
    let temp_dir = TempDir::new().unwrap();
    let store_path = temp_dir.path().join("library.json");
    fs::write(&store_path, "[]").unwrap();

    let component = r#"{"kind": "atomic", "valueSetOid": "2.16.840.1.113883.3.464.1003.103.12.1001", "valueSetName": null, "timing": {"operator": null, "quantity": null, "unit": null, "position": null, "reference": null}, "negation": false}"#;
    let component_path = temp_dir.path().join("component.json");
    fs::write(&component_path, component).unwrap();

    qmf_cmd()
        .args(["library", "find-match", "--store", store_path.to_str().unwrap(), component_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("no exact match"));
}

fn library_component_json(id: &str, children: &str) -> String {
    format!(
        r#"{{"id": "{id}", "name": "{id}", "body": {{"kind": "composite", "operator": "AND", "children": [{children}]}}, "status": "draft", "version": "0.1", "metadata": {{"category": "Composite Logic", "categoryAutoAssigned": true}}, "history": [], "approvedBy": null, "approvedAt": null}}"#
    )
}

#[test]
fn library_put_rejects_a_composite_with_a_dangling_child() {
    let temp_dir = TempDir::new().unwrap();
    let store_path = temp_dir.path().join("library.json");
    fs::write(&store_path, "[]").unwrap();

    let component_path = temp_dir.path().join("component.json");
    fs::write(&component_path, library_component_json("c1", "\"missing\"")).unwrap();

    qmf_cmd()
        .args(["library", "put", "--store", store_path.to_str().unwrap(), component_path.to_str().unwrap()])
        .assert()
        .failure();
}

#[test]
fn library_put_accepts_a_composite_over_a_stored_child_and_reports_complexity() {
    let temp_dir = TempDir::new().unwrap();
    let store_path = temp_dir.path().join("library.json");

    let atomic = r#"{"id": "a1", "name": "Diabetes diagnosis", "body": {"kind": "atomic", "valueSetOid": "2.16.840.1.113883.3.464.1003.103.12.1001", "valueSetName": null, "timing": {"operator": null, "quantity": null, "unit": null, "position": null, "reference": null}, "negation": false}, "status": "draft", "version": "0.1", "metadata": {"category": "Structural Criteria", "categoryAutoAssigned": true}, "history": [], "approvedBy": null, "approvedAt": null}"#;
    fs::write(&store_path, format!("[{atomic}]")).unwrap();

    let composite_path = temp_dir.path().join("composite.json");
    fs::write(&composite_path, library_component_json("c1", "\"a1\"")).unwrap();

    qmf_cmd()
        .args(["library", "put", "--store", store_path.to_str().unwrap(), composite_path.to_str().unwrap()])
        .assert()
        .success();

    qmf_cmd()
        .args(["library", "complexity", "--store", store_path.to_str().unwrap(), "c1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2"));
}

#[test]
fn library_put_rejects_a_self_referencing_composite() {
    let temp_dir = TempDir::new().unwrap();
    let store_path = temp_dir.path().join("library.json");
    fs::write(&store_path, "[]").unwrap();

    let component_path = temp_dir.path().join("component.json");
    fs::write(&component_path, library_component_json("c1", "\"c1\"")).unwrap();

    qmf_cmd()
        .args(["library", "put", "--store", store_path.to_str().unwrap(), component_path.to_str().unwrap()])
        .assert()
        .failure();
}
