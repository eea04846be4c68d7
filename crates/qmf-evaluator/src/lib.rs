//! The patient-trace evaluator (spec.md §4.7-§4.9): the "oracle" that
//! interprets a canonicalized [`qmf_ums::Measure`] directly against a
//! [`patient::PatientRecord`], independent of the CQL/SQL generators, to
//! produce a [`trace::PatientTrace`] for authoring feedback.

pub mod clause;
pub mod codematch;
pub mod dataelement;
pub mod patient;
pub mod timing;
pub mod trace;

mod evaluator;

use chrono::NaiveDate;
use qmf_ums::{Measure, MeasurementPeriod, ValueSetResolver};

/// Everything a single evaluation needs: the measure, its resolved
/// measurement period, an optional initial-population start date (for
/// `IPSD`-anchored timing), the patient, and a value-set resolver.
pub struct EvalContext<'a> {
    pub measure: &'a Measure,
    pub mp: MeasurementPeriod,
    pub ipsd: Option<NaiveDate>,
    pub patient: &'a patient::PatientRecord,
    pub resolver: &'a dyn ValueSetResolver,
}

pub fn evaluate(measure: &Measure, patient: &patient::PatientRecord, resolver: &dyn ValueSetResolver) -> trace::PatientTrace {
    let ctx = EvalContext {
        measure,
        mp: measure.metadata.measurement_period,
        ipsd: None,
        patient,
        resolver,
    };
    evaluator::evaluate(&ctx)
}

/// Same as [`evaluate`] but with an explicit initial-population start date,
/// for measures whose timing anchors on `IPSD` rather than the measurement
/// period.
pub fn evaluate_with_ipsd(measure: &Measure, patient: &patient::PatientRecord, resolver: &dyn ValueSetResolver, ipsd: NaiveDate) -> trace::PatientTrace {
    let ctx = EvalContext {
        measure,
        mp: measure.metadata.measurement_period,
        ipsd: Some(ipsd),
        patient,
        resolver,
    };
    evaluator::evaluate(&ctx)
}

pub use patient::{ClinicalFact, Demographics, PatientGender, PatientRecord};
pub use trace::{FinalOutcome, PatientTrace, TraceNode, TraceStatus};
