//! The patient record the evaluator interprets a measure against.
//!
//! FHIR-shaped but denormalized, per spec.md §4.7: demographics plus flat
//! lists of diagnoses, encounters, procedures, observations, medications,
//! and immunizations.

use chrono::{Datelike, NaiveDate};
use qmf_ums::GenderConstraint;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub birth_date: NaiveDate,
    pub gender: PatientGender,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatientGender {
    Male,
    Female,
    Other,
}

impl PatientGender {
    /// Whether this patient satisfies a measure's gender constraint.
    pub fn satisfies(&self, constraint: GenderConstraint) -> bool {
        match constraint {
            GenderConstraint::Any | GenderConstraint::All => true,
            GenderConstraint::Male => matches!(self, PatientGender::Male),
            GenderConstraint::Female => matches!(self, PatientGender::Female),
        }
    }
}

/// A single clinical fact: a coded event on a date, with an optional
/// numeric value (observations) and status (active/completed/final/…).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalFact {
    pub code: String,
    pub system: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ClinicalFact {
    pub fn new(code: impl Into<String>, system: impl Into<String>, date: NaiveDate) -> Self {
        ClinicalFact {
            code: code.into(),
            system: system.into(),
            display: None,
            date,
            value: None,
            status: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub empi_id: String,
    pub demographics: Option<Demographics>,
    #[serde(default)]
    pub diagnoses: Vec<ClinicalFact>,
    #[serde(default)]
    pub encounters: Vec<ClinicalFact>,
    #[serde(default)]
    pub procedures: Vec<ClinicalFact>,
    #[serde(default)]
    pub observations: Vec<ClinicalFact>,
    #[serde(default)]
    pub medications: Vec<ClinicalFact>,
    #[serde(default)]
    pub immunizations: Vec<ClinicalFact>,
}

impl PatientRecord {
    pub fn age_on(&self, as_of: NaiveDate) -> Option<u32> {
        let birth = self.demographics.as_ref()?.birth_date;
        if as_of < birth {
            return Some(0);
        }
        let mut age = as_of.year() - birth.year();
        let had_birthday = (as_of.month(), as_of.day()) >= (birth.month(), birth.day());
        if !had_birthday {
            age -= 1;
        }
        Some(age.max(0) as u32)
    }
}
