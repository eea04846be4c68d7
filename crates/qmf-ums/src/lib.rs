//! # qmf-ums
//!
//! The Universal Measure Specification (UMS) data model, validation, and
//! canonicalization — the shared intermediate representation that the CQL
//! generator, SQL generator, component library, and patient evaluator all
//! consume.

pub mod canonicalize;
pub mod fixtures;
pub mod interfaces;
pub mod model;
pub mod validate;

pub use canonicalize::canonicalize;
pub use interfaces::{
    InMemoryMeasureStore, MeasureStore, MeasureSummary, PutOutcome, StaticValueSetResolver,
    ValueSetResolver,
};
pub use model::*;
pub use validate::{validate, ValidationIssue, ValidationReport};
