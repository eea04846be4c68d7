//! `qmf eval` - runs the patient-trace evaluator directly against a
//! Universal Measure Specification, independent of CQL/SQL generation.

use anyhow::{Context, Result};
use clap::Args;
use qmf_evaluator::patient::PatientRecord;
use qmf_foundation::cli::{read_json, write_json};
use qmf_ums::interfaces::StaticValueSetResolver;
use qmf_ums::Measure;

#[derive(Args)]
pub struct EvalArgs {
    /// Path to the UMS measure JSON, or "-" for stdin
    #[clap(short, long)]
    measure: String,

    /// Path to the patient record JSON
    #[clap(short, long)]
    patient: String,

    /// Write the trace to a file instead of stdout
    #[clap(short, long)]
    output: Option<String>,
}

pub fn handle_command(args: EvalArgs) -> Result<()> {
    let measure: Measure = read_json(&args.measure).context("failed to read measure")?;
    let measure = qmf_ums::canonicalize(measure);
    let patient: PatientRecord = read_json(&args.patient).context("failed to read patient")?;

    let resolver = resolver_from_inline_codes(&measure);
    let trace = qmf_evaluator::evaluate(&measure, &patient, &resolver);

    write_json(&trace, args.output.as_deref())?;
    Ok(())
}

/// Builds a resolver purely from each value set's inline `codes`, since
/// this CLI has no terminology service to call out to (spec.md §6.2
/// resolution is an external concern).
fn resolver_from_inline_codes(measure: &Measure) -> StaticValueSetResolver {
    let mut resolver = StaticValueSetResolver::new();
    for value_set in &measure.value_sets {
        let (Some(oid), Some(codes)) = (&value_set.oid, &value_set.codes) else {
            continue;
        };
        resolver = resolver.with_expansion(oid.clone(), codes.clone());
    }
    resolver
}
