//! `qmf validate` - runs structural, reference, and semantic checks over a
//! Universal Measure Specification without generating anything from it.

use anyhow::{Context, Result};
use clap::Args;
use qmf_foundation::cli::{read_json, write_json};
use qmf_ums::Measure;

#[derive(Args)]
pub struct ValidateArgs {
    /// Path to the UMS measure JSON, or "-" for stdin
    #[clap(short, long)]
    measure: String,

    /// Canonicalize before validating
    #[clap(long)]
    canonicalize: bool,

    /// Output format: text or json
    #[clap(short, long, default_value = "text")]
    format: String,
}

pub fn handle_command(args: ValidateArgs) -> Result<()> {
    let measure: Measure = read_json(&args.measure).context("failed to read measure")?;
    let measure = if args.canonicalize { qmf_ums::canonicalize(measure) } else { measure };

    let report = qmf_ums::validate(&measure);

    if args.format == "json" {
        write_json(&report, None)?;
    } else {
        for issue in &report.errors {
            println!("error [{}] {}", issue.code, issue.message);
        }
        for issue in &report.warnings {
            println!("warning [{}] {}", issue.code, issue.message);
        }
        println!(
            "{} error(s), {} warning(s)",
            report.errors.len(),
            report.warnings.len()
        );
    }

    if !report.is_valid() {
        std::process::exit(1);
    }

    Ok(())
}
