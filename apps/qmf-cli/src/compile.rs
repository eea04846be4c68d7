//! `qmf compile` - lowers a Universal Measure Specification into CQL or SQL.

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use qmf_foundation::cli::{read_json, write_json, write_text};
use qmf_sql::Dialect;
use qmf_ums::Measure;
use tracing::warn;

#[derive(Args)]
pub struct CompileArgs {
    /// Path to the UMS measure JSON, or "-" for stdin
    #[clap(short, long)]
    measure: String,

    /// Compilation target
    #[clap(short, long, value_enum)]
    target: Target,

    /// SQL dialect (only used when --target sql)
    #[clap(short, long, value_enum, default_value = "postgres")]
    dialect: CliDialect,

    /// Skip canonicalization before generation
    #[clap(long)]
    skip_canonicalize: bool,

    /// Output format: text (raw CQL/SQL) or json (full generation result)
    #[clap(short, long, default_value = "text")]
    format: String,

    /// Write output to a file instead of stdout
    #[clap(short, long)]
    output: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    Cql,
    Sql,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliDialect {
    Postgres,
    SqlServer,
    Oracle,
    Synapse,
}

impl From<CliDialect> for Dialect {
    fn from(value: CliDialect) -> Self {
        match value {
            CliDialect::Postgres => Dialect::PostgreSql,
            CliDialect::SqlServer => Dialect::SqlServer,
            CliDialect::Oracle => Dialect::Oracle,
            CliDialect::Synapse => Dialect::Synapse,
        }
    }
}

pub fn handle_command(args: CompileArgs) -> Result<()> {
    let measure: Measure = read_json(&args.measure).context("failed to read measure")?;
    let measure = if args.skip_canonicalize {
        measure
    } else {
        qmf_ums::canonicalize(measure)
    };

    let report = qmf_ums::validate(&measure);
    for issue in &report.warnings {
        warn!("{}: {}", issue.code, issue.message);
    }
    if !report.is_valid() {
        for issue in &report.errors {
            warn!("{}: {}", issue.code, issue.message);
        }
        bail!("measure failed validation with {} error(s)", report.errors.len());
    }

    match args.target {
        Target::Cql => {
            let generation = qmf_cql::generate(&measure);
            if !generation.success {
                bail!("CQL generation failed: {:?}", generation.errors);
            }
            if args.format == "json" {
                write_json(&generation, args.output.as_deref())?;
            } else {
                write_text(&generation.cql, args.output.as_deref())?;
            }
        }
        Target::Sql => {
            let dialect: Dialect = args.dialect.into();
            let generation = qmf_sql::generate(&measure, dialect);
            if !generation.success {
                bail!("SQL generation failed: {:?}", generation.errors);
            }
            if args.format == "json" {
                write_json(&generation, args.output.as_deref())?;
            } else {
                write_text(&generation.sql, args.output.as_deref())?;
            }
        }
    }

    Ok(())
}
