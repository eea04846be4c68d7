use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

mod compile;
mod eval;
mod library;
mod validate;

/// qmf - Unified CLI for the Quality Measure Forge toolchain
///
/// Compiles a Universal Measure Specification into CQL or SQL, validates
/// it, evaluates it against a patient record, and manages the reusable
/// component library.
#[derive(Parser)]
#[clap(name = "qmf")]
#[clap(about = "Unified CLI for the Quality Measure Forge toolchain")]
#[clap(version)]
struct Cli {
    /// Enable verbose logging
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate CQL or SQL from a Universal Measure Specification
    Compile(compile::CompileArgs),

    /// Validate a Universal Measure Specification
    Validate(validate::ValidateArgs),

    /// Evaluate a measure against a patient record
    Eval(eval::EvalArgs),

    /// Manage the reusable component library
    #[clap(subcommand)]
    Library(library::LibraryCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = if cli.verbose {
        tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).finish()
    } else {
        tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).finish()
    };
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Compile(args) => {
            if let Err(e) = compile::handle_command(args) {
                error!("compile error: {e}");
                std::process::exit(1);
            }
        }
        Commands::Validate(args) => {
            if let Err(e) = validate::handle_command(args) {
                error!("validate error: {e}");
                std::process::exit(1);
            }
        }
        Commands::Eval(args) => {
            if let Err(e) = eval::handle_command(args) {
                error!("eval error: {e}");
                std::process::exit(1);
            }
        }
        Commands::Library(cmd) => {
            if let Err(e) = library::handle_command(cmd) {
                error!("library error: {e}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
