//! `qmf library` - manages the reusable component library: identity
//! matching, the draft/approved/archived workflow, and checking a
//! measure's value-set references against it.
//!
//! The library is persisted as a flat JSON array of components at
//! `--store`; this CLI is the one place in the workspace allowed to read
//! the real clock, since `qmf_library::workflow` takes timestamps as
//! explicit parameters to stay pure.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Subcommand};
use qmf_foundation::cli::{read_json, write_json};
use qmf_library::{
    compute_complexity, compute_component_diff, find_exact_match, find_similar_components, upsert_composite, validate_measure_components, AtomicComponent, ComponentBody,
    InMemoryLibraryStore, LibraryComponent, LibraryStore,
};
use qmf_ums::Measure;

#[derive(Subcommand)]
pub enum LibraryCommands {
    /// List every component in the store
    List(StoreArgs),

    /// Show a single component by id
    Show(IdArgs),

    /// Add or replace a component, rejecting composites that cycle or dangle
    Put(PutArgs),

    /// Find an exact identity match for a component body
    FindMatch(MatchArgs),

    /// Find near-matches for an atomic component by similarity score
    FindSimilar(SimilarArgs),

    /// Diff a component body against a stored component
    Diff(DiffArgs),

    /// Report a component's derived complexity
    Complexity(IdArgs),

    /// Move a draft component to Approved
    Approve(ApproveArgs),

    /// Archive a component, terminally
    Archive(ArchiveArgs),

    /// Create a new minor version of a component in Draft status
    Version(VersionArgs),

    /// Check a measure's value-set references against the library
    CheckRefs(CheckRefsArgs),
}

#[derive(Args)]
pub struct StoreArgs {
    /// Path to the component store JSON file
    #[clap(short, long)]
    store: String,
}

#[derive(Args)]
pub struct IdArgs {
    #[clap(short, long)]
    store: String,
    /// Component id
    id: String,
}

#[derive(Args)]
pub struct PutArgs {
    #[clap(short, long)]
    store: String,
    /// Path to a LibraryComponent JSON document to insert or replace
    component: String,
}

#[derive(Args)]
pub struct MatchArgs {
    #[clap(short, long)]
    store: String,
    /// Path to a ComponentBody JSON document to match
    component: String,
}

#[derive(Args)]
pub struct SimilarArgs {
    #[clap(short, long)]
    store: String,
    /// Path to an AtomicComponent JSON document to match
    component: String,
    /// Minimum similarity score to report
    #[clap(short, long, default_value_t = 0.5)]
    threshold: f64,
}

#[derive(Args)]
pub struct DiffArgs {
    #[clap(short, long)]
    store: String,
    /// Id of the stored component to diff against
    id: String,
    /// Path to the incoming ComponentBody JSON document
    component: String,
}

#[derive(Args)]
pub struct ApproveArgs {
    #[clap(short, long)]
    store: String,
    id: String,
    /// Name or id of the approver
    #[clap(short, long)]
    approver: String,
}

#[derive(Args)]
pub struct ArchiveArgs {
    #[clap(short, long)]
    store: String,
    id: String,
    #[clap(short, long)]
    by: String,
}

#[derive(Args)]
pub struct VersionArgs {
    #[clap(short, long)]
    store: String,
    id: String,
    #[clap(short, long)]
    description: String,
    #[clap(short, long)]
    author: String,
}

#[derive(Args)]
pub struct CheckRefsArgs {
    #[clap(short, long)]
    store: String,
    /// Path to the UMS measure JSON to check
    #[clap(short, long)]
    measure: String,
}

fn load_store(path: &str) -> Result<InMemoryLibraryStore> {
    let components: Vec<LibraryComponent> = if std::path::Path::new(path).exists() {
        read_json(path).context("failed to read component store")?
    } else {
        Vec::new()
    };
    let store = InMemoryLibraryStore::new();
    for component in components {
        store.put(component);
    }
    Ok(store)
}

fn save_store(path: &str, store: &InMemoryLibraryStore) -> Result<()> {
    let mut components = store.all();
    components.sort_by(|a, b| a.id.cmp(&b.id));
    write_json(&components, Some(path))?;
    Ok(())
}

fn require(store: &InMemoryLibraryStore, id: &str) -> Result<LibraryComponent> {
    store.get(id).with_context(|| format!("no component with id '{id}' in the store"))
}

pub fn handle_command(cmd: LibraryCommands) -> Result<()> {
    match cmd {
        LibraryCommands::List(args) => {
            let store = load_store(&args.store)?;
            let mut components = store.all();
            components.sort_by(|a, b| a.id.cmp(&b.id));
            write_json(&components, None)?;
        }
        LibraryCommands::Show(args) => {
            let store = load_store(&args.store)?;
            let component = require(&store, &args.id)?;
            write_json(&component, None)?;
        }
        LibraryCommands::Put(args) => {
            let store = load_store(&args.store)?;
            let component: LibraryComponent = read_json(&args.component).context("failed to read library component")?;
            upsert_composite(&store, component.clone()).context("rejected by the component store")?;
            save_store(&args.store, &store)?;
            write_json(&component, None)?;
        }
        LibraryCommands::FindMatch(args) => {
            let store = load_store(&args.store)?;
            let body: ComponentBody = read_json(&args.component).context("failed to read component body")?;
            match find_exact_match(&body, &store) {
                Some(component) => write_json(&component, None)?,
                None => println!("no exact match"),
            }
        }
        LibraryCommands::FindSimilar(args) => {
            let store = load_store(&args.store)?;
            let atomic: AtomicComponent = read_json(&args.component).context("failed to read atomic component")?;
            let matches = find_similar_components(&atomic, &store, args.threshold);
            write_json(&matches, None)?;
        }
        LibraryCommands::Diff(args) => {
            let store = load_store(&args.store)?;
            let existing = require(&store, &args.id)?;
            let body: ComponentBody = read_json(&args.component).context("failed to read component body")?;
            let diffs = compute_component_diff(&existing, &body);
            write_json(&diffs, None)?;
        }
        LibraryCommands::Complexity(args) => {
            let store = load_store(&args.store)?;
            require(&store, &args.id)?;
            match compute_complexity(&args.id, &store) {
                Some(value) => println!("{value}"),
                None => bail!("component '{}' references a missing child; complexity is undefined", args.id),
            }
        }
        LibraryCommands::Approve(args) => {
            let store = load_store(&args.store)?;
            let mut component = require(&store, &args.id)?;
            qmf_library::approve(&mut component, args.approver, Utc::now().naive_utc())?;
            store.put(component.clone());
            save_store(&args.store, &store)?;
            write_json(&component, None)?;
        }
        LibraryCommands::Archive(args) => {
            let store = load_store(&args.store)?;
            let mut component = require(&store, &args.id)?;
            qmf_library::archive(&mut component, args.by, Utc::now().naive_utc())?;
            store.put(component.clone());
            save_store(&args.store, &store)?;
            write_json(&component, None)?;
        }
        LibraryCommands::Version(args) => {
            let store = load_store(&args.store)?;
            let existing = require(&store, &args.id)?;
            let next = qmf_library::create_version(&existing, args.description, args.author, Utc::now().naive_utc())?;
            store.put(next.clone());
            save_store(&args.store, &store)?;
            write_json(&next, None)?;
        }
        LibraryCommands::CheckRefs(args) => {
            let store = load_store(&args.store)?;
            let measure: Measure = read_json(&args.measure).context("failed to read measure")?;
            let measure = qmf_ums::canonicalize(measure);
            let warnings = validate_measure_components(&measure, &store);
            if warnings.is_empty() {
                println!("every referenced value set has an approved library component");
            } else {
                for warning in &warnings {
                    println!("{warning}");
                }
                bail!("{} reference warning(s)", warnings.len());
            }
        }
    }

    Ok(())
}
