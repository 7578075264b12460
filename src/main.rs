// Use modules from the library crate
use unitres::repository::IndexRepository;
use unitres::{logging, ResolverContext, UnitResource};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "unitres",
    about = "Resolve self-describing deployable unit archives into canonical manifests",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a unit archive and print its finalized manifest
    Resolve {
        /// Archive location, e.g. ./foo@1.2.0.esa
        location: String,

        /// TOML index file serving external capability providers
        #[arg(long)]
        index: Option<PathBuf>,

        /// Working-storage root (one subdirectory is created per unit)
        #[arg(long)]
        workdir: Option<PathBuf>,

        /// Maximum nested-archive recursion depth
        #[arg(long)]
        max_depth: Option<usize>,

        /// Emit a JSON description instead of manifest text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    logging::init()?;
    let cli = Cli::parse();

    match cli.command {
        Command::Resolve {
            location,
            index,
            workdir,
            max_depth,
            json,
        } => resolve(location, index, workdir, max_depth, json),
    }
}

fn resolve(
    location: String,
    index: Option<PathBuf>,
    workdir: Option<PathBuf>,
    max_depth: Option<usize>,
    json: bool,
) -> Result<()> {
    // Unit ids are only unique within one process, so the default working
    // root must be too.
    let workdir = workdir
        .unwrap_or_else(|| std::env::temp_dir().join(format!("unitres-{}", std::process::id())));
    let mut context = ResolverContext::new(workdir);

    if let Some(path) = index {
        let repository = IndexRepository::from_file(&path)
            .with_context(|| format!("failed to load index {}", path.display()))?;
        context = context.with_external(Arc::new(repository));
    }
    if let Some(depth) = max_depth {
        context = context.with_max_depth(depth);
    }

    // When the location is a file on disk, resolve under its file name so
    // the name@version grammar applies to the archive name, not the path.
    let path = PathBuf::from(&location);
    let unit = if path.is_file() {
        let identifier = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| location.clone());
        let file = std::fs::File::open(&path)
            .with_context(|| format!("failed to open '{location}'"))?;
        UnitResource::resolve(&identifier, Some(Box::new(file)), &context)
    } else {
        UnitResource::resolve(&location, None, &context)
    }
    .with_context(|| format!("failed to resolve '{location}'"))?;

    if json {
        let manifest: serde_json::Map<String, serde_json::Value> = unit
            .manifest()
            .headers()
            .map(|header| (header.name().to_string(), header.value().into()))
            .collect();
        let resources: Vec<String> = unit
            .resources()
            .iter()
            .map(|resource| resource.identity().to_string())
            .collect();
        let output = serde_json::json!({
            "id": unit.id(),
            "location": unit.location().raw(),
            "manifest": manifest,
            "resources": resources,
            "workingDirectory": unit.directory(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", unit.manifest());
        if let Some(deployment) = unit.deployment_manifest() {
            println!();
            print!("{}", deployment.manifest());
        }
    }

    Ok(())
}
