use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use portal_engine::{
    DependencyResolver, DesignerConfig, FormState, FunctionRegistry, PlayerNeighbours, SchemaCommitter, declaration::preview,
    declaration_candidates, parse_metadata_file, parse_schema_file, parse_workflow_file, validate_submission,
};
use serde::Serialize;
use tracing::{Level, info};

/// Inspect, check and preview portal form schemas.
#[derive(Parser, Debug)]
#[command(name = "portal-designer", version, about)]
struct Args {
    /// Designer configuration file; defaults to the standard config location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a schema with every record normalized
    Normalize {
        schema: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Run the save-time checks over a schema and list warnings
    Check { schema: PathBuf },
    /// Render the declaration of a consent checkbox
    Preview {
        schema: PathBuf,
        /// Id or name of the consent checkbox
        #[arg(long)]
        field: String,
    },
    /// Regenerate and check the action forms of a workflow
    Actions { workflow: PathBuf },
    /// List the fields a declaration may reference
    Columns { metadata: PathBuf },
    /// Validate a form state against a schema
    Validate {
        schema: PathBuf,
        /// JSON or YAML map of field name to submitted value
        state: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

fn main() -> Result<()> {
    init_tracing();
    let Args { config, command } = Args::parse();
    let config = match config {
        Some(path) => DesignerConfig::load_from(&path),
        None => DesignerConfig::load(),
    }
    .context("Failed to load designer config")?;
    let registry = FunctionRegistry::builtin();
    let committer = SchemaCommitter::new(&config, &registry);

    match command {
        Command::Normalize { schema, format } => {
            let fields = parse_schema_file(&schema)?;
            match format {
                OutputFormat::Json => print_json(&fields)?,
                OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&fields)?),
            }
        }
        Command::Check { schema } => {
            let fields = parse_schema_file(&schema)?;
            let report = committer
                .commit_schema(fields)
                .with_context(|| format!("Schema rejected: {}", schema.display()))?;
            if report.warnings.is_empty() {
                println!("ok: {} fields", report.committed.len());
            }
            for warning in &report.warnings {
                println!("warning: {warning}");
            }
        }
        Command::Preview { schema, field } => {
            let fields = parse_schema_file(&schema)?;
            let resolver = DependencyResolver::new(&fields);
            let consent = resolver
                .lookup(&field)
                .and_then(|record| record.consent())
                .with_context(|| format!("No consent checkbox '{field}' in {}", schema.display()))?;
            println!("{}", preview(&consent.declaration));
        }
        Command::Actions { workflow } => {
            let workflow = parse_workflow_file(&workflow)?;
            let mut players = Vec::with_capacity(workflow.players.len());
            for (index, player) in workflow.players.iter().enumerate() {
                let neighbours = PlayerNeighbours::at(&workflow, index);
                let report = committer
                    .commit_action_form(player.clone(), &neighbours)
                    .with_context(|| format!("Action form of player '{}' rejected", player.id))?;
                for warning in &report.warnings {
                    println!("warning: {warning}");
                }
                players.push(report.committed);
            }
            info!(player_count = players.len(), "regenerated action forms");
            print_json(&players)?;
        }
        Command::Columns { metadata } => {
            let metadata = parse_metadata_file(&metadata)?;
            print_json(&declaration_candidates(&metadata))?;
        }
        Command::Validate { schema, state } => {
            let fields = parse_schema_file(&schema)?;
            let state_text =
                std::fs::read_to_string(&state).with_context(|| format!("Failed to read form state: {}", state.display()))?;
            let state: FormState = serde_yaml::from_str(&state_text).context("Form state must be a map of field name to value")?;
            let report = validate_submission(&fields, &state, &registry);
            print_json(&report)?;
            if !report.is_valid() {
                anyhow::bail!("{} field(s) failed validation", report.errors.len());
            }
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
