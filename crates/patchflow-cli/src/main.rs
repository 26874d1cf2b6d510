//! Patchflow - staged package release
//!
//! Usage:
//!   patchflow import MyApp-3.2.1.pkg     # Upload to the test track
//!   patchflow promote MyApp              # Promote test to stable when the gate allows
//!   patchflow config init --url URL --user NAME

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use patchflow_core::backend::{JamfClient, ThreadSleeper};
use patchflow_core::config::{ConfigStore, PatchflowConfig, PromoteConfigEntry, ServerConfig};
use patchflow_core::model::PatchTrack;
use patchflow_core::pipeline::{
    ImportOptions, ImportStage, PromoteOptions, PromoteStage, StageOutcome, SystemClock,
};

const SCHEMA_VERSION: u32 = 1;

#[derive(Parser)]
#[command(name = "patchflow")]
#[command(about = "Staged package release for device-management servers", long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/patchflow/patchflow.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a package and point the title's TEST policy at it
    Import {
        /// Package file named <title>-<version>.<ext>
        path: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Promote the package under test to stable
    Promote {
        /// Software title
        title: String,

        #[command(flatten)]
        settings: PromoteFlags,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Manage patchflow.toml
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a starter config with the server section filled in
    Init {
        /// Server base URL, e.g. https://example.jamfcloud.com
        #[arg(long)]
        url: String,

        /// API account
        #[arg(long)]
        user: String,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Store promotion defaults for a title
    SetPromote {
        /// Software title
        title: String,

        #[command(flatten)]
        settings: PromoteFlags,

        /// Replace different settings already stored for the title
        #[arg(long)]
        force: bool,
    },

    /// Print the config file location
    Path,
}

#[derive(Args)]
struct PromoteFlags {
    /// Patch title, when it differs from the software title
    #[arg(long)]
    patch: Option<String>,

    /// Permitted weekdays as digits, 0 = Monday (e.g. 0123)
    #[arg(long)]
    weekdays: Option<String>,

    /// Earliest time of day, HH:MM
    #[arg(long)]
    not_before: Option<String>,

    /// Latest time of day, HH:MM
    #[arg(long)]
    not_after: Option<String>,

    /// Minimum days since the measured patch policy was last stamped
    #[arg(long)]
    min_days: Option<u32>,

    /// Patch policy carrying the dwell stamp
    #[arg(long)]
    dwell_from: Option<DwellFrom>,
}

impl From<PromoteFlags> for PromoteConfigEntry {
    fn from(flags: PromoteFlags) -> Self {
        PromoteConfigEntry {
            patch: flags.patch,
            weekdays: flags.weekdays,
            not_before: flags.not_before,
            not_after: flags.not_after,
            min_days: flags.min_days,
            dwell_from: flags.dwell_from.map(PatchTrack::from),
        }
    }
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum DwellFrom {
    Stable,
    Test,
}

impl From<DwellFrom> for PatchTrack {
    fn from(value: DwellFrom) -> Self {
        match value {
            DwellFrom::Stable => PatchTrack::Stable,
            DwellFrom::Test => PatchTrack::Test,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "patchflow=debug,patchflow_core=debug,info"
    } else {
        "patchflow=info,patchflow_core=info,warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let store = match &cli.config {
        Some(path) => ConfigStore::from_path(path),
        None => ConfigStore::from_default_location()?,
    };

    match cli.command {
        Commands::Import { path, format } => run_import(&store.load()?, path, format),
        Commands::Promote {
            title,
            settings,
            format,
        } => run_promote(&store.load()?, &title, &settings.into(), format),
        Commands::Config(command) => run_config(&store, command),
    }
}

fn run_config(store: &ConfigStore, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Init { url, user, force } => {
            let server = ServerConfig {
                url,
                user,
                password: String::new(),
            };
            store.init(server, force)?;
            println!("✓ Wrote {}", store.config_path().display());
            println!("  Set [server] password before running import or promote");
        }
        ConfigCommands::SetPromote {
            title,
            settings,
            force,
        } => {
            if store.set_promote(&title, settings.into(), force)? {
                println!("✓ Saved promote settings for '{}'", title);
            } else {
                println!("• Promote settings for '{}' are unchanged", title);
            }
        }
        ConfigCommands::Path => println!("{}", store.config_path().display()),
    }
    Ok(())
}

fn connect(config: &PatchflowConfig) -> Result<JamfClient> {
    let server = config.require_server()?;
    JamfClient::connect(&server.url, server.credentials())
        .with_context(|| format!("Failed to connect to {}", server.url))
}

fn run_import(config: &PatchflowConfig, path: PathBuf, format: OutputFormat) -> Result<()> {
    let client = connect(config)?;
    let options = ImportOptions::new(path)
        .with_category(config.import.category.clone())
        .with_notes(config.import.notes.clone());

    let outcome = ImportStage::new(&client, &SystemClock, &ThreadSleeper).run(&options)?;
    print_outcome(&outcome, format)
}

fn run_promote(
    config: &PatchflowConfig,
    title: &str,
    flags: &PromoteConfigEntry,
    format: OutputFormat,
) -> Result<()> {
    let settings = config.promote_defaults(title).overridden_by(flags);
    let gate = settings
        .gate()
        .with_context(|| format!("Invalid promote settings for '{}'", title))?;

    let mut options = PromoteOptions::new(title)
        .with_gate(gate)
        .with_dwell_from(settings.dwell_from.unwrap_or(PatchTrack::Stable));
    if let Some(patch) = settings.patch {
        options = options.with_patch_title(patch);
    }

    let client = connect(config)?;
    let outcome = PromoteStage::new(&client, &SystemClock).run(&options)?;
    print_outcome(&outcome, format)
}

/// Text produced for one outcome. Only completed stages write a summary to
/// stdout; WAIT and SKIP status records go to stderr.
#[derive(Debug, Default)]
struct Rendered {
    stdout: Option<String>,
    stderr: Option<String>,
}

fn render_outcome(outcome: &StageOutcome, format: OutputFormat) -> Result<Rendered> {
    let rendered = match (outcome, format) {
        (StageOutcome::Completed(summary), OutputFormat::Table) => Rendered {
            stdout: Some(format!(
                "✓ {} {} {} (policy {})",
                summary.stage, summary.title, summary.version, summary.policy_id
            )),
            stderr: None,
        },
        (StageOutcome::Completed(summary), OutputFormat::Json) => {
            let output = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "status": "completed",
                "stage": summary.stage,
                "title": summary.title,
                "version": summary.version,
                "policy_id": summary.policy_id,
            });
            Rendered {
                stdout: Some(serde_json::to_string_pretty(&output)?),
                stderr: None,
            }
        }
        (StageOutcome::Waiting(reason), format) => {
            info!("Waiting: {}", reason);
            render_pending("waiting", reason, format)?
        }
        (StageOutcome::Skipped(reason), format) => {
            warn!("Skipped: {}", reason);
            render_pending("skipped", reason, format)?
        }
    };
    Ok(rendered)
}

fn render_pending(status: &str, reason: &str, format: OutputFormat) -> Result<Rendered> {
    let stderr = match format {
        OutputFormat::Table => None,
        OutputFormat::Json => Some(serde_json::to_string_pretty(&serde_json::json!({
            "schema_version": SCHEMA_VERSION,
            "status": status,
            "reason": reason,
        }))?),
    };
    Ok(Rendered {
        stdout: None,
        stderr,
    })
}

fn print_outcome(outcome: &StageOutcome, format: OutputFormat) -> Result<()> {
    let rendered = render_outcome(outcome, format)?;
    if let Some(text) = rendered.stdout {
        println!("{}", text);
    }
    if let Some(text) = rendered.stderr {
        eprintln!("{}", text);
    }
    Ok(())
}
