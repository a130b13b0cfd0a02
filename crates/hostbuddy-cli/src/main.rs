//! HostBuddy CLI: preview untrusted front-end source from the terminal.
//!
//! ## Commands
//!
//! - `run`: classify, build and render a source file, printing the run report
//! - `classify`: show which kind a file is and which rule decided it
//! - `imports`: show the package candidates and ignored specifiers of a file
//! - `config`: print the effective configuration

mod surface;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hostbuddy_core::scaffold::baseline_names;
use hostbuddy_core::{
    classify_with_rule, ImportExtractor, NpmViewRegistry, PersistenceMode, PipelineConfig,
    PipelineOrchestrator, PipelineServices, ProjectId, SourceArtifact,
};
use tracing::{info, Level};

use crate::surface::FileSurfaceFactory;

#[derive(Parser)]
#[command(name = "hostbuddy")]
#[command(author = "HostBuddy Developers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Preview untrusted front-end source in an isolated surface", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Root for run directories, offline projects and logs
    #[arg(long, global = true, env = "HOSTBUDDY_BASE_DIR")]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum RegistryVia {
    /// Query the registry HTTP API directly
    Http,
    /// Ask the package manager (`npm view`)
    Npm,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a source file through the pipeline and render it
    Run {
        /// Source file (markup or component script)
        file: PathBuf,

        /// Project identity (default: a fresh UUID)
        #[arg(short, long)]
        project_id: Option<String>,

        /// Reuse a persistent project directory and its dependency cache
        #[arg(long)]
        offline: bool,

        /// Registry URL for metadata queries and installs
        #[arg(long, env = "HOSTBUDDY_REGISTRY_URL")]
        registry: Option<String>,

        /// How registry metadata is queried
        #[arg(long, value_enum, default_value = "http")]
        registry_via: RegistryVia,

        /// Where inline preview documents are written (default: <base>/previews)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Keep an ephemeral scaffold on disk after the command exits
        #[arg(long)]
        keep: bool,

        /// Write the run report to this file instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Classify a source file
    Classify {
        file: PathBuf,
    },

    /// List the external packages a source file imports
    Imports {
        file: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    hostbuddy_core::telemetry::init_tracing(cli.json, level);

    let mut config = PipelineConfig::from_env().context("Invalid HOSTBUDDY_* configuration")?;
    if let Some(base) = &cli.base_dir {
        config = config.with_base_dir(base);
    }

    match cli.command {
        Commands::Run {
            file,
            project_id,
            offline,
            registry,
            registry_via,
            out_dir,
            keep,
            report,
        } => {
            if let Some(url) = registry {
                config.registry_url = url;
            }
            let options = RunOptions {
                project_id,
                offline,
                registry_via,
                out_dir,
                keep,
                report,
            };
            cmd_run(config, &file, options).await
        }
        Commands::Classify { file } => cmd_classify(&file),
        Commands::Imports { file } => cmd_imports(&config, &file),
        Commands::Config => print_json(&config),
    }
}

struct RunOptions {
    project_id: Option<String>,
    offline: bool,
    registry_via: RegistryVia,
    out_dir: Option<PathBuf>,
    keep: bool,
    report: Option<PathBuf>,
}

async fn cmd_run(config: PipelineConfig, file: &Path, options: RunOptions) -> Result<()> {
    let text = read_source(file)?;
    let project_id = match options.project_id {
        Some(id) => ProjectId::new(id)?,
        None => ProjectId::new(uuid::Uuid::new_v4().to_string())?,
    };
    let mode = PersistenceMode::from_offline_flag(options.offline);

    let out_dir = options
        .out_dir
        .unwrap_or_else(|| config.base_dir.join("previews"));
    let surfaces = FileSurfaceFactory::new(out_dir);
    let previews = surfaces.log();

    let mut services = PipelineServices::production(config.clone(), Arc::new(surfaces))
        .context("Failed to set up pipeline services")?;
    if options.registry_via == RegistryVia::Npm {
        let timeout_secs = config.registry_timeout().as_secs().max(1);
        let npm_view =
            NpmViewRegistry::new(config.npm_program.clone(), std::env::temp_dir(), timeout_secs)
                .with_registry(config.registry_url.clone());
        services = services.with_registry(Arc::new(npm_view));
    }

    info!(file = %file.display(), project_id = %project_id, mode = mode.as_str(), "starting run");
    let orchestrator = PipelineOrchestrator::new(Arc::new(services));
    let mut outcome = orchestrator
        .run(SourceArtifact::new(project_id, mode, text))
        .await;

    if options.keep {
        if let Some(path) = outcome.session.keep_workspace() {
            info!(path = %path.display(), "ephemeral scaffold kept");
        }
    }

    let rendered = serde_json::to_string_pretty(&outcome.report)?;
    match &options.report {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("Failed to write report to {}", path.display()))?,
        None => println!("{rendered}"),
    }

    // Without --keep an ephemeral scaffold is removed when the session drops.
    let discarded = outcome.session.workspace().is_some();
    eprintln!("{}", preview_message(previews.last().as_deref(), discarded));
    Ok(())
}

fn preview_message(preview: Option<&Path>, discarded: bool) -> String {
    match (preview, discarded) {
        (Some(path), false) => format!("preview: {}", path.display()),
        (Some(path), true) => format!(
            "preview rendered from {} (scaffold removed on exit; pass --keep to retain it)",
            path.display()
        ),
        (None, _) => "preview unavailable: the surface did not load anything".to_string(),
    }
}

fn cmd_classify(file: &Path) -> Result<()> {
    let text = read_source(file)?;
    let (kind, rule) = classify_with_rule(&text);
    println!("{} (rule: {rule})", kind.as_str());
    Ok(())
}

fn cmd_imports(config: &PipelineConfig, file: &Path) -> Result<()> {
    let text = read_source(file)?;
    let report = ImportExtractor::new(config.limits.max_packages)
        .with_excluded(baseline_names())
        .extract(&text);
    print_json(&report)
}

fn read_source(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "hostbuddy",
            "run",
            "App.tsx",
            "--project-id",
            "demo",
            "--offline",
            "--registry-via",
            "npm",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                file,
                project_id,
                offline,
                registry_via,
                ..
            } => {
                assert_eq!(file, PathBuf::from("App.tsx"));
                assert_eq!(project_id.as_deref(), Some("demo"));
                assert!(offline);
                assert_eq!(registry_via, RegistryVia::Npm);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_preview_message_flags_discarded_scaffold() {
        let shell = Path::new("/tmp/hb-run-x/index.html");
        assert_eq!(
            preview_message(Some(shell), false),
            "preview: /tmp/hb-run-x/index.html"
        );
        let discarded = preview_message(Some(shell), true);
        assert!(discarded.contains("removed on exit"));
        assert!(discarded.contains("--keep"));
        assert!(preview_message(None, true).starts_with("preview unavailable"));
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from(["hostbuddy", "--json", "-v", "classify", "x.html"]).unwrap();
        assert!(cli.json);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Classify { .. }));
    }
}
