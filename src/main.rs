//! el-classify CLI: classify OWL 2 EL ontologies given as JSON axiom lists.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, WrapErr};

use el_classifier::config::ReasonerConfig;
use el_classifier::model::Axiom;
use el_classifier::reasoner::Reasoner;

#[derive(Parser)]
#[command(name = "el-classify", version, about = "Concurrent OWL 2 EL classifier")]
struct Cli {
    /// Reasoner configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Number of saturation workers, overriding the config file.
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the ontology and print the class taxonomy as JSON.
    Classify {
        /// JSON file holding an array of axioms.
        #[arg(long)]
        axioms: PathBuf,

        /// Check the taxonomy's structure before printing it.
        #[arg(long)]
        validate: bool,
    },

    /// Compute direct types of individuals and print them as JSON.
    Realize {
        /// JSON file holding an array of axioms.
        #[arg(long)]
        axioms: PathBuf,
    },

    /// Report whether the ontology is consistent.
    Check {
        /// JSON file holding an array of axioms.
        #[arg(long)]
        axioms: PathBuf,
    },

    /// Write the default configuration to a file.
    InitConfig {
        /// Destination path.
        #[arg(long, default_value = "el-classifier.toml")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ReasonerConfig::load(path)?,
        None => ReasonerConfig::default(),
    };
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }

    match cli.command {
        Commands::Classify { axioms, validate } => {
            config.validate_taxonomy |= validate;
            let mut reasoner = load_reasoner(config, &axioms)?;
            let taxonomy = reasoner.classify()?;
            println!("{}", serde_json::to_string_pretty(taxonomy).into_diagnostic()?);
        }

        Commands::Realize { axioms } => {
            let mut reasoner = load_reasoner(config, &axioms)?;
            let instances = reasoner.realize()?;
            println!("{}", serde_json::to_string_pretty(instances).into_diagnostic()?);
        }

        Commands::Check { axioms } => {
            let mut reasoner = load_reasoner(config, &axioms)?;
            if reasoner.is_inconsistent()? {
                println!("inconsistent");
            } else {
                println!("consistent");
            }
        }

        Commands::InitConfig { out } => {
            config.save(&out)?;
            println!("Wrote configuration to {}", out.display());
        }
    }

    Ok(())
}

fn load_reasoner(config: ReasonerConfig, path: &Path) -> Result<Reasoner> {
    let content = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    let axioms: Vec<Axiom> = serde_json::from_str(&content)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to parse axioms from {}", path.display()))?;

    let mut reasoner = Reasoner::new(config)?;
    let added = reasoner.add_axioms(&axioms)?;
    tracing::info!(axioms = axioms.len(), added, "ontology loaded");
    Ok(reasoner)
}
