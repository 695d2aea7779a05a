//! DocWeaver CLI: the main entry point.
//!
//! Commands:
//! - `build`: Assemble context for a document type
//! - `analyze`: Report how a document type's context uses the budget
//! - `discover`: Score project files for injection
//! - `models`: List known model context windows
//! - `config`: Show, locate, validate, or initialize configuration

use clap::{Parser, Subcommand};
use docweaver_config::AppConfig;
use std::path::PathBuf;

mod commands;

use commands::session::SessionArgs;

#[derive(Parser)]
#[command(
    name = "docweaver",
    about = "DocWeaver: token-budgeted context assembly for LLM document generation",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.docweaver/config.toml)
    #[arg(long, global = true, env = "DOCWEAVER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble context for a document type and print it
    Build {
        /// Document type, e.g. risk-analysis
        document_type: String,

        #[command(flatten)]
        session: SessionArgs,

        /// Print the full assembly result as JSON
        #[arg(long)]
        json: bool,

        /// Write the assembled context to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show utilization, exclusions, and recommendations
    Analyze {
        document_type: String,

        #[command(flatten)]
        session: SessionArgs,

        #[arg(long)]
        json: bool,
    },

    /// Score project files under a directory
    Discover {
        /// Directory to scan
        dir: PathBuf,

        /// Minimum project-relevance score (0-100)
        #[arg(long)]
        min_score: Option<f64>,

        /// Maximum files selected
        #[arg(long)]
        max_count: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// List known models and their context budgets
    Models {
        /// Only show one provider
        #[arg(long)]
        provider: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file path
    Path,
    /// Load and validate the config file
    Validate,
    /// Write a default config file if none exists
    Init,
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env_overrides();
            config
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_ref();
    match cli.command {
        Commands::Build {
            document_type,
            session,
            json,
            output,
        } => {
            let config = load_config(config_path)?;
            commands::build::run(&config, &session, &document_type, json, output.as_deref())?
        }
        Commands::Analyze {
            document_type,
            session,
            json,
        } => {
            let config = load_config(config_path)?;
            commands::analyze::run(&config, &session, &document_type, json)?
        }
        Commands::Discover {
            dir,
            min_score,
            max_count,
            json,
        } => {
            let config = load_config(config_path)?;
            commands::discover::run(&config, &dir, min_score, max_count, json)?
        }
        Commands::Models { provider, json } => {
            let config = load_config(config_path)?;
            commands::models::run(&config, provider.as_deref(), json)?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&load_config(config_path)?)?,
            ConfigAction::Path => commands::config_cmd::path(config_path)?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path)?,
            ConfigAction::Init => commands::config_cmd::init(config_path)?,
        },
    }

    Ok(())
}
