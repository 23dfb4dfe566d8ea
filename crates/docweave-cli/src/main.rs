//! `docweave` command-line interface.

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use docweave::plugins::PluginManifest;
use docweave::{ExtractionConfig, JsonConfig, PipelineContext, detect_mime_type_from_path};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Extracted content only
    Text,
    /// The full extraction result as JSON
    Json,
}

#[derive(Parser)]
#[command(name = "docweave")]
#[command(version, about = "Extract text, metadata and structure from documents", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a single document
    Extract {
        path: PathBuf,

        /// MIME type override; detected from the file when omitted
        #[arg(short, long)]
        mime: Option<String>,

        /// Configuration file (.toml, .yaml, .yml or .json); discovered when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Extract several documents concurrently and print a JSON array
    Batch {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum concurrent extractions
        #[arg(short = 'j', long)]
        max_concurrency: Option<usize>,
    },

    /// Print the detected MIME type of a file
    Detect { path: PathBuf },

    /// Print the effective configuration as JSON
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check an extractor plugin manifest for compatibility
    Probe { manifest: PathBuf },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ExtractionConfig> {
    let config = match path {
        Some(path) => ExtractionConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ExtractionConfig::discover()
            .context("Failed to discover configuration")?
            .unwrap_or_default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let ctx = PipelineContext::global();

    match cli.command {
        Commands::Extract {
            path,
            mime,
            config,
            format,
        } => {
            let config = load_config(config.as_deref())?;
            let result = ctx
                .extract_file(&path, mime.as_deref(), &config)
                .await
                .with_context(|| format!("Failed to extract {}", path.display()))?;

            match format {
                OutputFormat::Text => println!("{}", result.content),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
            }
            Ok(())
        }

        Commands::Batch {
            paths,
            config,
            max_concurrency,
        } => {
            let mut config = load_config(config.as_deref())?;
            if max_concurrency.is_some() {
                config.max_concurrent_extractions = max_concurrency;
            }

            let results = ctx.batch_extract_file(paths.clone(), &config).await?;
            let items: Vec<serde_json::Value> = paths
                .iter()
                .zip(results)
                .map(|(path, outcome)| match outcome {
                    Ok(result) => json!({ "path": path, "result": result }),
                    Err(e) => json!({
                        "path": path,
                        "error": { "kind": e.kind(), "message": e.to_string() },
                    }),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
            Ok(())
        }

        Commands::Detect { path } => {
            if !path.exists() {
                bail!("File not found: {}", path.display());
            }
            println!("{}", detect_mime_type_from_path(&path));
            Ok(())
        }

        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            let map = config.to_map()?;
            println!("{}", serde_json::to_string_pretty(&map)?);
            Ok(())
        }

        Commands::Probe { manifest } => {
            if !ctx.extractors().test(&manifest) {
                bail!("Plugin manifest {} is not compatible", manifest.display());
            }
            let loaded = PluginManifest::load(&manifest)?;
            println!("{} {} ({})", loaded.name, loaded.version, loaded.mime_types.join(", "));
            Ok(())
        }
    }
}
