//! extmethods — typed extraction methods for metadata ingestion
//!
//! Lists the extraction methods offered by the installed metadata
//! extractors and turns loosely typed method payloads into typed records.

mod catalog;
mod config;
mod decode;
mod model;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::catalog::MethodCatalog;
use crate::config::ExtractorsConfig;
use crate::model::ExtractionMethod;

/// Typed extraction methods for metadata ingestion
#[derive(Parser)]
#[command(name = "extmethods")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the methods offered by all installed extractors
    List {
        #[command(flatten)]
        catalog: CatalogOptions,

        /// Output format
        #[arg(long, default_value = "json", value_enum)]
        format: OutputFormat,
    },

    /// Show a single method and the extractor providing it
    Show {
        /// Method name
        method: String,

        #[command(flatten)]
        catalog: CatalogOptions,

        /// Output format
        #[arg(long, default_value = "json", value_enum)]
        format: OutputFormat,
    },

    /// Decode a method payload (JSON text) into a typed record
    Decode {
        /// JSON payload; read from stdin when omitted or `-`
        payload: Option<String>,

        /// Payload is an array of methods
        #[arg(long)]
        list: bool,

        /// Output format
        #[arg(long, default_value = "json", value_enum)]
        format: OutputFormat,
    },
}

#[derive(Parser, Clone)]
struct CatalogOptions {
    /// Path to the extractors config file
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

/// `show` output: the method plus where it comes from.
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MethodDetails<'a> {
    name: &'a str,
    schema: &'a str,
    extractor: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    executable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command_line: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("extmethods=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List { catalog, format } => {
            let catalog = build_catalog(&catalog)?;
            let methods = catalog.available_methods();
            tracing::info!(count = methods.len(), "Available methods");
            output(&methods, format)?;
        }
        Commands::Show {
            method,
            catalog,
            format,
        } => {
            let catalog = build_catalog(&catalog)?;
            let m = catalog
                .method(&method)
                .with_context(|| format!("Unknown extraction method: {method}"))?;
            let extractor = catalog.extractor_for(&method);
            let details = MethodDetails {
                name: &m.name,
                schema: &m.schema,
                extractor: &m.extractor,
                executable: extractor.map(|e| e.executable_path.display().to_string()),
                version: extractor.map(|e| e.version.as_str()),
                command_line: extractor.map(|e| e.render_command_line()),
            };
            output(&details, format)?;
        }
        Commands::Decode {
            payload,
            list,
            format,
        } => {
            let text = match payload.as_deref() {
                None | Some("-") => {
                    let mut buf = String::new();
                    io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read payload from stdin")?;
                    buf
                }
                Some(text) => text.to_string(),
            };

            if list {
                let methods = ExtractionMethod::create_list_from(Some(text.into()))?;
                output(&methods, format)?;
            } else {
                let method = ExtractionMethod::create_from(Some(text.into()))?;
                tracing::debug!(
                    name = method.name().unwrap_or("<absent>"),
                    has_schema = method.schema().is_some(),
                    "Decoded extraction method"
                );
                output(&method, format)?;
            }
        }
    }

    Ok(())
}

fn build_catalog(options: &CatalogOptions) -> Result<MethodCatalog> {
    let (config, path) = ExtractorsConfig::load(options.config.as_deref())
        .context("Failed to load extractors config")?;
    tracing::info!(file = %path.display(), "Using config");

    let catalog = MethodCatalog::new(&config);
    if catalog.is_empty() {
        tracing::warn!("No extraction methods available");
    }
    Ok(catalog)
}

fn output<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match format {
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(value)?;
            write!(handle, "{}", yaml)?;
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            writeln!(handle, "{}", json)?;
        }
    }

    Ok(())
}
