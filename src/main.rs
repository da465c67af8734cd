//! # ingest-gate CLI Entry Point
//!
//! Stages local files through the same pipeline the upload API uses.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ingest_gate::{stage_local_file, GateConfig};

/// Upload ingest gate: validate a JSON or zip file and stage it for ingest.
#[derive(Parser, Debug)]
#[command(name = "ingest-gate", version, about)]
struct Cli {
    /// YAML configuration file. Defaults apply when omitted.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Validate a file and copy it into the staging directory.
    Stage {
        /// File to stage.
        file: PathBuf,

        /// Declared content type; guessed from the extension when omitted.
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Load and validate a configuration file without staging anything.
    CheckConfig,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => GateConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GateConfig::default(),
    };

    match cli.command {
        Commands::Stage { file, content_type } => {
            match stage_local_file(&file, content_type.as_deref(), &config) {
                Ok(staged) => {
                    println!("{}", staged.path.display());
                    tracing::info!(
                        file_type = %staged.file_type,
                        bytes_written = staged.bytes_written,
                        data_type = ?staged.metadata.as_ref().map(|m| m.data_type),
                        "staged"
                    );
                }
                Err(err) => {
                    eprintln!("ingest-gate: {err}");
                    std::process::exit(err.exit_code());
                }
            }
        }
        Commands::CheckConfig => {
            let staging = config.staging_config();
            println!(
                "config ok: version {}, staging into {}",
                config.version,
                staging.temp_dir.display()
            );
        }
    }

    Ok(())
}
