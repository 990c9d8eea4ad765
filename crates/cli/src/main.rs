//! partspec CLI — the main entry point.
//!
//! Commands:
//! - `extract`  — Turn a description into a parameter set
//! - `validate` — Check an interchange JSON file
//! - `schema`   — Print the JSON Schema the LLM path asks for
//! - `init`     — Write the default config file

use clap::{Parser, Subcommand};
use partspec_core::ExtractionMode;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

#[derive(Parser)]
#[command(
    name = "partspec",
    about = "partspec — turn part descriptions into validated CAD parameters",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Read configuration from this file instead of ~/.partspec/config.toml
    #[arg(long, global = true, env = "PARTSPEC_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract parameters from a part description
    Extract {
        /// The part description, e.g. "square plate 150mm with center hole 30mm diameter"
        description: String,

        /// auto, force-rule or force-llm (defaults to the configured mode)
        #[arg(short, long)]
        mode: Option<ExtractionMode>,

        /// Skip geometric validation
        #[arg(long)]
        no_validate: bool,

        /// Write the JSON to a file instead of stdout
        #[arg(short, long)]
        output_json: Option<PathBuf>,
    },

    /// Validate a parameter set JSON file
    Validate {
        file: PathBuf,
    },

    /// Print the JSON Schema sent to the language model
    Schema,

    /// Write the default configuration file
    Init,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Extract {
            description,
            mode,
            no_validate,
            output_json,
        } => {
            commands::extract::run(
                cli.config.as_deref(),
                &description,
                mode,
                !no_validate,
                output_json.as_deref(),
            )
            .await
        }
        Commands::Validate { file } => commands::validate::run(&file),
        Commands::Schema => commands::schema::run(),
        Commands::Init => commands::init::run(cli.config.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(exit_code(e.as_ref()))
        }
    }
}

/// 1 extraction failure, 2 geometry failure, 4 anything else.
fn exit_code(error: &(dyn std::error::Error + 'static)) -> u8 {
    match error.downcast_ref::<partspec_core::Error>() {
        Some(partspec_core::Error::Extraction(_)) => 1,
        Some(partspec_core::Error::Geometry(_)) => 2,
        _ => 4,
    }
}
