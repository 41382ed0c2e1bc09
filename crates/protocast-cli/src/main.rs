//! protocast CLI - Overlay custom field types onto prost-generated code
//!
//! Commands:
//! - `protocast overlay` - Rewrite generated files in place
//! - `protocast inspect` - Print the overlay map derived from a descriptor set

use clap::{Parser, Subcommand};
use protocast_core::OverlayError;
use std::path::PathBuf;
use std::process::ExitCode;

#[cfg(test)]
mod fixtures;
mod inspect;
mod logging;
mod overlay;

use logging::LogLevel;

#[derive(Parser)]
#[command(name = "protocast")]
#[command(author, version, about = "Option-driven type overlay for prost-generated code", long_about = None)]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite prost-generated files using annotations from a descriptor set
    Overlay {
        /// FileDescriptorSet written by `protoc --include_imports --descriptor_set_out`
        #[arg(short, long)]
        descriptor_set: PathBuf,

        /// Directory holding the generated `<package>.rs` files
        #[arg(short, long)]
        out_dir: PathBuf,

        /// Path to protocast.toml (default: <out-dir>/protocast.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Report files that would change and exit with status 1 instead of writing
        #[arg(long)]
        check: bool,
    },

    /// Print the overlay map as JSON
    Inspect {
        /// FileDescriptorSet written by `protoc --include_imports --descriptor_set_out`
        #[arg(short, long)]
        descriptor_set: PathBuf,

        /// Path to protocast.toml
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err
                .chain()
                .find_map(|cause| cause.downcast_ref::<OverlayError>())
                .map_or(1, OverlayError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run(command: Commands) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Overlay {
            descriptor_set,
            out_dir,
            config,
            check,
        } => {
            let outcome = overlay::run(&descriptor_set, &out_dir, config.as_deref(), check)?;
            if check && !outcome.changed.is_empty() {
                return Ok(ExitCode::from(1));
            }
        }
        Commands::Inspect {
            descriptor_set,
            config,
        } => {
            inspect::run(&descriptor_set, config.as_deref())?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
