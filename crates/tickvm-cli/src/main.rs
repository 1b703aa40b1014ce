use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tickvm_config::ConfigLoader;

mod commands;
mod logging;

/// Tools for tickvm state controller bytecode.
///
/// EXAMPLES:
///     tickvm disasm state200.bin        Disassemble an expression file
///     tickvm disasm --hex "01 02 01 03 20"
///     tickvm eval "01 02 01 03 20"      Evaluate an expression
///     tickvm save inspect slot1.sav     Show a save-state file
///     tickvm config                     Print the effective configuration
///
/// ENVIRONMENT VARIABLES:
///     RUST_LOG                    Log filter (overrides TICKVM_LOG and the config file)
///     TICKVM_LOG                  Log filter (overrides the config file)
///     TICKVM_SAVE_DIR             Save-state directory
///     TICKVM_POW_BIT_ORDER        auto, current or legacy
///     TICKVM_MAX_LOOP_ITERATIONS  Loop iteration limit
#[derive(Parser)]
#[command(name = "tickvm")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Use this tickvm.toml instead of searching from the working directory
    #[arg(long, global = true, env = "TICKVM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Disassemble expression bytecode
    ///
    /// EXAMPLES:
    ///     tickvm disasm expr.bin
    ///     tickvm disasm --hex "70 ..."
    #[command(visible_alias = "d")]
    Disasm {
        /// File holding raw bytecode
        #[arg(required_unless_present = "hex", conflicts_with = "hex")]
        file: Option<PathBuf>,
        /// Bytecode as hex digits
        #[arg(long)]
        hex: Option<String>,
    },

    /// Evaluate expression bytecode against a scratch two-player world
    ///
    /// The expression runs as player 1. Prints the resulting value.
    #[command(visible_alias = "e")]
    Eval {
        /// Bytecode as hex digits
        hex: String,
        /// Use the legacy integer power bit order
        #[arg(long)]
        legacy_pow: bool,
        /// Print per-opcode execution counts
        #[arg(long)]
        profile: bool,
    },

    /// Work with save-state files
    Save {
        #[command(subcommand)]
        command: SaveCommand,
    },

    /// Print the effective configuration
    Config {
        /// Only print which tickvm.toml was used
        #[arg(long)]
        path: bool,
    },
}

#[derive(Subcommand)]
enum SaveCommand {
    /// Show the contents of a save-state file
    Inspect {
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = ConfigLoader::new();
    let config = match &cli.config {
        Some(path) => loader
            .load_from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => loader.load_from_directory(&std::env::current_dir()?)?,
    };
    logging::init(config.vm.log_filter());
    tracing::debug!(source = ?config.source, "configuration loaded");

    match cli.command {
        Commands::Disasm { file, hex } => {
            let input = match (file, hex) {
                (_, Some(hex)) => commands::disasm::Input::Hex(hex),
                (Some(file), None) => commands::disasm::Input::File(file),
                (None, None) => anyhow::bail!("either a file or --hex is required"),
            };
            commands::disasm::run(input)?;
        }
        Commands::Eval {
            hex,
            legacy_pow,
            profile,
        } => {
            let args = commands::eval::EvalArgs {
                hex,
                legacy_pow,
                profile,
            };
            commands::eval::run(args, &config.vm)?;
        }
        Commands::Save {
            command: SaveCommand::Inspect { file, json },
        } => {
            commands::save::inspect(&file, json)?;
        }
        Commands::Config { path } => {
            commands::config::run(&config, path)?;
        }
    }

    Ok(())
}
