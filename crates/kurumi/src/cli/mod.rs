//! Command dispatch for the `kurumi` binary.

/// Clap argument definitions
mod args;

/// Config command handlers
mod config;

/// Folder commands
mod folder;

/// Note commands
mod note;

/// Sync commands
mod sync;

/// `export` and `import` commands
mod transfer;

/// Shared CLI utilities
mod util;

/// Vault commands
mod vault;

use clap::Parser;

pub use args::Cli;
use args::Commands;
pub use util::CliError;
use util::{CliContext, CliResult};

/// Main entry point for the CLI
pub fn run_cli() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = dispatch(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// `warn` by default; `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn dispatch(cli: Cli) -> CliResult<()> {
    let ctx = CliContext::load(cli.config, cli.data_dir)?;

    match cli.command {
        Commands::Vault { command } => vault::handle_vault_command(&ctx, command),
        Commands::Note { command } => note::handle_note_command(&ctx, command),
        Commands::Folder { command } => folder::handle_folder_command(&ctx, command),
        Commands::Sync { command } => sync::handle_sync_command(&ctx, command),
        Commands::Config { command } => config::handle_config_command(ctx, command),
        Commands::Export { file } => transfer::handle_export(&ctx, &file),
        Commands::Import {
            file,
            on_conflict,
            dry_run,
        } => transfer::handle_import(&ctx, &file, on_conflict, dry_run),
    }
}
