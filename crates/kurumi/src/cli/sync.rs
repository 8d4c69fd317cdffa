//! Sync command handlers

use std::sync::Arc;

use kurumi_core::config::SyncConfig;
use kurumi_core::merge::MergeOutcome;
use kurumi_core::sync::{SyncOrchestrator, SyncOutcome, SyncReport, SyncTrigger};
use tokio::sync::Mutex;

use crate::cli::args::SyncCommands;
use crate::cli::util::{CliContext, CliError, CliResult, format_millis};

pub fn handle_sync_command(ctx: &CliContext, command: SyncCommands) -> CliResult<()> {
    match command {
        SyncCommands::Run { auto } => run_sync(ctx, auto),
        SyncCommands::Test => test_connection(ctx),
        SyncCommands::Status => show_status(ctx),
    }
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(CliError::Runtime)
}

fn run_sync(ctx: &CliContext, auto: bool) -> CliResult<()> {
    let config = ctx.effective_config();
    let backend = config.sync_backend()?;
    let store = Arc::new(Mutex::new(ctx.open_store()?));
    let orchestrator = SyncOrchestrator::with_status(
        backend,
        Arc::clone(&store),
        config.min_sync_interval(),
        ctx.load_sync_status(),
    );
    let trigger = if auto {
        SyncTrigger::Automatic
    } else {
        SyncTrigger::Manual
    };

    println!("Syncing via {}...", orchestrator.backend().kind());
    let outcome = runtime()?.block_on(orchestrator.request_sync(trigger));
    store.blocking_lock().teardown();

    match outcome {
        SyncOutcome::Completed(report) => {
            ctx.save_sync_status(&orchestrator.status())?;
            print_report(&report);
            Ok(())
        }
        SyncOutcome::Skipped(reason) => {
            println!("Sync skipped: {}", reason);
            Ok(())
        }
        SyncOutcome::Failed(message) => {
            ctx.save_sync_status(&orchestrator.status())?;
            Err(CliError::SyncFailed(message))
        }
    }
}

fn print_report(report: &SyncReport) {
    match &report.merge {
        Some(MergeOutcome::Merged { strategy, notes }) => {
            println!("  Merged remote changes ({} merge, {} notes)", strategy, notes)
        }
        Some(MergeOutcome::AdoptedRemote { notes }) => {
            println!("  Adopted the remote document ({} notes)", notes)
        }
        Some(MergeOutcome::KeptLocal) => println!("  Remote was empty, kept local notes"),
        Some(MergeOutcome::Rejected { len }) => {
            println!("  Ignored a {}-byte remote payload", len)
        }
        Some(MergeOutcome::DecodeFailed) => println!("  Ignored an unreadable remote payload"),
        None => {}
    }
    if let Some(imported) = &report.imported {
        println!("  Imported {} changed entities", imported.total());
    }
    if let Some(commit) = &report.commit {
        println!("  Commit: {}", short_commit(commit));
    }
    println!("✓ Sync complete");
}

fn short_commit(commit: &str) -> &str {
    commit.get(..7).unwrap_or(commit)
}

fn test_connection(ctx: &CliContext) -> CliResult<()> {
    let backend = ctx.effective_config().sync_backend()?;
    println!("Testing {} remote...", backend.kind());
    runtime()?.block_on(backend.test_connection())?;
    println!("✓ Connection OK");
    Ok(())
}

fn show_status(ctx: &CliContext) -> CliResult<()> {
    let config = ctx.effective_config();

    println!("Sync Status");
    println!("===========");
    println!();

    match &config.sync {
        Some(SyncConfig::Blob { url, .. }) => {
            println!("Backend: blob");
            println!("Server: {}", url);
        }
        Some(SyncConfig::Git {
            repo_url, branch, ..
        }) => {
            println!("Backend: git");
            println!("Repository: {} ({})", repo_url, branch);
            let repo_dir = config.repo_dir()?;
            if repo_dir.join(".git").exists() {
                println!("Working copy: {}", repo_dir.display());
            } else {
                println!("Working copy: (not cloned yet)");
            }
        }
        None => {
            println!("Backend: (not configured)");
            println!();
            println!("To start syncing, configure a remote:");
            println!("  kurumi config blob <url> --token <token>");
            println!("  kurumi config git <repo-url> --token <token>");
            return Ok(());
        }
    }
    println!(
        "Minimum interval for automatic syncs: {}s",
        config.min_sync_interval_secs
    );

    let status = ctx.load_sync_status();
    match status.last_synced_at {
        Some(at) => println!("Last sync: {}", format_millis(at)),
        None => println!("Last sync: never"),
    }
    if let Some(commit) = &status.last_commit {
        println!("Last commit: {}", short_commit(commit));
    }
    if let Some(error) = &status.error {
        println!("Last error: {}", error);
    }
    Ok(())
}
