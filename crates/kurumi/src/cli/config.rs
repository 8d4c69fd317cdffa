//! Config command handlers

use kurumi_core::config::SyncConfig;

use crate::cli::args::ConfigCommands;
use crate::cli::util::{CliContext, CliResult, mask_secret};

pub fn handle_config_command(mut ctx: CliContext, command: Option<ConfigCommands>) -> CliResult<()> {
    match command {
        None | Some(ConfigCommands::Show) => show_config(&ctx),
        Some(ConfigCommands::Blob { url, token }) => {
            let sync = SyncConfig::blob(url.trim(), token);
            sync.validate()?;
            ctx.config.sync = Some(sync);
            ctx.save_config()?;
            println!("✓ Sync set to blob server {}", url.trim());
            Ok(())
        }
        Some(ConfigCommands::Git {
            repo_url,
            token,
            provider,
            branch,
            author_name,
            author_email,
            cors_proxy,
        }) => {
            let mut sync = SyncConfig::git(&repo_url, token);
            if let SyncConfig::Git {
                provider: detected,
                branch: current_branch,
                author_name: current_name,
                author_email: current_email,
                cors_proxy: current_proxy,
                ..
            } = &mut sync
            {
                if provider.is_some() {
                    *detected = provider;
                }
                if let Some(branch) = branch {
                    *current_branch = branch;
                }
                if let Some(name) = author_name {
                    *current_name = name;
                }
                if let Some(email) = author_email {
                    *current_email = email;
                }
                *current_proxy = cors_proxy;
            }
            sync.validate()?;

            let summary = match &sync {
                SyncConfig::Git {
                    repo_url, branch, ..
                } => format!("{} ({})", repo_url, branch),
                SyncConfig::Blob { url, .. } => url.clone(),
            };
            ctx.config.sync = Some(sync);
            ctx.save_config()?;
            println!("✓ Sync set to git repository {}", summary);
            Ok(())
        }
        Some(ConfigCommands::Interval { secs }) => {
            ctx.config.min_sync_interval_secs = secs;
            ctx.save_config()?;
            println!("✓ Automatic syncs at most every {}s", secs);
            Ok(())
        }
        Some(ConfigCommands::Clear) => {
            ctx.config.sync = None;
            ctx.save_config()?;
            println!("✓ Sync settings removed");
            Ok(())
        }
    }
}

fn show_config(ctx: &CliContext) -> CliResult<()> {
    let config = ctx.effective_config();

    println!("Kurumi Configuration");
    println!("====================");
    println!("Config file: {}", ctx.config_path.display());
    println!("Data directory: {}", config.data_dir()?.display());
    println!("Database: {}", config.database_path()?.display());
    println!("Minimum sync interval: {}s", config.min_sync_interval_secs);

    match &config.sync {
        None => println!("Sync: (not configured)"),
        Some(SyncConfig::Blob { url, token }) => {
            println!("Sync: blob");
            println!("  URL: {}", url);
            println!("  Token: {}", mask_secret(token));
        }
        Some(SyncConfig::Git {
            provider,
            repo_url,
            branch,
            token,
            author_name,
            author_email,
            cors_proxy,
        }) => {
            println!("Sync: git");
            if let Some(provider) = provider {
                println!("  Provider: {}", provider);
            }
            println!("  Repository: {}", repo_url);
            println!("  Branch: {}", branch);
            println!("  Token: {}", mask_secret(token));
            println!("  Author: {} <{}>", author_name, author_email);
            if let Some(proxy) = cors_proxy {
                println!("  Relay: {}", proxy);
            }
            println!("  Working copy: {}", config.repo_dir()?.display());
        }
    }
    Ok(())
}
