//! Vault command handlers

use crate::cli::args::VaultCommands;
use crate::cli::util::{CliContext, CliResult, resolve_vault};

pub fn handle_vault_command(ctx: &CliContext, command: VaultCommands) -> CliResult<()> {
    ctx.with_store(|store| {
        match command {
            VaultCommands::List => {
                let current = store.current_vault_id().to_string();
                for vault in store.vaults() {
                    let marker = if vault.id == current { "*" } else { " " };
                    let icon = vault.icon.as_deref().map(|i| format!("{} ", i)).unwrap_or_default();
                    println!("{} {}{}  ({})", marker, icon, vault.name, vault.id);
                }
            }
            VaultCommands::Add { name, icon, switch } => {
                let vault = store.add_vault(&name, icon);
                println!("✓ Created vault '{}' ({})", vault.name, vault.id);
                if switch {
                    store.set_current_vault(&vault.id)?;
                    println!("✓ Switched to '{}'", vault.name);
                }
            }
            VaultCommands::Rename { vault, name } => {
                let target = resolve_vault(store, &vault)?;
                let renamed = store.update_vault(&target.id, Some(&name), None)?;
                println!("✓ Renamed '{}' to '{}'", target.name, renamed.name);
            }
            VaultCommands::Remove { vault } => {
                let target = resolve_vault(store, &vault)?;
                store.delete_vault(&target.id)?;
                println!("✓ Deleted vault '{}'", target.name);
            }
            VaultCommands::Switch { vault } => {
                let target = resolve_vault(store, &vault)?;
                store.set_current_vault(&target.id)?;
                println!("✓ Switched to '{}'", target.name);
            }
        }
        Ok(())
    })
}
