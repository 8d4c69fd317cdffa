//! Folder command handlers

use kurumi_core::DocumentStore;

use crate::cli::args::FolderCommands;
use crate::cli::util::{CliContext, CliResult, resolve_folder, resolve_vault};

pub fn handle_folder_command(ctx: &CliContext, command: FolderCommands) -> CliResult<()> {
    ctx.with_store(|store| {
        match command {
            FolderCommands::List => {
                let root_notes = store.notes_in_folder(None).len();
                println!(". ({} notes)", root_notes);
                print_tree(store, None, 1);
            }
            FolderCommands::Add { name, parent } => {
                let parent = parent.map(|q| resolve_folder(store, &q)).transpose()?;
                let folder = store.add_folder(&name, parent.as_ref().map(|p| p.id.as_str()))?;
                println!("✓ Created folder '{}' ({})", folder.name, folder.id);
            }
            FolderCommands::Rename { folder, name } => {
                let target = resolve_folder(store, &folder)?;
                let renamed = store.rename_folder(&target.id, &name)?;
                println!("✓ Renamed '{}' to '{}'", target.name, renamed.name);
            }
            FolderCommands::Rm { folder, recursive } => {
                let target = resolve_folder(store, &folder)?;
                store.delete_folder(&target.id, recursive)?;
                if recursive {
                    println!("✓ Deleted '{}' and everything inside it", target.name);
                } else {
                    println!("✓ Deleted '{}', its contents moved to the root", target.name);
                }
            }
            FolderCommands::Mv {
                folder,
                into,
                root,
                vault,
            } => {
                let target = resolve_folder(store, &folder)?;
                if let Some(vault) = vault {
                    let dest = resolve_vault(store, &vault)?;
                    store.move_folder_to_vault(&target.id, &dest.id)?;
                    println!("✓ Moved '{}' to vault '{}'", target.name, dest.name);
                } else if let Some(into) = into {
                    let parent = resolve_folder(store, &into)?;
                    store.move_folder_to_folder(&target.id, Some(parent.id.as_str()))?;
                    println!("✓ Moved '{}' into '{}'", target.name, parent.name);
                } else if root {
                    store.move_folder_to_folder(&target.id, None)?;
                    println!("✓ Moved '{}' to the root", target.name);
                } else {
                    println!("Nothing to do: pass --into, --root or --vault");
                }
            }
        }
        Ok(())
    })
}

/// Merged edits can leave a parent cycle behind; stop descending here.
const MAX_DEPTH: usize = 64;

fn print_tree(store: &DocumentStore, parent: Option<&str>, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }
    for folder in store.subfolders(parent) {
        let notes = store.notes_in_folder(Some(folder.id.as_str())).len();
        println!(
            "{}{}/ ({} notes, {})",
            "  ".repeat(depth),
            folder.name,
            notes,
            folder.id
        );
        print_tree(store, Some(folder.id.as_str()), depth + 1);
    }
}
