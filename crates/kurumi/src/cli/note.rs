//! Note command handlers

use kurumi_core::model::Note;
use kurumi_core::store::{NoteUpdate, views};
use kurumi_core::template::TemplateContext;
use kurumi_core::DocumentStore;

use crate::cli::args::NoteCommands;
use crate::cli::util::{
    CliContext, CliResult, format_millis, resolve_folder, resolve_note, resolve_template,
    resolve_vault,
};
use crate::editor;

pub fn handle_note_command(ctx: &CliContext, command: NoteCommands) -> CliResult<()> {
    ctx.with_store(|store| match command {
        NoteCommands::List { folder, tag, all } => list_notes(store, folder, tag, all),
        NoteCommands::Add {
            title,
            content,
            folder,
            template,
        } => add_note(store, &title, content, folder, template),
        NoteCommands::Show { note } => show_note(store, &note),
        NoteCommands::Edit {
            note,
            title,
            content,
            tags,
        } => edit_note(store, &note, title, content, tags),
        NoteCommands::Rm { note } => {
            let target = resolve_note(store, &note)?;
            store.delete_note(&target.id)?;
            println!("✓ Deleted '{}'", target.title);
            Ok(())
        }
        NoteCommands::Mv {
            note,
            folder,
            root,
            vault,
        } => move_note(store, &note, folder, root, vault),
        NoteCommands::Templates => {
            for template in store.templates() {
                println!("{}  ({})", template.name, template.id);
                if !template.description.is_empty() {
                    println!("    {}", template.description);
                }
            }
            Ok(())
        }
    })
}

fn print_note_line(note: &Note) {
    let tags = if note.tags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", note.tags.join(", "))
    };
    println!(
        "{}  {}  ({}){}",
        format_millis(note.modified),
        note.title,
        note.id,
        tags
    );
}

fn list_notes(
    store: &DocumentStore,
    folder: Option<String>,
    tag: Option<String>,
    all: bool,
) -> CliResult<()> {
    if all {
        for vault in store.vaults() {
            println!("{}", vault.name);
            for note in store.all_notes().iter().filter(|n| n.vault_id == vault.id) {
                print!("  ");
                print_note_line(note);
            }
        }
        return Ok(());
    }

    let mut notes = match folder {
        Some(query) => {
            let folder = resolve_folder(store, &query)?;
            store.notes_in_folder(Some(folder.id.as_str()))
        }
        None => store.notes(),
    };
    if let Some(tag) = tag {
        let tagged: Vec<String> =
            views::notes_by_tag(&store.snapshot(), store.current_vault_id(), &tag)
                .into_iter()
                .map(|n| n.id)
                .collect();
        notes.retain(|n| tagged.contains(&n.id));
    }

    if notes.is_empty() {
        println!("No notes.");
    }
    for note in &notes {
        print_note_line(note);
    }
    Ok(())
}

fn add_note(
    store: &mut DocumentStore,
    title: &str,
    content: Option<String>,
    folder: Option<String>,
    template: Option<String>,
) -> CliResult<()> {
    let folder = folder.map(|q| resolve_folder(store, &q)).transpose()?;
    let folder_id = folder.as_ref().map(|f| f.id.as_str());

    let note = match template {
        Some(query) => {
            let template = resolve_template(store, &query)?;
            let note = store.add_note_from_template(&template.id, title, TemplateContext::new())?;
            match folder_id {
                Some(_) => store.move_note_to_folder(&note.id, folder_id)?,
                None => note,
            }
        }
        None => store.add_note(title, content.as_deref().unwrap_or_default(), folder_id)?,
    };

    println!("✓ Created '{}' ({})", note.title, note.id);
    Ok(())
}

fn show_note(store: &DocumentStore, query: &str) -> CliResult<()> {
    let note = resolve_note(store, query)?;
    let snapshot = store.snapshot();

    println!("{}", note.title);
    println!("{}", "=".repeat(note.title.chars().count().max(1)));
    println!("Id: {}", note.id);
    if let Some(folder_id) = &note.folder_id {
        let path: Vec<String> = views::folder_path(&snapshot.folders, folder_id)
            .into_iter()
            .map(|f| f.name)
            .collect();
        println!("Folder: {}", path.join(" / "));
    }
    if !note.tags.is_empty() {
        println!("Tags: {}", note.tags.join(", "));
    }
    println!("Modified: {}", format_millis(note.modified));

    let backlinks = views::backlinks(&snapshot, &note.id);
    if !backlinks.is_empty() {
        let titles: Vec<&str> = backlinks.iter().map(|n| n.title.as_str()).collect();
        println!("Linked from: {}", titles.join(", "));
    }

    println!();
    println!("{}", note.content);
    Ok(())
}

fn edit_note(
    store: &mut DocumentStore,
    query: &str,
    title: Option<String>,
    content: Option<String>,
    tags: Vec<String>,
) -> CliResult<()> {
    let note = resolve_note(store, query)?;

    let mut update = NoteUpdate {
        title,
        content,
        tags: (!tags.is_empty()).then_some(tags),
    };
    if update.title.is_none() && update.content.is_none() && update.tags.is_none() {
        let edited = editor::edit_text(&note.id, &note.content)?;
        if edited == note.content {
            println!("No changes.");
            return Ok(());
        }
        update.content = Some(edited);
    }

    let updated = store.update_note(&note.id, update)?;
    println!("✓ Updated '{}'", updated.title);
    Ok(())
}

fn move_note(
    store: &mut DocumentStore,
    query: &str,
    folder: Option<String>,
    root: bool,
    vault: Option<String>,
) -> CliResult<()> {
    let note = resolve_note(store, query)?;

    if let Some(vault) = vault {
        let target = resolve_vault(store, &vault)?;
        store.move_note_to_vault(&note.id, &target.id)?;
        println!("✓ Moved '{}' to vault '{}'", note.title, target.name);
        return Ok(());
    }

    match folder {
        Some(query) => {
            let target = resolve_folder(store, &query)?;
            store.move_note_to_folder(&note.id, Some(target.id.as_str()))?;
            println!("✓ Moved '{}' to '{}'", note.title, target.name);
        }
        None if root => {
            store.move_note_to_folder(&note.id, None)?;
            println!("✓ Moved '{}' to the vault root", note.title);
        }
        None => {
            println!("Nothing to do: pass --folder, --root or --vault");
        }
    }
    Ok(())
}
