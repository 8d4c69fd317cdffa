//! `export` and `import` command handlers

use std::io::Write;
use std::path::Path;

use kurumi_core::KurumiError;
use kurumi_core::store::ConflictPolicy;

use crate::cli::util::{CliContext, CliResult};

pub fn handle_export(ctx: &CliContext, file: &Path) -> CliResult<()> {
    let json = ctx.with_store(|store| Ok(store.export_json()?))?;

    if file == Path::new("-") {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(json.as_bytes())
            .and_then(|_| stdout.write_all(b"\n"))
            .map_err(KurumiError::from)?;
        return Ok(());
    }

    std::fs::write(file, json).map_err(|source| KurumiError::FileWrite {
        path: file.to_path_buf(),
        source,
    })?;
    eprintln!("✓ Exported to {}", file.display());
    Ok(())
}

pub fn handle_import(
    ctx: &CliContext,
    file: &Path,
    policy: ConflictPolicy,
    dry_run: bool,
) -> CliResult<()> {
    let json = std::fs::read_to_string(file).map_err(|source| KurumiError::FileRead {
        path: file.to_path_buf(),
        source,
    })?;

    ctx.with_store(|store| {
        let analysis = store.analyze_import(&json)?;
        println!(
            "{} new vaults, {} folders, {} notes",
            analysis.new_vaults.len(),
            analysis.total_folders,
            analysis.total_notes
        );
        for conflict in &analysis.vault_conflicts {
            println!(
                "  Vault '{}' already exists as '{}' ({})",
                conflict.imported_vault.name, conflict.existing_vault.name, policy
            );
        }
        if dry_run {
            println!("Dry run: nothing imported");
            return Ok(());
        }

        let summary = store.import_json(&json, policy)?;
        println!(
            "✓ Imported {} vaults, {} folders, {} notes, {} people, {} events, {} templates",
            summary.vaults,
            summary.folders,
            summary.notes,
            summary.people,
            summary.events,
            summary.templates
        );
        Ok(())
    })
}
