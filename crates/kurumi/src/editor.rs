use std::path::Path;
use std::process::Command;

use kurumi_core::KurumiError;

use crate::cli::CliError;

/// Edit `text` in the user's editor through a scratch file named after `id`.
pub fn edit_text(id: &str, text: &str) -> Result<String, CliError> {
    let path = std::env::temp_dir().join(format!("kurumi-{}.md", id));
    std::fs::write(&path, text).map_err(|source| KurumiError::FileWrite {
        path: path.clone(),
        source,
    })?;

    let result = launch_editor(&path).and_then(|()| {
        std::fs::read_to_string(&path).map_err(|source| {
            KurumiError::FileRead {
                path: path.clone(),
                source,
            }
            .into()
        })
    });
    if let Err(e) = std::fs::remove_file(&path) {
        log::debug!("Could not remove {}: {}", path.display(), e);
    }
    result
}

/// Launch an editor to open a file
fn launch_editor(path: &Path) -> Result<(), CliError> {
    let editor = determine_editor().ok_or_else(|| CliError::Editor {
        editor: String::new(),
        message: "no editor found, set $EDITOR".to_string(),
    })?;

    let status = Command::new(&editor)
        .arg(path)
        .status()
        .map_err(|e| CliError::Editor {
            editor: editor.clone(),
            message: e.to_string(),
        })?;

    if !status.success() {
        return Err(CliError::Editor {
            editor,
            message: format!("exited with code {}", status.code().unwrap_or(-1)),
        });
    }
    Ok(())
}

/// Determine which editor to use
fn determine_editor() -> Option<String> {
    for var in ["VISUAL", "EDITOR"] {
        if let Ok(editor) = std::env::var(var)
            && !editor.trim().is_empty()
        {
            return Some(editor);
        }
    }

    #[cfg(target_os = "windows")]
    {
        Some("notepad.exe".to_string())
    }

    #[cfg(not(target_os = "windows"))]
    {
        ["nano", "vim", "vi"]
            .into_iter()
            .find(|editor| which(editor))
            .map(str::to_string)
    }
}

/// Check if a command exists in PATH
#[cfg(not(target_os = "windows"))]
fn which(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
