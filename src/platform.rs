use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

fn opener() -> &'static str {
    if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

/// Hands `path` to the desktop's default application (media player, file manager).
pub fn open_path<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        anyhow::bail!("Nothing to open");
    }
    if !path.exists() {
        anyhow::bail!("{} does not exist", path.display());
    }

    Command::new(opener())
        .arg(path)
        .spawn()
        .with_context(|| format!("Failed to open {} with {}", path.display(), opener()))?;
    Ok(())
}
