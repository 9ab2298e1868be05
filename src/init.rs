use crate::config::Paths;
use crate::logi;
use anyhow::{Context, Result};
use tokio::fs;

/// Creates every working directory that does not exist yet.
pub async fn ensure_directories(paths: &Paths) -> Result<()> {
    for dir in paths.directories() {
        if !fs::try_exists(dir).await.unwrap_or(false) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create dir {}", dir.display()))?;
            logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

pub async fn check_tool(name: &str) -> bool {
    match tokio::process::Command::new(name)
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

pub async fn check_ffmpeg() -> bool {
    check_tool("ffmpeg").await && check_tool("ffprobe").await
}
