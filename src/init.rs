use crate::config::DirsConfig;
use crate::logi;
use anyhow::{Context, Result};
use tokio::fs;

pub async fn ensure_directories(dirs: &DirsConfig) -> Result<()> {
    for dir in [&dirs.input, &dirs.output, &dirs.temp] {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

pub async fn check_ffmpeg() -> bool {
    for tool in ["ffmpeg", "ffprobe"] {
        let ok = match tokio::process::Command::new(tool).arg("-version").output().await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        };
        if !ok {
            return false;
        }
    }
    true
}
