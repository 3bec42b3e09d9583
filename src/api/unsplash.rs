use crate::ffmpeg;
use crate::{logi, logw};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

const RANDOM_PHOTO_URL: &str = "https://api.unsplash.com/photos/random";

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    regular: String,
}

#[derive(Debug, Deserialize)]
struct RandomPhoto {
    urls: PhotoUrls,
}

pub fn orientation_for(width: u32, height: u32) -> &'static str {
    if width >= height { "landscape" } else { "portrait" }
}

async fn download_photo(
    client: &Client,
    access_key: &str,
    topic: &str,
    orientation: &str,
    dest: &Path,
) -> Result<()> {
    let photo: RandomPhoto = client
        .get(RANDOM_PHOTO_URL)
        .query(&[
            ("query", topic),
            ("orientation", orientation),
            ("client_id", access_key),
        ])
        .timeout(Duration::from_secs(15))
        .send()
        .await
        .context("Unsplash request failed")?
        .error_for_status()
        .context("Unsplash returned an error status")?
        .json()
        .await
        .context("Unsplash response parse failed")?;

    let bytes = client
        .get(&photo.urls.regular)
        .timeout(Duration::from_secs(15))
        .send()
        .await
        .context("Photo download failed")?
        .error_for_status()?
        .bytes()
        .await
        .context("Photo read failed")?;

    fs::write(dest, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", dest.display()))?;
    Ok(())
}

/// Writes a `width`x`height` background for `topic` to `out_png`.
///
/// Returns `Ok(true)` for a fetched photo and `Ok(false)` when the solid
/// fallback was used instead.
pub async fn fetch_background(
    client: &Client,
    access_key: &str,
    topic: &str,
    width: u32,
    height: u32,
    out_png: &Path,
) -> Result<bool> {
    if access_key.is_empty() {
        logw("Unsplash key not set; using a solid background.");
        return solid(width, height, out_png).await;
    }

    let raw = out_png.with_extension("download.jpg");
    let fetched = match download_photo(client, access_key, topic, orientation_for(width, height), &raw).await {
        Ok(()) => ffmpeg::ffmpeg_fit_background(&raw, width, height, out_png)
            .await
            .unwrap_or(false),
        Err(err) => {
            logw(format!("Unsplash fetch failed: {:#}", err));
            false
        }
    };
    fs::remove_file(&raw).await.ok();

    if fetched {
        logi(format!("Background fetched for \"{}\"", topic));
        Ok(true)
    } else {
        solid(width, height, out_png).await
    }
}

async fn solid(width: u32, height: u32, out_png: &Path) -> Result<bool> {
    if !ffmpeg::ffmpeg_solid_background(width, height, out_png).await? {
        anyhow::bail!("Failed to write fallback background {}", out_png.display());
    }
    Ok(false)
}
