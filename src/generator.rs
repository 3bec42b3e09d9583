use crate::api::{self, openai, unsplash};
use crate::chunk_builder::{self, FontSizes};
use crate::config::{Combo, Config, RenderSettings};
use crate::dialogue::{self, DialogueLine};
use crate::ffmpeg;
use crate::speech::SpeechSynthesizer;
use crate::thumbnail;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// Knobs given on the command line for one generation run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub topic: String,
    pub turns: u32,
    pub font_size_top: Option<u32>,
    pub font_size_bottom: Option<u32>,
    pub chunk_size: Option<usize>,
}

async fn dir_exists(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

async fn ensure_dir(path: &Path) -> Result<()> {
    if !dir_exists(path).await {
        fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create dir {}", path.display()))?;
    }
    Ok(())
}

async fn clear_directory_contents(dir_path: &Path) -> Result<bool> {
    if !dir_exists(dir_path).await {
        return Ok(true);
    }

    let mut clean = true;
    for entry in WalkDir::new(dir_path).min_depth(1).contents_first(true) {
        let entry = entry?;
        let path = entry.path();
        let removed = if entry.file_type().is_dir() {
            fs::remove_dir(path).await
        } else {
            fs::remove_file(path).await
        };
        clean &= removed.is_ok();
    }

    Ok(clean)
}

async fn reset_temp(temp: &Path) -> Result<()> {
    if !clear_directory_contents(temp).await? {
        logw(format!("Failed to fully clear {} (continuing anyway).", temp.display()));
    }
    ensure_dir(temp).await
}

/// `{audio}-{subs joined by _}_{stamp}.mp4`
pub fn output_file_name(combo: &Combo, stamp: &str) -> String {
    format!("{}-{}_{}.mp4", combo.audio, combo.subs.join("_"), stamp)
}

/// The cover speaks the second subtitle language, else the audio language.
fn thumbnail_language(combo: &Combo) -> &str {
    combo.subs.get(1).unwrap_or(&combo.audio)
}

/// Subtitle rows for one spoken line, in `combo.subs` order.
async fn subtitle_rows(client: &Client, cfg: &Config, combo: &Combo, spoken: &str) -> Vec<String> {
    let mut rows = Vec::with_capacity(combo.subs.len());
    for lang in &combo.subs {
        if *lang == combo.audio {
            rows.push(spoken.to_string());
        } else {
            rows.push(openai::translate(client, cfg, spoken, lang).await);
        }
    }
    rows
}

/// Builds the rendered line. A placeholder in the top row would drop the
/// line at render time while its audio stays in the track, so the spoken
/// text stands in for it.
fn line_from_rows(speaker: &str, spoken: &str, rows: Vec<String>, duration: f64) -> DialogueLine {
    let mut rows = rows.into_iter();
    let primary = match rows.next() {
        Some(top) if !dialogue::is_placeholder(&top) => top,
        _ => spoken.to_string(),
    };
    DialogueLine::new(speaker, primary, rows.next(), duration)
}

fn render_settings(cfg: &Config, opts: &RunOptions) -> (RenderSettings, FontSizes) {
    let mut render = cfg.render.clone();
    if let Some(chunk) = opts.chunk_size {
        render.chunk_size = chunk;
    }
    let sizes = FontSizes {
        primary: opts.font_size_top.unwrap_or(render.caption.font_size_primary),
        secondary: opts.font_size_bottom.unwrap_or(render.caption.font_size_secondary),
    };
    let settings = RenderSettings {
        render,
        fonts: cfg.fonts.clone(),
    };
    (settings, sizes)
}

pub async fn run_one(
    cfg: &Config,
    client: &Client,
    synth: &dyn SpeechSynthesizer,
    opts: &RunOptions,
    combo: &Combo,
) -> Result<Option<PathBuf>> {
    let temp = cfg.dirs.temp.as_path();
    reset_temp(temp).await?;

    if combo.subs.len() > 2 {
        logw(format!(
            "Combo {}: only the first two subtitle rows are drawn ({} given)",
            combo.audio,
            combo.subs.len()
        ));
    }

    let script = openai::make_dialogue(client, cfg, &opts.topic, &combo.audio, opts.turns).await?;

    let mut parts = Vec::with_capacity(script.len());
    let mut lines = Vec::with_capacity(script.len());
    for (i, (speaker, spoken)) in script.iter().enumerate() {
        let mp3 = temp.join(format!("{:02}.mp3", i + 1));
        match synth.synthesize(&combo.audio, speaker, spoken, &mp3).await {
            Ok(true) => {}
            Ok(false) => {
                logw(format!("TTS produced nothing for line {}; skipped", i + 1));
                continue;
            }
            Err(err) => {
                logw(format!("TTS failed for line {}: {:#}; skipped", i + 1, err));
                continue;
            }
        }

        let duration = match ffmpeg::ffprobe_duration_seconds(&mp3).await {
            Ok(d) => d,
            Err(err) => {
                logw(format!("Could not measure line {}: {:#}; skipped", i + 1, err));
                continue;
            }
        };

        let rows = subtitle_rows(client, cfg, combo, spoken).await;
        lines.push(line_from_rows(speaker, spoken, rows, duration));
        parts.push(mp3);
    }

    if lines.is_empty() {
        logw(format!("Combo {}: no line was synthesized", combo.audio));
        return Ok(None);
    }
    logok(format!("Synthesized {}/{} lines", lines.len(), script.len()));

    let list_txt = temp.join("audio_list.txt");
    let full_raw = temp.join("full_raw.mp3");
    let full = temp.join("full.mp3");
    ffmpeg::write_concat_list(&list_txt, &parts).await?;
    if !ffmpeg::ffmpeg_concat_audio(&list_txt, &full_raw).await? {
        anyhow::bail!("Audio concat failed: {}", full_raw.display());
    }
    if !ffmpeg::ffmpeg_enhance_voice(&full_raw, &full).await? {
        anyhow::bail!("Voice enhancement failed: {}", full.display());
    }

    let caption = &cfg.render.caption;
    let bg = temp.join("bg.png");
    unsplash::fetch_background(
        client,
        &cfg.unsplash_access_key,
        &opts.topic,
        caption.frame_width,
        caption.frame_height,
        &bg,
    )
    .await?;

    dialogue::save_lines_file(temp.join("lines.json"), &lines).await?;

    ensure_dir(&cfg.dirs.output).await?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let out = cfg.dirs.output.join(output_file_name(combo, &stamp));

    let thumb = out.with_extension("jpg");
    let thumb_lang = thumbnail_language(combo);
    match thumbnail::make_thumbnail(client, cfg, &opts.topic, thumb_lang, &bg, &thumb).await {
        Ok(true) => {}
        Ok(false) => logw("Thumbnail was not produced"),
        Err(err) => logw(format!("Thumbnail failed: {:#}", err)),
    }

    let (settings, sizes) = render_settings(cfg, opts);
    let made = chunk_builder::build_chunked_video(lines, &full, &bg, &out, &settings, sizes).await?;
    Ok(made.then_some(out))
}

/// Runs every configured combo; returns how many videos were written.
pub async fn run_all(cfg: &Config, opts: &RunOptions) -> Result<usize> {
    let client = Client::builder()
        .cookie_store(true)
        .build()
        .context("Failed to build HTTP client")?;
    let synth = api::synthesizer_for(&client, cfg);

    let mut produced = 0;
    for combo in &cfg.combos {
        logi(format!(
            "=== {} | audio {} | subs {} ===",
            opts.topic,
            combo.audio,
            combo.subs.join(",")
        ));
        match run_one(cfg, &client, synth.as_ref(), opts, combo).await {
            Ok(Some(out)) => {
                produced += 1;
                logok(format!("Video saved: {}", out.display()));
            }
            Ok(None) => logw(format!("FAILED: combo {}", combo.audio)),
            Err(err) => logw(format!("FAILED: combo {}: {:#}", combo.audio, err)),
        }
    }

    logi(format!("All done. Produced: {}", produced));
    Ok(produced)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combo() -> Combo {
        Combo {
            audio: "en".to_string(),
            subs: vec!["en".to_string(), "ja".to_string()],
        }
    }

    #[test]
    fn output_name_lists_languages() {
        assert_eq!(
            output_file_name(&combo(), "20250101_120000"),
            "en-en_ja_20250101_120000.mp4"
        );
    }

    #[test]
    fn thumbnail_uses_second_subtitle_language() {
        assert_eq!(thumbnail_language(&combo()), "ja");
        let single = Combo {
            audio: "pt".to_string(),
            subs: vec!["pt".to_string()],
        };
        assert_eq!(thumbnail_language(&single), "pt");
    }

    #[test]
    fn placeholder_top_row_falls_back_to_speech() {
        let line = line_from_rows(
            "Bob",
            "See you!",
            vec!["[PT unavailable]".into(), "またね".into()],
            1.2,
        );
        assert_eq!(line.text_primary, "See you!");
        assert_eq!(line.secondary(), Some("またね"));

        let single = line_from_rows("Alice", "Hi", vec!["Hi".into()], 0.8);
        assert_eq!(single.text_secondary, None);
    }

    #[test]
    fn cli_overrides_render_settings() {
        let cfg = Config::from_json(r#"{"openai_api_key": "sk-test"}"#).unwrap();
        let opts = RunOptions {
            topic: "coffee".into(),
            turns: 4,
            font_size_top: Some(70),
            font_size_bottom: None,
            chunk_size: Some(10),
        };
        let (settings, sizes) = render_settings(&cfg, &opts);
        assert_eq!(settings.render.chunk_size, 10);
        assert_eq!(sizes, FontSizes { primary: 70, secondary: 74 });
    }

    #[tokio::test]
    async fn clearing_temp_keeps_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let temp = dir.path().join("temp");
        fs::create_dir_all(temp.join("nested")).await.unwrap();
        fs::write(temp.join("a.mp3"), b"x").await.unwrap();
        fs::write(temp.join("nested/b.txt"), b"y").await.unwrap();

        reset_temp(&temp).await.unwrap();
        assert!(dir_exists(&temp).await);
        let mut entries = fs::read_dir(&temp).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }
}
