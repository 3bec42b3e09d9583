//! Cover image for a finished video: the blurred background, a glass panel
//! with a `scene|phrase` caption and a small "Lesson" badge in the corner.

use crate::api::openai;
use crate::caption::measure::font_path;
use crate::caption::{CaptionLayout, ScriptClass};
use crate::chunk_builder;
use crate::compose::{self, FilterScript};
use crate::config::{CaptionConfig, Config, FontPaths, RenderSettings, SpeakerStyle, WrapChars};
use crate::dialogue;
use crate::ffmpeg;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use tokio::fs;

const SCENE_MAX_CHARS: usize = 22;
const PHRASE_MAX_CHARS: usize = 24;
const BADGE_TEXT: &str = "Lesson";
const BADGE_SIZE: u32 = 64;
const BADGE_POS: u32 = 36;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailCaption {
    pub scene: String,
    pub phrase: String,
}

impl ThumbnailCaption {
    /// Topic alone, used when no caption could be generated.
    pub fn from_topic(topic: &str) -> Self {
        Self {
            scene: topic.trim().chars().take(SCENE_MAX_CHARS).collect(),
            phrase: String::new(),
        }
    }
}

/// Reads `scene|phrase`. A reply without `|` is split near its middle.
pub fn parse_caption(raw: &str) -> Option<ThumbnailCaption> {
    let parts: Vec<&str> = raw
        .trim()
        .split('|')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let (scene, phrase) = match parts.as_slice() {
        [] => return None,
        [single] => {
            let chars: Vec<char> = single.chars().collect();
            let mid = (chars.len() / 2).clamp(1, 16).min(chars.len());
            let scene: String = chars[..mid].iter().collect();
            let phrase: String = chars[mid..].iter().collect();
            (scene.trim().to_string(), phrase.trim().to_string())
        }
        [scene, phrase, ..] => (scene.to_string(), phrase.to_string()),
    };

    Some(ThumbnailCaption {
        scene: scene.chars().take(SCENE_MAX_CHARS).collect(),
        phrase: phrase.chars().take(PHRASE_MAX_CHARS).collect(),
    })
}

/// Caption geometry for the cover: bigger type, roomier padding, no speaker.
pub fn thumbnail_caption_config(base: &CaptionConfig) -> CaptionConfig {
    CaptionConfig {
        font_size_primary: 132,
        font_size_secondary: 92,
        min_font_size_primary: 64,
        min_font_size_secondary: 48,
        pad_x: 68,
        pad_y: 48,
        line_gap: 16,
        max_block_height_ratio: 0.45,
        speaker_style: SpeakerStyle::Hidden,
        box_opacity: 0.32,
        wrap_chars: WrapChars {
            latin: 12,
            cjk: 8,
            hangul: 9,
        },
        ..base.clone()
    }
}

/// Smallest rectangle `(x, y, w, h)` around every row of the layout.
fn panel_rect(layout: &CaptionLayout) -> (u32, u32, u32, u32) {
    let left = layout.boxes.iter().map(|b| b.box_x).min().unwrap_or(0);
    let right = layout
        .boxes
        .iter()
        .map(|b| b.box_x + b.box_width)
        .max()
        .unwrap_or(left);
    (left, layout.block_origin_y, right - left, layout.block_height)
}

pub fn build_thumbnail_graph(
    layout: &CaptionLayout,
    badge: &str,
    caption: &CaptionConfig,
    fonts: &FontPaths,
    text_dir: &Path,
) -> FilterScript {
    let (w, h) = (caption.frame_width, caption.frame_height);
    let (px, py, pw, ph) = panel_rect(layout);
    let mut filters = vec![
        format!("[0:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1"),
        "gblur=sigma=2".to_string(),
        "drawbox=x=0:y=0:w=iw:h=ih:color=black@0.35:t=fill".to_string(),
        format!(
            "drawbox=x={px}:y={py}:w={pw}:h={ph}:color=white@{:.2}:t=fill",
            caption.box_opacity
        ),
        format!("drawbox=x={px}:y={py}:w={pw}:h={ph}:color=white@0.51:t=2"),
    ];
    let mut text_files = Vec::new();

    for b in &layout.boxes {
        let font = font_path(fonts, b.script);
        for (line_idx, line) in b.lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let file = text_dir.join(format!("thumb_{:?}_{:02}.txt", b.kind, line_idx).to_lowercase());
            filters.push(compose::drawtext(font, &file, b, line_idx, "enable=1"));
            text_files.push((file, line.clone()));
        }
    }

    let badge_file = text_dir.join("thumb_badge.txt");
    filters.push(format!(
        "drawtext=fontfile={}:textfile={}:expansion=none:fontsize={}:fontcolor=white:borderw=3:bordercolor=black:x={}:y={}",
        compose::quote_path(font_path(fonts, ScriptClass::detect(badge))),
        compose::quote_path(&badge_file),
        BADGE_SIZE,
        BADGE_POS,
        BADGE_POS
    ));
    text_files.push((badge_file, badge.to_string()));
    filters.push("format=yuvj420p".to_string());

    let mut graph = filters.join(",");
    graph.push_str("[v]");
    FilterScript { graph, text_files }
}

/// Writes `out_jpg` for `topic`, with the caption and badge in `lang`.
pub async fn make_thumbnail(
    client: &Client,
    cfg: &Config,
    topic: &str,
    lang: &str,
    background: &Path,
    out_jpg: &Path,
) -> Result<bool> {
    let caption = match openai::thumbnail_caption(client, cfg, topic, lang).await {
        Ok(raw) => parse_caption(&raw).unwrap_or_else(|| ThumbnailCaption::from_topic(topic)),
        Err(err) => {
            logw(format!("Thumbnail caption failed: {:#}; using the topic", err));
            ThumbnailCaption::from_topic(topic)
        }
    };
    logi(format!("Thumbnail caption: {}|{}", caption.scene, caption.phrase));

    let badge = openai::translate(client, cfg, BADGE_TEXT, lang).await;
    let badge = if dialogue::is_placeholder(&badge) { BADGE_TEXT.to_string() } else { badge };

    let settings = RenderSettings {
        render: cfg.render.clone(),
        fonts: cfg.fonts.clone(),
    };
    let geometry = thumbnail_caption_config(&cfg.render.caption);
    let fitter = chunk_builder::make_fitter_for(geometry, &settings)?;
    let sizes = fitter.config();
    let layout = fitter.fit(
        &caption.scene,
        Some(caption.phrase.as_str()),
        None,
        sizes.font_size_primary,
        sizes.font_size_secondary,
    );

    let work = tempfile::Builder::new()
        .prefix("thumb_")
        .tempdir()
        .context("Failed to create thumbnail work dir")?;
    let script = build_thumbnail_graph(&layout, &badge, fitter.config(), &settings.fonts, work.path());
    let graph_path = compose::write_script(&script, work.path(), out_jpg).await?;

    if let Some(parent) = out_jpg.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }
    let made = ffmpeg::ffmpeg_render_still(background, &graph_path, out_jpg).await?;
    if made {
        logok(format!("Thumbnail saved: {}", out_jpg.display()));
    }
    Ok(made)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::{CaptionFitter, HeuristicMeasurer, RowKind};
    use std::path::PathBuf;

    #[test]
    fn splits_scene_and_phrase() {
        assert_eq!(
            parse_caption(" Hotel | Check-in made easy \n"),
            Some(ThumbnailCaption {
                scene: "Hotel".into(),
                phrase: "Check-in made easy".into(),
            })
        );
        assert_eq!(parse_caption("  |  "), None);
    }

    #[test]
    fn single_part_is_split_near_the_middle() {
        let caption = parse_caption("空港でのチェックイン").unwrap();
        assert_eq!(caption.scene, "空港でのチ");
        assert_eq!(caption.phrase, "ェックイン");

        let long = parse_caption(&"a".repeat(60)).unwrap();
        assert_eq!(long.scene.chars().count(), 16);
        assert_eq!(long.phrase.chars().count(), PHRASE_MAX_CHARS);
    }

    #[test]
    fn parts_are_capped() {
        let caption = parse_caption(&format!("{}|{}", "s".repeat(40), "p".repeat(40))).unwrap();
        assert_eq!(caption.scene.chars().count(), SCENE_MAX_CHARS);
        assert_eq!(caption.phrase.chars().count(), PHRASE_MAX_CHARS);
    }

    #[test]
    fn topic_fallback_has_no_phrase() {
        let caption = ThumbnailCaption::from_topic("  ordering coffee at a busy cafe downtown ");
        assert_eq!(caption.scene.chars().count(), SCENE_MAX_CHARS);
        assert!(caption.phrase.is_empty());
    }

    #[test]
    fn cover_geometry_is_valid_for_both_frames() {
        for base in [CaptionConfig::default(), CaptionConfig::landscape()] {
            let cover = thumbnail_caption_config(&base);
            assert!(cover.validate().is_ok());
            assert_eq!(cover.frame_width, base.frame_width);
        }
    }

    #[test]
    fn graph_draws_panel_caption_and_badge() {
        let cover = thumbnail_caption_config(&CaptionConfig::default());
        let fitter = CaptionFitter::new(cover.clone(), HeuristicMeasurer::default()).unwrap();
        let layout = fitter.fit("Hotel", Some("チェックイン"), None, 132, 92);
        assert!(layout.fits);
        assert_contained_in_frame(&layout, &cover);

        let dir = PathBuf::from("/tmp/thumb");
        let script = build_thumbnail_graph(&layout, "レッスン", &cover, &FontPaths::default(), &dir);

        assert!(script.graph.starts_with("[0:v]scale=1080:1920"));
        assert!(script.graph.contains("gblur=sigma=2"));
        assert!(script.graph.contains("color=white@0.32:t=fill"));
        assert!(script.graph.contains(":x=36:y=36"));
        assert!(script.graph.ends_with("format=yuvj420p[v]"));
        assert_eq!(script.graph.matches("drawtext=").count(), script.text_files.len());
        assert!(script.text_files.iter().any(|(_, t)| t == "Hotel"));
        assert!(script.text_files.iter().any(|(_, t)| t == "レッスン"));
        assert!(layout.boxes.iter().any(|b| b.kind == RowKind::Secondary));
    }

    #[test]
    fn panel_encloses_every_row() {
        let cover = thumbnail_caption_config(&CaptionConfig::default());
        let fitter = CaptionFitter::new(cover, HeuristicMeasurer::default()).unwrap();
        let layout = fitter.fit("At Work", Some("Asking for a day off"), None, 132, 92);

        let (x, y, w, h) = panel_rect(&layout);
        for b in &layout.boxes {
            assert!(b.box_x >= x && b.box_x + b.box_width <= x + w);
            assert!(b.box_y >= y && b.box_y + b.box_height <= y + h);
        }
    }

    fn assert_contained_in_frame(layout: &CaptionLayout, cfg: &CaptionConfig) {
        assert!(layout.block_bottom() <= cfg.bottom_limit());
    }
}
