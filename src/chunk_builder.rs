//! Renders a full dialogue as independently encoded chunks, then stitches
//! them together with the concat demuxer.

use crate::caption::measure::ensure_fonts_present;
use crate::caption::{
    CaptionFitter, CaptionLayout, CaptionRequest, FontSet, GlyphMeasurer, HeuristicMeasurer,
};
use crate::compose::{self, CaptionCue};
use crate::config::{CaptionConfig, MeasureMode, RenderSettings};
use crate::dialogue::{self, DialogueLine};
use crate::error::ShortsError;
use crate::ffmpeg;
use crate::timeline::{self, AudioSlice, TimelineChunk};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Font sizes requested for the two subtitle rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontSizes {
    pub primary: u32,
    pub secondary: u32,
}

impl FontSizes {
    pub fn from_settings(settings: &RenderSettings) -> Self {
        Self {
            primary: settings.render.caption.font_size_primary,
            secondary: settings.render.caption.font_size_secondary,
        }
    }
}

/// Builds the session fitter. Missing or broken fonts fail here, before any
/// rendering starts.
pub fn make_fitter(settings: &RenderSettings) -> Result<CaptionFitter> {
    make_fitter_for(settings.render.caption.clone(), settings)
}

/// Same as [`make_fitter`] with different caption geometry.
pub fn make_fitter_for(caption: CaptionConfig, settings: &RenderSettings) -> Result<CaptionFitter> {
    let fitter = match settings.render.measure {
        MeasureMode::Glyph => {
            let fonts = FontSet::load(&settings.fonts)?;
            CaptionFitter::new(caption, GlyphMeasurer::new(fonts))?
        }
        MeasureMode::Heuristic => {
            ensure_fonts_present(&settings.fonts)?;
            CaptionFitter::new(caption, HeuristicMeasurer::default())?
        }
    };
    Ok(fitter)
}

fn chunk_slice(master: f64, chunk: &TimelineChunk) -> Result<AudioSlice> {
    match timeline::slice_audio(master, chunk) {
        Ok(slice) => Ok(slice),
        Err(err @ ShortsError::Range { .. }) => {
            logw(format!("{err}; clamping to the end of the track"));
            Ok(AudioSlice {
                offset: chunk.start_offset,
                length: chunk.duration(),
            }
            .clamped_to(master))
        }
        Err(err) => Err(err.into()),
    }
}

/// Warnings for layouts that fell back to floor sizes or reach into the top
/// safe margin. Line numbers are 1-based across the whole dialogue.
fn layout_warnings(
    chunk: &TimelineChunk,
    layouts: &[CaptionLayout],
    caption: &CaptionConfig,
) -> Vec<String> {
    let top = caption.top_safe_margin;
    let mut warnings = Vec::new();
    for (offset, layout) in layouts.iter().enumerate() {
        let line_no = chunk.first_line + offset + 1;
        if !layout.fits {
            warnings.push(format!(
                "Line {}: caption does not fit, rendered at floor sizes {}/{}{}",
                line_no,
                layout.font_size_primary,
                layout.font_size_secondary,
                if layout.truncated { " (truncated)" } else { "" }
            ));
        }
        if layout.block_origin_y < top {
            warnings.push(format!(
                "Line {}: caption block starts at y={} inside the top safe margin ({})",
                line_no, layout.block_origin_y, top
            ));
        }
    }
    warnings
}

/// The pre-fitted background when ffmpeg produced it, else the original.
fn pick_background(fit: Result<bool>, fitted: PathBuf, original: &Path) -> (PathBuf, Option<String>) {
    match fit {
        Ok(true) => (fitted, None),
        Ok(false) => (
            original.to_path_buf(),
            Some(format!("Could not pre-fit {}; using it as is", original.display())),
        ),
        Err(err) => (
            original.to_path_buf(),
            Some(format!(
                "Could not pre-fit {}: {:#}; using it as is",
                original.display(),
                err
            )),
        ),
    }
}

struct ChunkRun<'a> {
    fitter: &'a CaptionFitter,
    settings: &'a RenderSettings,
    sizes: FontSizes,
    full_audio: &'a Path,
    background: &'a Path,
    work_dir: &'a Path,
}

async fn render_one_chunk(
    run: &ChunkRun<'_>,
    chunk: &TimelineChunk,
    slice: AudioSlice,
) -> Result<Option<PathBuf>> {
    let ChunkRun {
        fitter,
        settings,
        sizes,
        full_audio,
        background,
        work_dir,
    } = *run;
    let part_audio = work_dir.join(format!("part_{:02}.m4a", chunk.index));
    let part_video = work_dir.join(format!("part_{:02}.mp4", chunk.index));

    if !ffmpeg::ffmpeg_trim_audio(full_audio, slice.offset, slice.length, &part_audio).await? {
        logw(format!("Audio slice {} was not produced", chunk.index));
        return Ok(None);
    }

    let requests: Vec<CaptionRequest> = chunk
        .lines
        .iter()
        .map(|line| CaptionRequest::from_line(line, sizes.primary, sizes.secondary))
        .collect();
    let layouts = fitter.fit_all(&requests);
    for warning in layout_warnings(chunk, &layouts, fitter.config()) {
        logw(warning);
    }

    let cues: Vec<CaptionCue<'_>> = chunk
        .line_windows()
        .zip(&layouts)
        .map(|((start, end, _), layout)| CaptionCue { start, end, layout })
        .collect();

    let text_dir = work_dir.join(format!("text_{:02}", chunk.index));
    fs::create_dir_all(&text_dir)
        .await
        .with_context(|| format!("Failed to create {}", text_dir.display()))?;

    let script = compose::build_filter_graph(
        &cues,
        fitter.config(),
        &settings.fonts,
        settings.render.fps,
        &text_dir,
    );

    let made = compose::render_chunk(
        &script,
        work_dir,
        background,
        &part_audio,
        settings.render.fps,
        slice.length,
        &part_video,
    )
    .await?;

    Ok(made.then_some(part_video))
}

/// Renders `lines` over `bg_image` with `full_audio` into `out_mp4`.
///
/// Returns `Ok(false)` when nothing renderable remains or a part failed.
pub async fn build_chunked_video(
    lines: Vec<DialogueLine>,
    full_audio: &Path,
    bg_image: &Path,
    out_mp4: &Path,
    settings: &RenderSettings,
    sizes: FontSizes,
) -> Result<bool> {
    let lines = dialogue::retain_renderable(lines);
    if lines.is_empty() {
        logw("No renderable lines; nothing to build.");
        return Ok(false);
    }

    let fitter = make_fitter(settings)?;
    let chunks = timeline::segment(&lines, settings.render.chunk_size)?;
    let master = ffmpeg::ffprobe_duration_seconds(full_audio).await?;
    logi(format!(
        "{} lines -> {} chunks of up to {} lines (master track {:.2}s)",
        lines.len(),
        chunks.len(),
        settings.render.chunk_size,
        master
    ));

    let work = tempfile::Builder::new()
        .prefix("chunks_")
        .tempdir()
        .context("Failed to create chunk work dir")?;
    let work_dir = work.path();

    let caption = fitter.config();
    let fitted_bg = work_dir.join("background.png");
    let fit = ffmpeg::ffmpeg_fit_background(
        bg_image,
        caption.frame_width,
        caption.frame_height,
        &fitted_bg,
    )
    .await;
    let (background, warning) = pick_background(fit, fitted_bg, bg_image);
    if let Some(warning) = warning {
        logw(warning);
    }

    let run = ChunkRun {
        fitter: &fitter,
        settings,
        sizes,
        full_audio,
        background: &background,
        work_dir,
    };

    let mut parts = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let slice = chunk_slice(master, chunk)?;
        if slice.length <= 0.0 {
            logw(format!("Chunk {} lies past the end of the audio; skipped", chunk.index));
            continue;
        }

        match render_one_chunk(&run, chunk, slice).await? {
            Some(part) => {
                logok(format!(
                    "Chunk {} rendered: lines {}-{} ({:.2}s)",
                    chunk.index,
                    chunk.first_line + 1,
                    chunk.first_line + chunk.lines.len(),
                    slice.length
                ));
                parts.push(part);
            }
            None => {
                logw(format!("Chunk {} failed; aborting build", chunk.index));
                return Ok(false);
            }
        }
    }

    if parts.is_empty() {
        logw("No chunks were rendered.");
        return Ok(false);
    }

    if let Some(parent) = out_mp4.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }

    let list_txt = work_dir.join("concat_list.txt");
    ffmpeg::write_concat_list(&list_txt, &parts).await?;
    let made = ffmpeg::ffmpeg_concat_videos(&list_txt, out_mp4).await?;
    if made {
        logok(format!("Wrote {} ({} parts)", out_mp4.display(), parts.len()));
    }
    Ok(made)
}
