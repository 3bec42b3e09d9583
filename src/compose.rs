//! Turns fitted caption layouts into an ffmpeg filter graph.
//!
//! Every wrapped line is drawn from its own text file (`expansion=none`), so
//! dialogue text never has to survive filter-graph escaping. Only file paths
//! end up inside the graph.

use crate::caption::measure::font_path;
use crate::caption::{CaptionLayout, PlacedBox, RowKind};
use crate::config::{CaptionConfig, FontPaths};
use crate::ffmpeg;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// A fitted caption and the chunk-local window in which it is visible.
#[derive(Debug, Clone, Copy)]
pub struct CaptionCue<'a> {
    pub start: f64,
    pub end: f64,
    pub layout: &'a CaptionLayout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterScript {
    pub graph: String,
    /// Files the graph reads through `textfile=`.
    pub text_files: Vec<(PathBuf, String)>,
}

/// Quotes a path for use as a filter option value.
pub fn quote_path(path: &Path) -> String {
    let raw = path.display().to_string().replace('\\', "/");
    format!("'{}'", raw.replace('\'', "'\\''"))
}

fn enable_window(start: f64, end: f64) -> String {
    format!("enable='gte(t,{:.3})*lt(t,{:.3})'", start, end)
}

fn drawbox(b: &PlacedBox, opacity: f64, enable: &str) -> String {
    format!(
        "drawbox=x={}:y={}:w={}:h={}:color=black@{:.2}:t=fill:{}",
        b.box_x, b.box_y, b.box_width, b.box_height, opacity, enable
    )
}

pub(crate) fn drawtext(font: &Path, text_file: &Path, b: &PlacedBox, line_idx: usize, enable: &str) -> String {
    let lead = b.line_height.saturating_sub(b.font_size) / 2;
    let y = b.text_y + line_idx as u32 * b.line_height + lead;
    format!(
        "drawtext=fontfile={}:textfile={}:expansion=none:fontsize={}:fontcolor=white:borderw={}:bordercolor=black:x=(w-text_w)/2:y={}:{}",
        quote_path(font),
        quote_path(text_file),
        b.font_size,
        b.stroke_width,
        y,
        enable
    )
}

fn row_tag(kind: RowKind) -> &'static str {
    match kind {
        RowKind::Speaker => "spk",
        RowKind::Primary => "top",
        RowKind::Secondary => "bot",
    }
}

/// Builds the graph for one chunk: background fit, then a box and its lines
/// per caption row, each gated to the cue's window. Output label is `[v]`.
pub fn build_filter_graph(
    cues: &[CaptionCue<'_>],
    caption: &CaptionConfig,
    fonts: &FontPaths,
    fps: u32,
    text_dir: &Path,
) -> FilterScript {
    let (w, h) = (caption.frame_width, caption.frame_height);
    let mut filters = vec![format!(
        "[0:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1,fps={fps},format=yuv420p"
    )];
    let mut text_files = Vec::new();

    for (cue_idx, cue) in cues.iter().enumerate() {
        let enable = enable_window(cue.start, cue.end);
        for b in &cue.layout.boxes {
            filters.push(drawbox(b, caption.box_opacity, &enable));
            let font = font_path(fonts, b.script);
            for (line_idx, line) in b.lines.iter().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let file = text_dir.join(format!(
                    "cue{:03}_{}_{:02}.txt",
                    cue_idx,
                    row_tag(b.kind),
                    line_idx
                ));
                filters.push(drawtext(font, &file, b, line_idx, &enable));
                text_files.push((file, line.clone()));
            }
        }
    }

    let mut graph = filters.join(",");
    graph.push_str("[v]");
    FilterScript { graph, text_files }
}

/// Writes the text files and the graph itself; returns the graph's path.
pub async fn write_script(script: &FilterScript, work_dir: &Path, out: &Path) -> Result<PathBuf> {
    for (path, text) in &script.text_files {
        fs::write(path, text)
            .await
            .with_context(|| format!("Failed to write caption text {}", path.display()))?;
    }

    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "chunk".to_string());
    let graph_path = work_dir.join(format!("{stem}.filter"));
    fs::write(&graph_path, &script.graph)
        .await
        .with_context(|| format!("Failed to write filter script {}", graph_path.display()))?;
    Ok(graph_path)
}

/// Writes the graph and its text files, then renders one chunk.
pub async fn render_chunk(
    script: &FilterScript,
    work_dir: &Path,
    background: &Path,
    audio: &Path,
    fps: u32,
    duration_s: f64,
    out_mp4: &Path,
) -> Result<bool> {
    let graph_path = write_script(script, work_dir, out_mp4).await?;
    ffmpeg::ffmpeg_render_captioned(background, audio, &graph_path, fps, duration_s, out_mp4).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::{CaptionFitter, HeuristicMeasurer};

    fn layouts() -> (CaptionConfig, Vec<CaptionLayout>) {
        let config = CaptionConfig::default();
        let fitter = CaptionFitter::new(config.clone(), HeuristicMeasurer::default()).unwrap();
        let a = fitter.fit("Good morning", Some("おはようございます"), Some("Alice"), 86, 74);
        let b = fitter.fit("How did you sleep?", None, Some("Bob"), 86, 74);
        (config, vec![a, b])
    }

    #[test]
    fn graph_gates_each_cue_to_its_window() {
        let (config, layouts) = layouts();
        let cues = [
            CaptionCue { start: 0.0, end: 2.0, layout: &layouts[0] },
            CaptionCue { start: 2.0, end: 3.5, layout: &layouts[1] },
        ];
        let dir = PathBuf::from("/tmp/chunks_test");
        let script = build_filter_graph(&cues, &config, &FontPaths::default(), 30, &dir);

        assert!(script.graph.starts_with("[0:v]scale=1080:1920:force_original_aspect_ratio=increase"));
        assert!(script.graph.ends_with("[v]"));
        assert!(script.graph.contains("enable='gte(t,0.000)*lt(t,2.000)'"));
        assert!(script.graph.contains("enable='gte(t,2.000)*lt(t,3.500)'"));
        assert_eq!(script.graph.matches("drawbox=").count(), 3);
        assert!(script.graph.contains("color=black@0.45"));
        assert!(script.graph.contains("NotoSansJP-Bold.ttf"));
        assert!(script.text_files.iter().any(|(_, t)| t == "Alice: Good morning"));
        assert!(script.text_files.iter().all(|(p, _)| p.starts_with(&dir)));
        assert_eq!(
            script.graph.matches("drawtext=").count(),
            script.text_files.len()
        );
    }

    #[test]
    fn text_lines_are_stacked_by_line_height() {
        let config = CaptionConfig::default();
        let fitter = CaptionFitter::new(config.clone(), HeuristicMeasurer::default()).unwrap();
        let layout = fitter.fit("one\ntwo", None, None, 86, 74);
        let b = &layout.boxes[0];

        let dir = PathBuf::from("/tmp/x");
        let first = drawtext(Path::new("f.ttf"), &dir.join("a.txt"), b, 0, "enable='1'");
        let second = drawtext(Path::new("f.ttf"), &dir.join("b.txt"), b, 1, "enable='1'");
        let lead = (b.line_height - b.font_size) / 2;
        assert!(first.contains(&format!(":y={}:", b.text_y + lead)));
        assert!(second.contains(&format!(":y={}:", b.text_y + b.line_height + lead)));
    }

    #[test]
    fn quotes_awkward_paths() {
        assert_eq!(quote_path(Path::new("fonts/a.ttf")), "'fonts/a.ttf'");
        assert_eq!(quote_path(Path::new("it's.txt")), "'it'\\''s.txt'");
    }
}
