use super::measure::TextMeasurer;
use super::script::{self, ScriptClass};
use crate::config::{CaptionConfig, SpeakerStyle};
use crate::dialogue::DialogueLine;
use crate::error::ShortsResult;

/// Parallel fitting only pays off past this many lines.
const PARALLEL_MIN_LINES: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionRequest {
    pub text_primary: String,
    pub text_secondary: Option<String>,
    pub speaker: Option<String>,
    pub font_size_primary: u32,
    pub font_size_secondary: u32,
}

impl CaptionRequest {
    pub fn from_line(line: &DialogueLine, font_size_primary: u32, font_size_secondary: u32) -> Self {
        Self {
            text_primary: line.text_primary.clone(),
            text_secondary: line.secondary().map(str::to_string),
            speaker: line.speaker_label().map(str::to_string),
            font_size_primary,
            font_size_secondary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Speaker,
    Primary,
    Secondary,
}

/// One drawn element of a caption block, in absolute frame pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedBox {
    pub kind: RowKind,
    pub script: ScriptClass,
    pub font_size: u32,
    pub stroke_width: u32,
    pub line_height: u32,
    pub lines: Vec<String>,
    pub text_width: u32,
    pub box_x: u32,
    pub box_y: u32,
    pub box_width: u32,
    pub box_height: u32,
    /// Top of the first text line.
    pub text_y: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayout {
    pub font_size_primary: u32,
    /// Zero when the line has no secondary row.
    pub font_size_secondary: u32,
    pub wrapped_text_primary: String,
    pub wrapped_text_secondary: Option<String>,
    pub block_origin_y: u32,
    pub block_height: u32,
    pub fits: bool,
    /// Trailing lines were dropped to keep the block inside the frame.
    pub truncated: bool,
    pub boxes: Vec<PlacedBox>,
}

impl CaptionLayout {
    pub fn block_bottom(&self) -> u32 {
        self.block_origin_y.saturating_add(self.block_height)
    }
}

struct RowText {
    kind: RowKind,
    text: String,
    script: ScriptClass,
}

struct Content {
    speaker: Option<RowText>,
    primary: RowText,
    secondary: Option<RowText>,
}

struct Row {
    kind: RowKind,
    script: ScriptClass,
    font_size: u32,
    line_height: u32,
    pad_x: u32,
    pad_y: u32,
    lines: Vec<String>,
    text_width: u32,
    truncated: bool,
}

impl Row {
    fn box_height(&self) -> u32 {
        (self.lines.len() as u32)
            .saturating_mul(self.line_height)
            .saturating_add(self.pad_y.saturating_mul(2))
    }

    fn box_width(&self) -> u32 {
        self.text_width.saturating_add(self.pad_x.saturating_mul(2))
    }
}

pub struct CaptionFitter {
    config: CaptionConfig,
    measurer: Box<dyn TextMeasurer>,
}

impl CaptionFitter {
    pub fn new(config: CaptionConfig, measurer: impl TextMeasurer + 'static) -> ShortsResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            measurer: Box::new(measurer),
        })
    }

    pub fn config(&self) -> &CaptionConfig {
        &self.config
    }

    pub fn fit(
        &self,
        text_primary: &str,
        text_secondary: Option<&str>,
        speaker: Option<&str>,
        font_size_primary: u32,
        font_size_secondary: u32,
    ) -> CaptionLayout {
        let content = self.content(text_primary, text_secondary, speaker);
        let has_secondary = content.secondary.is_some();

        let mut size_p = self.clamp_size(font_size_primary);
        let mut size_s = if has_secondary { self.clamp_size(font_size_secondary) } else { 0 };
        let floor_p = self.config.min_font_size_primary.min(size_p);
        let floor_s = self.config.min_font_size_secondary.min(size_s.max(1));

        let mut iterations = 0;
        loop {
            let rows = self.build_rows(&content, size_p, size_s);
            let height = block_height(&rows, &self.config);
            let origin = self.candidate_origin(height);

            if self.satisfies(&rows, height, origin) {
                return self.layout(rows, origin, true, size_p, size_s);
            }

            let at_floor = size_p <= floor_p && (!has_secondary || size_s <= floor_s);
            if at_floor {
                return self.degrade(rows, size_p, size_s);
            }
            if iterations >= self.config.max_iterations {
                // Out of steps: the floor is the last size worth trying.
                size_p = floor_p;
                if has_secondary {
                    size_s = floor_s;
                }
                continue;
            }

            size_p = shrink(size_p, floor_p, self.config.shrink_ratio);
            if has_secondary {
                size_s = shrink(size_s, floor_s, self.config.shrink_ratio);
            }
            iterations += 1;
        }
    }

    pub fn fit_request(&self, request: &CaptionRequest) -> CaptionLayout {
        self.fit(
            &request.text_primary,
            request.text_secondary.as_deref(),
            request.speaker.as_deref(),
            request.font_size_primary,
            request.font_size_secondary,
        )
    }

    /// Whether the request fits at exactly these sizes, without shrinking.
    pub fn fits_at(&self, request: &CaptionRequest, size_primary: u32, size_secondary: u32) -> bool {
        let content = self.content(
            &request.text_primary,
            request.text_secondary.as_deref(),
            request.speaker.as_deref(),
        );
        let size_s = if content.secondary.is_some() { self.clamp_size(size_secondary) } else { 0 };
        let rows = self.build_rows(&content, self.clamp_size(size_primary), size_s);
        let height = block_height(&rows, &self.config);
        self.satisfies(&rows, height, self.candidate_origin(height))
    }

    /// Fits every request; results keep the input order.
    pub fn fit_all(&self, requests: &[CaptionRequest]) -> Vec<CaptionLayout> {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(requests.len());

        if workers <= 1 || requests.len() < PARALLEL_MIN_LINES {
            return requests.iter().map(|r| self.fit_request(r)).collect();
        }

        let per_worker = requests.len().div_ceil(workers);
        let parallel = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = requests
                .chunks(per_worker)
                .map(|batch| {
                    scope.spawn(move |_| {
                        batch.iter().map(|r| self.fit_request(r)).collect::<Vec<_>>()
                    })
                })
                .collect();

            let mut out = Vec::with_capacity(requests.len());
            for handle in handles {
                match handle.join() {
                    Ok(batch) => out.extend(batch),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            out
        });

        parallel.unwrap_or_else(|_| requests.iter().map(|r| self.fit_request(r)).collect())
    }

    /// Requested sizes are capped at the frame height; nothing taller can fit.
    fn clamp_size(&self, size: u32) -> u32 {
        size.clamp(1, self.config.frame_height)
    }

    fn content(&self, primary: &str, secondary: Option<&str>, speaker: Option<&str>) -> Content {
        let speaker = speaker.map(str::trim).filter(|s| !s.is_empty());
        let primary = primary.trim();

        let (primary_text, chip) = match (self.config.speaker_style, speaker) {
            (SpeakerStyle::Inline, Some(name)) => (format!("{name}: {primary}"), None),
            (SpeakerStyle::Chip, Some(name)) => (primary.to_string(), Some(name.to_string())),
            _ => (primary.to_string(), None),
        };

        let row = |kind, text: String| RowText {
            kind,
            script: ScriptClass::detect(&text),
            text,
        };

        Content {
            speaker: chip.map(|name| row(RowKind::Speaker, name)),
            primary: row(RowKind::Primary, primary_text),
            secondary: secondary
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| row(RowKind::Secondary, s.to_string())),
        }
    }

    fn build_row(&self, text: &RowText, font_size: u32) -> Row {
        let cfg = &self.config;
        let width = text.script.wrap_width(&cfg.wrap_chars);
        let lines = script::wrap(&text.text, width, text.script);
        let (pad_x, pad_y) = match text.kind {
            RowKind::Speaker => (cfg.chip_pad_x, cfg.chip_pad_y),
            _ => (cfg.pad_x, cfg.pad_y),
        };

        let mut row = Row {
            kind: text.kind,
            script: text.script,
            font_size,
            line_height: cfg.line_height(font_size),
            pad_x,
            pad_y,
            lines,
            text_width: 0,
            truncated: false,
        };
        self.remeasure(&mut row);
        row
    }

    fn remeasure(&self, row: &mut Row) {
        row.text_width = row
            .lines
            .iter()
            .map(|line| self.measurer.line_width(line, row.script, row.font_size).ceil() as u32)
            .max()
            .unwrap_or(0);
    }

    fn build_rows(&self, content: &Content, size_p: u32, size_s: u32) -> Vec<Row> {
        let mut rows = Vec::with_capacity(3);
        if let Some(chip) = &content.speaker {
            rows.push(self.build_row(chip, self.config.speaker_font_size(size_p)));
        }
        rows.push(self.build_row(&content.primary, size_p));
        if let Some(secondary) = &content.secondary {
            rows.push(self.build_row(secondary, size_s));
        }
        rows
    }

    /// Slightly below center, kept between the safe margins when possible.
    fn candidate_origin(&self, height: u32) -> i64 {
        let cfg = &self.config;
        let h = height as i64;
        let anchor = (cfg.frame_height as f64 * cfg.anchor_ratio).round() as i64;
        let above_bottom = cfg.bottom_limit() as i64 - h - cfg.bottom_margin as i64;
        (anchor - h / 2).min(above_bottom).max(cfg.top_safe_margin as i64)
    }

    fn satisfies(&self, rows: &[Row], height: u32, origin: i64) -> bool {
        let cfg = &self.config;
        let fits_height = height <= cfg.max_block_height()
            && origin + height as i64 <= cfg.bottom_limit() as i64;
        let fits_width = rows.iter().all(|row| row.text_width <= cfg.safe_width());
        fits_height && fits_width
    }

    /// Floor-size fallback: truncate if the block cannot fit the frame at all,
    /// then shift it up so it never crosses the bottom safe boundary.
    fn degrade(&self, mut rows: Vec<Row>, size_p: u32, size_s: u32) -> CaptionLayout {
        let available = self.config.bottom_limit();

        while block_height(&rows, &self.config) > available {
            let victim = rows
                .iter()
                .rposition(|r| r.kind == RowKind::Secondary && r.lines.len() > 1)
                .or_else(|| rows.iter().position(|r| r.kind == RowKind::Primary && r.lines.len() > 1));
            let Some(idx) = victim else { break };
            rows[idx].lines.pop();
            rows[idx].truncated = true;
        }

        for row in rows.iter_mut().filter(|r| r.truncated) {
            if let Some(last) = row.lines.last_mut() {
                last.push('…');
            }
            self.remeasure(row);
        }

        let height = block_height(&rows, &self.config) as i64;
        let mut origin = self.candidate_origin(height as u32);
        let overflow = origin + height - available as i64;
        if overflow > 0 {
            origin -= overflow;
        }
        let origin = origin.max(0);

        self.layout(rows, origin, false, size_p, size_s)
    }

    fn layout(&self, rows: Vec<Row>, origin: i64, fits: bool, size_p: u32, size_s: u32) -> CaptionLayout {
        let cfg = &self.config;
        let origin = origin.max(0) as u32;
        let height = block_height(&rows, cfg);
        let truncated = rows.iter().any(|r| r.truncated);

        let mut wrapped_primary = String::new();
        let mut wrapped_secondary = None;
        let mut boxes = Vec::with_capacity(rows.len());
        let mut cursor = origin;

        for row in rows {
            let box_width = row.box_width();
            let box_height = row.box_height();
            let stroke_width = self.stroke_width(row.kind, row.font_size);

            match row.kind {
                RowKind::Primary => wrapped_primary = row.lines.join("\n"),
                RowKind::Secondary => wrapped_secondary = Some(row.lines.join("\n")),
                RowKind::Speaker => {}
            }

            let gap_after = match row.kind {
                RowKind::Speaker => cfg.speaker_gap,
                RowKind::Primary => cfg.line_gap,
                RowKind::Secondary => 0,
            };

            boxes.push(PlacedBox {
                kind: row.kind,
                script: row.script,
                font_size: row.font_size,
                stroke_width,
                line_height: row.line_height,
                text_width: row.text_width,
                box_x: cfg.frame_width.saturating_sub(box_width) / 2,
                box_y: cursor,
                box_width,
                box_height,
                text_y: cursor.saturating_add(row.pad_y),
                lines: row.lines,
            });
            cursor = cursor.saturating_add(box_height).saturating_add(gap_after);
        }

        CaptionLayout {
            font_size_primary: size_p,
            font_size_secondary: size_s,
            wrapped_text_primary: wrapped_primary,
            wrapped_text_secondary: wrapped_secondary,
            block_origin_y: origin,
            block_height: height,
            fits,
            truncated,
            boxes,
        }
    }

    /// Outline thickness follows the font size relative to the defaults.
    fn stroke_width(&self, kind: RowKind, font_size: u32) -> u32 {
        let (base, reference) = match kind {
            RowKind::Primary => (6, self.config.font_size_primary),
            RowKind::Secondary => (4, self.config.font_size_secondary),
            RowKind::Speaker => return 2,
        };
        (base * font_size / reference.max(1)).max(2)
    }
}

fn block_height(rows: &[Row], cfg: &CaptionConfig) -> u32 {
    rows.iter()
        .map(|row| {
            let gap = match row.kind {
                RowKind::Speaker => cfg.speaker_gap,
                RowKind::Secondary => cfg.line_gap,
                RowKind::Primary => 0,
            };
            row.box_height().saturating_add(gap)
        })
        .fold(0, u32::saturating_add)
}

/// One shrink step: strictly smaller, never below `floor`.
fn shrink(size: u32, floor: u32, ratio: f64) -> u32 {
    if size <= floor {
        return size;
    }
    let scaled = (size as f64 * ratio).floor() as u32;
    scaled.min(size - 1).max(floor)
}
