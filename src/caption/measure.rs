use super::script::ScriptClass;
use crate::config::FontPaths;
use crate::error::{ShortsError, ShortsResult};
use fontdue::{Font, FontSettings};
use std::path::{Path, PathBuf};

/// Pixel width of a single rendered line.
///
/// The caption fitter only ever asks for widths; line height is derived from
/// the font size and the configured line spacing.
pub trait TextMeasurer: Send + Sync {
    fn line_width(&self, line: &str, script: ScriptClass, font_size: u32) -> f32;
}

/// Width estimate from character counts, no font files needed.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicMeasurer {
    pub narrow_advance: f32,
    pub space_advance: f32,
    pub cjk_advance: f32,
    pub hangul_advance: f32,
}

impl Default for HeuristicMeasurer {
    fn default() -> Self {
        Self {
            narrow_advance: 0.5,
            space_advance: 0.3,
            cjk_advance: 1.0,
            hangul_advance: 0.92,
        }
    }
}

impl TextMeasurer for HeuristicMeasurer {
    fn line_width(&self, line: &str, _script: ScriptClass, font_size: u32) -> f32 {
        let em: f32 = line
            .chars()
            .map(|ch| match ScriptClass::of_char(ch) {
                Some(ScriptClass::Cjk) => self.cjk_advance,
                Some(ScriptClass::Hangul) => self.hangul_advance,
                _ if ch.is_whitespace() => self.space_advance,
                _ => self.narrow_advance,
            })
            .sum();
        em * font_size as f32
    }
}

/// One parsed font per script class, plus where it came from so the
/// compositor can hand the same file to ffmpeg.
pub struct FontSet {
    latin: LoadedFont,
    cjk: LoadedFont,
    hangul: LoadedFont,
}

struct LoadedFont {
    path: PathBuf,
    font: Font,
}

fn load_font(class: ScriptClass, path: &Path) -> ShortsResult<LoadedFont> {
    let bytes = std::fs::read(path).map_err(|err| ShortsError::FontResource {
        class,
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|err| {
        ShortsError::FontResource {
            class,
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    })?;
    Ok(LoadedFont {
        path: path.to_path_buf(),
        font,
    })
}

/// Checks that every font file exists without parsing it.
pub fn ensure_fonts_present(paths: &FontPaths) -> ShortsResult<()> {
    for class in ScriptClass::ALL {
        let path = font_path(paths, class);
        if !path.is_file() {
            return Err(ShortsError::FontResource {
                class,
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }
    }
    Ok(())
}

pub fn font_path(paths: &FontPaths, class: ScriptClass) -> &Path {
    match class {
        ScriptClass::Latin => &paths.latin,
        ScriptClass::Cjk => &paths.cjk,
        ScriptClass::Hangul => &paths.hangul,
    }
}

impl FontSet {
    pub fn load(paths: &FontPaths) -> ShortsResult<Self> {
        Ok(Self {
            latin: load_font(ScriptClass::Latin, &paths.latin)?,
            cjk: load_font(ScriptClass::Cjk, &paths.cjk)?,
            hangul: load_font(ScriptClass::Hangul, &paths.hangul)?,
        })
    }

    fn get(&self, class: ScriptClass) -> &LoadedFont {
        match class {
            ScriptClass::Latin => &self.latin,
            ScriptClass::Cjk => &self.cjk,
            ScriptClass::Hangul => &self.hangul,
        }
    }

    pub fn path(&self, class: ScriptClass) -> &Path {
        &self.get(class).path
    }
}

/// Advance widths taken from the session fonts.
pub struct GlyphMeasurer {
    fonts: FontSet,
}

impl GlyphMeasurer {
    pub fn new(fonts: FontSet) -> Self {
        Self { fonts }
    }

    pub fn fonts(&self) -> &FontSet {
        &self.fonts
    }
}

impl TextMeasurer for GlyphMeasurer {
    fn line_width(&self, line: &str, script: ScriptClass, font_size: u32) -> f32 {
        let font = &self.fonts.get(script).font;
        let px = font_size as f32;
        line.chars()
            .map(|ch| font.metrics(ch, px).advance_width)
            .sum()
    }
}
