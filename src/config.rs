use crate::error::{ShortsError, ShortsResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default)]
    pub unsplash_access_key: String,
    #[serde(default)]
    pub elevenlabs_api_key: String,
    #[serde(default)]
    pub tts_provider: TtsProvider,
    /// Language code -> (Alice voice, Bob voice).
    #[serde(default = "default_openai_voices")]
    pub openai_voices: HashMap<String, (String, String)>,
    #[serde(default = "default_eleven_voices")]
    pub eleven_voices: (String, String),
    #[serde(default = "default_eleven_model_id")]
    pub eleven_model_id: String,
    #[serde(default = "default_combos")]
    pub combos: Vec<Combo>,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub fonts: FontPaths,
    #[serde(default)]
    pub dirs: DirsConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    #[default]
    OpenAi,
    ElevenLabs,
}

/// One audio language rendered with a list of subtitle rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combo {
    pub audio: String,
    pub subs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirsConfig {
    #[serde(default = "default_input_dir")]
    pub input: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output: PathBuf,
    #[serde(default = "default_temp_dir")]
    pub temp: PathBuf,
}

impl Default for DirsConfig {
    fn default() -> Self {
        Self {
            input: default_input_dir(),
            output: default_output_dir(),
            temp: default_temp_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontPaths {
    #[serde(default = "default_font_latin")]
    pub latin: PathBuf,
    #[serde(default = "default_font_cjk")]
    pub cjk: PathBuf,
    #[serde(default = "default_font_hangul")]
    pub hangul: PathBuf,
}

impl Default for FontPaths {
    fn default() -> Self {
        Self {
            latin: default_font_latin(),
            cjk: default_font_cjk(),
            hangul: default_font_hangul(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureMode {
    /// Advance widths from the loaded fonts.
    #[default]
    Glyph,
    /// Character-count estimate per script class.
    Heuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub measure: MeasureMode,
    #[serde(default)]
    pub caption: CaptionConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            fps: default_fps(),
            measure: MeasureMode::default(),
            caption: CaptionConfig::default(),
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> ShortsResult<()> {
        if self.chunk_size < 1 {
            return Err(ShortsError::config("render.chunk_size must be at least 1"));
        }
        if self.fps == 0 {
            return Err(ShortsError::config("render.fps must be positive"));
        }
        self.caption.validate()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerStyle {
    /// `"Alice: text"` on the primary row.
    #[default]
    Inline,
    /// Small label box above the primary row.
    Chip,
    Hidden,
}

/// Characters per wrapped line, by script class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WrapChars {
    pub latin: usize,
    pub cjk: usize,
    pub hangul: usize,
}

impl Default for WrapChars {
    fn default() -> Self {
        Self {
            latin: 22,
            cjk: 11,
            hangul: 12,
        }
    }
}

/// Caption geometry for one render session. Defaults target a 1080x1920
/// Shorts frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    pub frame_width: u32,
    pub frame_height: u32,
    pub side_margin: u32,
    pub top_safe_margin: u32,
    pub bottom_safe_margin_ratio: f64,
    pub bottom_margin: u32,
    pub max_block_height_ratio: f64,
    pub anchor_ratio: f64,
    pub font_size_primary: u32,
    pub font_size_secondary: u32,
    pub min_font_size_primary: u32,
    pub min_font_size_secondary: u32,
    pub shrink_ratio: f64,
    pub line_gap: u32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub line_spacing: f64,
    pub wrap_chars: WrapChars,
    pub speaker_style: SpeakerStyle,
    pub speaker_scale: f64,
    pub speaker_gap: u32,
    pub chip_pad_x: u32,
    pub chip_pad_y: u32,
    pub box_opacity: f64,
    pub max_iterations: u32,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            frame_width: 1080,
            frame_height: 1920,
            side_margin: 64,
            top_safe_margin: 140,
            bottom_safe_margin_ratio: 0.20,
            bottom_margin: 28,
            max_block_height_ratio: 0.28,
            anchor_ratio: 0.60,
            font_size_primary: 86,
            font_size_secondary: 74,
            min_font_size_primary: 42,
            min_font_size_secondary: 38,
            shrink_ratio: 0.94,
            line_gap: 32,
            pad_x: 24,
            pad_y: 18,
            line_spacing: 1.25,
            wrap_chars: WrapChars::default(),
            speaker_style: SpeakerStyle::Inline,
            speaker_scale: 0.6,
            speaker_gap: 12,
            chip_pad_x: 16,
            chip_pad_y: 8,
            box_opacity: 0.45,
            max_iterations: 64,
        }
    }
}

impl CaptionConfig {
    /// A 1280x720 frame with the same proportions for margins.
    pub fn landscape() -> Self {
        Self {
            frame_width: 1280,
            frame_height: 720,
            side_margin: 64,
            top_safe_margin: 40,
            bottom_safe_margin_ratio: 0.08,
            max_block_height_ratio: 0.40,
            font_size_primary: 48,
            font_size_secondary: 42,
            min_font_size_primary: 24,
            min_font_size_secondary: 22,
            wrap_chars: WrapChars {
                latin: 44,
                cjk: 22,
                hangul: 24,
            },
            ..Self::default()
        }
    }

    pub fn safe_width(&self) -> u32 {
        self.frame_width.saturating_sub(self.side_margin * 2)
    }

    pub fn bottom_safe_margin(&self) -> u32 {
        (self.frame_height as f64 * self.bottom_safe_margin_ratio).round() as u32
    }

    /// Lowest y a caption block may reach.
    pub fn bottom_limit(&self) -> u32 {
        self.frame_height.saturating_sub(self.bottom_safe_margin())
    }

    pub fn max_block_height(&self) -> u32 {
        (self.frame_height as f64 * self.max_block_height_ratio).round() as u32
    }

    pub fn line_height(&self, font_size: u32) -> u32 {
        ((font_size as f64 * self.line_spacing).round() as u32).max(1)
    }

    pub fn speaker_font_size(&self, primary_size: u32) -> u32 {
        ((primary_size as f64 * self.speaker_scale).round() as u32).max(1)
    }

    pub fn validate(&self) -> ShortsResult<()> {
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(ShortsError::config("caption frame size must be positive"));
        }
        if self.safe_width() == 0 {
            return Err(ShortsError::config(format!(
                "side margin {} leaves no room in a {}px wide frame",
                self.side_margin, self.frame_width
            )));
        }
        for (name, ratio) in [
            ("bottom_safe_margin_ratio", self.bottom_safe_margin_ratio),
            ("max_block_height_ratio", self.max_block_height_ratio),
            ("anchor_ratio", self.anchor_ratio),
            ("shrink_ratio", self.shrink_ratio),
        ] {
            if !(ratio > 0.0 && ratio < 1.0) {
                return Err(ShortsError::config(format!(
                    "caption.{name} must be within (0, 1), got {ratio}"
                )));
            }
        }
        if !(self.box_opacity >= 0.0 && self.box_opacity <= 1.0) {
            return Err(ShortsError::config("caption.box_opacity must be within [0, 1]"));
        }
        if self.line_spacing <= 0.0 || self.speaker_scale <= 0.0 {
            return Err(ShortsError::config(
                "caption.line_spacing and caption.speaker_scale must be positive",
            ));
        }
        if self.bottom_limit() <= self.top_safe_margin {
            return Err(ShortsError::config(format!(
                "safe margins overlap: top {} vs bottom limit {}",
                self.top_safe_margin,
                self.bottom_limit()
            )));
        }
        if self.min_font_size_primary == 0 || self.min_font_size_secondary == 0 {
            return Err(ShortsError::config("minimum font sizes must be positive"));
        }
        if self.min_font_size_primary > self.font_size_primary
            || self.min_font_size_secondary > self.font_size_secondary
        {
            return Err(ShortsError::config(
                "minimum font sizes must not exceed the default sizes",
            ));
        }
        if self.wrap_chars.latin == 0 || self.wrap_chars.cjk == 0 || self.wrap_chars.hangul == 0 {
            return Err(ShortsError::config("wrap widths must be at least 1 character"));
        }
        if self.max_iterations == 0 {
            return Err(ShortsError::config("caption.max_iterations must be positive"));
        }

        let smallest_block = self.smallest_block_height();
        if smallest_block > self.bottom_limit() {
            return Err(ShortsError::config(format!(
                "a single caption line at the minimum font sizes needs {}px, frame only offers {}px",
                smallest_block,
                self.bottom_limit()
            )));
        }
        Ok(())
    }

    /// Height of a one-line-per-row block at the floor sizes.
    fn smallest_block_height(&self) -> u32 {
        let mut height = self.line_height(self.min_font_size_primary) + self.pad_y * 2;
        height += self.line_gap + self.line_height(self.min_font_size_secondary) + self.pad_y * 2;
        if self.speaker_style == SpeakerStyle::Chip {
            let chip_size = self.speaker_font_size(self.min_font_size_primary);
            height += self.line_height(chip_size) + self.chip_pad_y * 2 + self.speaker_gap;
        }
        height
    }
}

fn default_openai_voices() -> HashMap<String, (String, String)> {
    [
        ("en", "alloy", "echo"),
        ("ja", "nova", "echo"),
        ("pt", "fable", "onyx"),
        ("id", "alloy", "fable"),
    ]
    .into_iter()
    .map(|(lang, a, b)| (lang.to_string(), (a.to_string(), b.to_string())))
    .collect()
}

fn default_eleven_voices() -> (String, String) {
    (
        "21m00Tcm4TlvDq8ikWAM".to_string(),
        "OmEnGXU7trwJsZ3jMPl8".to_string(),
    )
}

fn default_eleven_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_combos() -> Vec<Combo> {
    vec![Combo {
        audio: "en".to_string(),
        subs: vec!["en".to_string(), "ja".to_string()],
    }]
}

fn default_chunk_size() -> usize {
    40
}

fn default_fps() -> u32 {
    30
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("input")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_font_latin() -> PathBuf {
    PathBuf::from("fonts/RobotoSerif_36pt-Bold.ttf")
}

fn default_font_cjk() -> PathBuf {
    PathBuf::from("fonts/NotoSansJP-Bold.ttf")
}

fn default_font_hangul() -> PathBuf {
    PathBuf::from("fonts/malgunbd.ttf")
}

fn env_fallback(value: &mut String, var: &str) {
    if value.is_empty() {
        if let Ok(from_env) = std::env::var(var) {
            *value = from_env;
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        let mut config: Config = serde_json::from_str(text).context("Failed to parse config JSON")?;
        env_fallback(&mut config.openai_api_key, "OPENAI_API_KEY");
        env_fallback(&mut config.unsplash_access_key, "UNSPLASH_ACCESS_KEY");
        env_fallback(&mut config.elevenlabs_api_key, "ELEVENLABS_API_KEY");
        Ok(config)
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let config = Config::from_json(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.openai_api_key.is_empty() {
            anyhow::bail!("config.json: openai_api_key missing (or set OPENAI_API_KEY)");
        }
        if self.tts_provider == TtsProvider::ElevenLabs && self.elevenlabs_api_key.is_empty() {
            anyhow::bail!("config.json: elevenlabs_api_key missing for tts_provider=elevenlabs");
        }
        if self.combos.is_empty() {
            anyhow::bail!("config.json: combos must list at least one audio/subs combination");
        }
        for combo in &self.combos {
            if combo.subs.is_empty() {
                anyhow::bail!("config.json: combo for audio '{}' has no subtitle rows", combo.audio);
            }
        }
        self.render.validate()?;
        Ok(())
    }

    /// Voices for `(alice, bob)` in the given language.
    pub fn openai_voice_pair(&self, lang: &str) -> (&str, &str) {
        match self.openai_voices.get(lang) {
            Some((a, b)) => (a.as_str(), b.as_str()),
            None => ("alloy", "echo"),
        }
    }
}

/// Render-only settings, for rendering without any API access.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub fonts: FontPaths,
}

impl RenderSettings {
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read config: {}", path.display()))?;
                serde_json::from_str(&content).context("Failed to parse render settings")?
            }
            None => RenderSettings::default(),
        };
        settings.render.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        RenderConfig::default().validate().unwrap();
        CaptionConfig::landscape().validate().unwrap();
    }

    #[test]
    fn derived_geometry() {
        let caption = CaptionConfig::default();
        assert_eq!(caption.safe_width(), 952);
        assert_eq!(caption.bottom_safe_margin(), 384);
        assert_eq!(caption.bottom_limit(), 1536);
        assert_eq!(caption.max_block_height(), 538);
        assert_eq!(caption.line_height(86), 108);
    }

    #[test]
    fn rejects_overlapping_margins() {
        let caption = CaptionConfig {
            top_safe_margin: 1600,
            ..CaptionConfig::default()
        };
        assert!(matches!(caption.validate(), Err(ShortsError::Configuration(_))));
    }

    #[test]
    fn rejects_floor_above_default() {
        let caption = CaptionConfig {
            min_font_size_primary: 90,
            ..CaptionConfig::default()
        };
        assert!(caption.validate().is_err());
    }

    #[test]
    fn rejects_bad_ratio() {
        let caption = CaptionConfig {
            shrink_ratio: 1.0,
            ..CaptionConfig::default()
        };
        assert!(caption.validate().is_err());
    }

    #[test]
    fn rejects_frame_too_small_for_floor_block() {
        let caption = CaptionConfig {
            frame_width: 320,
            frame_height: 200,
            side_margin: 10,
            top_safe_margin: 10,
            ..CaptionConfig::default()
        };
        assert!(caption.validate().is_err());
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config = Config::from_json(
            r#"{
                "openai_api_key": "sk-test",
                "combos": [{"audio": "ja", "subs": ["ja", "en"]}],
                "render": {"chunk_size": 12, "caption": {"speaker_style": "chip"}}
            }"#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.render.chunk_size, 12);
        assert_eq!(config.render.caption.speaker_style, SpeakerStyle::Chip);
        assert_eq!(config.render.caption.font_size_primary, 86);
        assert_eq!(config.openai_voice_pair("ja"), ("nova", "echo"));
        assert_eq!(config.openai_voice_pair("xx"), ("alloy", "echo"));
        assert_eq!(config.tts_provider, TtsProvider::OpenAi);
    }

    #[test]
    fn elevenlabs_requires_key() {
        let mut config = Config::from_json(r#"{"openai_api_key": "sk-test"}"#).unwrap();
        config.tts_provider = TtsProvider::ElevenLabs;
        config.elevenlabs_api_key.clear();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn render_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.json");
        tokio::fs::write(&path, r#"{"render": {"chunk_size": 5}}"#)
            .await
            .unwrap();
        let settings = RenderSettings::load_or_default(Some(&path)).await.unwrap();
        assert_eq!(settings.render.chunk_size, 5);

        let defaults = RenderSettings::load_or_default(None).await.unwrap();
        assert_eq!(defaults.render.chunk_size, 40);
    }

    #[tokio::test]
    async fn render_settings_reject_zero_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.json");
        tokio::fs::write(&path, r#"{"render": {"chunk_size": 0}}"#)
            .await
            .unwrap();
        assert!(RenderSettings::load_or_default(Some(&path)).await.is_err());
    }
}
