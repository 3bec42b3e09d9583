use crate::config::Config;
use crate::speech::{self, SpeechSynthesizer};
use crate::{logi, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
const CHAT_MODEL: &str = "gpt-4o-mini";
const SPEECH_MODEL: &str = "tts-1";
const SPEAKERS: [&str; 2] = ["Alice", "Bob"];

const TRANSLATE_ATTEMPTS: u32 = 3;
const TRANSLATE_BACKOFF_S: f64 = 1.5;

fn snippet(raw: &str) -> String {
    raw.chars().take(800).collect()
}

/// Pulls `choices[0].message.content` out of a chat completion body.
fn chat_extract_content(resp_json: &str) -> Option<String> {
    let root: serde_json::Value = serde_json::from_str(resp_json).ok()?;

    if let Some(err) = root.get("error") {
        if let Some(msg) = err.get("message").and_then(|v| v.as_str()) {
            logw(format!("OpenAI error message: {}", msg));
        }
        return None;
    }

    root.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

async fn chat(client: &Client, cfg: &Config, body: serde_json::Value) -> Result<String> {
    let resp = client
        .post(CHAT_URL)
        .bearer_auth(&cfg.openai_api_key)
        .json(&body)
        .timeout(Duration::from_secs(120))
        .send()
        .await
        .context("OpenAI request failed")?;

    let status = resp.status();
    let raw = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("OpenAI HTTP {}: {}", status.as_u16(), snippet(&raw));
    }

    chat_extract_content(&raw)
        .with_context(|| format!("OpenAI response parse failed: {}", snippet(&raw)))
}

#[derive(Debug, Deserialize)]
struct ScriptLine {
    #[serde(default)]
    speaker: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ScriptReply {
    #[serde(default)]
    lines: Vec<ScriptLine>,
    /// Older prompt shape: role-tagged segments without speakers.
    #[serde(default)]
    segments: Vec<ScriptLine>,
}

fn alternate_speakers(texts: impl IntoIterator<Item = String>) -> Vec<(String, String)> {
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| (SPEAKERS[i % 2].to_string(), text))
        .collect()
}

fn fallback_dialogue(topic: &str) -> Vec<(String, String)> {
    alternate_speakers([
        format!("Let's talk about {topic}."),
        format!("This phrase means '{topic}' in daily life."),
        "Now you can use it naturally!".to_string(),
    ])
}

/// Reads the model's JSON into `(speaker, text)` pairs; `None` when unusable.
pub fn parse_dialogue(content: &str) -> Option<Vec<(String, String)>> {
    let reply: ScriptReply = serde_json::from_str(content).ok()?;

    let lines: Vec<(String, String)> = if !reply.lines.is_empty() {
        reply
            .lines
            .into_iter()
            .enumerate()
            .map(|(i, l)| {
                let speaker = if l.speaker.trim().is_empty() {
                    SPEAKERS[i % 2].to_string()
                } else {
                    l.speaker.trim().to_string()
                };
                (speaker, l.text.trim().to_string())
            })
            .collect()
    } else {
        alternate_speakers(reply.segments.into_iter().map(|s| s.text.trim().to_string()))
    };

    let lines: Vec<_> = lines.into_iter().filter(|(_, t)| !t.is_empty()).collect();
    if lines.is_empty() { None } else { Some(lines) }
}

/// Two-speaker learning dialogue in `lang`, `turns` exchanges long.
pub async fn make_dialogue(
    client: &Client,
    cfg: &Config,
    topic: &str,
    lang: &str,
    turns: u32,
) -> Result<Vec<(String, String)>> {
    let prompt = format!(
        "You are a professional {lang_up} scriptwriter for YouTube Shorts.\n\
Write a short dialogue between Alice and Bob for language learners.\n\n\
Topic: \"{topic}\"\n\n\
Requirements:\n\
- Exactly {lines} lines, alternating Alice and Bob, starting with Alice.\n\
- Open with a hook, explain or give examples in the middle, end with a line that calls back to the hook.\n\
- Entire dialogue in {lang}. Keep each line under 12 words.\n\
- Natural, slightly conversational tone. No narration outside the dialogue.\n\
- Return ONLY a JSON object: {{\"lines\":[{{\"speaker\":\"Alice\",\"text\":\"...\"}}, ...]}}\n",
        lang_up = lang.to_uppercase(),
        lines = turns.max(1) * 2,
    );

    let body = json!({
        "model": CHAT_MODEL,
        "messages": [{"role": "user", "content": prompt}],
        "temperature": 0.6,
        "response_format": {"type": "json_object"},
    });

    let content = chat(client, cfg, body).await?;
    match parse_dialogue(&content) {
        Some(lines) => {
            logi(format!("Dialogue received: {} lines", lines.len()));
            Ok(lines)
        }
        None => {
            logw(format!(
                "Dialogue JSON unusable, falling back to a stock script: {}",
                snippet(&content)
            ));
            Ok(fallback_dialogue(topic))
        }
    }
}

/// Cheap check for text that is already in the target language.
pub fn looks_like(text: &str, lang: &str) -> bool {
    match lang {
        "en" => text.is_ascii(),
        "ja" => text
            .chars()
            .any(|c| matches!(c as u32, 0x3040..=0x30FE | 0x4E00..=0x9FFF)),
        "ko" => text.chars().any(|c| matches!(c as u32, 0xAC00..=0xD7AF)),
        _ => false,
    }
}

pub fn unavailable_placeholder(lang: &str) -> String {
    format!("[{} unavailable]", lang.to_uppercase())
}

/// Translates `text` into `target`; never fails, a placeholder marks text
/// that could not be translated.
pub async fn translate(client: &Client, cfg: &Config, text: &str, target: &str) -> String {
    if looks_like(text, target) {
        return text.to_string();
    }

    let system = format!(
        "You are a professional translator. Translate the following text into {} accurately. Return the translation only.",
        target.to_uppercase()
    );

    let mut last_err = None;
    for attempt in 1..=TRANSLATE_ATTEMPTS {
        let body = json!({
            "model": CHAT_MODEL,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": text},
            ],
            "temperature": 0.2,
        });

        match chat(client, cfg, body).await {
            Ok(out) => {
                let out = out.trim().replace('\n', " ");
                return if out.is_empty() { text.to_string() } else { out };
            }
            Err(err) => {
                last_err = Some(err);
                if attempt < TRANSLATE_ATTEMPTS {
                    let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
                    tokio::time::sleep(Duration::from_secs_f64(TRANSLATE_BACKOFF_S + jitter)).await;
                }
            }
        }
    }

    let preview: String = text.chars().take(40).collect();
    logw(format!(
        "Translate error ({} -> {}): {}",
        preview,
        target,
        last_err.map(|e| e.to_string()).unwrap_or_default()
    ));
    unavailable_placeholder(target)
}

/// Raw `scene|phrase` thumbnail caption for `topic`, written in `lang`.
pub async fn thumbnail_caption(client: &Client, cfg: &Config, topic: &str, lang: &str) -> Result<String> {
    let prompt = format!(
        "You craft high-performing YouTube thumbnail captions.\n\
Language: {lang_up} ONLY.\n\
Return TWO ultra-short lines separated by a single '|' character:\n\
 - Line 1: the SCENE label (e.g., Hotel / Airport / Restaurant / At Work), at most 16 chars.\n\
 - Line 2: the key PHRASE learners will master, at most 20 chars.\n\
Rules: no quotes or emojis, no surrounding punctuation, no translation, avoid brand names.\n\
Topic: {topic}\n\
Output example (do not translate this example):\n\
Hotel|Check-in made easy",
        lang_up = lang.to_uppercase(),
    );

    let body = json!({
        "model": CHAT_MODEL,
        "messages": [{"role": "user", "content": prompt}],
        "temperature": 0.55,
    });
    chat(client, cfg, body).await
}

/// OpenAI `tts-1` with a voice pair per language.
pub struct OpenAiSpeech {
    client: Client,
    cfg: Config,
}

impl OpenAiSpeech {
    pub fn new(client: Client, cfg: Config) -> Self {
        Self { client, cfg }
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(
        &self,
        lang: &str,
        speaker: &str,
        text: &str,
        out_mp3: &Path,
    ) -> Result<bool> {
        let input = speech::clean_for_tts(text, lang)?;
        let voice = speech::pick_voice(self.cfg.openai_voice_pair(lang), speaker);

        let body = json!({
            "model": SPEECH_MODEL,
            "voice": voice,
            "input": input,
            "response_format": "mp3",
        });

        let resp = self
            .client
            .post(SPEECH_URL)
            .bearer_auth(&self.cfg.openai_api_key)
            .json(&body)
            .timeout(Duration::from_secs(300))
            .send()
            .await
            .context("OpenAI speech request failed")?;

        if !resp.status().is_success() {
            logw(format!("OpenAI TTS failed HTTP {}", resp.status().as_u16()));
            return Ok(false);
        }

        let bytes = resp.bytes().await.context("OpenAI speech response read failed")?;
        fs::write(out_mp3, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", out_mp3.display()))?;
        Ok(!bytes.is_empty())
    }
}
