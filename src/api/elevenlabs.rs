use crate::config::Config;
use crate::logw;
use crate::speech::{self, SpeechSynthesizer};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use tokio::fs;

/// ElevenLabs speech with one fixed voice per speaker.
pub struct ElevenLabsSpeech {
    client: Client,
    api_key: String,
    model_id: String,
    voices: (String, String),
}

impl ElevenLabsSpeech {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_key: cfg.elevenlabs_api_key.clone(),
            model_id: cfg.eleven_model_id.clone(),
            voices: cfg.eleven_voices.clone(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSpeech {
    async fn synthesize(
        &self,
        lang: &str,
        speaker: &str,
        text: &str,
        out_mp3: &Path,
    ) -> Result<bool> {
        let voice_id = speech::pick_voice((self.voices.0.as_str(), self.voices.1.as_str()), speaker);
        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}?output_format=mp3_44100_128",
            voice_id
        );

        let body = serde_json::json!({
            "text": speech::clean_for_tts(text, lang)?,
            "model_id": self.model_id,
        });

        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .timeout(std::time::Duration::from_secs(300))
            .send()
            .await
            .context("ElevenLabs request failed")?;

        if !resp.status().is_success() {
            logw(format!("ElevenLabs TTS failed HTTP {}", resp.status().as_u16()));
            return Ok(false);
        }

        let bytes = resp.bytes().await.context("ElevenLabs response read failed")?;
        if let Some(parent) = out_mp3.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }
        fs::write(out_mp3, &bytes).await?;

        Ok(fs::metadata(out_mp3).await.is_ok())
    }
}
