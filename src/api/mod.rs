pub mod elevenlabs;
pub mod openai;
pub mod unsplash;

use crate::config::{Config, TtsProvider};
use crate::speech::SpeechSynthesizer;
use reqwest::Client;

/// Speech backend selected by `tts_provider`.
pub fn synthesizer_for(client: &Client, cfg: &Config) -> Box<dyn SpeechSynthesizer> {
    match cfg.tts_provider {
        TtsProvider::OpenAi => Box::new(openai::OpenAiSpeech::new(client.clone(), cfg.clone())),
        TtsProvider::ElevenLabs => Box::new(elevenlabs::ElevenLabsSpeech::new(client.clone(), cfg)),
    }
}
