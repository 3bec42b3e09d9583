use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::path::Path;

/// Turns one dialogue line into an mp3 on disk.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns `Ok(false)` when the service answered but produced no audio.
    async fn synthesize(
        &self,
        lang: &str,
        speaker: &str,
        text: &str,
        out_mp3: &Path,
    ) -> Result<bool>;
}

/// First voice for Alice, second for everyone else.
pub fn pick_voice<'a>(voices: (&'a str, &'a str), speaker: &str) -> &'a str {
    if speaker.trim().eq_ignore_ascii_case("alice") {
        voices.0
    } else {
        voices.1
    }
}

fn speaker_prefix_regex() -> Result<&'static Regex> {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_try_init(|| Regex::new(r"^[A-Za-z]+:\s*").context("failed to compile speaker regex"))
}

fn whitespace_regex() -> Result<&'static Regex> {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_try_init(|| Regex::new(r"\s+").context("failed to compile whitespace regex"))
}

fn latin_word_regex() -> Result<&'static Regex> {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_try_init(|| Regex::new(r"[A-Za-z]+").context("failed to compile latin regex"))
}

fn symbol_regex() -> Result<&'static Regex> {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_try_init(|| Regex::new(r#"[#"'※＊*~`]"#).context("failed to compile symbol regex"))
}

/// Prepares a line for speech: drops a leading `Name:` and collapses
/// whitespace. Japanese also loses Latin words and decorative symbols, which
/// the voices otherwise spell out. Never returns an empty string.
pub fn clean_for_tts(text: &str, lang: &str) -> Result<String> {
    let ws = whitespace_regex()?;
    let stripped = speaker_prefix_regex()?.replace(text, "");
    let mut out = ws.replace_all(&stripped, " ").trim().to_string();

    if lang == "ja" {
        let no_latin = latin_word_regex()?.replace_all(&out, "");
        let no_symbols = symbol_regex()?.replace_all(&no_latin, "");
        out = ws.replace_all(&no_symbols, " ").trim().to_string();
    }

    if out.is_empty() {
        out.push('。');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_speaker_and_whitespace() {
        assert_eq!(
            clean_for_tts("Alice:   Good\n morning  ", "en").unwrap(),
            "Good morning"
        );
    }

    #[test]
    fn japanese_drops_latin_and_symbols() {
        assert_eq!(
            clean_for_tts("Bob: これは *OK* ※テスト です", "ja").unwrap(),
            "これは テスト です"
        );
    }

    #[test]
    fn empty_becomes_full_stop() {
        assert_eq!(clean_for_tts("Alice:", "en").unwrap(), "。");
        assert_eq!(clean_for_tts("hello", "ja").unwrap(), "。");
    }

    #[test]
    fn alice_gets_first_voice() {
        assert_eq!(pick_voice(("nova", "echo"), "Alice"), "nova");
        assert_eq!(pick_voice(("nova", "echo"), "ALICE "), "nova");
        assert_eq!(pick_voice(("nova", "echo"), "Bob"), "echo");
        assert_eq!(pick_voice(("nova", "echo"), ""), "echo");
    }
}
