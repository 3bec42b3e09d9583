use crate::config::WrapChars;
use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_segmentation::UnicodeSegmentation;

/// Writing-system grouping that selects the wrap budget and the font.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptClass {
    Latin,
    Cjk,
    Hangul,
}

impl ScriptClass {
    pub const ALL: [ScriptClass; 3] = [ScriptClass::Latin, ScriptClass::Cjk, ScriptClass::Hangul];

    pub fn of_char(ch: char) -> Option<ScriptClass> {
        match ch as u32 {
            0xAC00..=0xD7A3 | 0x1100..=0x11FF | 0x3130..=0x318F => Some(ScriptClass::Hangul),
            0x3040..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF
            | 0xFF00..=0xFFEF | 0x3000..=0x303F => Some(ScriptClass::Cjk),
            _ => None,
        }
    }

    /// First distinctive character wins; anything else is Latin.
    pub fn detect(text: &str) -> ScriptClass {
        text.chars()
            .find_map(ScriptClass::of_char)
            .unwrap_or(ScriptClass::Latin)
    }

    pub fn wrap_width(self, budget: &WrapChars) -> usize {
        match self {
            ScriptClass::Latin => budget.latin,
            ScriptClass::Cjk => budget.cjk,
            ScriptClass::Hangul => budget.hangul,
        }
    }

    /// Scripts written without spaces break between any two graphemes.
    fn breaks_anywhere(self) -> bool {
        matches!(self, ScriptClass::Cjk)
    }
}

impl fmt::Display for ScriptClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScriptClass::Latin => "latin",
            ScriptClass::Cjk => "cjk",
            ScriptClass::Hangul => "hangul",
        };
        f.write_str(name)
    }
}

fn grapheme_len(text: &str) -> usize {
    text.graphemes(true).count()
}

/// Wraps `text` into lines of at most `width` graphemes.
///
/// Explicit newlines are kept as hard breaks. Words longer than `width` are
/// split; CJK text is split between any graphemes.
pub fn wrap(text: &str, width: usize, class: ScriptClass) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();

    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut len = 0usize;

        for word in paragraph.split_whitespace() {
            let word_len = grapheme_len(word);
            let sep = usize::from(len > 0);

            if len + sep + word_len <= width {
                if sep == 1 {
                    line.push(' ');
                }
                line.push_str(word);
                len += sep + word_len;
                continue;
            }

            if class.breaks_anywhere() {
                if len > 0 && len + 1 < width {
                    line.push(' ');
                    len += 1;
                } else if len > 0 {
                    out.push(std::mem::take(&mut line));
                    len = 0;
                }
            } else {
                if len > 0 {
                    out.push(std::mem::take(&mut line));
                    len = 0;
                }
                if word_len <= width {
                    line.push_str(word);
                    len = word_len;
                    continue;
                }
            }

            for g in word.graphemes(true) {
                if len == width {
                    out.push(std::mem::take(&mut line));
                    len = 0;
                }
                line.push_str(g);
                len += 1;
            }
        }

        if len > 0 {
            out.push(line);
        }
    }

    if out.is_empty() {
        out.push(String::new());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_script_classes() {
        assert_eq!(ScriptClass::detect("Hello there"), ScriptClass::Latin);
        assert_eq!(ScriptClass::detect("Olá, tudo bem?"), ScriptClass::Latin);
        assert_eq!(ScriptClass::detect("こんにちは"), ScriptClass::Cjk);
        assert_eq!(ScriptClass::detect("漢字"), ScriptClass::Cjk);
        assert_eq!(ScriptClass::detect("안녕하세요"), ScriptClass::Hangul);
        assert_eq!(ScriptClass::detect("Alice: 안녕"), ScriptClass::Hangul);
        assert_eq!(ScriptClass::detect(""), ScriptClass::Latin);
    }

    #[test]
    fn cjk_budget_is_narrower_than_latin() {
        let budget = WrapChars::default();
        assert!(ScriptClass::Cjk.wrap_width(&budget) < ScriptClass::Latin.wrap_width(&budget));
    }

    #[test]
    fn wraps_latin_on_words() {
        let lines = wrap("the quick brown fox jumps over the lazy dog", 10, ScriptClass::Latin);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps over", "the lazy", "dog"]);
        assert!(lines.iter().all(|l| grapheme_len(l) <= 10));
    }

    #[test]
    fn breaks_long_latin_words() {
        let lines = wrap("supercalifragilistic ok", 8, ScriptClass::Latin);
        assert_eq!(lines, vec!["supercal", "ifragili", "stic ok"]);
    }

    #[test]
    fn wraps_cjk_between_characters() {
        let lines = wrap("今日はとても良い天気ですね散歩に行きましょう", 8, ScriptClass::Cjk);
        assert_eq!(lines, vec!["今日はとても良い", "天気ですね散歩に", "行きましょう"]);
    }

    #[test]
    fn keeps_hard_breaks() {
        let lines = wrap("first\nsecond line", 40, ScriptClass::Latin);
        assert_eq!(lines, vec!["first", "second line"]);
    }

    #[test]
    fn empty_text_is_one_empty_line() {
        assert_eq!(wrap("   ", 10, ScriptClass::Latin), vec![String::new()]);
    }
}
