use crate::logw;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tokio::fs;

/// One utterance of the generated conversation, after speech synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker: String,
    pub text_primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_secondary: Option<String>,
    pub duration_seconds: f64,
}

impl DialogueLine {
    pub fn new(
        speaker: impl Into<String>,
        text_primary: impl Into<String>,
        text_secondary: Option<String>,
        duration_seconds: f64,
    ) -> Self {
        Self {
            speaker: speaker.into(),
            text_primary: text_primary.into(),
            text_secondary,
            duration_seconds,
        }
    }

    /// Secondary text, if present and not blank.
    pub fn secondary(&self) -> Option<&str> {
        self.text_secondary
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    pub fn speaker_label(&self) -> Option<&str> {
        let speaker = self.speaker.trim();
        if speaker.is_empty() { None } else { Some(speaker) }
    }

    pub fn is_renderable(&self) -> bool {
        self.duration_seconds.is_finite()
            && self.duration_seconds > 0.0
            && !is_placeholder(&self.text_primary)
    }
}

/// Empty text, or the marker the translator leaves behind on failure.
pub fn is_placeholder(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "。" {
        return true;
    }
    trimmed.starts_with('[') && trimmed.ends_with(" unavailable]")
}

/// Drops lines that must never reach the segmenter or the caption fitter.
pub fn retain_renderable(lines: Vec<DialogueLine>) -> Vec<DialogueLine> {
    lines
        .into_iter()
        .enumerate()
        .filter_map(|(idx, line)| {
            if line.is_renderable() {
                Some(line)
            } else {
                logw(format!(
                    "Skipping line {} (speaker={:?}, dur={:.3}s): empty or placeholder text",
                    idx + 1,
                    line.speaker,
                    line.duration_seconds
                ));
                None
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LineRecord {
    Tuple(Vec<Value>),
    Object(DialogueLine),
}

fn line_from_tuple(idx: usize, row: &[Value]) -> Result<DialogueLine> {
    if row.len() < 3 {
        bail!(
            "lines.json row {}: expected [speaker, text..., duration], got {} fields",
            idx + 1,
            row.len()
        );
    }

    let speaker = row[0].as_str().unwrap_or_default().to_string();
    let duration = row[row.len() - 1]
        .as_f64()
        .with_context(|| format!("lines.json row {}: duration is not a number", idx + 1))?;

    let texts: Vec<String> = row[1..row.len() - 1]
        .iter()
        .map(|v| v.as_str().unwrap_or_default().to_string())
        .collect();

    let text_primary = texts.first().cloned().unwrap_or_default();
    let text_secondary = texts.get(1).cloned();

    Ok(DialogueLine::new(speaker, text_primary, text_secondary, duration))
}

pub fn parse_lines(text: &str) -> Result<Vec<DialogueLine>> {
    let records: Vec<LineRecord> =
        serde_json::from_str(text).context("Failed to parse lines JSON")?;

    records
        .into_iter()
        .enumerate()
        .map(|(idx, record)| match record {
            LineRecord::Tuple(row) => line_from_tuple(idx, &row),
            LineRecord::Object(line) => Ok(line),
        })
        .collect()
}

/// Keeps only the first `rows` subtitle rows of every line.
pub fn limit_rows(lines: Vec<DialogueLine>, rows: usize) -> Vec<DialogueLine> {
    if rows >= 2 {
        return lines;
    }
    lines
        .into_iter()
        .map(|mut line| {
            line.text_secondary = None;
            line
        })
        .collect()
}

pub fn lines_to_json(lines: &[DialogueLine]) -> Result<String> {
    let rows: Vec<Value> = lines
        .iter()
        .map(|line| {
            let mut row = vec![
                Value::from(line.speaker.clone()),
                Value::from(line.text_primary.clone()),
            ];
            if let Some(secondary) = &line.text_secondary {
                row.push(Value::from(secondary.clone()));
            }
            row.push(Value::from(line.duration_seconds));
            Value::Array(row)
        })
        .collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

pub async fn load_lines_file<P: AsRef<Path>>(path: P) -> Result<Vec<DialogueLine>> {
    let content = fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read lines: {}", path.as_ref().display()))?;
    parse_lines(&content)
}

pub async fn save_lines_file<P: AsRef<Path>>(path: P, lines: &[DialogueLine]) -> Result<()> {
    let json = lines_to_json(lines)?;
    fs::write(&path, json)
        .await
        .with_context(|| format!("Failed to write lines: {}", path.as_ref().display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tuple_rows() {
        let text = r#"[["Alice", "Hello", "こんにちは", 1.5], ["Bob", "Hi", 0.75]]"#;
        let lines = parse_lines(text).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].speaker, "Alice");
        assert_eq!(lines[0].text_secondary.as_deref(), Some("こんにちは"));
        assert_eq!(lines[1].text_secondary, None);
        assert!((lines[1].duration_seconds - 0.75).abs() < 1e-9);
    }

    #[test]
    fn parses_object_rows() {
        let text = r#"[{"speaker": "", "text_primary": "Olá", "duration_seconds": 2.0}]"#;
        let lines = parse_lines(text).unwrap();
        assert_eq!(lines[0].text_primary, "Olá");
        assert_eq!(lines[0].speaker_label(), None);
    }

    #[test]
    fn rejects_short_rows() {
        assert!(parse_lines(r#"[["Alice", 1.0]]"#).is_err());
        assert!(parse_lines(r#"[["Alice", "Hi", "oops"]]"#).is_err());
    }

    #[test]
    fn json_output_reads_back() {
        let lines = vec![
            DialogueLine::new("Alice", "Good morning", Some("Bom dia".into()), 1.25),
            DialogueLine::new("Bob", "Morning!", None, 0.5),
        ];
        let json = lines_to_json(&lines).unwrap();
        assert_eq!(parse_lines(&json).unwrap(), lines);
    }

    #[test]
    fn filters_placeholders_and_bad_durations() {
        let lines = vec![
            DialogueLine::new("Alice", "Keep me", None, 1.0),
            DialogueLine::new("Bob", "   ", None, 1.0),
            DialogueLine::new("Bob", "[JA unavailable]", None, 1.0),
            DialogueLine::new("Alice", "Zero", None, 0.0),
            DialogueLine::new("Alice", "NaN", None, f64::NAN),
        ];
        let kept = retain_renderable(lines);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text_primary, "Keep me");
    }

    #[test]
    fn blank_secondary_is_absent() {
        let line = DialogueLine::new("Alice", "Hi", Some("  ".into()), 1.0);
        assert_eq!(line.secondary(), None);
        let one_row = limit_rows(vec![DialogueLine::new("A", "x", Some("y".into()), 1.0)], 1);
        assert_eq!(one_row[0].text_secondary, None);
    }

    #[tokio::test]
    async fn lines_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.json");
        let lines = vec![DialogueLine::new("Alice", "Hello", Some("Halo".into()), 2.0)];
        save_lines_file(&path, &lines).await.unwrap();
        assert_eq!(load_lines_file(&path).await.unwrap(), lines);
    }
}
