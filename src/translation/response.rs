//! Reading and checking LLM replies.

use log::debug;

use crate::error::{Result, SubtitleError};
use crate::subtitle::{self, parser::HEADER_TOKEN, VttFile};

/// Remove a surrounding ```` ``` ```` / ```` ```vtt ```` fence if the model added one
pub fn strip_markdown_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`vtt`, `webvtt`, ...) on the opening line
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse the model's reply as WebVTT.
///
/// Chatter before the header is skipped. Anything that still does not parse
/// is a [`SubtitleError::ResponseFormat`].
pub fn parse_translated_vtt_response(raw: &str) -> Result<VttFile> {
    let body = strip_markdown_fence(raw);
    if body.is_empty() {
        return Err(SubtitleError::ResponseFormat("Empty response from LLM".to_string()));
    }

    let document = match body.find(HEADER_TOKEN) {
        Some(0) => body,
        Some(pos) => {
            debug!("Skipping {} bytes of text before the WEBVTT header", pos);
            &body[pos..]
        }
        None => {
            return Err(SubtitleError::ResponseFormat(
                "LLM response does not contain a WEBVTT header".to_string(),
            ))
        }
    };

    subtitle::parse(document)
        .map(|parsed| parsed.file)
        .map_err(|e| SubtitleError::ResponseFormat(e.to_string()))
}

/// Alignment problems between a source batch and its translation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(SubtitleError::ValidationMismatch(self.errors))
        }
    }
}

/// Same cue count, same timestamps in the same order
pub fn validate_translated_vtt(original: &VttFile, translated: &VttFile) -> ValidationReport {
    let mut errors = Vec::new();

    if original.cues.len() != translated.cues.len() {
        errors.push(format!(
            "Cue count mismatch: expected {}, got {}",
            original.cues.len(),
            translated.cues.len()
        ));
    }

    for (index, (source, target)) in original.cues.iter().zip(&translated.cues).enumerate() {
        if source.start_time != target.start_time || source.end_time != target.end_time {
            errors.push(format!(
                "Cue {} timing mismatch: expected {} --> {}, got {} --> {}",
                index + 1,
                source.start_time,
                source.end_time,
                target.start_time,
                target.end_time
            ));
        }
    }

    ValidationReport { errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::Cue;

    fn batch(cues: &[(u64, u64, &str)]) -> VttFile {
        VttFile::default().with_cues(cues.iter().map(|(s, e, t)| Cue::new(*s, *e, *t)).collect())
    }

    #[test]
    fn test_fenced_response_is_unwrapped() {
        let raw = "```vtt\nWEBVTT\n\n00:00:00.000 --> 00:00:01.000\n你好\n```";
        let file = parse_translated_vtt_response(raw).unwrap();
        assert_eq!(file.cues.len(), 1);
        assert_eq!(file.cues[0].text, "你好");
    }

    #[test]
    fn test_preamble_before_header_is_skipped() {
        let raw = "Here is the translation:\n\nWEBVTT\n\n00:00:00.000 --> 00:00:01.000\nHola";
        let file = parse_translated_vtt_response(raw).unwrap();
        assert_eq!(file.cues[0].text, "Hola");
    }

    #[test]
    fn test_non_vtt_response_is_format_error() {
        for raw in ["", "   ", "1. Hola\n2. Mundo", "```\n```"] {
            let result = parse_translated_vtt_response(raw);
            assert!(matches!(result, Err(SubtitleError::ResponseFormat(_))), "input {:?}", raw);
        }
    }

    #[test]
    fn test_matching_batch_is_valid() {
        let original = batch(&[(0, 1000, "Hello"), (1000, 2000, "World")]);
        let translated = batch(&[(0, 1000, "你好"), (1000, 2000, "世界")]);
        let report = validate_translated_vtt(&original, &translated);
        assert!(report.is_valid());
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_dropped_and_shifted_cues_are_reported() {
        let original = batch(&[(0, 1000, "a"), (1000, 2000, "b"), (2000, 3000, "c")]);
        let translated = batch(&[(0, 1000, "x"), (1000, 2500, "y")]);
        let report = validate_translated_vtt(&original, &translated);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[0].starts_with("Cue count mismatch"));
        assert!(report.errors[1].starts_with("Cue 2 timing mismatch"));
        assert!(matches!(report.into_result(), Err(SubtitleError::ValidationMismatch(_))));
    }
}
