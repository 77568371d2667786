//! WebVTT parser.
//!
//! Strict about the header, lenient about everything after it: broken cue
//! blocks are skipped and reported as warnings instead of failing the parse.

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SubtitleError};
use crate::subtitle::types::{Cue, ParsedVtt, Timestamp, VttFile};

pub const HEADER_TOKEN: &str = "WEBVTT";

static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+):)?(\d{1,2}):(\d{1,2})(?:\.(\d{1,3}))?$").expect("timestamp regex is valid")
});

/// Parse `HH:MM:SS.mmm` or `MM:SS.mmm`
pub fn parse_timestamp(time_str: &str) -> Result<Timestamp> {
    let invalid = || SubtitleError::Parse(format!("Invalid timestamp: {}", time_str));
    let caps = TIMESTAMP_RE.captures(time_str.trim()).ok_or_else(invalid)?;

    let number = |idx: usize| -> Result<u64> {
        match caps.get(idx) {
            Some(m) => m.as_str().parse::<u64>().map_err(|_| invalid()),
            None => Ok(0),
        }
    };

    let hours = number(1)?;
    let minutes = number(2)?;
    let seconds = number(3)?;
    if minutes >= 60 || seconds >= 60 {
        return Err(invalid());
    }

    // Short fractions are tenths or hundredths
    let milliseconds = match caps.get(4) {
        Some(m) => {
            let digits = m.as_str();
            let value = digits.parse::<u64>().map_err(|_| invalid())?;
            match digits.len() {
                1 => value * 100,
                2 => value * 10,
                _ => value,
            }
        }
        None => 0,
    };

    let total = hours
        .checked_mul(3_600_000)
        .and_then(|ms| ms.checked_add(minutes * 60_000 + seconds * 1_000 + milliseconds))
        .ok_or_else(|| SubtitleError::Parse(format!("Timestamp out of range: {}", time_str)))?;
    Ok(Timestamp::from_millis(total))
}

/// Splits `start --> end [settings]`
fn parse_timing_line(line: &str) -> Result<(Timestamp, Timestamp, Option<String>)> {
    let (start, rest) = line
        .split_once("-->")
        .ok_or_else(|| SubtitleError::Parse(format!("Missing '-->' in timing line: {}", line)))?;

    let mut rest = rest.split_whitespace();
    let end = rest
        .next()
        .ok_or_else(|| SubtitleError::Parse(format!("Missing end timestamp: {}", line)))?;
    let settings: Vec<&str> = rest.collect();

    let start = parse_timestamp(start)?;
    let end = parse_timestamp(end)?;
    let settings = if settings.is_empty() { None } else { Some(settings.join(" ")) };

    Ok((start, end, settings))
}

fn starts_with_keyword(line: &str, keyword: &str) -> bool {
    match line.strip_prefix(keyword) {
        Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
        None => false,
    }
}

fn normalize_line_endings(text: &str) -> String {
    text.trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

/// Parse WebVTT text.
///
/// Whitespace-only input yields an empty file. Anything else must start with
/// the `WEBVTT` token.
pub fn parse(text: &str) -> Result<ParsedVtt> {
    let normalized = normalize_line_endings(text);
    let content = normalized.trim_start();

    if content.trim().is_empty() {
        return Ok(ParsedVtt::default());
    }

    if !starts_with_keyword(content, HEADER_TOKEN) {
        return Err(SubtitleError::Parse("Invalid VTT file format: missing WEBVTT header".to_string()));
    }

    let mut lines = content.lines();
    let mut header_parts = Vec::new();

    // Header: the rest of the WEBVTT line plus anything up to the first blank line
    if let Some(first) = lines.next() {
        let remainder = first[HEADER_TOKEN.len()..].trim();
        if !remainder.is_empty() {
            header_parts.push(remainder.to_string());
        }
    }
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut current = Vec::new();
    for line in lines.by_ref() {
        if line.trim().is_empty() {
            break;
        }
        // A cue glued to the header without a blank line
        if line.contains("-->") {
            current.push(line.trim_end());
            break;
        }
        header_parts.push(line.trim_end().to_string());
    }

    for line in lines {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    let mut file = VttFile {
        header: if header_parts.is_empty() { None } else { Some(header_parts.join("\n")) },
        ..VttFile::default()
    };
    let mut warnings = Vec::new();

    for (block_index, block) in blocks.iter().enumerate() {
        let first = block[0].trim();

        if starts_with_keyword(first, "NOTE") {
            file.notes.push(block.join("\n"));
            continue;
        }
        if first == "STYLE" {
            file.style_blocks.push(block[1..].join("\n"));
            continue;
        }
        if first == "REGION" {
            file.regions.push(block[1..].join("\n"));
            continue;
        }

        match parse_cue_block(block) {
            Ok(cue) => {
                if let Some(prev) = file.cues.last() {
                    if cue.start_time < prev.start_time {
                        warnings.push(format!(
                            "Block {}: cue starts at {} before previous cue at {}",
                            block_index + 1,
                            cue.start_time,
                            prev.start_time
                        ));
                    }
                }
                file.cues.push(cue);
            }
            Err(e) => warnings.push(format!("Block {} skipped: {}", block_index + 1, e)),
        }
    }

    for warning in &warnings {
        warn!("{}", warning);
    }
    debug!(
        "Parsed {} cues ({} style, {} region, {} note blocks, {} warnings)",
        file.cues.len(),
        file.style_blocks.len(),
        file.regions.len(),
        file.notes.len(),
        warnings.len()
    );

    Ok(ParsedVtt { file, warnings })
}

/// Parse one cue block: optional id line, timing line, text lines
fn parse_cue_block(block: &[&str]) -> Result<Cue> {
    let (id, timing_index) = if block[0].contains("-->") {
        (None, 0)
    } else if block.len() > 1 && block[1].contains("-->") {
        (Some(block[0].trim().to_string()), 1)
    } else {
        return Err(SubtitleError::Parse(format!("no timing line in block starting '{}'", block[0])));
    };

    let (start_time, end_time, settings) = parse_timing_line(block[timing_index])?;
    if start_time > end_time {
        return Err(SubtitleError::Parse(format!("cue ends at {} before it starts at {}", end_time, start_time)));
    }

    Ok(Cue {
        id,
        start_time,
        end_time,
        text: block[timing_index + 1..].join("\n"),
        settings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_document() {
        let parsed = parse("WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nHello").unwrap();
        assert_eq!(parsed.file.cues.len(), 1);
        let cue = &parsed.file.cues[0];
        assert_eq!(cue.start_ms(), 0);
        assert_eq!(cue.end_ms(), 1000);
        assert_eq!(cue.text, "Hello");
        assert!(cue.id.is_none());
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_missing_header_is_an_error() {
        let result = parse("00:00:00.000 --> 00:00:01.000\nHello");
        assert!(matches!(result, Err(SubtitleError::Parse(_))));

        let result = parse("WEBVTTX\n\n00:00:00.000 --> 00:00:01.000\nHello");
        assert!(matches!(result, Err(SubtitleError::Parse(_))));
    }

    #[test]
    fn test_blank_input_is_empty_file() {
        assert!(parse("").unwrap().file.cues.is_empty());
        assert!(parse("  \n\t\n").unwrap().file.cues.is_empty());
        assert!(parse("WEBVTT\n\n").unwrap().file.cues.is_empty());
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert_eq!(parse_timestamp("00:01:23.456").unwrap().as_millis(), 83_456);
        assert_eq!(parse_timestamp("01:23.456").unwrap().as_millis(), 83_456);
        assert_eq!(parse_timestamp("1:00:00.000").unwrap().as_millis(), 3_600_000);
        assert_eq!(parse_timestamp("00:00:01.5").unwrap().as_millis(), 1_500);
        assert!(parse_timestamp("00:61:00.000").is_err());
        assert!(parse_timestamp("abc").is_err());
    }

    #[test]
    fn test_huge_hours_are_rejected() {
        assert!(matches!(
            parse_timestamp("99999999999999999:00:00.000"),
            Err(SubtitleError::Parse(_))
        ));

        let text = "WEBVTT\n\n99999999999999999:00:00.000 --> 99999999999999999:00:01.000\nBoom\n\n\
                    00:00:01.000 --> 00:00:02.000\nOk";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.file.cues.len(), 1);
        assert_eq!(parsed.file.cues[0].text, "Ok");
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn test_ids_settings_and_multiline_text() {
        let text = "WEBVTT - lecture 3\nKind: captions\n\n\
                    intro\n00:00:01.000 --> 00:00:04.000 align:start line:0\n<v Speaker>Welcome</v>\nto <i>the</i> course\n\n\
                    00:05.000 --> 00:07.500\nSecond";
        let parsed = parse(text).unwrap();
        let file = parsed.file;

        assert_eq!(file.header.as_deref(), Some("- lecture 3\nKind: captions"));
        assert_eq!(file.cues.len(), 2);
        assert_eq!(file.cues[0].id.as_deref(), Some("intro"));
        assert_eq!(file.cues[0].settings.as_deref(), Some("align:start line:0"));
        assert_eq!(file.cues[0].text, "<v Speaker>Welcome</v>\nto <i>the</i> course");
        assert_eq!(file.cues[1].start_ms(), 5_000);
        assert_eq!(file.cues[1].end_ms(), 7_500);
    }

    #[test]
    fn test_note_style_region_blocks_are_opaque() {
        let text = "WEBVTT\n\nSTYLE\n::cue { color: yellow }\n\nREGION\nid:fred width:40%\n\n\
                    NOTE this is a comment\nspanning lines\n\n00:00:00.000 --> 00:00:01.000\nHi";
        let file = parse(text).unwrap().file;
        assert_eq!(file.style_blocks, vec!["::cue { color: yellow }".to_string()]);
        assert_eq!(file.regions, vec!["id:fred width:40%".to_string()]);
        assert_eq!(file.notes, vec!["NOTE this is a comment\nspanning lines".to_string()]);
        assert_eq!(file.cues.len(), 1);
    }

    #[test]
    fn test_malformed_blocks_are_skipped_with_warnings() {
        let text = "WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nOne\n\n\
                    bad --> worse\nBroken\n\n\
                    just some text\n\n\
                    00:00:03.000 --> 00:00:02.000\nBackwards\n\n\
                    00:00:04.000 --> 00:00:05.000\nTwo";
        let parsed = parse(text).unwrap();
        let texts: Vec<&str> = parsed.file.cues.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["One", "Two"]);
        assert_eq!(parsed.warnings.len(), 3);
    }

    #[test]
    fn test_out_of_order_cues_are_reported_not_reordered() {
        let text = "WEBVTT\n\n00:00:05.000 --> 00:00:06.000\nLater\n\n00:00:01.000 --> 00:00:02.000\nEarlier";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.file.cues[0].text, "Later");
        assert_eq!(parsed.warnings.len(), 1);

        let sorted = parsed.file.normalize_order();
        assert_eq!(sorted.cues[0].text, "Earlier");
    }

    #[test]
    fn test_cue_directly_after_header() {
        let file = parse("WEBVTT\n00:00:00.000 --> 00:00:01.000\nHello").unwrap().file;
        assert!(file.header.is_none());
        assert_eq!(file.cues.len(), 1);
    }

    #[test]
    fn test_crlf_and_bom_are_tolerated() {
        let text = "\u{feff}WEBVTT\r\n\r\n00:00:00.000 --> 00:00:01.000\r\nHello\r\nWorld\r\n";
        let file = parse(text).unwrap().file;
        assert_eq!(file.cues[0].text, "Hello\nWorld");
    }
}
