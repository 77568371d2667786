//! WebVTT serialization.

use crate::subtitle::parser::HEADER_TOKEN;
use crate::subtitle::types::{Cue, Timestamp, VttFile};

/// Output options for [`generate`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Write `MM:SS.mmm` for timestamps below one hour
    pub short_timestamps: bool,
}

fn format_timestamp(ts: &Timestamp, options: &GenerateOptions) -> String {
    if options.short_timestamps {
        ts.to_short_string()
    } else {
        ts.to_long_string()
    }
}

/// `start --> end [settings]`
pub fn format_timing_line(cue: &Cue, options: &GenerateOptions) -> String {
    let mut line = format!(
        "{} --> {}",
        format_timestamp(&cue.start_time, options),
        format_timestamp(&cue.end_time, options)
    );
    if let Some(settings) = cue.settings.as_deref().filter(|s| !s.is_empty()) {
        line.push(' ');
        line.push_str(settings);
    }
    line
}

/// Serialize a file: header, `STYLE`/`REGION`/`NOTE` blocks, then the cues in order.
pub fn generate(file: &VttFile, options: &GenerateOptions) -> String {
    let mut out = String::from(HEADER_TOKEN);
    if let Some(header) = file.header.as_deref().filter(|h| !h.is_empty()) {
        let mut header_lines = header.lines();
        if let Some(first) = header_lines.next() {
            out.push(' ');
            out.push_str(first);
        }
        for line in header_lines {
            out.push('\n');
            out.push_str(line);
        }
    }
    out.push_str("\n\n");

    for style in &file.style_blocks {
        out.push_str("STYLE\n");
        out.push_str(style);
        out.push_str("\n\n");
    }
    for region in &file.regions {
        out.push_str("REGION\n");
        out.push_str(region);
        out.push_str("\n\n");
    }
    for note in &file.notes {
        out.push_str(note);
        out.push_str("\n\n");
    }

    for cue in &file.cues {
        if let Some(id) = cue.id.as_deref().filter(|id| !id.is_empty()) {
            out.push_str(id);
            out.push('\n');
        }
        out.push_str(&format_timing_line(cue, options));
        out.push('\n');
        // Blank lines inside the text would end the cue early
        for line in cue.text.lines().filter(|l| !l.trim().is_empty()) {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }

    out
}
