//! Core subtitle data types.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

/// Wall-clock position inside a subtitle track.
///
/// Equality and ordering compare the total instant, so two values with a
/// different hour/minute split but the same millisecond total are equal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub milliseconds: u64,
}

impl Timestamp {
    pub fn new(hours: u64, minutes: u64, seconds: u64, milliseconds: u64) -> Self {
        Self {
            hours,
            minutes,
            seconds,
            milliseconds,
        }
    }

    /// Canonical split of a millisecond total
    pub fn from_millis(ms: u64) -> Self {
        Self {
            hours: ms / MS_PER_HOUR,
            minutes: (ms % MS_PER_HOUR) / MS_PER_MINUTE,
            seconds: (ms % MS_PER_MINUTE) / MS_PER_SECOND,
            milliseconds: ms % MS_PER_SECOND,
        }
    }

    /// Saturates at `u64::MAX` for out-of-range fields
    pub fn as_millis(&self) -> u64 {
        self.hours
            .saturating_mul(MS_PER_HOUR)
            .saturating_add(self.minutes.saturating_mul(MS_PER_MINUTE))
            .saturating_add(self.seconds.saturating_mul(MS_PER_SECOND))
            .saturating_add(self.milliseconds)
    }

    /// `HH:MM:SS.mmm`
    pub fn to_long_string(&self) -> String {
        let c = Self::from_millis(self.as_millis());
        format!("{:02}:{:02}:{:02}.{:03}", c.hours, c.minutes, c.seconds, c.milliseconds)
    }

    /// `MM:SS.mmm` when the hour part is zero, long form otherwise
    pub fn to_short_string(&self) -> String {
        let c = Self::from_millis(self.as_millis());
        if c.hours == 0 {
            format!("{:02}:{:02}.{:03}", c.minutes, c.seconds, c.milliseconds)
        } else {
            c.to_long_string()
        }
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.as_millis() == other.as_millis()
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_millis().cmp(&other.as_millis())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_long_string())
    }
}

/// Milliseconds to [`Timestamp`]
pub fn ms_to_timestamp(ms: u64) -> Timestamp {
    Timestamp::from_millis(ms)
}

/// [`Timestamp`] to milliseconds
pub fn timestamp_to_ms(ts: &Timestamp) -> u64 {
    ts.as_millis()
}

/// A single timed text entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    pub id: Option<String>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    /// Cue payload, lines joined with `\n`; inline tags are kept verbatim
    pub text: String,
    /// Cue settings that follow the end timestamp (`align:start line:0` ...)
    pub settings: Option<String>,
}

impl Cue {
    pub fn new(start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            id: None,
            start_time: Timestamp::from_millis(start_ms),
            end_time: Timestamp::from_millis(end_ms),
            text: text.into(),
            settings: None,
        }
    }

    pub fn start_ms(&self) -> u64 {
        self.start_time.as_millis()
    }

    pub fn end_ms(&self) -> u64 {
        self.end_time.as_millis()
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms().saturating_sub(self.start_ms())
    }
}

/// A parsed WebVTT document.
///
/// Values are never mutated after parsing; every transformation returns a new file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VttFile {
    /// Text following the `WEBVTT` token and any header lines before the first blank line
    pub header: Option<String>,
    pub cues: Vec<Cue>,
    /// Bodies of `STYLE` blocks
    pub style_blocks: Vec<String>,
    /// Bodies of `REGION` blocks
    pub regions: Vec<String>,
    /// Full text of `NOTE` blocks
    pub notes: Vec<String>,
}

impl VttFile {
    /// Same header and blocks, different cues
    pub fn with_cues(&self, cues: Vec<Cue>) -> Self {
        Self {
            header: self.header.clone(),
            cues,
            style_blocks: self.style_blocks.clone(),
            regions: self.regions.clone(),
            notes: self.notes.clone(),
        }
    }

    /// Replace each cue's text, keeping ids, timing and settings.
    ///
    /// Returns `None` when the number of texts differs from the number of cues.
    pub fn with_cue_texts<I, S>(&self, texts: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let texts: Vec<String> = texts.into_iter().map(Into::into).collect();
        if texts.len() != self.cues.len() {
            return None;
        }
        let cues = self
            .cues
            .iter()
            .zip(texts)
            .map(|(cue, text)| Cue { text, ..cue.clone() })
            .collect();
        Some(self.with_cues(cues))
    }

    /// Stable sort by start time. Only applied when a caller asks for it.
    pub fn normalize_order(&self) -> Self {
        let mut cues = self.cues.clone();
        cues.sort_by_key(|cue| cue.start_ms());
        self.with_cues(cues)
    }

    /// End of the last cue
    pub fn duration_ms(&self) -> u64 {
        self.cues.iter().map(Cue::end_ms).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }
}

/// Parse output: the file plus the cue blocks that were skipped
#[derive(Debug, Clone, Default)]
pub struct ParsedVtt {
    pub file: VttFile,
    pub warnings: Vec<String>,
}
