//! WebVTT codec: parsing, serialization, batching.

pub mod batch;
pub mod parser;
pub mod types;
pub mod writer;

pub use batch::{merge, split, DEFAULT_BATCH_DURATION_MS};
pub use parser::{parse, parse_timestamp};
pub use types::{ms_to_timestamp, timestamp_to_ms, Cue, ParsedVtt, Timestamp, VttFile};
pub use writer::{generate, GenerateOptions};
