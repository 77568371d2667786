//! Translate WebVTT lecture subtitles with an LLM.
//!
//! Source cues are split into duration-bounded batches, each batch is sent to
//! the provider and checked cue by cue, and the result is cached per
//! `(course, lecture)`.

pub mod cache;
pub mod config;
pub mod error;
pub mod estimate;
pub mod llm;
pub mod notification;
pub mod pipeline;
pub mod progress;
pub mod subtitle;
pub mod translation;
pub mod utils;

pub use cache::{CacheDecision, CacheEntry, CacheStats, TranslationCache};
pub use config::{CacheConfig, PipelineConfig, Provider, TranslationConfig};
pub use error::{Result, SubtitleError};
pub use estimate::{estimate_translation_cost, CostEstimate};
pub use pipeline::{Pipeline, TaskRequest};
pub use progress::{CompletionEvent, ProgressEvent, TaskEventSink, TaskStage};
pub use subtitle::{Cue, Timestamp, VttFile};
pub use translation::{TranslationResult, Translator};
