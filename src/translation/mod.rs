//! LLM translation of subtitle batches.

pub mod prompt;
pub mod registry;
pub mod response;
pub mod translator;

pub use prompt::{build_system_prompt, build_user_prompt, PromptContext};
pub use registry::{TaskGuard, TaskRegistry};
pub use response::{parse_translated_vtt_response, strip_markdown_fence, validate_translated_vtt, ValidationReport};
pub use translator::{TokenUsage, TranslationResult, Translator};
