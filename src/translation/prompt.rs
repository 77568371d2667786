//! Prompt construction.
//!
//! One system prompt per task, one user prompt per batch. The model is asked
//! for a complete WebVTT document back so the reply can be checked cue by cue.

use crate::config::TranslationConfig;

/// Lecture metadata and languages that shape the system prompt
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub source_language: String,
    pub target_language: String,
    pub course_name: Option<String>,
    pub section_name: Option<String>,
    pub lecture_name: Option<String>,
}

impl Default for PromptContext {
    fn default() -> Self {
        let config = TranslationConfig::default();
        Self {
            source_language: config.source_language,
            target_language: config.target_language,
            course_name: None,
            section_name: None,
            lecture_name: None,
        }
    }
}

impl PromptContext {
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            source_language: config.source_language.clone(),
            target_language: config.target_language.clone(),
            ..Self::default()
        }
    }

    pub fn with_names(
        mut self,
        course_name: Option<String>,
        section_name: Option<String>,
        lecture_name: Option<String>,
    ) -> Self {
        let keep = |name: Option<String>| name.filter(|n| !n.trim().is_empty());
        self.course_name = keep(course_name);
        self.section_name = keep(section_name);
        self.lecture_name = keep(lecture_name);
        self
    }
}

pub fn build_system_prompt(context: &PromptContext) -> String {
    let mut prompt = format!(
        "You are a professional subtitle translator for online video lectures. \
        Translate the WebVTT subtitles you receive from {source} into {target}.\n\n\
        Rules:\n\
        1. Return a complete, valid WebVTT document starting with the line WEBVTT.\n\
        2. Keep every cue, in the same order, with exactly the same timestamps.\n\
        3. Do not merge, split, add or drop cues, even when a sentence spans several cues.\n\
        4. Translate only the cue text. Keep cue identifiers, settings and inline tags such as <i> or <v> unchanged.\n\
        5. Keep technical terms, code and proper names accurate; use the lecture context below for terminology.\n\
        6. Output only the WebVTT document, without explanations or Markdown fences.",
        source = context.source_language,
        target = context.target_language,
    );

    let context_lines: Vec<String> = [
        ("Course", &context.course_name),
        ("Section", &context.section_name),
        ("Lecture", &context.lecture_name),
    ]
    .iter()
    .filter_map(|(label, value)| value.as_ref().map(|v| format!("{}: {}", label, v.trim())))
    .collect();

    if !context_lines.is_empty() {
        prompt.push_str("\n\nLecture context:\n");
        prompt.push_str(&context_lines.join("\n"));
    }

    prompt
}

pub fn build_user_prompt(batch_vtt: &str) -> String {
    format!(
        "Translate the following WebVTT subtitles. Return the full translated WebVTT document.\n\n{}",
        batch_vtt.trim_end()
    )
}
