//! Token and cost estimation.
//!
//! Character-count heuristics, good enough to show the user a price before
//! the first request goes out. Nothing here touches the network.

use serde::{Deserialize, Serialize};

use crate::config::{Provider, TranslationConfig};
use crate::error::Result;
use crate::subtitle::{self, DEFAULT_BATCH_DURATION_MS};
use crate::translation::prompt::{build_system_prompt, build_user_prompt, PromptContext};

/// Price used for models missing from [`PRICING`]
pub const DEFAULT_PRICE_PER_1K: f64 = 0.002;

/// USD per 1K tokens, blended across input and output
const PRICING: &[(&str, f64)] = &[
    ("gpt-4o-mini", 0.000_375),
    ("gpt-4o", 0.006_25),
    ("gpt-4.1-mini", 0.001),
    ("gpt-4.1-nano", 0.000_25),
    ("gpt-4.1", 0.005),
    ("gpt-4-turbo", 0.02),
    ("gpt-3.5-turbo", 0.001),
    ("gemini-2.0-flash", 0.000_25),
    ("gemini-1.5-flash", 0.000_19),
    ("gemini-1.5-pro", 0.003_125),
    ("gemini-2.5-pro", 0.005_625),
    ("gemini-2.5-flash", 0.001_4),
];

/// Per-provider tokenizer approximation
struct TokenRatio {
    ascii_chars_per_token: f64,
    tokens_per_other_char: f64,
}

fn token_ratio(provider: Provider) -> TokenRatio {
    match provider {
        Provider::OpenAi => TokenRatio {
            ascii_chars_per_token: 4.0,
            tokens_per_other_char: 1.0,
        },
        Provider::Gemini => TokenRatio {
            ascii_chars_per_token: 4.0,
            tokens_per_other_char: 0.8,
        },
    }
}

/// Approximate token count. Zero for empty text, never decreases as text grows.
pub fn estimate_tokens(provider: Provider, text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    let ratio = token_ratio(provider);
    let (ascii, other) = text
        .chars()
        .fold((0u64, 0u64), |(a, o), c| if c.is_ascii() { (a + 1, o) } else { (a, o + 1) });

    let tokens = ascii as f64 / ratio.ascii_chars_per_token + other as f64 * ratio.tokens_per_other_char;
    tokens.ceil() as u64
}

/// Model price per 1K tokens; dated snapshots match by prefix
pub fn price_per_thousand(model: &str) -> f64 {
    let model = model.trim().to_ascii_lowercase();
    PRICING
        .iter()
        .filter(|(name, _)| model.starts_with(name))
        .max_by_key(|(name, _)| name.len())
        .map(|(_, price)| *price)
        .unwrap_or(DEFAULT_PRICE_PER_1K)
}

/// Cost in USD for `token_count` tokens
pub fn calculate_cost(model: &str, token_count: u64) -> f64 {
    token_count as f64 / 1000.0 * price_per_thousand(model)
}

/// Up-front estimate for translating a whole document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub cue_count: usize,
    pub estimated_prompt_tokens: u64,
    pub estimated_output_tokens: u64,
    pub estimated_total_tokens: u64,
    pub estimated_cost: f64,
    pub estimated_batches: usize,
}

/// Estimate with the default 10-minute batch window
pub fn estimate_translation_cost(vtt_text: &str, provider: Provider, model: &str) -> Result<CostEstimate> {
    estimate_with_batch_duration(vtt_text, provider, model, DEFAULT_BATCH_DURATION_MS)
}

/// Estimate using the same settings a translate call would use
pub fn estimate_for_config(vtt_text: &str, config: &TranslationConfig) -> Result<CostEstimate> {
    estimate_with_context(vtt_text, config, &PromptContext::from_config(config))
}

/// Like [`estimate_for_config`], with the exact prompt context of the task
pub fn estimate_with_context(
    vtt_text: &str,
    config: &TranslationConfig,
    context: &PromptContext,
) -> Result<CostEstimate> {
    estimate_batches(
        vtt_text,
        config.provider,
        &config.effective_model(),
        config.max_batch_duration_ms,
        context,
    )
}

/// Estimate for the default language pair
pub fn estimate_with_batch_duration(
    vtt_text: &str,
    provider: Provider,
    model: &str,
    max_batch_duration_ms: u64,
) -> Result<CostEstimate> {
    estimate_batches(vtt_text, provider, model, max_batch_duration_ms, &PromptContext::default())
}

/// Batches are counted with the real splitter, so the estimate matches the
/// number of requests a translation would make.
fn estimate_batches(
    vtt_text: &str,
    provider: Provider,
    model: &str,
    max_batch_duration_ms: u64,
    context: &PromptContext,
) -> Result<CostEstimate> {
    let parsed = subtitle::parse(vtt_text)?;
    let file = parsed.file;
    if file.cues.is_empty() {
        return Ok(CostEstimate::default());
    }

    let batches = subtitle::split(&file, max_batch_duration_ms);
    let system_prompt = build_system_prompt(context);
    let system_tokens = estimate_tokens(provider, &system_prompt);

    let mut prompt_tokens = 0;
    let mut output_tokens = 0;
    for batch in &batches {
        let batch_text = subtitle::generate(batch, &subtitle::GenerateOptions::default());
        prompt_tokens += system_tokens + estimate_tokens(provider, &build_user_prompt(&batch_text));
        // The reply is a WebVTT document of the same shape
        output_tokens += estimate_tokens(provider, &batch_text);
    }

    let total = prompt_tokens + output_tokens;
    Ok(CostEstimate {
        cue_count: file.cues.len(),
        estimated_prompt_tokens: prompt_tokens,
        estimated_output_tokens: output_tokens,
        estimated_total_tokens: total,
        estimated_cost: calculate_cost(model, total),
        estimated_batches: batches.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_zero_for_empty_and_monotonic() {
        for provider in [Provider::OpenAi, Provider::Gemini] {
            assert_eq!(estimate_tokens(provider, ""), 0);
            let mut previous = 0;
            let mut text = String::new();
            for c in "Hello, 世界! Recursion is 递归.".chars() {
                text.push(c);
                let tokens = estimate_tokens(provider, &text);
                assert!(tokens >= previous);
                previous = tokens;
            }
            assert!(previous > 0);
        }
    }

    #[test]
    fn test_unknown_model_uses_default_price() {
        assert_eq!(price_per_thousand("some-new-model"), DEFAULT_PRICE_PER_1K);
        assert!((calculate_cost("some-new-model", 1000) - DEFAULT_PRICE_PER_1K).abs() < 1e-12);
    }

    #[test]
    fn test_dated_snapshot_matches_longest_prefix() {
        assert_eq!(price_per_thousand("gpt-4o-mini-2024-07-18"), price_per_thousand("gpt-4o-mini"));
        assert_ne!(price_per_thousand("gpt-4o-mini"), price_per_thousand("gpt-4o"));
    }

    #[test]
    fn test_empty_document_estimate_is_zero() {
        let estimate = estimate_translation_cost("WEBVTT\n\n", Provider::OpenAi, "gpt-4o-mini").unwrap();
        assert_eq!(estimate.cue_count, 0);
        assert_eq!(estimate.estimated_total_tokens, 0);
        assert_eq!(estimate.estimated_cost, 0.0);
        assert_eq!(estimate.estimated_batches, 0);
    }

    #[test]
    fn test_config_languages_reach_the_estimate() {
        let text = "WEBVTT\n\n00:00:00.000 --> 00:00:05.000\nHello\n\n";
        let default = TranslationConfig::default();
        let german = TranslationConfig {
            target_language: "German as spoken in Switzerland, formal register".to_string(),
            ..TranslationConfig::default()
        };

        let base = estimate_for_config(text, &default).unwrap();
        let longer = estimate_for_config(text, &german).unwrap();
        assert!(longer.estimated_prompt_tokens > base.estimated_prompt_tokens);
        assert_eq!(longer.estimated_output_tokens, base.estimated_output_tokens);

        let named = PromptContext::from_config(&german).with_names(Some("Algorithms".to_string()), None, None);
        let with_names = estimate_with_context(text, &german, &named).unwrap();
        assert!(with_names.estimated_prompt_tokens > longer.estimated_prompt_tokens);
    }

    #[test]
    fn test_batches_follow_splitter() {
        let mut text = String::from("WEBVTT\n\n");
        for i in 0..300u64 {
            let start = subtitle::ms_to_timestamp(i * 5_000);
            let end = subtitle::ms_to_timestamp((i + 1) * 5_000);
            text.push_str(&format!("{} --> {}\nline {}\n\n", start, end, i));
        }
        let estimate = estimate_translation_cost(&text, Provider::OpenAi, "gpt-4o-mini").unwrap();
        assert_eq!(estimate.cue_count, 300);
        assert_eq!(estimate.estimated_batches, 3);
        assert_eq!(
            estimate.estimated_total_tokens,
            estimate.estimated_prompt_tokens + estimate.estimated_output_tokens
        );
        assert!(estimate.estimated_cost > 0.0);
    }

    #[test]
    fn test_invalid_document_is_parse_error() {
        let result = estimate_translation_cost("not a subtitle", Provider::OpenAi, "gpt-4o");
        assert!(result.is_err());
    }
}
