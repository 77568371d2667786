//! Per-task translation driver.
//!
//! `batching -> [requesting -> (retrying)* -> batch_done]* -> reassembling ->
//! validating -> done`, with `cancelled` reachable from every step and
//! `failed` once a batch runs out of retries. Either every batch succeeds or
//! the task fails as a whole; partial translations are never returned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::TranslationConfig;
use crate::error::{Result, SubtitleError};
use crate::estimate::calculate_cost;
use crate::llm::{Completion, CompletionRequest, LlmClient};
use crate::progress::{ProgressTracker, TaskStage};
use crate::subtitle::{self, GenerateOptions, VttFile};
use crate::translation::prompt::{build_system_prompt, build_user_prompt, PromptContext};
use crate::translation::response::{parse_translated_vtt_response, validate_translated_vtt};

/// Tokens spent so far, including failed attempts
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub estimated_cost: f64,
}

impl TokenUsage {
    pub fn tokens_used(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    fn record(&mut self, completion: &Completion, model: &str) {
        self.prompt_tokens += completion.prompt_tokens;
        self.completion_tokens += completion.completion_tokens;
        self.estimated_cost = calculate_cost(model, self.tokens_used());
    }
}

/// Outcome of one translate call
#[derive(Debug)]
pub struct TranslationResult {
    /// Translated WebVTT text, or the error that ended the task
    pub outcome: Result<String>,
    pub usage: TokenUsage,
    pub cue_count: usize,
    pub batch_count: usize,
    pub duration_ms: u64,
}

impl TranslationResult {
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, Err(SubtitleError::Cancelled))
    }

    pub fn translated_vtt(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    pub fn error(&self) -> Option<&SubtitleError> {
        self.outcome.as_ref().err()
    }
}

/// Where a batch sits in its task, for progress reporting
struct BatchPosition<'a> {
    index: usize,
    total: usize,
    tracker: Option<&'a ProgressTracker>,
}

impl BatchPosition<'_> {
    fn report(&self, stage: TaskStage, completed: usize) {
        if let Some(tracker) = self.tracker {
            tracker.report(stage, completed, self.total);
        }
    }
}

pub struct Translator {
    client: Arc<dyn LlmClient>,
    config: TranslationConfig,
}

impl Translator {
    pub fn new(client: Arc<dyn LlmClient>, config: TranslationConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    /// Translate a parsed file batch by batch.
    pub async fn translate(
        &self,
        source: &VttFile,
        context: &PromptContext,
        cancellation: &CancellationToken,
        tracker: Option<&ProgressTracker>,
    ) -> TranslationResult {
        let started = Instant::now();
        let mut usage = TokenUsage::default();

        let batches = subtitle::split(source, self.config.max_batch_duration_ms);
        let batch_count = batches.len();
        let outcome = self
            .run(source, &batches, context, cancellation, tracker, &mut usage)
            .await;

        match &outcome {
            Ok(_) => info!(
                "Translation finished: {} cues in {} batches, {} tokens, ${:.4}",
                source.cues.len(),
                batch_count,
                usage.tokens_used(),
                usage.estimated_cost
            ),
            Err(SubtitleError::Cancelled) => warn!(
                "Translation cancelled after {} tokens",
                usage.tokens_used()
            ),
            Err(e) => error!("Translation failed: {} ({} tokens spent)", e, usage.tokens_used()),
        }

        TranslationResult {
            outcome,
            usage,
            cue_count: source.cues.len(),
            batch_count,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn run(
        &self,
        source: &VttFile,
        batches: &[VttFile],
        context: &PromptContext,
        cancellation: &CancellationToken,
        tracker: Option<&ProgressTracker>,
        usage: &mut TokenUsage,
    ) -> Result<String> {
        if cancellation.is_cancelled() {
            return Err(SubtitleError::Cancelled);
        }

        let total = batches.len();
        info!(
            "Translating {} cues in {} batches of up to {} ms with {}",
            source.cues.len(),
            total,
            self.config.max_batch_duration_ms,
            self.config.effective_model()
        );
        if let Some(t) = tracker {
            t.report(TaskStage::Batching, 0, total);
        }

        let system_prompt = build_system_prompt(context);
        let mut translated = Vec::with_capacity(total);

        for (index, batch) in batches.iter().enumerate() {
            if index > 0 {
                self.pause_between_batches(cancellation).await?;
            }
            if cancellation.is_cancelled() {
                return Err(SubtitleError::Cancelled);
            }

            let position = BatchPosition { index, total, tracker };
            let file = self
                .translate_batch(batch, &system_prompt, &position, cancellation, usage)
                .await?;
            translated.push(file);
            position.report(TaskStage::BatchDone, index + 1);
        }

        debug!("{}: merging {} translated batches", TaskStage::Reassembling.as_str(), translated.len());
        let merged = subtitle::merge(&translated);

        debug!("{}: checking reassembled file", TaskStage::Validating.as_str());
        validate_translated_vtt(source, &merged).into_result()?;

        Ok(subtitle::generate(&merged, &GenerateOptions::default()))
    }

    async fn pause_between_batches(&self, cancellation: &CancellationToken) -> Result<()> {
        let delay = self.config.inter_batch_delay();
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(SubtitleError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// One batch with its retry budgets: `max_retries` for network failures,
    /// `max_validation_retries` for unusable replies.
    async fn translate_batch(
        &self,
        batch: &VttFile,
        system_prompt: &str,
        position: &BatchPosition<'_>,
        cancellation: &CancellationToken,
        usage: &mut TokenUsage,
    ) -> Result<VttFile> {
        let batch_text = subtitle::generate(batch, &GenerateOptions::default());
        let user_prompt = build_user_prompt(&batch_text);
        let mut network_failures = 0;
        let mut content_failures = 0;

        loop {
            if cancellation.is_cancelled() {
                return Err(SubtitleError::Cancelled);
            }
            debug!(
                "Batch {}/{}: requesting ({} cues)",
                position.index + 1,
                position.total,
                batch.cues.len()
            );
            position.report(TaskStage::Requesting, position.index);

            let error = match self
                .attempt(batch, system_prompt, &user_prompt, cancellation, usage)
                .await
            {
                Ok(file) => return Ok(file),
                Err(e) => e,
            };

            let exhausted = if !error.is_retryable() {
                true
            } else if error.is_content_failure() {
                content_failures += 1;
                content_failures > self.config.max_validation_retries
            } else {
                network_failures += 1;
                network_failures > self.config.max_retries
            };

            if exhausted {
                if !matches!(error, SubtitleError::Cancelled) {
                    error!("Batch {}/{} failed: {}", position.index + 1, position.total, error);
                }
                return Err(error);
            }

            warn!(
                "Batch {}/{} attempt failed, retrying: {}",
                position.index + 1,
                position.total,
                error
            );
            position.report(TaskStage::Retrying, position.index);
        }
    }

    async fn attempt(
        &self,
        batch: &VttFile,
        system_prompt: &str,
        user_prompt: &str,
        cancellation: &CancellationToken,
        usage: &mut TokenUsage,
    ) -> Result<VttFile> {
        let model = self.config.effective_model();
        let timeout = self.config.request_timeout();
        let request = CompletionRequest {
            api_key: self.config.api_key.clone(),
            model: model.clone(),
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            temperature: self.config.temperature,
            max_output_tokens: self.config.max_output_tokens,
            timeout,
            cancellation: cancellation.clone(),
        };

        let completion = self.call_with_timeout(&request, timeout, cancellation).await?;
        usage.record(&completion, &model);

        if completion.is_truncated() {
            return Err(SubtitleError::ResponseFormat(
                "LLM output was truncated at the token limit".to_string(),
            ));
        }

        let translated = parse_translated_vtt_response(&completion.content)?;
        validate_translated_vtt(batch, &translated).into_result()?;

        // Keep source ids, timing and settings; take only the text from the reply
        batch
            .with_cue_texts(translated.cues.into_iter().map(|cue| cue.text))
            .ok_or_else(|| SubtitleError::ValidationMismatch(vec!["Cue count changed during rebuild".to_string()]))
    }

    async fn call_with_timeout(
        &self,
        request: &CompletionRequest,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> Result<Completion> {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(SubtitleError::Cancelled),
            result = tokio::time::timeout(timeout, self.client.complete(request)) => match result {
                Ok(completion) => completion,
                Err(_) => Err(SubtitleError::NetworkTimeout(timeout.as_millis() as u64)),
            },
        }
    }
}
