//! Inbound task handling.
//!
//! One request in, zero or more progress events and exactly one completion
//! event out, all through the configured [`TaskEventSink`].

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::{content_hash, CacheEntry, TranslationCache};
use crate::config::{PipelineConfig, Provider, TranslationConfig};
use crate::error::{Result, SubtitleError};
use crate::estimate::estimate_with_context;
use crate::llm::{create_client, LlmClient};
use crate::progress::{CompletionEvent, ProgressTracker, TaskEventSink};
use crate::subtitle;
use crate::translation::{PromptContext, TaskGuard, TaskRegistry, TokenUsage, Translator};

/// A translation request from the host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    #[serde(default)]
    pub task_id: Option<String>,
    pub source_text: String,
    pub course_id: String,
    pub lecture_id: String,
    #[serde(default)]
    pub course_name: Option<String>,
    #[serde(default)]
    pub section_name: Option<String>,
    #[serde(default)]
    pub lecture_name: Option<String>,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub api_key: String,
    /// Empty selects the provider default
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub force: bool,
}

pub struct Pipeline {
    config: PipelineConfig,
    cache: Arc<TranslationCache>,
    registry: TaskRegistry,
    sink: Arc<dyn TaskEventSink>,
    client: Option<Arc<dyn LlmClient>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, cache: Arc<TranslationCache>, sink: Arc<dyn TaskEventSink>) -> Self {
        Self {
            config,
            cache,
            registry: TaskRegistry::new(),
            sink,
            client: None,
        }
    }

    /// Use this client for every provider instead of the HTTP ones
    pub fn with_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn cancel(&self, task_id: &str) -> bool {
        self.registry.cancel(task_id)
    }

    pub fn cancel_all(&self) {
        self.registry.cancel_all();
    }

    /// Run a task to completion on the current task.
    pub async fn run(&self, request: TaskRequest) -> CompletionEvent {
        let guard = self.registry.register(request.task_id.clone());
        self.run_registered(guard, request).await
    }

    /// Register the task now and run it in the background.
    ///
    /// Registration happens before this returns, so `cancel` works right away.
    pub fn submit(self: &Arc<Self>, request: TaskRequest) -> (String, JoinHandle<CompletionEvent>) {
        let guard = self.registry.register(request.task_id.clone());
        let task_id = guard.task_id().to_string();
        let pipeline = Arc::clone(self);
        let handle = tokio::spawn(async move { pipeline.run_registered(guard, request).await });
        (task_id, handle)
    }

    async fn run_registered(&self, guard: TaskGuard, request: TaskRequest) -> CompletionEvent {
        let tracker = ProgressTracker::new(guard.task_id(), Arc::clone(&self.sink));
        info!(
            "Task {}: translating {}/{}{}",
            guard.task_id(),
            request.course_id,
            request.lecture_id,
            if request.force { " (forced)" } else { "" }
        );

        let mut event = self.execute(&request, guard.token(), &tracker).await;
        event.task_id = guard.task_id().to_string();
        tracker.complete(event.clone());
        event
    }

    fn translation_config(&self, request: &TaskRequest) -> TranslationConfig {
        TranslationConfig {
            provider: request.provider,
            api_key: request.api_key.clone(),
            model: request.model.clone(),
            ..self.config.translation.clone()
        }
    }

    async fn execute(
        &self,
        request: &TaskRequest,
        cancellation: &CancellationToken,
        tracker: &ProgressTracker,
    ) -> CompletionEvent {
        let config = self.translation_config(request);
        if let Err(e) = config.validate() {
            return failure_event(&e, TokenUsage::default());
        }

        let parsed = match subtitle::parse(&request.source_text) {
            Ok(parsed) => parsed,
            Err(e) => return failure_event(&e, TokenUsage::default()),
        };
        if cancellation.is_cancelled() {
            return cancelled_event(TokenUsage::default());
        }

        let decision = self
            .cache
            .decide(&request.course_id, &request.lecture_id, request.force)
            .await;
        if decision.use_cache() {
            if let Some(entry) = decision.cached_entry {
                if let Err(e) = self.cache.touch(&request.course_id, &request.lecture_id).await {
                    warn!("Failed to update cache access time: {}", e);
                }
                return CompletionEvent {
                    success: true,
                    from_cache: true,
                    translated_vtt: Some(entry.translated_vtt),
                    ..CompletionEvent::default()
                };
            }
        }

        let context = PromptContext::from_config(&config).with_names(
            request.course_name.clone(),
            request.section_name.clone(),
            request.lecture_name.clone(),
        );
        if let Ok(estimate) = estimate_with_context(&request.source_text, &config, &context) {
            debug!(
                "Estimated {} tokens (${:.4}) over {} batches",
                estimate.estimated_total_tokens, estimate.estimated_cost, estimate.estimated_batches
            );
        }
        let client = self.client.clone().unwrap_or_else(|| create_client(config.provider));
        let model = config.effective_model();
        let translator = Translator::new(client, config);

        let result = translator
            .translate(&parsed.file, &context, cancellation, Some(tracker))
            .await;
        let usage = result.usage;
        debug!(
            "{} cues, {} batches in {} ms",
            result.cue_count, result.batch_count, result.duration_ms
        );

        let translated = match result.outcome {
            Ok(text) => text,
            Err(SubtitleError::Cancelled) => return cancelled_event(usage),
            Err(e) => return failure_event(&e, usage),
        };
        if cancellation.is_cancelled() {
            return cancelled_event(usage);
        }

        let mut event = CompletionEvent {
            success: true,
            translated_vtt: Some(translated.clone()),
            tokens_used: usage.tokens_used(),
            estimated_cost: usage.estimated_cost,
            ..CompletionEvent::default()
        };
        // The translation is delivered either way; a failed write is reported on the event
        if let Err(e) = self.store(request, translated, &model, usage).await {
            warn!("Translation finished but could not be cached: {}", e);
            event.error = Some(e.to_string());
            event.error_code = Some(e.code().to_string());
        }
        event
    }

    async fn store(
        &self,
        request: &TaskRequest,
        translated_vtt: String,
        model: &str,
        usage: TokenUsage,
    ) -> Result<CacheEntry> {
        let entry = CacheEntry {
            course_id: request.course_id.clone(),
            lecture_id: request.lecture_id.clone(),
            course_name: request.course_name.clone(),
            lecture_name: request.lecture_name.clone(),
            original_hash: content_hash(&request.source_text),
            translated_vtt,
            provider: request.provider,
            model: model.to_string(),
            tokens_used: usage.tokens_used(),
            estimated_cost: usage.estimated_cost,
            created_at: 0,
            last_accessed_at: 0,
        };
        self.cache.set(entry).await
    }
}

fn failure_event(error: &SubtitleError, usage: TokenUsage) -> CompletionEvent {
    CompletionEvent {
        success: false,
        error: Some(error.to_string()),
        error_code: Some(error.code().to_string()),
        tokens_used: usage.tokens_used(),
        estimated_cost: usage.estimated_cost,
        ..CompletionEvent::default()
    }
}

/// Cancellation is not an error: only the code is set
fn cancelled_event(usage: TokenUsage) -> CompletionEvent {
    CompletionEvent {
        cancelled: true,
        error: None,
        ..failure_event(&SubtitleError::Cancelled, usage)
    }
}
