//! Модуль для отслеживания прогресса задач перевода
//!
//! The pipeline reports through [`TaskEventSink`] only: zero or more progress
//! events and exactly one completion event per task. Transport to the UI is
//! the host's business.

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

/// Этапы задачи перевода
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStage {
    Idle,
    Estimating,
    Batching,
    Requesting,
    Retrying,
    BatchDone,
    Reassembling,
    Validating,
    Done,
    Failed,
    Cancelled,
}

impl TaskStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Estimating => "estimating",
            Self::Batching => "batching",
            Self::Requesting => "requesting",
            Self::Retrying => "retrying",
            Self::BatchDone => "batch_done",
            Self::Reassembling => "reassembling",
            Self::Validating => "validating",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

/// Промежуточное событие прогресса
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub task_id: String,
    /// 0..=100
    pub progress: u8,
    pub stage: TaskStage,
    pub completed_batches: usize,
    pub total_batches: usize,
}

/// Итоговое событие задачи
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub task_id: String,
    pub success: bool,
    pub cancelled: bool,
    pub from_cache: bool,
    pub translated_vtt: Option<String>,
    pub tokens_used: u64,
    pub estimated_cost: f64,
    pub error: Option<String>,
    pub error_code: Option<String>,
}

/// Получатель событий задачи
pub trait TaskEventSink: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);

    fn on_complete(&self, event: CompletionEvent);
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TaskEventSink for NullSink {
    fn on_progress(&self, _event: ProgressEvent) {}

    fn on_complete(&self, _event: CompletionEvent) {}
}

/// `completed / total * 100`, clamped to 0..=100
pub fn batch_progress(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = completed.min(total) * 100 / total;
    percent.min(100) as u8
}

/// Трекер прогресса одной задачи
#[derive(Clone)]
pub struct ProgressTracker {
    task_id: String,
    sink: Arc<dyn TaskEventSink>,
}

impl ProgressTracker {
    pub fn new(task_id: impl Into<String>, sink: Arc<dyn TaskEventSink>) -> Self {
        Self {
            task_id: task_id.into(),
            sink,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Report progress for `completed` of `total` batches
    pub fn report(&self, stage: TaskStage, completed: usize, total: usize) {
        let progress = batch_progress(completed, total);
        debug!(
            "Task {}: {} ({}/{} batches, {}%)",
            self.task_id,
            stage.as_str(),
            completed,
            total,
            progress
        );
        self.sink.on_progress(ProgressEvent {
            task_id: self.task_id.clone(),
            progress,
            stage,
            completed_batches: completed,
            total_batches: total,
        });
    }

    pub fn complete(&self, mut event: CompletionEvent) {
        event.task_id = self.task_id.clone();
        self.sink.on_complete(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::MemorySink;

    #[test]
    fn test_batch_progress_is_clamped() {
        assert_eq!(batch_progress(0, 3), 0);
        assert_eq!(batch_progress(1, 3), 33);
        assert_eq!(batch_progress(2, 3), 66);
        assert_eq!(batch_progress(3, 3), 100);
        assert_eq!(batch_progress(5, 3), 100);
        assert_eq!(batch_progress(0, 0), 100);
    }

    #[test]
    fn test_tracker_stamps_task_id() {
        let sink = Arc::new(MemorySink::new());
        let tracker = ProgressTracker::new("t-1", sink.clone());

        tracker.report(TaskStage::BatchDone, 1, 2);
        tracker.complete(CompletionEvent {
            success: true,
            ..CompletionEvent::default()
        });

        let progress = sink.progress_events();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].task_id, "t-1");
        assert_eq!(progress[0].progress, 50);

        let completions = sink.completion_events();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].task_id, "t-1");
    }

    #[test]
    fn test_terminal_stages() {
        assert!(TaskStage::Done.is_terminal());
        assert!(TaskStage::Cancelled.is_terminal());
        assert!(!TaskStage::Retrying.is_terminal());
    }
}
