//! Модуль с реализациями получателей событий
//!
//! Конкретные реализации [`TaskEventSink`] для хоста и тестов.

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::progress::{CompletionEvent, ProgressEvent, TaskEventSink};

/// Событие задачи для передачи через канал
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskEvent {
    TranslationProgress(ProgressEvent),
    TranslationComplete(CompletionEvent),
}

impl TaskEvent {
    pub fn task_id(&self) -> &str {
        match self {
            Self::TranslationProgress(e) => &e.task_id,
            Self::TranslationComplete(e) => &e.task_id,
        }
    }
}

/// Получатель, пересылающий события в канал Tokio
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<TaskEvent>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::UnboundedSender<TaskEvent>) -> Self {
        Self { sender }
    }

    /// Создать получатель вместе с приёмником канала
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TaskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: TaskEvent) {
        if let Err(e) = self.sender.send(event) {
            log::error!("Failed to send task event: {}", e);
        }
    }
}

impl TaskEventSink for ChannelSink {
    fn on_progress(&self, event: ProgressEvent) {
        self.send(TaskEvent::TranslationProgress(event));
    }

    fn on_complete(&self, event: CompletionEvent) {
        self.send(TaskEvent::TranslationComplete(event));
    }
}

/// Получатель, сохраняющий события в памяти
#[derive(Default)]
pub struct MemorySink {
    history: Mutex<Vec<TaskEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TaskEvent> {
        self.history.lock().clone()
    }

    pub fn progress_events(&self) -> Vec<ProgressEvent> {
        self.history
            .lock()
            .iter()
            .filter_map(|e| match e {
                TaskEvent::TranslationProgress(p) => Some(p.clone()),
                TaskEvent::TranslationComplete(_) => None,
            })
            .collect()
    }

    pub fn completion_events(&self) -> Vec<CompletionEvent> {
        self.history
            .lock()
            .iter()
            .filter_map(|e| match e {
                TaskEvent::TranslationComplete(c) => Some(c.clone()),
                TaskEvent::TranslationProgress(_) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.history.lock().clear();
    }
}

impl TaskEventSink for MemorySink {
    fn on_progress(&self, event: ProgressEvent) {
        self.history.lock().push(TaskEvent::TranslationProgress(event));
    }

    fn on_complete(&self, event: CompletionEvent) {
        self.history.lock().push(TaskEvent::TranslationComplete(event));
    }
}

/// Получатель, вызывающий функцию обратного вызова
pub struct CallbackSink<F>
where
    F: Fn(TaskEvent) + Send + Sync + 'static,
{
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: Fn(TaskEvent) + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> TaskEventSink for CallbackSink<F>
where
    F: Fn(TaskEvent) + Send + Sync + 'static,
{
    fn on_progress(&self, event: ProgressEvent) {
        (self.callback)(TaskEvent::TranslationProgress(event));
    }

    fn on_complete(&self, event: CompletionEvent) {
        (self.callback)(TaskEvent::TranslationComplete(event));
    }
}

/// Получатель, пишущий события в лог
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TaskEventSink for LogSink {
    fn on_progress(&self, event: ProgressEvent) {
        log::info!(
            "[{}] {}% ({}/{} batches)",
            event.task_id,
            event.progress,
            event.completed_batches,
            event.total_batches
        );
    }

    fn on_complete(&self, event: CompletionEvent) {
        if event.success {
            log::info!(
                "[{}] done: {} tokens, ${:.4}{}",
                event.task_id,
                event.tokens_used,
                event.estimated_cost,
                if event.from_cache { " (cache)" } else { "" }
            );
        } else if event.cancelled {
            log::warn!("[{}] cancelled", event.task_id);
        } else {
            log::error!(
                "[{}] failed: {}",
                event.task_id,
                event.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}
