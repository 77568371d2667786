//! Registry of in-flight translation tasks.
//!
//! Maps a task id to its cancellation token. Registering an id that is already
//! running cancels the older task first. Entries leave the registry when the
//! task's [`TaskGuard`] is dropped, whatever the outcome.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct Registration {
    generation: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct Inner {
    tasks: Mutex<HashMap<String, Registration>>,
    next_generation: AtomicU64,
}

#[derive(Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<Inner>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a task. Generates an id when the caller did not supply one.
    pub fn register(&self, task_id: Option<String>) -> TaskGuard {
        let task_id = task_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();

        let previous = self.inner.tasks.lock().insert(
            task_id.clone(),
            Registration {
                generation,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            info!("Task {} resubmitted, cancelling the previous run", task_id);
            previous.token.cancel();
        }
        debug!("Registered task {} (generation {})", task_id, generation);

        TaskGuard {
            registry: self.clone(),
            task_id,
            generation,
            token,
        }
    }

    /// Cancel a running task. Returns `false` if no such task is active.
    pub fn cancel(&self, task_id: &str) -> bool {
        match self.inner.tasks.lock().get(task_id) {
            Some(registration) => {
                info!("Cancelling task {}", task_id);
                registration.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (task_id, registration) in self.inner.tasks.lock().iter() {
            debug!("Cancelling task {}", task_id);
            registration.token.cancel();
        }
    }

    pub fn is_active(&self, task_id: &str) -> bool {
        self.inner.tasks.lock().contains_key(task_id)
    }

    pub fn active_tasks(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.tasks.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn finish(&self, task_id: &str, generation: u64) {
        let mut tasks = self.inner.tasks.lock();
        // A newer run under the same id owns the slot now
        if tasks.get(task_id).map(|r| r.generation) == Some(generation) {
            tasks.remove(task_id);
            debug!("Task {} removed from registry", task_id);
        }
    }
}

/// Keeps a task registered for as long as it is alive
pub struct TaskGuard {
    registry: TaskRegistry,
    task_id: String,
    generation: u64,
    token: CancellationToken,
}

impl TaskGuard {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.registry.finish(&self.task_id, self.generation);
    }
}
