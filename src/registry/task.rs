//! Status store for background ingestion tasks.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Lifecycle states of an ingestion task.
///
/// The only legal transitions are `Pending -> Processing` and
/// `Processing -> Completed | Failed`; terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Registered but not yet picked up by a worker.
    Pending,
    /// A worker is running the pipeline.
    Processing,
    /// Pipeline finished; result payload is available.
    Completed,
    /// Pipeline aborted; error message is available.
    Failed,
}

impl TaskStatus {
    fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Point-in-time view of a task, shaped for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    /// Task identifier handed back at submission.
    pub task_id: String,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Completion estimate in percent, monotonically non-decreasing.
    pub progress: u8,
    /// Human-readable description of the current stage.
    pub message: String,
    /// Result payload, present once the task completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Failure description, present once the task fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Thread-safe store of ingestion task snapshots.
///
/// Writers are the spawned pipeline workers; readers are status polls. The
/// store refuses transitions out of terminal states and never lets progress
/// move backwards.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<Mutex<HashMap<String, TaskSnapshot>>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending task and return its identifier.
    pub fn start(&self, message: &str) -> String {
        let task_id = Uuid::new_v4().to_string();
        let snapshot = TaskSnapshot {
            task_id: task_id.clone(),
            status: TaskStatus::Pending,
            progress: 0,
            message: message.to_string(),
            result: None,
            error: None,
        };
        self.lock().insert(task_id.clone(), snapshot);
        tracing::info!(task_id = %task_id, "Registered ingestion task");
        task_id
    }

    /// Move a pending task into the processing state.
    pub fn begin(&self, task_id: &str, message: &str) {
        let mut tasks = self.lock();
        let Some(task) = tasks.get_mut(task_id) else {
            return;
        };
        if task.status != TaskStatus::Pending {
            return;
        }
        task.status = TaskStatus::Processing;
        task.message = message.to_string();
        tracing::info!(task_id, "Task processing started");
    }

    /// Record a progress checkpoint on a task.
    ///
    /// Updates `progress` and `message` only; the lifecycle state is owned by
    /// `begin`/`complete`/`fail`. Progress only moves forward; a stale update
    /// with a lower percentage is ignored, as are updates against terminal
    /// tasks.
    pub fn advance(&self, task_id: &str, progress: u8, message: &str) {
        let mut tasks = self.lock();
        let Some(task) = tasks.get_mut(task_id) else {
            return;
        };
        if task.status.is_terminal() || progress < task.progress {
            return;
        }
        task.progress = progress;
        task.message = message.to_string();
        tracing::debug!(task_id, progress, message, "Task progress");
    }

    /// Mark a task as completed with its result payload.
    pub fn complete(&self, task_id: &str, message: &str, result: serde_json::Value) {
        let mut tasks = self.lock();
        let Some(task) = tasks.get_mut(task_id) else {
            return;
        };
        if task.status.is_terminal() {
            return;
        }
        task.status = TaskStatus::Completed;
        task.progress = 100;
        task.message = message.to_string();
        task.result = Some(result);
        tracing::info!(task_id, "Task completed");
    }

    /// Mark a task as failed with an error description.
    pub fn fail(&self, task_id: &str, error: &str) {
        let mut tasks = self.lock();
        let Some(task) = tasks.get_mut(task_id) else {
            return;
        };
        if task.status.is_terminal() {
            return;
        }
        task.status = TaskStatus::Failed;
        task.message = "Ingestion failed".to_string();
        task.error = Some(error.to_string());
        tracing::warn!(task_id, error, "Task failed");
    }

    /// Fetch the current snapshot of a task.
    pub fn poll(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.lock().get(task_id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TaskSnapshot>> {
        self.inner.lock().expect("task registry lock poisoned")
    }
}
