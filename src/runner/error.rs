// ABOUTME: Error types for task runner execution
// ABOUTME: Covers transform faults, worker process failures, and protocol issues

use thiserror::Error;

/// Errors surfaced by a runner.
///
/// Kept cloneable so a per-invocation evaluation cache can hand the same
/// failure to every fan-in path that reaches an already-failed node.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunnerError {
    #[error("Task execution failed: {task_id} - {message}")]
    TaskFailed { task_id: String, message: String },

    #[error("Worker process failed for task {task_id}: {message}")]
    WorkerProcess { task_id: String, message: String },

    #[error("Worker protocol error for task {task_id}: {message}")]
    Protocol { task_id: String, message: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl RunnerError {
    pub(crate) fn io(error: impl std::fmt::Display) -> Self {
        RunnerError::Io {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;
