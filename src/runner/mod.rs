// ABOUTME: Task runner implementations for dependency graph execution
// ABOUTME: Sequential, threaded, process-parallel, and cooperative-async strategies

pub mod cooperative;
pub mod error;
pub mod process;
pub mod sequential;
pub mod threaded;

pub use cooperative::CooperativeRunner;
pub use error::{Result, RunnerError};
pub use process::{ProcessRunner, WorkerCommand};
pub use sequential::SequentialRunner;
pub use threaded::ThreadedRunner;

use serde_json::Value;

use crate::graph::TaskNode;
use crate::meta::Meta;

/// Executes a resolved task graph.
///
/// All runners produce the same observable result for the same graph and
/// metadata; they differ only in how evaluation is scheduled. Within a
/// single `run` call, each distinct task is evaluated at most once per
/// distinct scoped metadata: fan-in paths that deliver the same meta share
/// one evaluation, paths that scope different metas evaluate separately.
/// Nothing is cached across calls.
///
/// Callers must only pass nodes with a fully resolved dependency closure;
/// running a graph with unresolved dependencies is a contract violation
/// and panics.
pub trait TaskRunner: Send + Sync {
    fn run(&self, meta: &Meta, node: &TaskNode) -> Result<Value>;
}

/// Cache key for one node evaluation: task identity plus the canonical
/// JSON of the metadata scoped to it. Keying on the meta as well keeps the
/// fan-in collapse deterministic, so every runner resolves the same value
/// when branches scope different metas to a shared node.
pub(crate) fn eval_key(node: &TaskNode, meta: &Meta) -> (usize, String) {
    (node.key(), meta.to_json().to_string())
}

pub(crate) fn check_resolved(node: &TaskNode) {
    assert!(
        !node.has_dependence_errors(),
        "task '{}' has unresolved dependencies and cannot be run",
        node.task().name()
    );
}

pub(crate) fn transform_failure(node: &TaskNode, error: anyhow::Error) -> RunnerError {
    RunnerError::TaskFailed {
        task_id: node.task().name().to_string(),
        message: format!("{error:#}"),
    }
}
