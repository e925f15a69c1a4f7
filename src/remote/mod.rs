// ABOUTME: Remote unit command protocol over envelopes
// ABOUTME: Resolves and runs tasks, reports structure and capability

pub mod error;
pub mod unit;
pub mod worker;

pub use error::{RemoteError, Result};
pub use unit::RemoteUnit;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::envelope::{Envelope, Payload};
use crate::graph::TaskNode;
use crate::meta::{Meta, MetaValue};
use crate::runner::TaskRunner;
use crate::workspace::Workspace;

pub const CMD_RUN: &str = "run";
pub const CMD_STRUCTURE: &str = "structure";
pub const CMD_CAPABILITY: &str = "capability-query";

pub const STATUS_FILLED: &str = "filled";
pub const STATUS_FULFILLED: &str = "fulfilled";
pub const STATUS_FAILED: &str = "failed";

pub const KEY_COMMAND: &str = "command";
pub const KEY_TASK_PATH: &str = "task_path";
pub const KEY_TASK_META: &str = "task_meta";
pub const KEY_STATUS: &str = "status";
pub const KEY_ERROR: &str = "error";
pub const KEY_CAPABILITY: &str = "capability";

/// Serves the three unit commands against one workspace and one runner.
///
/// `handle` never fails: malformed requests, unknown tasks, unresolved
/// graphs, and transform faults all come back as `failed` response
/// envelopes so the transport only deals with framing.
pub struct UnitService {
    workspace: Arc<Workspace>,
    runner: Arc<dyn TaskRunner>,
    capability: u64,
}

impl UnitService {
    pub fn new(workspace: Arc<Workspace>, runner: Arc<dyn TaskRunner>, capability: u64) -> Self {
        Self {
            workspace,
            runner,
            capability,
        }
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    /// Relative worker weight reported to capability queries.
    pub fn capability(&self) -> u64 {
        self.capability
    }

    pub fn handle(&self, request: &Envelope) -> Envelope {
        let command = request.meta().get(KEY_COMMAND).and_then(MetaValue::as_str);
        debug!(command, "handling unit request");

        match command {
            Some(CMD_RUN) => self.handle_run(request.meta()),
            Some(CMD_STRUCTURE) => self.handle_structure(),
            Some(CMD_CAPABILITY) => self.handle_capability(),
            Some(other) => failure(format!("unknown command: {other}")),
            None => failure("request is missing the command field"),
        }
    }

    fn handle_run(&self, meta: &Meta) -> Envelope {
        let Some(task_path) = meta.get(KEY_TASK_PATH).and_then(MetaValue::as_str) else {
            return failure("run request is missing the task_path field");
        };
        let Some(task) = self.workspace.find_task(task_path) else {
            return failure(format!("task not found: {task_path}"));
        };

        let node = match TaskNode::build(task, &self.workspace) {
            Ok(node) => node,
            Err(e) => return failure(e.to_string()),
        };
        if node.has_dependence_errors() {
            return failure(format!(
                "task {task_path} has unresolved dependencies: {}",
                node.all_unresolved().join(", ")
            ));
        }

        let task_meta = meta.scope(KEY_TASK_META);
        match self.runner.run(&task_meta, &node) {
            Ok(value) => match serde_json::to_vec(&value) {
                Ok(bytes) => Envelope::new(Meta::new().with(KEY_STATUS, STATUS_FILLED), bytes),
                Err(e) => failure(format!("result serialization failed: {e}")),
            },
            Err(e) => {
                warn!(task_path, error = %e, "task run failed");
                failure(e.to_string())
            }
        }
    }

    fn handle_structure(&self) -> Envelope {
        match serde_json::to_vec(&self.workspace.structure()) {
            Ok(bytes) => Envelope::new(Meta::new().with(KEY_STATUS, STATUS_FULFILLED), bytes),
            Err(e) => failure(format!("structure serialization failed: {e}")),
        }
    }

    fn handle_capability(&self) -> Envelope {
        Envelope::new(
            Meta::new()
                .with(KEY_STATUS, STATUS_FILLED)
                .with(KEY_CAPABILITY, self.capability),
            Payload::empty(),
        )
    }
}

fn failure(error: impl Into<String>) -> Envelope {
    Envelope::new(
        Meta::new()
            .with(KEY_STATUS, STATUS_FAILED)
            .with(KEY_ERROR, error.into()),
        Payload::empty(),
    )
}
