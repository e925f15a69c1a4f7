// ABOUTME: Process-parallel task runner delegating dependencies to worker processes
// ABOUTME: Workers speak the envelope run command over stdin/stdout

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use serde_json::Value;
use tracing::debug;

use super::error::{Result, RunnerError};
use super::{check_resolved, eval_key, transform_failure, TaskRunner};
use crate::envelope::{Envelope, Payload};
use crate::graph::TaskNode;
use crate::meta::{Meta, MetaValue};
use crate::remote::{
    CMD_RUN, KEY_COMMAND, KEY_ERROR, KEY_STATUS, KEY_TASK_META, KEY_TASK_PATH, STATUS_FAILED,
    STATUS_FILLED,
};
use crate::task::DepValues;

/// How to start a worker child process, typically a binary that rebuilds
/// the same workspace and serves one request via
/// [`crate::remote::worker::serve_stdio`].
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

/// Runs each direct dependency of the top node in its own worker process,
/// bounded by `max_workers` concurrent children, then applies the top
/// transform locally.
///
/// Dependencies are shipped by name, so every direct dependency must be
/// resolvable by name in the worker's workspace; each worker evaluates its
/// whole subtree, collapsing fan-in within that subtree. Direct
/// dependencies sharing a task and a scoped meta are dispatched once.
pub struct ProcessRunner {
    command: WorkerCommand,
    max_workers: usize,
}

impl ProcessRunner {
    pub fn new(command: WorkerCommand) -> Self {
        let max_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            command,
            max_workers,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    fn spawn_worker(&self, task_meta: &Meta, name: &str) -> Result<Child> {
        let request = Envelope::new(
            Meta::new()
                .with(KEY_COMMAND, CMD_RUN)
                .with(KEY_TASK_PATH, name)
                .with(KEY_TASK_META, task_meta.clone()),
            Payload::empty(),
        );

        let mut child = self
            .command
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(RunnerError::io)?;
        debug!(task = name, pid = child.id(), "worker spawned");

        let Some(mut stdin) = child.stdin.take() else {
            return Err(RunnerError::io("worker stdin was not captured"));
        };
        request
            .write_to(&mut stdin)
            .map_err(|e| protocol_error(name, e))?;
        // Dropping stdin closes the pipe; the worker reads one framed
        // request and does not wait for EOF.
        Ok(child)
    }
}

fn collect_worker(name: &str, child: Child) -> Result<Value> {
    let output = child.wait_with_output().map_err(RunnerError::io)?;
    if !output.status.success() {
        return Err(RunnerError::WorkerProcess {
            task_id: name.to_string(),
            message: format!("worker exited with {}", output.status),
        });
    }

    let response = Envelope::from_bytes(&output.stdout).map_err(|e| protocol_error(name, e))?;
    match response.meta().get(KEY_STATUS).and_then(MetaValue::as_str) {
        Some(STATUS_FILLED) => serde_json::from_slice(response.payload().as_bytes())
            .map_err(|e| protocol_error(name, e)),
        Some(STATUS_FAILED) => Err(RunnerError::WorkerProcess {
            task_id: name.to_string(),
            message: response
                .meta()
                .get(KEY_ERROR)
                .and_then(MetaValue::as_str)
                .unwrap_or("unknown worker failure")
                .to_string(),
        }),
        other => Err(RunnerError::Protocol {
            task_id: name.to_string(),
            message: format!("unexpected response status: {other:?}"),
        }),
    }
}

fn protocol_error(name: &str, error: impl std::fmt::Display) -> RunnerError {
    RunnerError::Protocol {
        task_id: name.to_string(),
        message: error.to_string(),
    }
}

impl TaskRunner for ProcessRunner {
    fn run(&self, meta: &Meta, node: &TaskNode) -> Result<Value> {
        check_resolved(node);

        let mut seen = HashSet::new();
        let mut jobs = Vec::new();
        for (name, child) in node.dependencies() {
            let child_meta = meta.scope(name);
            let key = eval_key(child, &child_meta);
            if seen.insert(key.clone()) {
                jobs.push((name, child_meta, key));
            }
        }

        let mut results: HashMap<(usize, String), Value> = HashMap::new();
        for wave in jobs.chunks(self.max_workers) {
            let mut running = Vec::with_capacity(wave.len());
            for (name, child_meta, key) in wave {
                running.push((name, key, self.spawn_worker(child_meta, name)?));
            }
            for (name, key, worker) in running {
                results.insert(key.clone(), collect_worker(name, worker)?);
            }
        }

        let mut deps = DepValues::new();
        for (name, child) in node.dependencies() {
            let key = eval_key(child, &meta.scope(name));
            let value = results.get(&key).cloned().ok_or_else(|| {
                protocol_error(name, "worker result missing after dispatch")
            })?;
            deps.insert(name.clone(), value);
        }

        debug!(task = node.task().name(), "running top-level transform");
        node.task()
            .transform(meta, &deps)
            .map_err(|e| transform_failure(node, e))
    }
}
