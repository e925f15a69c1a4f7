// ABOUTME: Thread-based task runner with a shared per-invocation worker bound
// ABOUTME: Evaluates dependencies on scoped OS threads, gating transforms by permit

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, OnceLock};
use std::thread;

use serde_json::Value;
use tracing::debug;

use super::error::Result;
use super::{check_resolved, eval_key, transform_failure, TaskRunner};
use crate::graph::TaskNode;
use crate::meta::Meta;
use crate::task::DepValues;

pub const DEFAULT_MAX_WORKERS: usize = 4;

type Slot = std::sync::Arc<OnceLock<Result<Value>>>;

/// Counting permit pool shared by one invocation. Threads waiting on
/// children or on a permit consume no permit, so narrow pools cannot
/// deadlock on deep graphs.
struct Limiter {
    max: usize,
    active: Mutex<usize>,
    idle: Condvar,
}

struct Permit<'a> {
    limiter: &'a Limiter,
}

impl Limiter {
    fn new(max: usize) -> Self {
        Self {
            max,
            active: Mutex::new(0),
            idle: Condvar::new(),
        }
    }

    fn acquire(&self) -> Permit<'_> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        while *active >= self.max {
            active = self.idle.wait(active).unwrap_or_else(|e| e.into_inner());
        }
        *active += 1;
        Permit { limiter: self }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut active = self
            .limiter
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *active -= 1;
        self.limiter.idle.notify_one();
    }
}

struct RunState {
    cache: Mutex<HashMap<(usize, String), Slot>>,
    limiter: Limiter,
}

/// Runs dependencies on scoped OS threads.
///
/// At most `max_workers` transforms execute concurrently across the whole
/// invocation; the bound is one permit pool per run, not per sibling set.
/// Fan-in is collapsed through once-cell slots keyed by task identity and
/// scoped meta, so concurrent arrivals with the same meta block on a
/// single evaluation and divergent metas evaluate separately.
#[derive(Debug)]
pub struct ThreadedRunner {
    max_workers: usize,
}

impl ThreadedRunner {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    fn eval(&self, meta: &Meta, node: &TaskNode, state: &RunState) -> Result<Value> {
        let key = eval_key(node, meta);
        let slot = {
            let mut map = state.cache.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(key).or_default().clone()
        };
        slot.get_or_init(|| self.eval_uncached(meta, node, state)).clone()
    }

    fn eval_uncached(&self, meta: &Meta, node: &TaskNode, state: &RunState) -> Result<Value> {
        let mut outcomes = Vec::with_capacity(node.dependencies().len());
        thread::scope(|scope| {
            let handles: Vec<_> = node
                .dependencies()
                .iter()
                .map(|(name, child)| {
                    let child_meta = meta.scope(name);
                    (name, scope.spawn(move || self.eval(&child_meta, child, state)))
                })
                .collect();
            for (name, handle) in handles {
                match handle.join() {
                    Ok(result) => outcomes.push((name.clone(), result)),
                    // A panicking transform is a programming error in the
                    // task, not a runner failure; re-raise it.
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
        });

        let mut deps = DepValues::new();
        for (name, result) in outcomes {
            deps.insert(name, result?);
        }

        // Acquired for the transform only; holding a permit while joining
        // children would deadlock once the graph is deeper than the pool.
        let _permit = state.limiter.acquire();
        debug!(task = node.task().name(), "running transform");
        node.task()
            .transform(meta, &deps)
            .map_err(|e| transform_failure(node, e))
    }
}

impl Default for ThreadedRunner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}

impl TaskRunner for ThreadedRunner {
    fn run(&self, meta: &Meta, node: &TaskNode) -> Result<Value> {
        check_resolved(node);
        let state = RunState {
            cache: Mutex::new(HashMap::new()),
            limiter: Limiter::new(self.max_workers),
        };
        self.eval(meta, node, &state)
    }
}
