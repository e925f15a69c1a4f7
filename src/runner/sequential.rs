// ABOUTME: Depth-first single-threaded task runner
// ABOUTME: Reference execution order against which the other runners are checked

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use super::error::Result;
use super::{check_resolved, eval_key, transform_failure, TaskRunner};
use crate::graph::TaskNode;
use crate::meta::Meta;
use crate::task::DepValues;

type Cache = HashMap<(usize, String), Result<Value>>;

/// Runs the graph depth-first on the calling thread.
///
/// Dependencies are evaluated in declaration order; a per-invocation cache
/// keyed by task identity and scoped meta collapses fan-in so shared nodes
/// run once per distinct meta.
#[derive(Debug, Default)]
pub struct SequentialRunner;

impl SequentialRunner {
    pub fn new() -> Self {
        Self
    }

    fn eval(meta: &Meta, node: &TaskNode, cache: &mut Cache) -> Result<Value> {
        let key = eval_key(node, meta);
        if let Some(cached) = cache.get(&key) {
            return cached.clone();
        }

        let result = Self::eval_uncached(meta, node, cache);
        cache.insert(key, result.clone());
        result
    }

    fn eval_uncached(meta: &Meta, node: &TaskNode, cache: &mut Cache) -> Result<Value> {
        let mut deps = DepValues::new();
        for (name, child) in node.dependencies() {
            let child_meta = meta.scope(name);
            let value = Self::eval(&child_meta, child, cache)?;
            deps.insert(name.clone(), value);
        }

        debug!(task = node.task().name(), "running transform");
        node.task()
            .transform(meta, &deps)
            .map_err(|e| transform_failure(node, e))
    }
}

impl TaskRunner for SequentialRunner {
    fn run(&self, meta: &Meta, node: &TaskNode) -> Result<Value> {
        check_resolved(node);
        let mut cache = HashMap::new();
        Self::eval(meta, node, &mut cache)
    }
}
