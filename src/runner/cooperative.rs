// ABOUTME: Cooperative single-threaded async task runner
// ABOUTME: Interleaves dependency evaluation as futures on a current-thread runtime

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::{join_all, FutureExt, LocalBoxFuture};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use super::error::{Result, RunnerError};
use super::{check_resolved, eval_key, transform_failure, TaskRunner};
use crate::graph::TaskNode;
use crate::meta::Meta;
use crate::task::DepValues;

type Slot = Rc<OnceCell<Result<Value>>>;
type Cache = RefCell<HashMap<(usize, String), Slot>>;

/// Runs the graph as cooperatively scheduled futures on one thread.
///
/// Sibling dependencies are joined concurrently, so a task that suspends in
/// `transform_async` yields to its siblings instead of blocking them. No
/// additional threads are involved.
#[derive(Debug, Default)]
pub struct CooperativeRunner;

impl CooperativeRunner {
    pub fn new() -> Self {
        Self
    }
}

fn eval<'a>(meta: Meta, node: &'a TaskNode, cache: &'a Cache) -> LocalBoxFuture<'a, Result<Value>> {
    async move {
        let slot = {
            let mut map = cache.borrow_mut();
            map.entry(eval_key(node, &meta))
                .or_insert_with(|| Rc::new(OnceCell::new()))
                .clone()
        };
        slot.get_or_init(|| async move {
            let children: Vec<_> = node
                .dependencies()
                .iter()
                .map(|(name, child)| {
                    let child_meta = meta.scope(name);
                    async move { (name.as_str(), eval(child_meta, child, cache).await) }
                })
                .collect();
            let outcomes = join_all(children).await;

            let mut deps = DepValues::new();
            for (name, outcome) in outcomes {
                deps.insert(name.to_string(), outcome?);
            }

            debug!(task = node.task().name(), "running transform");
            node.task()
                .transform_async(&meta, &deps)
                .await
                .map_err(|e| transform_failure(node, e))
        })
        .await
        .clone()
    }
    .boxed_local()
}

impl TaskRunner for CooperativeRunner {
    fn run(&self, meta: &Meta, node: &TaskNode) -> Result<Value> {
        check_resolved(node);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(RunnerError::io)?;
        let cache = RefCell::new(HashMap::new());
        runtime.block_on(eval(meta.clone(), node, &cache))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TaskNode;
    use crate::task::{DependencyRef, FnTask, Task};
    use crate::workspace::Workspace;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct YieldingTask {
        name: String,
        dependencies: Vec<DependencyRef>,
        value: i64,
    }

    #[async_trait]
    impl Task for YieldingTask {
        fn name(&self) -> &str {
            &self.name
        }

        fn dependencies(&self) -> &[DependencyRef] {
            &self.dependencies
        }

        fn transform(&self, _meta: &Meta, deps: &DepValues) -> crate::Result<Value> {
            let sum: i64 = deps.values().filter_map(|v| v.as_i64()).sum();
            Ok((self.value + sum).into())
        }

        async fn transform_async(&self, meta: &Meta, deps: &DepValues) -> crate::Result<Value> {
            tokio::task::yield_now().await;
            self.transform(meta, deps)
        }
    }

    #[test]
    fn test_drives_async_transforms() {
        let ws = Workspace::builder("root")
            .task(YieldingTask {
                name: "left".into(),
                dependencies: vec![],
                value: 2,
            })
            .task(YieldingTask {
                name: "right".into(),
                dependencies: vec![],
                value: 3,
            })
            .task(YieldingTask {
                name: "top".into(),
                dependencies: vec!["left".into(), "right".into()],
                value: 0,
            })
            .build();
        let node = TaskNode::build(ws.find_task("top").unwrap(), &ws).unwrap();

        let result = CooperativeRunner::new().run(&Meta::new(), &node).unwrap();
        assert_eq!(result, Value::from(5));
    }

    #[test]
    fn test_fan_in_evaluates_shared_node_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let ws = Workspace::builder("root")
            .task(FnTask::source("base", move |_meta| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from(7))
            }))
            .task(FnTask::new("left", |_meta, deps| Ok(deps["base"].clone())).depends_on(["base"]))
            .task(FnTask::new("right", |_meta, deps| Ok(deps["base"].clone())).depends_on(["base"]))
            .task(
                FnTask::new("top", |_meta, deps| {
                    let sum: i64 = deps.values().filter_map(|v| v.as_i64()).sum();
                    Ok(sum.into())
                })
                .depends_on(["left", "right"]),
            )
            .build();
        let node = TaskNode::build(ws.find_task("top").unwrap(), &ws).unwrap();

        let result = CooperativeRunner::new().run(&Meta::new(), &node).unwrap();
        assert_eq!(result, Value::from(14));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_divergent_scoped_metas_match_sequential() {
        let ws = Workspace::builder("root")
            .task(FnTask::source("base", |meta| {
                Ok(meta.get("start").and_then(|v| v.as_i64()).unwrap_or(0).into())
            }))
            .task(FnTask::new("left", |_meta, deps| Ok(deps["base"].clone())).depends_on(["base"]))
            .task(FnTask::new("right", |_meta, deps| Ok(deps["base"].clone())).depends_on(["base"]))
            .task(
                FnTask::new("top", |_meta, deps| {
                    let sum: i64 = deps.values().filter_map(|v| v.as_i64()).sum();
                    Ok(sum.into())
                })
                .depends_on(["left", "right"]),
            )
            .build();
        let node = TaskNode::build(ws.find_task("top").unwrap(), &ws).unwrap();

        // Each branch scopes a different meta to the shared base node.
        let meta = Meta::new()
            .with("left", Meta::new().with("base", Meta::new().with("start", 1)))
            .with(
                "right",
                Meta::new().with("base", Meta::new().with("start", 100)),
            );

        let cooperative = CooperativeRunner::new().run(&meta, &node).unwrap();
        let sequential = crate::runner::SequentialRunner::new().run(&meta, &node).unwrap();
        assert_eq!(cooperative, sequential);
        assert_eq!(cooperative, Value::from(101));
    }

    #[test]
    fn test_matches_sequential_result() {
        let ws = Workspace::builder("root")
            .task(FnTask::source("b", |meta| {
                Ok(meta.get("value").and_then(|v| v.as_i64()).unwrap_or(0).into())
            }))
            .task(
                FnTask::new("a", |meta, deps| {
                    let x = meta.get("x").and_then(|v| v.as_i64()).unwrap_or(0);
                    let b = deps.get("b").and_then(|v| v.as_i64()).unwrap_or(0);
                    Ok((x + b).into())
                })
                .depends_on(["b"]),
            )
            .build();
        let node = TaskNode::build(ws.find_task("a").unwrap(), &ws).unwrap();
        let meta = Meta::new()
            .with("x", 3)
            .with("b", Meta::new().with("value", 5));

        let cooperative = CooperativeRunner::new().run(&meta, &node).unwrap();
        let sequential = crate::runner::SequentialRunner::new().run(&meta, &node).unwrap();
        assert_eq!(cooperative, sequential);
        assert_eq!(cooperative, Value::from(8));
    }

    #[test]
    fn test_async_fault_surfaces_as_task_failed() {
        let ws = Workspace::builder("root")
            .task(FnTask::source("broken", |_meta| anyhow::bail!("stream closed")))
            .build();
        let node = TaskNode::build(ws.find_task("broken").unwrap(), &ws).unwrap();

        let err = CooperativeRunner::new().run(&Meta::new(), &node).unwrap_err();
        assert!(matches!(err, RunnerError::TaskFailed { .. }));
        assert!(err.to_string().contains("stream closed"));
    }
}
