// ABOUTME: Per-invocation dependency graph resolution
// ABOUTME: Builds TaskNode trees against a workspace, accumulating unresolved names

pub mod error;

pub use error::{GraphError, Result};

use std::sync::Arc;

use tracing::debug;

use crate::task::{DependencyRef, Task};
use crate::workspace::Workspace;

/// Identity key for a task handle, shared by graph construction and the
/// runners' per-invocation evaluation caches.
pub(crate) fn task_key(task: &Arc<dyn Task>) -> usize {
    Arc::as_ptr(task) as *const () as usize
}

/// A resolved, per-invocation node of the dependency graph.
///
/// Each declared dependency is either resolved into a child node or recorded
/// in the unresolved list; `has_dependence_errors` propagates transitively.
/// Nodes are rebuilt fresh for every top-level execution, since metadata
/// overrides may differ per call, and construction never touches metadata.
pub struct TaskNode {
    task: Arc<dyn Task>,
    dependencies: Vec<(String, TaskNode)>,
    unresolved: Vec<String>,
    has_errors: bool,
}

impl TaskNode {
    /// Resolve `task`'s dependency closure against `workspace`.
    ///
    /// Name references are looked up via `Workspace::find_task`; misses are
    /// accumulated rather than failing the build. A task that depends on
    /// itself, directly or through intermediaries, fails with
    /// [`GraphError::CircularDependency`].
    pub fn build(task: Arc<dyn Task>, workspace: &Workspace) -> Result<TaskNode> {
        let mut path = Vec::new();
        let node = Self::build_inner(task, workspace, &mut path)?;
        if node.has_errors {
            debug!(
                task = node.task.name(),
                "task graph built with unresolved dependencies"
            );
        }
        Ok(node)
    }

    fn build_inner(
        task: Arc<dyn Task>,
        workspace: &Workspace,
        path: &mut Vec<(usize, String)>,
    ) -> Result<TaskNode> {
        let key = task_key(&task);
        if path.iter().any(|(seen, _)| *seen == key) {
            let mut cycle: Vec<String> = path.iter().map(|(_, name)| name.clone()).collect();
            cycle.push(task.name().to_string());
            return Err(GraphError::CircularDependency { path: cycle });
        }

        path.push((key, task.name().to_string()));

        let mut dependencies = Vec::new();
        let mut unresolved = Vec::new();

        for dependency in task.dependencies() {
            match dependency {
                DependencyRef::ByHandle(handle) => {
                    let child = Self::build_inner(Arc::clone(handle), workspace, path)?;
                    dependencies.push((handle.name().to_string(), child));
                }
                DependencyRef::ByName(name) => match workspace.find_task(name.as_str()) {
                    Some(resolved) => {
                        let dep_name = resolved.name().to_string();
                        let child = Self::build_inner(resolved, workspace, path)?;
                        dependencies.push((dep_name, child));
                    }
                    None => unresolved.push(name.clone()),
                },
            }
        }

        path.pop();

        let has_errors =
            !unresolved.is_empty() || dependencies.iter().any(|(_, child)| child.has_errors);

        Ok(TaskNode {
            task,
            dependencies,
            unresolved,
            has_errors,
        })
    }

    pub fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }

    /// Resolved children, keyed by the resolved task's name.
    pub fn dependencies(&self) -> &[(String, TaskNode)] {
        &self.dependencies
    }

    /// Declared dependency names that could not be resolved in scope.
    pub fn unresolved_dependencies(&self) -> &[String] {
        &self.unresolved
    }

    /// True iff this node or any node below it has unresolved dependencies.
    pub fn has_dependence_errors(&self) -> bool {
        self.has_errors
    }

    /// Every unresolved dependency name in this subtree, depth-first.
    pub fn all_unresolved(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_unresolved(&mut names);
        names
    }

    fn collect_unresolved(&self, out: &mut Vec<String>) {
        out.extend(self.unresolved.iter().cloned());
        for (_, child) in &self.dependencies {
            child.collect_unresolved(out);
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub(crate) fn key(&self) -> usize {
        task_key(&self.task)
    }
}

impl std::fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskNode")
            .field("task", &self.task.name())
            .field(
                "dependencies",
                &self.dependencies.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("unresolved", &self.unresolved)
            .field("has_dependence_errors", &self.has_errors)
            .finish()
    }
}
