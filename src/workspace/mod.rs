// ABOUTME: Workspace registry of tasks and nested child workspaces
// ABOUTME: Resolves dotted task paths and produces structure reports

pub mod path;

pub use path::TaskPath;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::task::Task;

/// A named registry of tasks and child workspaces.
///
/// Workspaces are constructed explicitly through [`WorkspaceBuilder`] and
/// passed to callers that need them; there is no hidden process-wide
/// registry. Task keys are unique per workspace and child names are unique
/// among siblings (a repeated registration replaces the earlier one).
pub struct Workspace {
    name: String,
    tasks: IndexMap<String, Arc<dyn Task>>,
    children: IndexMap<String, Arc<Workspace>>,
}

impl Workspace {
    pub fn builder(name: impl Into<String>) -> WorkspaceBuilder {
        WorkspaceBuilder {
            name: name.into(),
            tasks: IndexMap::new(),
            children: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tasks(&self) -> impl Iterator<Item = (&str, &Arc<dyn Task>)> {
        self.tasks.iter().map(|(name, task)| (name.as_str(), task))
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|name| name.as_str())
    }

    pub fn workspaces(&self) -> impl Iterator<Item = &Arc<Workspace>> {
        self.children.values()
    }

    pub fn get_workspace(&self, name: &str) -> Option<&Arc<Workspace>> {
        self.children.get(name)
    }

    /// Resolve a dotted path to a task.
    ///
    /// Multi-segment paths descend into the direct child workspace named by
    /// the head segment and recurse on the remainder. Single-segment paths
    /// match local tasks first, then search child workspaces in registration
    /// order, first match wins. An unknown path yields `None`, never an
    /// error.
    pub fn find_task(&self, path: impl Into<TaskPath>) -> Option<Arc<dyn Task>> {
        self.find(&path.into())
    }

    fn find(&self, path: &TaskPath) -> Option<Arc<dyn Task>> {
        if !path.is_leaf() {
            let child = self.children.get(path.head())?;
            return child.find(&path.sub_path());
        }

        if let Some(task) = self.tasks.get(path.name()) {
            return Some(Arc::clone(task));
        }
        self.children.values().find_map(|child| child.find(path))
    }

    pub fn has_task(&self, path: impl Into<TaskPath>) -> bool {
        self.find_task(path).is_some()
    }

    /// A read-only tree view of this workspace and its descendants.
    pub fn structure(&self) -> Structure {
        Structure {
            name: self.name.clone(),
            tasks: self.tasks.keys().cloned().collect(),
            workspaces: self.children.values().map(|c| c.structure()).collect(),
        }
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("name", &self.name)
            .field("tasks", &self.tasks.keys().collect::<Vec<_>>())
            .field("workspaces", &self.children.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder registering named tasks and child workspaces.
pub struct WorkspaceBuilder {
    name: String,
    tasks: IndexMap<String, Arc<dyn Task>>,
    children: IndexMap<String, Arc<Workspace>>,
}

impl WorkspaceBuilder {
    /// Register a task under its own name.
    pub fn task<T: Task + 'static>(self, task: T) -> Self {
        self.task_handle(Arc::new(task))
    }

    /// Register an already-shared task handle under its own name.
    pub fn task_handle(mut self, task: Arc<dyn Task>) -> Self {
        self.tasks.insert(task.name().to_string(), task);
        self
    }

    /// Register a child workspace under its own name.
    pub fn child(mut self, workspace: Workspace) -> Self {
        self.children
            .insert(workspace.name.clone(), Arc::new(workspace));
        self
    }

    /// Register an already-shared child workspace.
    pub fn child_handle(mut self, workspace: Arc<Workspace>) -> Self {
        self.children.insert(workspace.name.clone(), workspace);
        self
    }

    pub fn build(self) -> Workspace {
        Workspace {
            name: self.name,
            tasks: self.tasks,
            children: self.children,
        }
    }
}

/// Serializable structure report: `{name, tasks, workspaces}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub name: String,
    pub tasks: Vec<String>,
    pub workspaces: Vec<Structure>,
}
