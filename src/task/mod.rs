// ABOUTME: Core task model for the execution engine
// ABOUTME: Defines the Task trait, dependency references, and resolved dependency values

pub mod combinators;
pub mod function;

pub use combinators::{FilterTask, MapTask, ReduceTask};
pub use function::FnTask;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use crate::meta::{Meta, Specification};

/// Dependency results gathered for a transform call, keyed by task name.
pub type DepValues = IndexMap<String, Value>;

/// A named unit of computation with declared dependencies.
///
/// `transform` receives the metadata tree for this node and the results of
/// every resolved dependency. The cooperative runner drives
/// `transform_async` instead; tasks override it to introduce suspension
/// points, otherwise it falls through to the synchronous body.
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    fn dependencies(&self) -> &[DependencyRef];

    fn specification(&self) -> Option<&Specification> {
        None
    }

    fn settings(&self) -> Option<&Meta> {
        None
    }

    fn transform(&self, meta: &Meta, deps: &DepValues) -> crate::Result<Value>;

    async fn transform_async(&self, meta: &Meta, deps: &DepValues) -> crate::Result<Value> {
        self.transform(meta, deps)
    }
}

/// A reference to a dependency: either a name resolved against the owning
/// workspace at graph-build time, or a direct task handle.
#[derive(Clone)]
pub enum DependencyRef {
    ByName(String),
    ByHandle(Arc<dyn Task>),
}

impl DependencyRef {
    /// The name this reference resolves under.
    pub fn name(&self) -> &str {
        match self {
            DependencyRef::ByName(name) => name,
            DependencyRef::ByHandle(task) => task.name(),
        }
    }
}

impl fmt::Debug for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyRef::ByName(name) => f.debug_tuple("ByName").field(name).finish(),
            DependencyRef::ByHandle(task) => f.debug_tuple("ByHandle").field(&task.name()).finish(),
        }
    }
}

impl From<&str> for DependencyRef {
    fn from(name: &str) -> Self {
        DependencyRef::ByName(name.to_string())
    }
}

impl From<String> for DependencyRef {
    fn from(name: String) -> Self {
        DependencyRef::ByName(name)
    }
}

impl From<Arc<dyn Task>> for DependencyRef {
    fn from(task: Arc<dyn Task>) -> Self {
        DependencyRef::ByHandle(task)
    }
}
