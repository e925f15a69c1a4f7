// ABOUTME: Combinator tasks operating on a single list-valued dependency
// ABOUTME: Provides map, filter, and reduce over another task's result

use std::sync::Arc;

use anyhow::bail;
use serde_json::Value;

use super::{DepValues, DependencyRef, Task};
use crate::meta::Meta;

fn items_of<'a>(deps: &'a DepValues, dependency: &str, kind: &str) -> crate::Result<&'a Vec<Value>> {
    match deps.get(dependency) {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => bail!(
            "{} task expects a list from dependency '{}', got {}",
            kind,
            dependency,
            other
        ),
        None => bail!("{} task is missing dependency '{}'", kind, dependency),
    }
}

/// Applies a function to every item of a list-valued dependency.
///
/// Named `map_<dependency>` after the task it maps over.
pub struct MapTask {
    name: String,
    dependency: String,
    dependencies: Vec<DependencyRef>,
    func: Arc<dyn Fn(Value) -> crate::Result<Value> + Send + Sync>,
}

impl MapTask {
    pub fn new<F>(dependency: impl Into<DependencyRef>, func: F) -> Self
    where
        F: Fn(Value) -> crate::Result<Value> + Send + Sync + 'static,
    {
        let dependency = dependency.into();
        let dep_name = dependency.name().to_string();
        Self {
            name: format!("map_{dep_name}"),
            dependency: dep_name,
            dependencies: vec![dependency],
            func: Arc::new(func),
        }
    }
}

impl Task for MapTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[DependencyRef] {
        &self.dependencies
    }

    fn transform(&self, _meta: &Meta, deps: &DepValues) -> crate::Result<Value> {
        let items = items_of(deps, &self.dependency, "map")?;
        let mapped: crate::Result<Vec<Value>> =
            items.iter().cloned().map(|item| (self.func)(item)).collect();
        Ok(Value::Array(mapped?))
    }
}

/// Keeps the items of a list-valued dependency matching a predicate.
pub struct FilterTask {
    name: String,
    dependency: String,
    dependencies: Vec<DependencyRef>,
    predicate: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
}

impl FilterTask {
    pub fn new<F>(dependency: impl Into<DependencyRef>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let dependency = dependency.into();
        let dep_name = dependency.name().to_string();
        Self {
            name: format!("filter_{dep_name}"),
            dependency: dep_name,
            dependencies: vec![dependency],
            predicate: Arc::new(predicate),
        }
    }
}

impl Task for FilterTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[DependencyRef] {
        &self.dependencies
    }

    fn transform(&self, _meta: &Meta, deps: &DepValues) -> crate::Result<Value> {
        let items = items_of(deps, &self.dependency, "filter")?;
        let kept: Vec<Value> = items
            .iter()
            .filter(|item| (self.predicate)(item))
            .cloned()
            .collect();
        Ok(Value::Array(kept))
    }
}

/// Folds a list-valued dependency into a single value.
pub struct ReduceTask {
    name: String,
    dependency: String,
    dependencies: Vec<DependencyRef>,
    func: Arc<dyn Fn(Value, Value) -> crate::Result<Value> + Send + Sync>,
}

impl ReduceTask {
    pub fn new<F>(dependency: impl Into<DependencyRef>, func: F) -> Self
    where
        F: Fn(Value, Value) -> crate::Result<Value> + Send + Sync + 'static,
    {
        let dependency = dependency.into();
        let dep_name = dependency.name().to_string();
        Self {
            name: format!("reduce_{dep_name}"),
            dependency: dep_name,
            dependencies: vec![dependency],
            func: Arc::new(func),
        }
    }
}

impl Task for ReduceTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[DependencyRef] {
        &self.dependencies
    }

    fn transform(&self, _meta: &Meta, deps: &DepValues) -> crate::Result<Value> {
        let items = items_of(deps, &self.dependency, "reduce")?;
        let mut iter = items.iter().cloned();
        let Some(mut acc) = iter.next() else {
            bail!(
                "reduce task cannot fold an empty list from dependency '{}'",
                self.dependency
            );
        };
        for item in iter {
            acc = (self.func)(acc, item)?;
        }
        Ok(acc)
    }
}
