// ABOUTME: Closure-backed task implementation
// ABOUTME: Builds tasks from plain functions with builder-style configuration

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::{DepValues, DependencyRef, Task};
use crate::meta::{Meta, Specification};

type TransformFn = Arc<dyn Fn(&Meta, &DepValues) -> crate::Result<Value> + Send + Sync>;

/// A task backed by a closure.
///
/// ```
/// use taskforge::{FnTask, Task};
///
/// let sum = FnTask::new("sum", |_meta, deps| {
///     let total: i64 = deps.values().filter_map(|v| v.as_i64()).sum();
///     Ok(total.into())
/// })
/// .depends_on(["left", "right"]);
///
/// assert_eq!(sum.name(), "sum");
/// ```
pub struct FnTask {
    name: String,
    dependencies: Vec<DependencyRef>,
    specification: Option<Specification>,
    settings: Option<Meta>,
    func: TransformFn,
}

impl FnTask {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Meta, &DepValues) -> crate::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            specification: None,
            settings: None,
            func: Arc::new(func),
        }
    }

    /// A leaf task producing data from metadata alone.
    pub fn source<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Meta) -> crate::Result<Value> + Send + Sync + 'static,
    {
        Self::new(name, move |meta, _deps| func(meta))
    }

    pub fn depends_on<I, D>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<DependencyRef>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    pub fn with_specification(mut self, specification: Specification) -> Self {
        self.specification = Some(specification);
        self
    }

    pub fn with_settings(mut self, settings: Meta) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn into_arc(self) -> Arc<dyn Task> {
        Arc::new(self)
    }
}

impl Task for FnTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[DependencyRef] {
        &self.dependencies
    }

    fn specification(&self) -> Option<&Specification> {
        self.specification.as_ref()
    }

    fn settings(&self) -> Option<&Meta> {
        self.settings.as_ref()
    }

    fn transform(&self, meta: &Meta, deps: &DepValues) -> crate::Result<Value> {
        (self.func)(meta, deps)
    }
}

impl fmt::Debug for FnTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::TypeTag;

    #[test]
    fn test_transform_receives_meta_and_deps() {
        let task = FnTask::new("offset_sum", |meta, deps| {
            let offset = meta.get("x").and_then(|v| v.as_i64()).unwrap_or(0);
            let b = deps.get("b").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok((offset + b).into())
        })
        .depends_on(["b"]);

        let meta = Meta::new().with("x", 3);
        let mut deps = DepValues::new();
        deps.insert("b".to_string(), 5.into());

        let result = task.transform(&meta, &deps).unwrap();
        assert_eq!(result, Value::from(8));
    }

    #[test]
    fn test_source_task_has_no_dependencies() {
        let task = FnTask::source("constant", |_meta| Ok(Value::from(42)));

        assert!(task.dependencies().is_empty());
        let result = task.transform(&Meta::new(), &DepValues::new()).unwrap();
        assert_eq!(result, Value::from(42));
    }

    #[test]
    fn test_builder_attaches_specification_and_settings() {
        let task = FnTask::source("reader", |_meta| Ok(Value::Null))
            .with_specification(Specification::fields([]).field("path", [TypeTag::String]))
            .with_settings(Meta::new().with("buffered", true));

        assert!(task.specification().is_some());
        assert_eq!(
            task.settings().unwrap().get("buffered"),
            Some(&crate::MetaValue::Bool(true))
        );
    }

    #[tokio::test]
    async fn test_default_async_transform_matches_sync() {
        let task = FnTask::source("constant", |_meta| Ok(Value::from(7)));

        let sync = task.transform(&Meta::new(), &DepValues::new()).unwrap();
        let async_result = task
            .transform_async(&Meta::new(), &DepValues::new())
            .await
            .unwrap();
        assert_eq!(sync, async_result);
    }
}
