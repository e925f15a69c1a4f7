// ABOUTME: Error types for dependency graph construction
// ABOUTME: Covers cycles detected while resolving a task's dependency closure

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Circular dependency detected: {}", path.join(" -> "))]
    CircularDependency { path: Vec<String> },
}

pub type Result<T> = std::result::Result<T, GraphError>;
