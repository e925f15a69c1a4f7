// ABOUTME: Main library module for the taskforge execution engine
// ABOUTME: Exports all core modules and provides the public API

pub mod envelope;
pub mod graph;
pub mod meta;
pub mod remote;
pub mod runner;
pub mod task;
pub mod workspace;

// Re-export commonly used types
pub use envelope::{Envelope, Payload};
pub use graph::TaskNode;
pub use meta::{Meta, MetaValue, Specification, Verification};
pub use remote::{RemoteUnit, UnitService};
pub use runner::{CooperativeRunner, ProcessRunner, SequentialRunner, TaskRunner, ThreadedRunner};
pub use task::{DepValues, DependencyRef, FnTask, Task};
pub use workspace::{Structure, TaskPath, Workspace, WorkspaceBuilder};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
