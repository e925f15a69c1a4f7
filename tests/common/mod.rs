// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides the shared demo workspace and tracing setup

#![allow(dead_code)]

use std::sync::Once;

use serde_json::Value;
use taskforge::{FnTask, Meta, Workspace};

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .try_init();
    });
}

/// The demo analysis workspace, mirrored by the `taskforge-worker` binary
/// so the process runner can resolve the same tasks by name.
pub fn analysis_workspace() -> Workspace {
    Workspace::builder("analysis")
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
        .task(FnTask::source("base", |meta| {
            Ok(meta.get("start").and_then(|v| v.as_i64()).unwrap_or(1).into())
        }))
        .task(
            FnTask::new("left", |_meta, deps| {
                Ok((deps["base"].as_i64().unwrap_or(0) * 2).into())
            })
            .depends_on(["base"]),
        )
        .task(
            FnTask::new("right", |_meta, deps| {
                Ok((deps["base"].as_i64().unwrap_or(0) * 3).into())
            })
            .depends_on(["base"]),
        )
        .task(
            FnTask::new("total", |_meta, deps| {
                let sum: i64 = deps.values().filter_map(Value::as_i64).sum();
                Ok(sum.into())
            })
            .depends_on(["left", "right"]),
        )
        .task(FnTask::source("failing", |_meta| {
            anyhow::bail!("synthetic failure")
        }))
        .child(
            Workspace::builder("group")
                .child(
                    Workspace::builder("sub")
                        .task(FnTask::source("taskname", |_meta| Ok(Value::from(99))))
                        .build(),
                )
                .build(),
        )
        .build()
}

/// Metadata for running task `a`: `x = 3` at the top, `value = 5` scoped to
/// dependency `b`, expected result 8.
pub fn offset_meta() -> Meta {
    Meta::new()
        .with("x", 3)
        .with("b", Meta::new().with("value", 5))
}
