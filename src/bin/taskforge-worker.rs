// ABOUTME: Demo worker binary serving one run request over stdio
// ABOUTME: Hosts the demo analysis workspace used by the integration tests

use std::process::ExitCode;
use std::sync::Arc;

use serde_json::Value;
use taskforge::remote::worker::serve_stdio;
use taskforge::remote::UnitService;
use taskforge::runner::SequentialRunner;
use taskforge::{FnTask, Workspace};

fn analysis_workspace() -> Workspace {
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
        .build()
}

fn main() -> ExitCode {
    let service = UnitService::new(
        Arc::new(analysis_workspace()),
        Arc::new(SequentialRunner::new()),
        1,
    );
    match serve_stdio(&service) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("worker failed: {e}");
            ExitCode::FAILURE
        }
    }
}
