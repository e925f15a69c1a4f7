// ABOUTME: Integration tests for runner equivalence across execution strategies
// ABOUTME: Covers sequential, threaded, cooperative, and process-parallel runs

mod common;

use serde_json::Value;
use taskforge::runner::{RunnerError, WorkerCommand};
use taskforge::{
    CooperativeRunner, Meta, ProcessRunner, SequentialRunner, TaskNode, TaskRunner, ThreadedRunner,
};

use common::{analysis_workspace, init_tracing, offset_meta};

fn node_for(task: &str) -> TaskNode {
    let ws = analysis_workspace();
    TaskNode::build(ws.find_task(task).unwrap(), &ws).unwrap()
}

fn worker_command() -> WorkerCommand {
    WorkerCommand::new(env!("CARGO_BIN_EXE_taskforge-worker"))
}

#[test]
fn test_all_runners_agree_on_scoped_metadata() {
    init_tracing();
    let node = node_for("a");
    let meta = offset_meta();

    let runners: Vec<Box<dyn TaskRunner>> = vec![
        Box::new(SequentialRunner::new()),
        Box::new(ThreadedRunner::default()),
        Box::new(CooperativeRunner::new()),
        Box::new(ProcessRunner::new(worker_command())),
    ];
    for runner in runners {
        let result = runner.run(&meta, &node).unwrap();
        assert_eq!(result, Value::from(8));
    }
}

#[test]
fn test_all_runners_agree_on_diamond_graph() {
    init_tracing();
    let node = node_for("total");
    let meta = Meta::new()
        .with("left", Meta::new().with("base", Meta::new().with("start", 4)))
        .with("right", Meta::new().with("base", Meta::new().with("start", 4)));

    // base yields 4 in both branches: left 8, right 12, total 20.
    let runners: Vec<Box<dyn TaskRunner>> = vec![
        Box::new(SequentialRunner::new()),
        Box::new(ThreadedRunner::new(2)),
        Box::new(CooperativeRunner::new()),
        Box::new(ProcessRunner::new(worker_command()).with_max_workers(2)),
    ];
    for runner in runners {
        let result = runner.run(&meta, &node).unwrap();
        assert_eq!(result, Value::from(20));
    }
}

#[test]
fn test_all_runners_agree_when_branch_metas_diverge() {
    init_tracing();
    let node = node_for("total");
    // left and right scope different start values to the shared base task,
    // so base resolves per branch: left 1*2, right 100*3.
    let meta = Meta::new()
        .with("left", Meta::new().with("base", Meta::new().with("start", 1)))
        .with(
            "right",
            Meta::new().with("base", Meta::new().with("start", 100)),
        );

    let expected = SequentialRunner::new().run(&meta, &node).unwrap();
    assert_eq!(expected, Value::from(302));

    let runners: Vec<Box<dyn TaskRunner>> = vec![
        Box::new(ThreadedRunner::new(2)),
        Box::new(CooperativeRunner::new()),
        Box::new(ProcessRunner::new(worker_command()).with_max_workers(2)),
    ];
    for runner in runners {
        for _ in 0..10 {
            assert_eq!(runner.run(&meta, &node).unwrap(), expected);
        }
    }
}

#[test]
fn test_process_runner_end_to_end() {
    init_tracing();
    let node = node_for("total");

    // Default meta: base defaults to 1, so left 2, right 3, total 5.
    let runner = ProcessRunner::new(worker_command());
    let result = runner.run(&Meta::new(), &node).unwrap();
    assert_eq!(result, Value::from(5));
}

#[test]
fn test_process_runner_surfaces_worker_failure() {
    init_tracing();
    let ws = analysis_workspace();
    let top = taskforge::FnTask::new("report", |_meta, _deps| Ok(Value::Null))
        .depends_on(["failing"]);
    let ws = taskforge::Workspace::builder("wrapper")
        .task(top)
        .child(ws)
        .build();
    let node = TaskNode::build(ws.find_task("report").unwrap(), &ws).unwrap();

    let err = ProcessRunner::new(worker_command())
        .run(&Meta::new(), &node)
        .unwrap_err();
    match err {
        RunnerError::WorkerProcess { task_id, message } => {
            assert_eq!(task_id, "failing");
            assert!(message.contains("synthetic failure"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_failure_is_identical_across_in_process_runners() {
    init_tracing();
    let node = node_for("failing");

    let sequential = SequentialRunner::new()
        .run(&Meta::new(), &node)
        .unwrap_err();
    let threaded = ThreadedRunner::default()
        .run(&Meta::new(), &node)
        .unwrap_err();
    let cooperative = CooperativeRunner::new()
        .run(&Meta::new(), &node)
        .unwrap_err();

    assert_eq!(sequential, threaded);
    assert_eq!(sequential, cooperative);
    assert!(sequential.to_string().contains("synthetic failure"));
}
