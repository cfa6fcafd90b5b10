//! Verification pipeline integration tests with real child processes.
#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use gitclaw_sessions::verify::{
    StageKind, VerificationStage, detect_stages, run_pipeline_with, run_stage,
};
use tempfile::TempDir;

fn stage(kind: StageKind, command: &str) -> VerificationStage {
    VerificationStage {
        kind,
        command: command.to_string(),
        timeout: Duration::from_secs(10),
        optional: false,
    }
}

/// No recognizable manifests: empty stage list, pipeline is a skipped pass
/// and the fix callback is never invoked.
#[test]
fn test_no_tooling_is_a_noop() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("README.md"), "# nothing to build").unwrap();

    assert!(detect_stages(dir.path()).is_empty());

    let mut fix_calls = 0;
    let outcome = run_pipeline_with(dir.path(), detect_stages, &mut |_| {
        fix_calls += 1;
        Ok(())
    }, 3);

    assert!(outcome.passed);
    assert!(outcome.skipped);
    assert_eq!(fix_calls, 0);
}

/// A tree with a type error and maxIterations = 2: the first iteration
/// fails, the fix callback repairs the tree, and the second iteration
/// passes with two recorded iterations.
#[test]
fn test_failing_typecheck_fixed_in_second_iteration() {
    let dir = TempDir::new().unwrap();
    // The "typechecker" greps for the marker the broken source contains
    fs::write(dir.path().join("src.txt"), "TYPE_ERROR here\n").unwrap();
    let detect = |_tree: &Path| {
        vec![stage(StageKind::Typecheck, "! grep -q TYPE_ERROR src.txt")]
    };

    let tree = dir.path().to_path_buf();
    let mut fix_calls = 0;
    let outcome = run_pipeline_with(
        &tree,
        detect,
        &mut |prompt| {
            fix_calls += 1;
            assert!(prompt.contains("typecheck"));
            fs::write(tree.join("src.txt"), "all good now\n").unwrap();
            Ok(())
        },
        2,
    );

    assert!(outcome.passed);
    assert_eq!(outcome.iterations.len(), 2);
    assert_eq!(fix_calls, 1);
    assert!(!outcome.iterations[0].stages[0].passed);
    assert!(outcome.iterations[1].stages[0].passed);
}

/// A 2-second-timeout stage running a 10-second sleep comes back within a
/// couple of seconds, failed and flagged as timed out.
#[test]
fn test_stage_timeout_enforced() {
    let dir = TempDir::new().unwrap();
    let mut slow = stage(StageKind::Test, "sleep 10");
    slow.timeout = Duration::from_secs(2);

    let started = Instant::now();
    let result = run_stage(&slow, dir.path());
    let elapsed = started.elapsed();

    assert!(!result.passed);
    assert!(result.timed_out);
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(6), "took {:?}", elapsed);
}

/// Every iteration fails: the pipeline terminates after maxIterations with
/// the final stage results, and the caller keeps the commit decision.
#[test]
fn test_pipeline_always_terminates() {
    let dir = TempDir::new().unwrap();
    let mut fix_calls = 0;
    let outcome = run_pipeline_with(
        dir.path(),
        |_| vec![stage(StageKind::Test, "exit 1")],
        &mut |_| {
            fix_calls += 1;
            Ok(())
        },
        4,
    );

    assert!(!outcome.passed);
    assert!(!outcome.skipped);
    assert_eq!(outcome.iterations.len(), 4);
    assert_eq!(fix_calls, 3);
    assert_eq!(outcome.final_failures().len(), 1);
    assert_eq!(outcome.final_failures()[0].exit_code, Some(1));
}

/// Stage order is enforced: a blocking typecheck failure means the test
/// stage never runs in that iteration.
#[test]
fn test_blocking_failure_skips_later_stages() {
    let dir = TempDir::new().unwrap();
    let witness = dir.path().join("test-ran");
    let detect = {
        let witness = witness.clone();
        move |_tree: &Path| {
            vec![
                stage(StageKind::Typecheck, "exit 1"),
                stage(StageKind::Test, &format!("touch {}", witness.display())),
            ]
        }
    };

    let outcome = run_pipeline_with(dir.path(), detect, &mut |_| Ok(()), 1);

    assert!(!outcome.passed);
    assert_eq!(outcome.iterations[0].stages.len(), 1);
    assert!(!witness.exists(), "test stage ran despite typecheck failure");
}

/// The serialized outcome is plain structured data a presentation layer can
/// render without this crate's help.
#[test]
fn test_outcome_serializes_for_report_consumers() {
    let dir = TempDir::new().unwrap();
    let outcome = run_pipeline_with(
        dir.path(),
        |_| vec![stage(StageKind::Test, "echo done")],
        &mut |_| Ok(()),
        1,
    );

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["passed"], true);
    assert_eq!(json["iterations"][0]["stages"][0]["kind"], "test");
    assert_eq!(json["iterations"][0]["stages"][0]["exit_code"], 0);
}
