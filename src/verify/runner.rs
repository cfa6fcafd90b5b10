use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use super::detect::{StageKind, VerificationStage};

/// Captured output is tail-truncated to this many bytes per stream.
const OUTPUT_TAIL_BYTES: u64 = 8 * 1024;

/// How often the runner polls a child for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome of one stage execution.
#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    pub kind: StageKind,
    pub command: String,
    pub passed: bool,
    /// None when the process was killed (timeout) or never started.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub duration_ms: u64,
    pub stdout_tail: String,
    pub stderr_tail: String,
    pub optional: bool,
}

impl StageResult {
    /// A failure that blocks the pipeline (non-optional stage not passing).
    pub fn is_blocking_failure(&self) -> bool {
        !self.passed && !self.optional
    }

    fn failed_to_start(stage: &VerificationStage, error: String) -> Self {
        Self {
            kind: stage.kind,
            command: stage.command.clone(),
            passed: false,
            exit_code: None,
            timed_out: false,
            duration_ms: 0,
            stdout_tail: String::new(),
            stderr_tail: error,
            optional: stage.optional,
        }
    }
}

/// Execute one stage's command in `working_tree` with its timeout.
///
/// The command runs through the platform shell with stdout/stderr captured
/// to temp files (bounded tails are read back afterwards, so a chatty build
/// cannot grow memory). On timeout the child is forcibly killed and the
/// stage is recorded failed with `timed_out` set. A command that cannot
/// start at all is an ordinary failure, not a panic.
pub fn run_stage(stage: &VerificationStage, working_tree: &Path) -> StageResult {
    let stdout_file = match tempfile::tempfile() {
        Ok(f) => f,
        Err(e) => return StageResult::failed_to_start(stage, format!("capture setup failed: {e}")),
    };
    let stderr_file = match tempfile::tempfile() {
        Ok(f) => f,
        Err(e) => return StageResult::failed_to_start(stage, format!("capture setup failed: {e}")),
    };
    let (stdout_clone, stderr_clone) = match (stdout_file.try_clone(), stderr_file.try_clone()) {
        (Ok(o), Ok(e)) => (o, e),
        _ => return StageResult::failed_to_start(stage, "capture setup failed".to_string()),
    };

    let started = Instant::now();
    let spawned = shell_command(&stage.command)
        .current_dir(working_tree)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_clone))
        .stderr(Stdio::from(stderr_clone))
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            return StageResult::failed_to_start(stage, format!("failed to start: {e}"));
        }
    };

    let deadline = started + stage.timeout;
    let mut timed_out = false;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {}
            Err(e) => {
                warn!(stage = %stage.kind, error = %e, "wait failed");
            }
        }
        if Instant::now() >= deadline {
            timed_out = true;
            let _ = child.kill();
            break child.wait().ok();
        }
        sleep(POLL_INTERVAL);
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    let exit_code = status.as_ref().and_then(|s| s.code());
    let passed = !timed_out && status.as_ref().is_some_and(|s| s.success());

    debug!(
        stage = %stage.kind,
        command = %stage.command,
        passed,
        timed_out,
        duration_ms,
        "stage finished"
    );

    StageResult {
        kind: stage.kind,
        command: stage.command.clone(),
        passed,
        exit_code,
        timed_out,
        duration_ms,
        stdout_tail: read_tail(stdout_file),
        stderr_tail: read_tail(stderr_file),
        optional: stage.optional,
    }
}

/// Run stages in their fixed canonical order, skipping everything after the
/// first blocking failure - there is no point testing code that does not
/// type-check.
pub fn run_stages(stages: &[VerificationStage], working_tree: &Path) -> Vec<StageResult> {
    let mut results = Vec::with_capacity(stages.len());
    for stage in stages {
        let result = run_stage(stage, working_tree);
        let blocked = result.is_blocking_failure();
        results.push(result);
        if blocked {
            break;
        }
    }
    results
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Last [`OUTPUT_TAIL_BYTES`] of a capture file.
fn read_tail(mut file: File) -> String {
    let len = match file.seek(SeekFrom::End(0)) {
        Ok(len) => len,
        Err(_) => return String::new(),
    };
    let start = len.saturating_sub(OUTPUT_TAIL_BYTES);
    if file.seek(SeekFrom::Start(start)).is_err() {
        return String::new();
    }
    let mut buf = Vec::with_capacity((len - start) as usize);
    if file.read_to_end(&mut buf).is_err() {
        return String::new();
    }
    let mut tail = String::from_utf8_lossy(&buf).into_owned();
    if start > 0 {
        tail.insert_str(0, "... [truncated] ...\n");
    }
    tail
}

#[cfg(all(test, unix))]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn stage(kind: StageKind, command: &str, timeout: Duration) -> VerificationStage {
        VerificationStage { kind, command: command.to_string(), timeout, optional: false }
    }

    #[test]
    fn test_passing_stage() {
        let dir = TempDir::new().unwrap();
        let result = run_stage(
            &stage(StageKind::Test, "echo ok", Duration::from_secs(5)),
            dir.path(),
        );
        assert!(result.passed);
        assert_eq!(result.exit_code, Some(0));
        assert!(!result.timed_out);
        assert_eq!(result.stdout_tail.trim(), "ok");
    }

    #[test]
    fn test_failing_stage_captures_exit_code_and_stderr() {
        let dir = TempDir::new().unwrap();
        let result = run_stage(
            &stage(StageKind::Typecheck, "echo boom >&2; exit 3", Duration::from_secs(5)),
            dir.path(),
        );
        assert!(!result.passed);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.stderr_tail.trim(), "boom");
    }

    #[test]
    fn test_timeout_kills_child() {
        let dir = TempDir::new().unwrap();
        let started = Instant::now();
        let result = run_stage(
            &stage(StageKind::Test, "sleep 10", Duration::from_millis(300)),
            dir.path(),
        );
        assert!(!result.passed);
        assert!(result.timed_out);
        // Returned near the timeout, not after the full sleep
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_command_not_found_is_ordinary_failure() {
        let dir = TempDir::new().unwrap();
        let result = run_stage(
            &stage(StageKind::Build, "definitely-not-a-real-command-xyz", Duration::from_secs(5)),
            dir.path(),
        );
        // The shell itself starts, then fails with 127
        assert!(!result.passed);
        assert!(!result.timed_out);
    }

    #[test]
    fn test_output_is_tail_truncated() {
        let dir = TempDir::new().unwrap();
        let result = run_stage(
            &stage(
                StageKind::Test,
                "i=0; while [ $i -lt 2000 ]; do echo line-$i; i=$((i+1)); done",
                Duration::from_secs(10),
            ),
            dir.path(),
        );
        assert!(result.passed);
        assert!(result.stdout_tail.len() as u64 <= OUTPUT_TAIL_BYTES + 64);
        assert!(result.stdout_tail.starts_with("... [truncated] ..."));
        assert!(result.stdout_tail.contains("line-1999"));
    }

    #[test]
    fn test_run_stages_stops_after_blocking_failure() {
        let dir = TempDir::new().unwrap();
        let stages = vec![
            stage(StageKind::Typecheck, "exit 1", Duration::from_secs(5)),
            stage(StageKind::Test, "echo never", Duration::from_secs(5)),
        ];
        let results = run_stages(&stages, dir.path());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].kind, StageKind::Typecheck);
    }

    #[test]
    fn test_run_stages_continues_past_optional_failure() {
        let dir = TempDir::new().unwrap();
        let mut lint = stage(StageKind::Lint, "exit 1", Duration::from_secs(5));
        lint.optional = true;
        let stages = vec![lint, stage(StageKind::Test, "echo ok", Duration::from_secs(5))];
        let results = run_stages(&stages, dir.path());
        assert_eq!(results.len(), 2);
        assert!(!results[0].passed);
        assert!(results[1].passed);
    }
}
