use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use super::detect::{VerificationStage, detect_stages};
use super::runner::{StageResult, run_stages};
use crate::utils::truncate_bytes;

/// Bytes of captured output quoted per failing stage in a fix prompt.
const PROMPT_OUTPUT_BYTES: usize = 2 * 1024;

/// One attempt's stage results.
#[derive(Debug, Clone, Serialize)]
pub struct IterationResult {
    pub attempt: usize,
    pub stages: Vec<StageResult>,
}

impl IterationResult {
    pub fn blocking_failures(&self) -> Vec<&StageResult> {
        self.stages.iter().filter(|s| s.is_blocking_failure()).collect()
    }
}

/// Aggregated pipeline result handed back to the caller.
///
/// `passed == false` after exhausting iterations is a result value, not an
/// error: the caller decides commit-with-warning versus abort.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub passed: bool,
    /// True when no tooling was detected and nothing ran.
    pub skipped: bool,
    pub iterations: Vec<IterationResult>,
}

impl VerificationOutcome {
    /// Blocking failures of the final iteration, empty when passed.
    pub fn final_failures(&self) -> Vec<&StageResult> {
        self.iterations.last().map(|i| i.blocking_failures()).unwrap_or_default()
    }
}

/// Run the full detect → run → fix → retry loop against `working_tree`.
///
/// Tooling is re-detected on every iteration since the fix callback mutates
/// the tree. With `max_iterations = N` the callback runs at most `N - 1`
/// times; the loop always terminates with a Passed or Failed outcome even
/// when every stage fails every time.
pub fn run_pipeline(
    working_tree: &Path,
    fix_callback: &mut dyn FnMut(&str) -> Result<()>,
    max_iterations: usize,
) -> VerificationOutcome {
    run_pipeline_with(working_tree, detect_stages, fix_callback, max_iterations)
}

/// [`run_pipeline`] with a pluggable detection function (in-memory tests
/// supply sh-based stages without real toolchains on the machine).
pub fn run_pipeline_with<D>(
    working_tree: &Path,
    detect: D,
    fix_callback: &mut dyn FnMut(&str) -> Result<()>,
    max_iterations: usize,
) -> VerificationOutcome
where
    D: Fn(&Path) -> Vec<VerificationStage>,
{
    let mut iterations = Vec::new();

    for attempt in 1..=max_iterations {
        let stages = detect(working_tree);
        if stages.is_empty() {
            info!(tree = %working_tree.display(), "no tooling detected, verification skipped");
            return VerificationOutcome { passed: true, skipped: true, iterations };
        }

        let results = run_stages(&stages, working_tree);
        let iteration = IterationResult { attempt, stages: results };
        let failures = iteration.blocking_failures();

        if failures.is_empty() {
            info!(attempt, "verification passed");
            iterations.push(iteration);
            return VerificationOutcome { passed: true, skipped: false, iterations };
        }

        let prompt = build_fix_prompt(&failures);
        let last_attempt = attempt == max_iterations;
        iterations.push(iteration);

        if last_attempt {
            break;
        }
        info!(attempt, "verification failed, invoking fix callback");
        if let Err(e) = fix_callback(&prompt) {
            warn!(attempt, error = %format!("{e:#}"), "fix callback failed, stopping iteration");
            break;
        }
    }

    VerificationOutcome { passed: false, skipped: false, iterations }
}

/// Summarize blocking failures for the agent: stage, command, exit status,
/// and the tail of captured output.
fn build_fix_prompt(failures: &[&StageResult]) -> String {
    let mut prompt = String::from(
        "The following verification stages failed. Fix the underlying problems without weakening or skipping the checks.\n",
    );
    for failure in failures {
        let status = if failure.timed_out {
            format!("timed out after {}ms", failure.duration_ms)
        } else {
            match failure.exit_code {
                Some(code) => format!("exit code {}", code),
                None => "terminated without an exit code".to_string(),
            }
        };
        prompt.push_str(&format!("\n## {} (`{}`) - {}\n", failure.kind, failure.command, status));

        let output =
            if failure.stderr_tail.trim().is_empty() { &failure.stdout_tail } else { &failure.stderr_tail };
        if !output.trim().is_empty() {
            prompt.push_str("```\n");
            prompt.push_str(truncate_bytes(output, PROMPT_OUTPUT_BYTES));
            prompt.push_str("\n```\n");
        }
    }
    prompt
}
