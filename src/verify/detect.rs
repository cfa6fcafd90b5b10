use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Canonical verification stage kinds, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Typecheck,
    Lint,
    Test,
    Build,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Typecheck => "typecheck",
            StageKind::Lint => "lint",
            StageKind::Test => "test",
            StageKind::Build => "build",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One named verification step with a command and timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationStage {
    pub kind: StageKind,
    pub command: String,
    pub timeout: Duration,
    /// Optional stages report failures but never block or trigger fixes.
    pub optional: bool,
}

impl VerificationStage {
    fn new(kind: StageKind, command: impl Into<String>) -> Self {
        let timeout = match kind {
            StageKind::Typecheck | StageKind::Lint => Duration::from_secs(120),
            StageKind::Test | StageKind::Build => Duration::from_secs(600),
        };
        Self { kind, command: command.into(), timeout, optional: false }
    }

    fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Inspect the working tree root for recognizable build-tool manifests and
/// map each to its canonical stages.
///
/// Detection is purely additive: a tree with no recognizable tooling yields
/// an empty list and the pipeline becomes a no-op. Stages come back sorted
/// in canonical order (typecheck, lint, test, build).
pub fn detect_stages(working_tree: &Path) -> Vec<VerificationStage> {
    let mut stages = Vec::new();

    if working_tree.join("Cargo.toml").exists() {
        stages.push(VerificationStage::new(StageKind::Typecheck, "cargo check --all-targets"));
        stages.push(
            VerificationStage::new(StageKind::Lint, "cargo clippy --all-targets -- -D warnings")
                .optional(),
        );
        stages.push(VerificationStage::new(StageKind::Test, "cargo test"));
        stages.push(VerificationStage::new(StageKind::Build, "cargo build"));
    }

    if working_tree.join("package.json").exists() {
        detect_node(working_tree, &mut stages);
    }

    let pyproject = working_tree.join("pyproject.toml");
    if pyproject.exists() {
        detect_python(working_tree, &pyproject, &mut stages);
    } else if working_tree.join("setup.py").exists() {
        stages.push(VerificationStage::new(StageKind::Test, "pytest"));
    }

    if working_tree.join("go.mod").exists() {
        stages.push(VerificationStage::new(StageKind::Typecheck, "go vet ./..."));
        stages.push(VerificationStage::new(StageKind::Test, "go test ./..."));
        stages.push(VerificationStage::new(StageKind::Build, "go build ./..."));
    }

    stages.sort_by_key(|s| s.kind);
    debug!(tree = %working_tree.display(), stages = stages.len(), "tooling detection complete");
    stages
}

/// package.json detection is script-aware: only scripts that exist become
/// stages, and typechecking requires a tsconfig.
fn detect_node(working_tree: &Path, stages: &mut Vec<VerificationStage>) {
    if working_tree.join("tsconfig.json").exists() {
        stages.push(VerificationStage::new(StageKind::Typecheck, "npx tsc --noEmit"));
    }

    let scripts = fs::read_to_string(working_tree.join("package.json"))
        .ok()
        .and_then(|json| serde_json::from_str::<Value>(&json).ok())
        .and_then(|pkg| pkg.get("scripts").cloned());
    let Some(scripts) = scripts else { return };

    if scripts.get("lint").is_some() {
        stages.push(VerificationStage::new(StageKind::Lint, "npm run lint").optional());
    }
    if scripts.get("test").is_some() {
        stages.push(VerificationStage::new(StageKind::Test, "npm test"));
    }
    if scripts.get("build").is_some() {
        stages.push(VerificationStage::new(StageKind::Build, "npm run build"));
    }
}

fn detect_python(working_tree: &Path, pyproject: &Path, stages: &mut Vec<VerificationStage>) {
    let content = fs::read_to_string(pyproject).unwrap_or_default();

    if content.contains("[tool.mypy]") || working_tree.join("mypy.ini").exists() {
        stages.push(VerificationStage::new(StageKind::Typecheck, "mypy ."));
    }
    if content.contains("[tool.ruff]") {
        stages.push(VerificationStage::new(StageKind::Lint, "ruff check .").optional());
    }
    stages.push(VerificationStage::new(StageKind::Test, "pytest"));
}
