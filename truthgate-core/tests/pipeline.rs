use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use truthgate_core::{
    BlockerKind, ClaimKind, ClaimParser, CommandOutput, CommandSpec, DetectionContext, Dimension,
    ProcessRunner, ReadinessStatus, Result, Severity, SnapshotSource, StatusAggregator,
    StdFileSystem, TruthConfig, TruthGateError, build_detectors, detect_blockers, validate,
};

/// Answers commands from a script keyed by the rendered command line.
#[derive(Default)]
struct ScriptedRunner {
    script: HashMap<String, CommandOutput>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    fn with(mut self, command: &str, output: CommandOutput) -> Self {
        self.script.insert(command.to_string(), output);
        self
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(&self, command: &CommandSpec, _cwd: &Path, _timeout: Duration) -> Result<CommandOutput> {
        let line = command.to_string();
        self.calls.lock().expect("calls").push(line.clone());
        self.script.get(&line).cloned().ok_or_else(|| {
            TruthGateError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{line}: not found"),
            ))
        })
    }
}

fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: Some(0),
        timed_out: false,
    }
}

fn eslint(errors: u64) -> CommandOutput {
    let body = json!([{ "filePath": "src/app.js", "errorCount": errors, "warningCount": 0 }]);
    CommandOutput {
        stdout: body.to_string(),
        stderr: String::new(),
        exit_code: Some(if errors > 0 { 1 } else { 0 }),
        timed_out: false,
    }
}

const CONFIG: &str = r#"
[commands]
test = "npm test"
lint = "npx eslint . --format json"

[cicd]
query_latest_run = false

[documentation]
required = ["README.md"]

[ai]
tools = []

[dependencies]
npm_ls = false
npm_audit = false
"#;

const WORKFLOW: &str = r#"
name: CI
on: [push]
jobs:
  test:
    runs-on: ubuntu-latest
    timeout-minutes: 15
    steps:
      - uses: actions/checkout@v4
      - run: npm test
"#;

fn fixture(readme: &str) -> TempDir {
    let root = tempfile::tempdir().expect("temp dir");
    let write = |rel: &str, body: &str| {
        let path = root.path().join(rel);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, body).expect("write");
    };
    write("truthgate.toml", CONFIG);
    write("README.md", readme);
    write("dist/index.js", "module.exports = {};\n");
    write(".github/workflows/ci.yml", WORKFLOW);
    root
}

fn load_config(root: &Path) -> TruthConfig {
    TruthConfig::discover(&StdFileSystem::new(), root, None).expect("config")
}

#[test]
fn production_ready_claim_on_unready_project_is_critical() {
    let root = fixture("# Demo\n\n✅ 100% production ready\n");
    let fs = StdFileSystem::new();
    let config = load_config(root.path());
    let runner = ScriptedRunner::default()
        .with("npm test", ok("Tests:       10 passed, 10 total"))
        .with("npx eslint . --format json", eslint(3));

    let claims = ClaimParser::new(&fs).parse(root.path()).expect("claims");
    let status = StatusAggregator::new(&fs, &runner, &config).collect(root.path());
    let report = validate(&claims.claims, &status, &config);

    assert_eq!(status.overall.status, ReadinessStatus::DevelopmentReady);
    assert_eq!(status.overall.critical_issues, vec!["3 lint errors"]);
    assert_eq!(report.discrepancies.len(), 1);
    let discrepancy = &report.discrepancies[0];
    assert_eq!(discrepancy.kind, ClaimKind::ProductionReady);
    assert_eq!(discrepancy.severity, Severity::Critical);
    assert_eq!(discrepancy.claimed, json!("Production Ready"));
    assert_eq!(discrepancy.source, "README.md:3");
}

#[test]
fn accurate_ratio_claim_passes() {
    let root = fixture("# Demo\n\n554/555 tests passing\n");
    let fs = StdFileSystem::new();
    let config = load_config(root.path());
    let runner = ScriptedRunner::default()
        .with(
            "npm test",
            ok("Tests:       1 failed, 554 passed, 555 total"),
        )
        .with("npx eslint . --format json", eslint(0));

    let claims = ClaimParser::new(&fs).parse(root.path()).expect("claims");
    let status = StatusAggregator::new(&fs, &runner, &config).collect(root.path());
    let report = validate(&claims.claims, &status, &config);

    assert_eq!(claims.claims.len(), 1);
    assert!(report.discrepancies.is_empty());
    assert_eq!(report.summary.passed, 1);
}

#[test]
fn under_reported_lint_errors_are_high() {
    let root = fixture("# Demo\n\n- 0 linting errors\n");
    let fs = StdFileSystem::new();
    let config = load_config(root.path());
    let runner = ScriptedRunner::default()
        .with("npm test", ok("Tests:       10 passed, 10 total"))
        .with("npx eslint . --format json", eslint(7));

    let claims = ClaimParser::new(&fs).parse(root.path()).expect("claims");
    let status = StatusAggregator::new(&fs, &runner, &config).collect(root.path());
    let report = validate(&claims.claims, &status, &config);

    assert_eq!(report.discrepancies.len(), 1);
    let discrepancy = &report.discrepancies[0];
    assert_eq!(discrepancy.kind, ClaimKind::ErrorCount);
    assert_eq!(discrepancy.severity, Severity::High);
    assert_eq!(discrepancy.claimed, json!(0));
    assert_eq!(discrepancy.actual, json!(7));
}

#[test]
fn timed_out_collector_degrades_and_run_completes() {
    let root = fixture("# Demo\n\n10/10 tests passing\n");
    let fs = StdFileSystem::new();
    let config = load_config(root.path());

    // First run measures live and seeds the cache.
    let healthy = ScriptedRunner::default()
        .with("npm test", ok("Tests:       10 passed, 10 total"))
        .with("npx eslint . --format json", eslint(0));
    let first = StatusAggregator::new(&fs, &healthy, &config).collect(root.path());
    assert!(first.snapshot(Dimension::Tests).expect("tests").is_live());

    let hanging = ScriptedRunner::default()
        .with(
            "npm test",
            CommandOutput {
                timed_out: true,
                ..CommandOutput::default()
            },
        )
        .with("npx eslint . --format json", eslint(0));
    let status = StatusAggregator::new(&fs, &hanging, &config).collect(root.path());

    let tests = status.snapshot(Dimension::Tests).expect("tests");
    assert_eq!(tests.source, SnapshotSource::Cached);
    assert!(tests.timed_out);
    assert!(tests.note.as_deref().unwrap_or_default().contains("timed out after 300s"));
    assert_eq!(status.overall.component_scores[&Dimension::Tests], 1.0);
    assert!(
        status
            .overall
            .critical_issues
            .contains(&"Test execution timed out".to_string())
    );
    assert!(status.snapshot(Dimension::Linting).expect("lint").is_live());

    let claims = ClaimParser::new(&fs).parse(root.path()).expect("claims");
    let report = validate(&claims.claims, &status, &config);
    assert!(report.discrepancies.is_empty());

    let ctx = DetectionContext {
        root: root.path(),
        fs: &fs,
        runner: &hanging,
        config: &config,
        status: &status,
    };
    let blockers = detect_blockers(&build_detectors(), &ctx);
    assert!(blockers.errors.is_empty());
    assert_eq!(blockers.blockers[0].kind, BlockerKind::TestTimeout);
    assert_eq!(blockers.blockers[0].severity, Severity::Critical);
}

#[test]
fn dry_run_leaves_no_cache_behind() {
    let root = fixture("# Demo\n");
    let fs = StdFileSystem::new();
    let config = load_config(root.path());
    let runner = ScriptedRunner::default()
        .with("npm test", ok("Tests:       1 passed, 1 total"))
        .with("npx eslint . --format json", eslint(0));

    let status = StatusAggregator::new(&fs, &runner, &config)
        .dry_run(true)
        .collect(root.path());

    assert_eq!(status.overall.status, ReadinessStatus::ProductionReady);
    assert!(!root.path().join(".truthgate/status-cache.json").exists());
    let calls = runner.calls.lock().expect("calls");
    assert!(calls.contains(&"npm test".to_string()));
}
