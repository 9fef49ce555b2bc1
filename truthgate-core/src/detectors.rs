//! Detector registry, the built-in detectors, and blocker prioritization.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::OnceLock;

use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::collectors::relative_display;
use crate::detector::{BlockerDetector, DetectionContext, Findings};
use crate::domain::{Blocker, BlockerKind, Dimension, Metrics, PipelineState, Severity, SnapshotSource, StatusSnapshot};
use crate::error::Result;
use crate::inspector::{SourceFile, SourceInspector};
use crate::process::CommandSpec;

const DETAIL_LIMIT: usize = 20;

/// Build the standard detectors in registration order.
pub fn build_detectors() -> Vec<Box<dyn BlockerDetector>> {
    vec![
        Box::new(TestSuiteDetector),
        Box::new(InfrastructureDetector),
        Box::new(DependencyDetector),
        Box::new(CodeQualityDetector),
    ]
}

/// A detector, or one of its checks, that failed to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorFailure {
    /// Detector name.
    pub detector: String,
    /// Error message, prefixed with the failed check when only part of the detector failed.
    pub message: String,
}

/// Prioritized blockers plus any detector failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockerReport {
    /// Blockers, most urgent first.
    pub blockers: Vec<Blocker>,
    /// Failed detectors and checks; blockers they would have found are missing.
    pub errors: Vec<DetectorFailure>,
}

impl BlockerReport {
    /// Number of blockers at a severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.blockers
            .iter()
            .filter(|blocker| blocker.severity == severity)
            .count()
    }

    /// Whether any blocker has the severity.
    pub fn has(&self, severity: Severity) -> bool {
        self.count(severity) > 0
    }
}

/// Stable sort by severity, then blocker importance. Ties keep input order.
pub fn prioritize(mut blockers: Vec<Blocker>) -> Vec<Blocker> {
    blockers.sort_by_key(|blocker| (blocker.severity, blocker.kind));
    blockers
}

/// Run the detectors in parallel, concatenate in registration order, and prioritize.
pub fn detect_blockers(
    detectors: &[Box<dyn BlockerDetector>],
    ctx: &DetectionContext<'_>,
) -> BlockerReport {
    let results: Vec<(&'static str, Result<Findings>)> = detectors
        .par_iter()
        .map(|detector| (detector.name(), detector.detect(ctx)))
        .collect();

    let mut report = BlockerReport::default();
    let mut blockers = Vec::new();
    for (name, result) in results {
        match result {
            Ok(found) => {
                log::debug!("{name}: {} blockers", found.blockers.len());
                blockers.extend(found.blockers);
                report
                    .errors
                    .extend(found.failed_checks.into_iter().map(|message| DetectorFailure {
                        detector: name.to_string(),
                        message,
                    }));
            }
            Err(err) => {
                log::warn!("{name} detector failed: {err}");
                report.errors.push(DetectorFailure {
                    detector: name.to_string(),
                    message: err.to_string(),
                });
            }
        }
    }
    report.blockers = prioritize(blockers);
    report
}

fn measured<'a>(ctx: &'a DetectionContext<'_>, dimension: Dimension) -> Option<&'a StatusSnapshot> {
    ctx.status
        .snapshot(dimension)
        .filter(|snapshot| snapshot.source != SnapshotSource::Default)
}

fn read_json(ctx: &DetectionContext<'_>, name: &str) -> Result<Option<Value>> {
    let path = ctx.root.join(name);
    if !ctx.fs.exists(&path) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&ctx.fs.read_to_string(&path)?)?))
}

fn limited(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .take(DETAIL_LIMIT)
        .map(|path| path.display().to_string())
        .collect()
}

fn count_matches(re: &Regex, sources: &[&SourceFile]) -> (usize, Vec<PathBuf>) {
    let mut total = 0;
    let mut files = Vec::new();
    for source in sources {
        let hits = re.find_iter(&source.contents).count();
        if hits > 0 {
            total += hits;
            files.push(source.path.clone());
        }
    }
    (total, files)
}

fn focused_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:it|test|describe|context)\.only\s*\(|\bf(?:it|describe)\s*\(")
            .expect("focused regex must compile")
    })
}

fn skip_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:it|test|describe|context)\.skip\s*\(|\bx(?:it|describe)\s*\(|#\[ignore\]|@pytest\.mark\.skip")
            .expect("skip regex must compile")
    })
}

/// Test-suite health: failures, timeouts, empty suites, and runner configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestSuiteDetector;

impl TestSuiteDetector {
    fn from_status(ctx: &DetectionContext<'_>) -> Vec<Blocker> {
        let mut blockers = Vec::new();
        let Some(snapshot) = ctx.status.snapshot(Dimension::Tests) else {
            return blockers;
        };
        if snapshot.timed_out {
            blockers.push(Blocker::new(
                BlockerKind::TestTimeout,
                Severity::Critical,
                format!(
                    "Test execution timed out after {}s",
                    ctx.config.commands.test_timeout_secs
                ),
                "Find the hanging test (open handles, unresolved promises) or raise commands.test_timeout_secs",
            ));
        }
        let Some(Metrics::Tests(tests)) = measured(ctx, Dimension::Tests).map(|s| &s.metrics) else {
            return blockers;
        };
        if tests.total == 0 {
            blockers.push(Blocker::new(
                BlockerKind::NoTests,
                Severity::Critical,
                "No tests were found or run",
                "Add tests or fix the test runner's discovery configuration",
            ));
            return blockers;
        }
        let counts = json!({
            "passed": tests.passed,
            "failed": tests.failed,
            "skipped": tests.skipped,
            "total": tests.total,
        });
        if tests.failed > 0 {
            blockers.push(
                Blocker::new(
                    BlockerKind::TestFailures,
                    Severity::Critical,
                    format!("{} of {} tests failing", tests.failed, tests.total),
                    "Fix the failing tests before claiming readiness",
                )
                .with_details(counts.clone()),
            );
        }
        let minimum = ctx.config.thresholds.min_pass_rate;
        if tests.pass_rate + 1e-9 < minimum {
            blockers.push(
                Blocker::new(
                    BlockerKind::LowPassRate,
                    Severity::High,
                    format!(
                        "Pass rate {:.1}% is below the {:.1}% minimum",
                        tests.pass_rate * 100.0,
                        minimum * 100.0
                    ),
                    "Raise the pass rate above the minimum",
                )
                .with_details(counts),
            );
        }
        blockers
    }

    fn from_manifest(ctx: &DetectionContext<'_>) -> Result<Vec<Blocker>> {
        let mut blockers = Vec::new();
        let Some(manifest) = read_json(ctx, "package.json")? else {
            return Ok(blockers);
        };
        let test_script = manifest.pointer("/scripts/test").and_then(Value::as_str);
        if test_script.is_none_or(|script| script.contains("no test specified")) {
            blockers.push(Blocker::new(
                BlockerKind::MissingTestScript,
                Severity::High,
                "package.json has no usable `test` script",
                "Add a `test` script that runs the suite",
            ));
        }

        let lenient: Vec<String> = manifest
            .get("scripts")
            .and_then(Value::as_object)
            .map(|scripts| {
                scripts
                    .iter()
                    .filter(|(_, body)| {
                        body.as_str()
                            .is_some_and(|body| body.contains("--passWithNoTests"))
                    })
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default();
        if !lenient.is_empty() {
            blockers.push(
                Blocker::new(
                    BlockerKind::PassWithNoTests,
                    Severity::Medium,
                    "Test scripts succeed even when no tests run",
                    "Remove --passWithNoTests so an empty suite fails",
                )
                .with_details(json!({ "scripts": lenient })),
            );
        }

        let empty_match = manifest
            .pointer("/jest/testMatch")
            .and_then(Value::as_array)
            .is_some_and(|patterns| patterns.is_empty());
        if empty_match {
            blockers.push(Blocker::new(
                BlockerKind::EmptyTestMatch,
                Severity::High,
                "Jest testMatch is empty, so no test files are collected",
                "Set testMatch to the project's test file patterns",
            ));
        }
        Ok(blockers)
    }

    fn from_sources(ctx: &DetectionContext<'_>) -> Result<Vec<Blocker>> {
        let mut blockers = Vec::new();
        let sources = SourceInspector::new(ctx.fs).inspect(ctx.root)?;
        let tests: Vec<&SourceFile> = sources.iter().filter(|source| source.is_test).collect();

        let (focused, files) = count_matches(focused_re(), &tests);
        if focused > 0 {
            blockers.push(
                Blocker::new(
                    BlockerKind::FocusedTests,
                    Severity::High,
                    format!("{focused} focused test(s) restrict the suite"),
                    "Remove .only / fit / fdescribe so the whole suite runs",
                )
                .with_details(json!({ "count": focused, "files": limited(&files) })),
            );
        }

        let (markers, files) = count_matches(skip_marker_re(), &tests);
        let runner_skipped = measured(ctx, Dimension::Tests)
            .and_then(|snapshot| match &snapshot.metrics {
                Metrics::Tests(tests) => Some(tests.skipped),
                _ => None,
            })
            .unwrap_or(0);
        if markers > 0 || runner_skipped > 0 {
            blockers.push(
                Blocker::new(
                    BlockerKind::SkippedTests,
                    Severity::Low,
                    format!(
                        "{} skipped test(s) reported, {markers} skip marker(s) in source",
                        runner_skipped
                    ),
                    "Re-enable or delete skipped tests",
                )
                .with_details(json!({
                    "runnerSkipped": runner_skipped,
                    "markers": markers,
                    "files": limited(&files),
                })),
            );
        }
        Ok(blockers)
    }
}

impl BlockerDetector for TestSuiteDetector {
    fn name(&self) -> &'static str {
        "test-suite"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Findings> {
        let mut findings = Findings::from(Self::from_status(ctx));
        findings.record("package.json", Self::from_manifest(ctx));
        findings.record("test sources", Self::from_sources(ctx));
        Ok(findings)
    }
}

/// Build and CI health, including GitHub workflow hygiene.
#[derive(Debug, Default, Clone, Copy)]
pub struct InfrastructureDetector;

const WORKFLOW_PATTERNS: [&str; 2] = [".github/workflows/*.yml", ".github/workflows/*.yaml"];

impl InfrastructureDetector {
    fn from_status(ctx: &DetectionContext<'_>) -> Vec<Blocker> {
        let mut blockers = Vec::new();

        if let Some(Metrics::Build(build)) = measured(ctx, Dimension::Build).map(|s| &s.metrics) {
            if !build.success {
                let message = if build.error_count > 0 {
                    format!("Build failing with {} errors", build.error_count)
                } else {
                    "Build failing: no build succeeded and no artifacts were found".to_string()
                };
                blockers.push(
                    Blocker::new(
                        BlockerKind::BuildFailure,
                        Severity::Critical,
                        message,
                        "Fix the build before anything else",
                    )
                    .with_details(json!({ "expectedArtifacts": ctx.config.build.artifacts })),
                );
            }
        }

        if let Some(Metrics::Cicd(cicd)) = measured(ctx, Dimension::Cicd).map(|s| &s.metrics) {
            if cicd.latest_run == PipelineState::Failing {
                blockers.push(Blocker::new(
                    BlockerKind::CiFailure,
                    Severity::High,
                    "The latest CI run failed",
                    "Inspect the failing run with `gh run view` and fix it",
                ));
            }
            if !cicd.configured {
                blockers.push(Blocker::new(
                    BlockerKind::MissingWorkflow,
                    Severity::Medium,
                    "No CI workflow is configured",
                    "Add a workflow that runs the build, linter and tests",
                ));
            }
        }

        blockers
    }

    fn from_workflow(name: &str, contents: &str) -> Vec<Blocker> {
        match serde_yaml::from_str::<serde_yaml::Value>(contents) {
            Ok(workflow) => analyze_workflow(name, &workflow),
            Err(err) => {
                log::warn!("skipping unparseable workflow {name}: {err}");
                Vec::new()
            }
        }
    }
}

impl BlockerDetector for InfrastructureDetector {
    fn name(&self) -> &'static str {
        "infrastructure"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Findings> {
        let mut findings = Findings::from(Self::from_status(ctx));
        let mut workflows = Vec::new();
        for pattern in WORKFLOW_PATTERNS {
            match ctx.fs.glob(ctx.root, pattern) {
                Ok(found) => workflows.extend(found),
                Err(err) => findings.record(pattern, Err(err)),
            }
        }
        for path in workflows {
            let name = relative_display(&path, ctx.root);
            let outcome = ctx
                .fs
                .read_to_string(&path)
                .map(|contents| Self::from_workflow(&name, &contents));
            findings.record(&name, outcome);
        }
        Ok(findings)
    }
}

/// Blockers for one parsed GitHub Actions workflow.
pub fn analyze_workflow(name: &str, workflow: &serde_yaml::Value) -> Vec<Blocker> {
    let Some(jobs) = workflow.get("jobs").and_then(serde_yaml::Value::as_mapping) else {
        return Vec::new();
    };

    let mut untimed = Vec::new();
    let mut lenient = Vec::new();
    let mut uncached = Vec::new();
    for (key, job) in jobs {
        let job_name = key.as_str().unwrap_or("?").to_string();
        if job.get("timeout-minutes").is_none() {
            untimed.push(job_name.clone());
        }
        if continues_on_error(job) {
            lenient.push(job_name.clone());
        }
        let steps = job
            .get("steps")
            .and_then(serde_yaml::Value::as_sequence)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for (index, step) in steps.iter().enumerate() {
            let step_name = step
                .get("name")
                .and_then(serde_yaml::Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("step {}", index + 1));
            if continues_on_error(step) {
                lenient.push(format!("{job_name}/{step_name}"));
            }
            let setup_node = step
                .get("uses")
                .and_then(serde_yaml::Value::as_str)
                .is_some_and(|uses| uses.starts_with("actions/setup-node"));
            let cached = step.get("with").and_then(|with| with.get("cache")).is_some();
            if setup_node && !cached {
                uncached.push(format!("{job_name}/{step_name}"));
            }
        }
    }

    let mut blockers = Vec::new();
    if !lenient.is_empty() {
        blockers.push(
            Blocker::new(
                BlockerKind::ContinueOnError,
                Severity::Medium,
                format!("{name}: failures are ignored in {}", lenient.join(", ")),
                "Remove continue-on-error so failures fail the run",
            )
            .with_details(json!({ "workflow": name, "locations": lenient })),
        );
    }
    if !untimed.is_empty() {
        blockers.push(
            Blocker::new(
                BlockerKind::WorkflowTimeout,
                Severity::Low,
                format!("{name}: jobs without timeout-minutes: {}", untimed.join(", ")),
                "Set timeout-minutes on every job",
            )
            .with_details(json!({ "workflow": name, "jobs": untimed })),
        );
    }
    if !uncached.is_empty() {
        blockers.push(
            Blocker::new(
                BlockerKind::MissingCache,
                Severity::Low,
                format!("{name}: setup-node without dependency cache"),
                "Add `cache: npm` (or yarn/pnpm) to actions/setup-node",
            )
            .with_details(json!({ "workflow": name, "steps": uncached })),
        );
    }
    blockers
}

fn continues_on_error(value: &serde_yaml::Value) -> bool {
    value
        .get("continue-on-error")
        .and_then(serde_yaml::Value::as_bool)
        .unwrap_or(false)
}

const NPM_LOCKFILES: &[&str] = &[
    "package-lock.json",
    "npm-shrinkwrap.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
];

const DEPENDENCY_SECTIONS: &[&str] = &["dependencies", "devDependencies", "optionalDependencies"];

/// Lockfile presence and freshness, installed-tree drift, and audit findings.
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyDetector;

impl DependencyDetector {
    fn npm_json(ctx: &DetectionContext<'_>, args: &[&str]) -> Option<Value> {
        let command = CommandSpec::new("npm", args);
        match ctx
            .runner
            .run(&command, ctx.root, ctx.config.commands.probe_timeout())
        {
            // npm ls and npm audit exit non-zero when they find problems.
            Ok(output) if !output.timed_out => serde_json::from_str(output.stdout.trim()).ok(),
            Ok(_) => {
                log::warn!("`{command}` timed out");
                None
            }
            Err(err) => {
                log::debug!("`{command}` unavailable: {err}");
                None
            }
        }
    }

    fn npm_lockfile(ctx: &DetectionContext<'_>) -> Result<Vec<Blocker>> {
        let mut blockers = Vec::new();
        let lockfile = NPM_LOCKFILES
            .iter()
            .find(|name| ctx.fs.exists(&ctx.root.join(name)));
        match lockfile {
            None => blockers.push(Blocker::new(
                BlockerKind::MissingLockfile,
                Severity::High,
                "package.json has no lockfile",
                "Run `npm install` and commit package-lock.json",
            )),
            Some(&"package-lock.json") => {
                let manifest = read_json(ctx, "package.json")?.unwrap_or(Value::Null);
                if let Some(lock) = read_json(ctx, "package-lock.json")? {
                    let missing = missing_from_lockfile(&manifest, &lock);
                    if !missing.is_empty() {
                        blockers.push(
                            Blocker::new(
                                BlockerKind::StaleLockfile,
                                Severity::Medium,
                                format!(
                                    "{} declared dependencies are missing from package-lock.json",
                                    missing.len()
                                ),
                                "Run `npm install` and commit the updated lockfile",
                            )
                            .with_details(json!({ "missing": missing })),
                        );
                    }
                }
            }
            Some(_) => {}
        }
        Ok(blockers)
    }

    fn npm_audits(ctx: &DetectionContext<'_>) -> Vec<Blocker> {
        let mut blockers = Vec::new();
        let deps = &ctx.config.dependencies;
        if deps.npm_ls {
            if let Some(tree) = Self::npm_json(ctx, &["ls", "--json"]) {
                let problems: Vec<Value> = tree
                    .get("problems")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                if !problems.is_empty() {
                    blockers.push(
                        Blocker::new(
                            BlockerKind::DependencyMismatch,
                            Severity::High,
                            format!("npm ls reports {} dependency problems", problems.len()),
                            "Run `npm install` (or `npm ci`) to sync node_modules",
                        )
                        .with_details(json!({
                            "problems": problems.into_iter().take(DETAIL_LIMIT).collect::<Vec<_>>()
                        })),
                    );
                }
            }
        }
        if deps.npm_audit {
            if let Some(audit) = Self::npm_json(ctx, &["audit", "--json"]) {
                blockers.extend(audit_blocker(&audit));
            }
        }
        blockers
    }
}

impl BlockerDetector for DependencyDetector {
    fn name(&self) -> &'static str {
        "dependency"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Findings> {
        let mut findings = Findings::default();
        if ctx.fs.exists(&ctx.root.join("package.json")) {
            findings.record("npm lockfile", Self::npm_lockfile(ctx));
            findings.blockers.extend(Self::npm_audits(ctx));
        }
        if ctx.fs.exists(&ctx.root.join("Cargo.toml")) && !ctx.fs.exists(&ctx.root.join("Cargo.lock")) {
            findings.blockers.push(Blocker::new(
                BlockerKind::MissingLockfile,
                Severity::Medium,
                "Cargo.toml has no Cargo.lock",
                "Run `cargo generate-lockfile` and commit Cargo.lock",
            ));
        }
        Ok(findings)
    }
}

/// Declared npm dependencies absent from a `package-lock.json` (v1 or v2+).
pub fn missing_from_lockfile(manifest: &Value, lock: &Value) -> Vec<String> {
    let declared: BTreeSet<&String> = DEPENDENCY_SECTIONS
        .iter()
        .filter_map(|section| manifest.get(*section).and_then(Value::as_object))
        .flat_map(|deps| deps.keys())
        .collect();
    let packages = lock.get("packages").and_then(Value::as_object);
    let legacy = lock.get("dependencies").and_then(Value::as_object);
    declared
        .into_iter()
        .filter(|name| {
            let in_packages =
                packages.is_some_and(|p| p.contains_key(&format!("node_modules/{name}")));
            let in_legacy = legacy.is_some_and(|d| d.contains_key(name.as_str()));
            !in_packages && !in_legacy
        })
        .cloned()
        .collect()
}

/// Blocker for critical/high vulnerabilities in `npm audit --json` output.
pub fn audit_blocker(audit: &Value) -> Option<Blocker> {
    let counts = audit.pointer("/metadata/vulnerabilities")?;
    let critical = counts.get("critical").and_then(Value::as_u64).unwrap_or(0);
    let high = counts.get("high").and_then(Value::as_u64).unwrap_or(0);
    let severity = if critical > 0 {
        Severity::Critical
    } else if high > 0 {
        Severity::High
    } else {
        return None;
    };
    Some(
        Blocker::new(
            BlockerKind::SecurityVulnerability,
            severity,
            format!("npm audit: {critical} critical, {high} high vulnerabilities"),
            "Run `npm audit fix` or upgrade the affected packages",
        )
        .with_details(json!({ "critical": critical, "high": high })),
    )
}

fn debug_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bconsole\.log\s*\(|\bdebugger\s*;|\bdbg!\s*\(")
            .expect("debug regex must compile")
    })
}

fn suppression_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)@ts-ignore|@ts-nocheck|eslint-disable|^\s*#!\[allow\(")
            .expect("suppression regex must compile")
    })
}

fn todo_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:TODO|FIXME|XXX|HACK)\b").expect("todo regex must compile"))
}

/// Lint errors plus source hygiene: debug output, suppressions, TODOs, file size.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodeQualityDetector;

impl BlockerDetector for CodeQualityDetector {
    fn name(&self) -> &'static str {
        "code-quality"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Findings> {
        let mut findings = Findings::from(Self::from_status(ctx));
        findings.record("source scan", Self::from_sources(ctx));
        Ok(findings)
    }
}

impl CodeQualityDetector {
    fn from_status(ctx: &DetectionContext<'_>) -> Vec<Blocker> {
        let mut blockers = Vec::new();
        if let Some(Metrics::Linting(lint)) = measured(ctx, Dimension::Linting).map(|s| &s.metrics)
        {
            if lint.errors > 0 {
                blockers.push(
                    Blocker::new(
                        BlockerKind::LintErrors,
                        Severity::High,
                        format!("{} lint errors", lint.errors),
                        "Fix the lint errors; do not suppress them",
                    )
                    .with_details(json!({ "errors": lint.errors, "warnings": lint.warnings })),
                );
            }
        }
        blockers
    }

    fn from_sources(ctx: &DetectionContext<'_>) -> Result<Vec<Blocker>> {
        let mut blockers = Vec::new();
        let sources = SourceInspector::new(ctx.fs).inspect(ctx.root)?;
        let all: Vec<&SourceFile> = sources.iter().collect();
        let production: Vec<&SourceFile> = sources.iter().filter(|s| !s.is_test).collect();
        let quality = &ctx.config.quality;

        let (debug, files) = count_matches(debug_re(), &production);
        if debug > 0 {
            blockers.push(
                Blocker::new(
                    BlockerKind::DebugStatements,
                    Severity::Medium,
                    format!("{debug} debug statement(s) in non-test code"),
                    "Remove console.log / debugger / dbg! or route through the logger",
                )
                .with_details(json!({ "count": debug, "files": limited(&files) })),
            );
        }

        let (suppressed, files) = count_matches(suppression_re(), &production);
        if suppressed > 0 {
            blockers.push(
                Blocker::new(
                    BlockerKind::SuppressedChecks,
                    Severity::Low,
                    format!("{suppressed} suppressed lint/type check(s)"),
                    "Fix the underlying issue instead of suppressing the check",
                )
                .with_details(json!({ "count": suppressed, "files": limited(&files) })),
            );
        }

        let (todos, files) = count_matches(todo_re(), &all);
        if todos > quality.max_todo_markers {
            blockers.push(
                Blocker::new(
                    BlockerKind::TodoMarkers,
                    Severity::Low,
                    format!(
                        "{todos} TODO/FIXME markers (threshold {})",
                        quality.max_todo_markers
                    ),
                    "Resolve or ticket the outstanding markers",
                )
                .with_details(json!({ "count": todos, "files": limited(&files) })),
            );
        }

        let oversized: Vec<PathBuf> = sources
            .iter()
            .filter(|source| source.code_lines > quality.max_file_lines)
            .map(|source| source.path.clone())
            .collect();
        if !oversized.is_empty() {
            blockers.push(
                Blocker::new(
                    BlockerKind::OversizedFiles,
                    Severity::Low,
                    format!(
                        "{} file(s) exceed {} lines of code",
                        oversized.len(),
                        quality.max_file_lines
                    ),
                    "Split oversized files into focused modules",
                )
                .with_details(json!({ "files": limited(&oversized) })),
            );
        }
        Ok(blockers)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::aggregator::overall_status;
    use crate::config::TruthConfig;
    use crate::domain::{BuildMetrics, CicdMetrics, LintMetrics, ProjectStatus, TestMetrics};
    use crate::error::TruthGateError;
    use crate::fs::{MockFileSystem, StdFileSystem};
    use crate::process::{CommandOutput, MockProcessRunner};

    fn status(snapshots: Vec<StatusSnapshot>) -> ProjectStatus {
        let config = TruthConfig::default();
        ProjectStatus {
            collected_at: "2026-01-01T00:00:00Z".to_string(),
            overall: overall_status(&snapshots, &config.weights, &config.thresholds),
            snapshots,
        }
    }

    fn empty_fs() -> MockFileSystem {
        let mut fs = MockFileSystem::new();
        fs.expect_exists().returning(|_| false);
        fs.expect_list_files().returning(|_| Ok(Vec::new()));
        fs.expect_glob().returning(|_, _| Ok(Vec::new()));
        fs
    }

    fn blocker(kind: BlockerKind, severity: Severity, message: &str) -> Blocker {
        Blocker::new(kind, severity, message, "act")
    }

    #[test]
    fn prioritize_is_stable_by_severity() {
        let sorted = prioritize(vec![
            blocker(BlockerKind::TodoMarkers, Severity::Low, "low"),
            blocker(BlockerKind::LintErrors, Severity::Critical, "first"),
            blocker(BlockerKind::CiFailure, Severity::High, "high"),
            blocker(BlockerKind::LintErrors, Severity::Critical, "second"),
        ]);
        let messages: Vec<&str> = sorted.iter().map(|b| b.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "high", "low"]);
    }

    #[test]
    fn prioritize_breaks_ties_by_kind_importance() {
        let sorted = prioritize(vec![
            blocker(BlockerKind::StaleLockfile, Severity::Medium, "stale"),
            blocker(BlockerKind::ContinueOnError, Severity::Medium, "continue"),
            blocker(BlockerKind::BuildFailure, Severity::Medium, "build"),
        ]);
        let kinds: Vec<BlockerKind> = sorted.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockerKind::BuildFailure,
                BlockerKind::ContinueOnError,
                BlockerKind::StaleLockfile
            ]
        );
    }

    #[test]
    fn test_suite_detector_reads_status() {
        let fs = empty_fs();
        let runner = MockProcessRunner::new();
        let config = TruthConfig::default();
        let status = status(vec![StatusSnapshot::live(Metrics::Tests(
            TestMetrics::from_counts(80, 20, 3, 103),
        ))]);
        let ctx = DetectionContext {
            root: Path::new("/repo"),
            fs: &fs,
            runner: &runner,
            config: &config,
            status: &status,
        };

        let kinds: Vec<BlockerKind> = TestSuiteDetector
            .detect(&ctx)
            .expect("detect")
            .blockers
            .iter()
            .map(|b| b.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                BlockerKind::TestFailures,
                BlockerKind::LowPassRate,
                BlockerKind::SkippedTests
            ]
        );
    }

    #[test]
    fn timed_out_tests_are_a_critical_blocker() {
        let fs = empty_fs();
        let runner = MockProcessRunner::new();
        let config = TruthConfig::default();
        let status = status(vec![StatusSnapshot {
            metrics: Metrics::Tests(TestMetrics::default()),
            source: SnapshotSource::Default,
            timed_out: true,
            note: Some("timed out".to_string()),
        }]);
        let ctx = DetectionContext {
            root: Path::new("/repo"),
            fs: &fs,
            runner: &runner,
            config: &config,
            status: &status,
        };
        let blockers = TestSuiteDetector.detect(&ctx).expect("detect").blockers;
        assert_eq!(blockers.len(), 1);
        assert_eq!(blockers[0].kind, BlockerKind::TestTimeout);
        assert_eq!(blockers[0].severity, Severity::Critical);
    }

    #[test]
    fn manifest_and_source_checks() {
        let root = tempfile::tempdir().expect("temp dir");
        let write = |rel: &str, body: &str| {
            let path = root.path().join(rel);
            std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            std::fs::write(path, body).expect("write");
        };
        write(
            "package.json",
            r#"{"scripts":{"test":"jest --passWithNoTests"},"jest":{"testMatch":[]}}"#,
        );
        write("src/app.test.js", "describe.only('x', () => { it.skip('y', () => {}) })\n");

        let fs = StdFileSystem::new();
        let runner = MockProcessRunner::new();
        let config = TruthConfig::default();
        let status = status(Vec::new());
        let ctx = DetectionContext {
            root: root.path(),
            fs: &fs,
            runner: &runner,
            config: &config,
            status: &status,
        };
        let kinds: Vec<BlockerKind> = TestSuiteDetector
            .detect(&ctx)
            .expect("detect")
            .blockers
            .iter()
            .map(|b| b.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                BlockerKind::PassWithNoTests,
                BlockerKind::EmptyTestMatch,
                BlockerKind::FocusedTests,
                BlockerKind::SkippedTests
            ]
        );
    }

    #[test]
    fn workflow_analysis_parses_yaml() {
        let yaml = r#"
name: CI
on: [push]
jobs:
  test:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - name: Node
        uses: actions/setup-node@v4
        with:
          node-version: 20
      - name: Lint
        run: npm run lint
        continue-on-error: true
  deploy:
    runs-on: ubuntu-latest
    timeout-minutes: 10
    steps:
      - uses: actions/setup-node@v4
        with:
          cache: npm
"#;
        let workflow: serde_yaml::Value = serde_yaml::from_str(yaml).expect("yaml");
        let blockers = analyze_workflow(".github/workflows/ci.yml", &workflow);
        let kinds: Vec<BlockerKind> = blockers.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockerKind::ContinueOnError,
                BlockerKind::WorkflowTimeout,
                BlockerKind::MissingCache
            ]
        );
        assert_eq!(
            blockers[0].details.as_ref().expect("details")["locations"],
            json!(["test/Lint"])
        );
        assert_eq!(
            blockers[1].details.as_ref().expect("details")["jobs"],
            json!(["test"])
        );
        assert_eq!(
            blockers[2].details.as_ref().expect("details")["steps"],
            json!(["test/Node"])
        );
    }

    #[test]
    fn infrastructure_reports_build_and_ci_failures() {
        let fs = empty_fs();
        let runner = MockProcessRunner::new();
        let config = TruthConfig::default();
        let status = status(vec![
            StatusSnapshot::live(Metrics::Build(BuildMetrics::default())),
            StatusSnapshot::live(Metrics::Cicd(CicdMetrics {
                configured: true,
                workflows: vec![".github/workflows/ci.yml".to_string()],
                latest_run: PipelineState::Failing,
            })),
        ]);
        let ctx = DetectionContext {
            root: Path::new("/repo"),
            fs: &fs,
            runner: &runner,
            config: &config,
            status: &status,
        };
        let kinds: Vec<BlockerKind> = InfrastructureDetector
            .detect(&ctx)
            .expect("detect")
            .blockers
            .iter()
            .map(|b| b.kind)
            .collect();
        assert_eq!(kinds, vec![BlockerKind::BuildFailure, BlockerKind::CiFailure]);
    }

    #[test]
    fn lockfile_staleness_checks_v2_and_v1_layouts() {
        let manifest = json!({
            "dependencies": {"react": "^18", "@scope/pkg": "1"},
            "devDependencies": {"jest": "^29"}
        });
        let v2 = json!({"packages": {"": {}, "node_modules/react": {}, "node_modules/@scope/pkg": {}}});
        assert_eq!(missing_from_lockfile(&manifest, &v2), vec!["jest".to_string()]);
        let v1 = json!({"dependencies": {"react": {}, "jest": {}, "@scope/pkg": {}}});
        assert!(missing_from_lockfile(&manifest, &v1).is_empty());
    }

    #[test]
    fn audit_severity_follows_worst_vulnerability() {
        let audit = json!({"metadata": {"vulnerabilities": {"critical": 1, "high": 2}}});
        assert_eq!(audit_blocker(&audit).map(|b| b.severity), Some(Severity::Critical));
        let audit = json!({"metadata": {"vulnerabilities": {"critical": 0, "high": 2}}});
        assert_eq!(audit_blocker(&audit).map(|b| b.severity), Some(Severity::High));
        let audit = json!({"metadata": {"vulnerabilities": {"moderate": 4}}});
        assert!(audit_blocker(&audit).is_none());
    }

    #[test]
    fn dependency_detector_runs_npm_checks() {
        let mut fs = MockFileSystem::new();
        fs.expect_exists().returning(|path| {
            path == Path::new("/repo/package.json") || path == Path::new("/repo/yarn.lock")
        });
        fs.expect_read_to_string()
            .returning(|_| Ok(r#"{"dependencies":{"left-pad":"1"}}"#.to_string()));
        let mut runner = MockProcessRunner::new();
        runner.expect_run().returning(|command, _, _| {
            let stdout = if command.args[0] == "ls" {
                r#"{"problems":["missing: left-pad@1"]}"#
            } else {
                r#"{"metadata":{"vulnerabilities":{"critical":0,"high":1}}}"#
            };
            Ok(CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: Some(1),
                timed_out: false,
            })
        });
        let config = TruthConfig::default();
        let status = status(Vec::new());
        let ctx = DetectionContext {
            root: Path::new("/repo"),
            fs: &fs,
            runner: &runner,
            config: &config,
            status: &status,
        };
        let kinds: Vec<BlockerKind> = DependencyDetector
            .detect(&ctx)
            .expect("detect")
            .blockers
            .iter()
            .map(|b| b.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![BlockerKind::DependencyMismatch, BlockerKind::SecurityVulnerability]
        );
    }

    #[test]
    fn code_quality_scans_sources() {
        let root = tempfile::tempdir().expect("temp dir");
        let src = root.path().join("src");
        std::fs::create_dir_all(&src).expect("mkdir");
        std::fs::write(
            src.join("app.js"),
            "// eslint-disable-next-line\nconsole.log('x');\n// TODO one\n// TODO two\n",
        )
        .expect("write");
        std::fs::write(src.join("app.test.js"), "console.log('fine in tests');\n")
            .expect("write");

        let fs = StdFileSystem::new();
        let runner = MockProcessRunner::new();
        let mut config = TruthConfig::default();
        config.quality.max_todo_markers = 1;
        config.quality.max_file_lines = 0;
        let status = status(vec![StatusSnapshot::live(Metrics::Linting(LintMetrics {
            errors: 2,
            warnings: 0,
            measured: true,
            tool: None,
        }))]);
        let ctx = DetectionContext {
            root: root.path(),
            fs: &fs,
            runner: &runner,
            config: &config,
            status: &status,
        };
        let blockers = CodeQualityDetector.detect(&ctx).expect("detect").blockers;
        let kinds: Vec<BlockerKind> = blockers.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockerKind::LintErrors,
                BlockerKind::DebugStatements,
                BlockerKind::SuppressedChecks,
                BlockerKind::TodoMarkers,
                BlockerKind::OversizedFiles
            ]
        );
        assert_eq!(blockers[1].details.as_ref().expect("details")["count"], 1);
    }

    struct FailingDetector;

    impl BlockerDetector for FailingDetector {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&self, _ctx: &DetectionContext<'_>) -> Result<Findings> {
            Err(TruthGateError::Other("boom".to_string()))
        }
    }

    struct FixedDetector(Vec<Blocker>);

    impl BlockerDetector for FixedDetector {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn detect(&self, _ctx: &DetectionContext<'_>) -> Result<Findings> {
            Ok(Findings::from(self.0.clone()))
        }
    }

    #[test]
    fn detector_failure_is_recorded_not_fatal() {
        let fs = empty_fs();
        let runner = MockProcessRunner::new();
        let config = TruthConfig::default();
        let status = status(Vec::new());
        let ctx = DetectionContext {
            root: Path::new("/repo"),
            fs: &fs,
            runner: &runner,
            config: &config,
            status: &status,
        };
        let detectors: Vec<Box<dyn BlockerDetector>> = vec![
            Box::new(FixedDetector(vec![blocker(
                BlockerKind::TodoMarkers,
                Severity::Low,
                "todo",
            )])),
            Box::new(FailingDetector),
            Box::new(FixedDetector(vec![blocker(
                BlockerKind::BuildFailure,
                Severity::Critical,
                "build",
            )])),
        ];
        let report = detect_blockers(&detectors, &ctx);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].detector, "failing");
        assert_eq!(report.blockers[0].kind, BlockerKind::BuildFailure);
        assert_eq!(report.count(Severity::Low), 1);
        assert!(report.has(Severity::Critical));
    }

    #[test]
    fn malformed_manifest_keeps_failing_test_blockers() {
        let root = tempfile::tempdir().expect("temp dir");
        std::fs::write(root.path().join("package.json"), "{ not json").expect("write");
        let fs = StdFileSystem::new();
        let runner = MockProcessRunner::new();
        let mut config = TruthConfig::default();
        config.dependencies.npm_ls = false;
        config.dependencies.npm_audit = false;
        let status = status(vec![StatusSnapshot::live(Metrics::Tests(
            TestMetrics::from_counts(5, 5, 0, 10),
        ))]);
        let ctx = DetectionContext {
            root: root.path(),
            fs: &fs,
            runner: &runner,
            config: &config,
            status: &status,
        };

        let findings = TestSuiteDetector.detect(&ctx).expect("detect");
        assert_eq!(findings.blockers[0].kind, BlockerKind::TestFailures);
        assert_eq!(findings.failed_checks.len(), 1);
        assert!(findings.failed_checks[0].starts_with("package.json: "));

        let report = detect_blockers(&build_detectors(), &ctx);
        assert!(report.has(Severity::Critical));
        assert_eq!(report.blockers[0].kind, BlockerKind::TestFailures);
        let failed: Vec<&str> = report.errors.iter().map(|e| e.detector.as_str()).collect();
        assert_eq!(failed, vec!["test-suite"]);
    }

    #[test]
    fn unreadable_workflow_keeps_build_and_ci_blockers() {
        let mut fs = MockFileSystem::new();
        fs.expect_glob().returning(|_, pattern| {
            if pattern.ends_with("*.yml") {
                Ok(vec![
                    PathBuf::from("/repo/.github/workflows/broken.yml"),
                    PathBuf::from("/repo/.github/workflows/ci.yml"),
                ])
            } else {
                Ok(Vec::new())
            }
        });
        fs.expect_read_to_string().returning(|path| {
            if path.ends_with("broken.yml") {
                Err(TruthGateError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "denied",
                )))
            } else {
                Ok("jobs:\n  test:\n    runs-on: ubuntu-latest\n".to_string())
            }
        });
        let runner = MockProcessRunner::new();
        let config = TruthConfig::default();
        let status = status(vec![
            StatusSnapshot::live(Metrics::Build(BuildMetrics::default())),
            StatusSnapshot::live(Metrics::Cicd(CicdMetrics {
                configured: true,
                workflows: vec![".github/workflows/ci.yml".to_string()],
                latest_run: PipelineState::Failing,
            })),
        ]);
        let ctx = DetectionContext {
            root: Path::new("/repo"),
            fs: &fs,
            runner: &runner,
            config: &config,
            status: &status,
        };

        let findings = InfrastructureDetector.detect(&ctx).expect("detect");
        let kinds: Vec<BlockerKind> = findings.blockers.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockerKind::BuildFailure,
                BlockerKind::CiFailure,
                BlockerKind::WorkflowTimeout
            ]
        );
        assert_eq!(findings.failed_checks.len(), 1);
        assert!(findings.failed_checks[0].starts_with(".github/workflows/broken.yml: "));
    }

    #[test]
    fn malformed_npm_lockfile_keeps_cargo_check() {
        let mut fs = MockFileSystem::new();
        fs.expect_exists().returning(|path| {
            path == Path::new("/repo/package.json")
                || path == Path::new("/repo/package-lock.json")
                || path == Path::new("/repo/Cargo.toml")
        });
        fs.expect_read_to_string().returning(|path| {
            if path.ends_with("package-lock.json") {
                Ok("{ truncated".to_string())
            } else {
                Ok(r#"{"dependencies":{}}"#.to_string())
            }
        });
        let runner = MockProcessRunner::new();
        let mut config = TruthConfig::default();
        config.dependencies.npm_ls = false;
        config.dependencies.npm_audit = false;
        let status = status(Vec::new());
        let ctx = DetectionContext {
            root: Path::new("/repo"),
            fs: &fs,
            runner: &runner,
            config: &config,
            status: &status,
        };

        let findings = DependencyDetector.detect(&ctx).expect("detect");
        assert_eq!(findings.blockers.len(), 1);
        assert_eq!(findings.blockers[0].kind, BlockerKind::MissingLockfile);
        assert!(findings.blockers[0].message.contains("Cargo.lock"));
        assert!(findings.failed_checks[0].starts_with("npm lockfile: "));
    }
}
