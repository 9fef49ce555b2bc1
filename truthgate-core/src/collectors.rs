//! Collector registry and the per-dimension probes.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::collector::{Collector, ProbeContext};
use crate::domain::{
    AiMetrics, BuildMetrics, CicdMetrics, Dimension, DocsMetrics, LintMetrics, Metrics,
    PipelineState, TestMetrics,
};
use crate::error::{Result, TruthGateError};
use crate::process::{CommandOutput, CommandSpec};

/// Build one collector per dimension, in dimension order.
pub fn build_collectors() -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(TestsCollector),
        Box::new(LintCollector),
        Box::new(BuildCollector),
        Box::new(CicdCollector),
        Box::new(DocsCollector),
        Box::new(AiCollector),
    ]
}

fn timeout_error(command: &CommandSpec, output: &CommandOutput, seconds: u64) -> Result<()> {
    if output.timed_out {
        return Err(TruthGateError::Timeout {
            command: command.to_string(),
            seconds,
        });
    }
    Ok(())
}

fn configured_or(configured: Option<&str>, detected: Option<CommandSpec>) -> Option<CommandSpec> {
    configured.and_then(CommandSpec::parse).or(detected)
}

fn has_marker(ctx: &ProbeContext<'_>, name: &str) -> bool {
    ctx.fs.exists(&ctx.root.join(name))
}

/// Runs the test suite and parses the runner's summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestsCollector;

impl TestsCollector {
    fn command(ctx: &ProbeContext<'_>) -> Option<CommandSpec> {
        let detected = if has_marker(ctx, "package.json") {
            Some(CommandSpec::new("npm", &["test", "--silent"]))
        } else if has_marker(ctx, "Cargo.toml") {
            Some(CommandSpec::new("cargo", &["test"]))
        } else if ["pyproject.toml", "pytest.ini", "setup.py"]
            .iter()
            .any(|marker| has_marker(ctx, marker))
        {
            Some(CommandSpec::new("pytest", &["-q"]))
        } else {
            None
        };
        configured_or(ctx.config.commands.test.as_deref(), detected)
    }
}

impl Collector for TestsCollector {
    fn dimension(&self) -> Dimension {
        Dimension::Tests
    }

    fn collect(&self, ctx: &ProbeContext<'_>) -> Result<Metrics> {
        let command = Self::command(ctx).ok_or_else(|| {
            TruthGateError::Other("no test command configured or detected".to_string())
        })?;
        let commands = &ctx.config.commands;
        let output = ctx.runner.run(&command, ctx.root, commands.test_timeout())?;
        timeout_error(&command, &output, commands.test_timeout_secs)?;

        let merged = output.merged_output();
        if let Some(metrics) = parse_test_summary(&merged) {
            log::debug!(
                "tests: {}/{} passed ({})",
                metrics.passed,
                metrics.total,
                metrics.framework.as_deref().unwrap_or("unknown")
            );
            return Ok(Metrics::Tests(metrics));
        }
        if no_tests_found(&merged) {
            return Ok(Metrics::Tests(TestMetrics::default()));
        }
        Err(TruthGateError::Other(format!(
            "could not parse test summary from `{command}` (exit code {:?})",
            output.exit_code
        )))
    }

    fn fallback(&self) -> Metrics {
        Metrics::Tests(TestMetrics::default())
    }
}

fn count_pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)\s+(passed|failed|skipped|ignored|todo|total|errors?|xfailed|xpassed)\b")
            .expect("count pair regex must compile")
    })
}

fn jest_summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*Tests:\s+(.+)$").expect("jest regex must compile"))
}

fn cargo_summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^test result: \w+\. (.+)$").expect("cargo regex must compile")
    })
}

fn pytest_summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^=*\s*(.*\d+\s+(?:passed|failed|errors?|skipped).*?)\s+in\s+[\d.]+s\b")
            .expect("pytest regex must compile")
    })
}

fn no_tests_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)no tests found|no tests ran|running 0 tests|collected 0 items")
            .expect("no-tests regex must compile")
    })
}

fn no_tests_found(output: &str) -> bool {
    no_tests_re().is_match(output)
}

#[derive(Debug, Default)]
struct Counts {
    passed: u64,
    failed: u64,
    skipped: u64,
    total: Option<u64>,
}

impl Counts {
    fn add(&mut self, text: &str) {
        for caps in count_pair_re().captures_iter(text) {
            let Ok(value) = caps[1].parse::<u64>() else {
                continue;
            };
            match &caps[2] {
                "passed" | "xpassed" => self.passed += value,
                "failed" | "error" | "errors" => self.failed += value,
                "skipped" | "ignored" | "todo" | "xfailed" => self.skipped += value,
                "total" => *self.total.get_or_insert(0) += value,
                _ => {}
            }
        }
    }

    fn into_metrics(self, framework: &str) -> TestMetrics {
        let total = self
            .total
            .unwrap_or(self.passed + self.failed + self.skipped);
        let mut metrics = TestMetrics::from_counts(self.passed, self.failed, self.skipped, total);
        metrics.framework = Some(framework.to_string());
        metrics
    }
}

/// Parse a Jest, cargo, or pytest summary. Returns `None` when none is recognised.
pub fn parse_test_summary(output: &str) -> Option<TestMetrics> {
    if let Some(caps) = jest_summary_re().captures_iter(output).last() {
        let mut counts = Counts::default();
        counts.add(&caps[1]);
        return Some(counts.into_metrics("jest"));
    }

    let mut cargo = Counts::default();
    let mut saw_cargo = false;
    for caps in cargo_summary_re().captures_iter(output) {
        saw_cargo = true;
        cargo.add(&caps[1]);
    }
    if saw_cargo {
        return Some(cargo.into_metrics("cargo"));
    }

    pytest_summary_re().captures_iter(output).last().map(|caps| {
        let mut counts = Counts::default();
        counts.add(&caps[1]);
        counts.into_metrics("pytest")
    })
}

/// Runs the linter and counts error and warning diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct LintCollector;

impl LintCollector {
    fn command(ctx: &ProbeContext<'_>) -> Option<CommandSpec> {
        let detected = if has_marker(ctx, "package.json") {
            Some(CommandSpec::new("npx", &["eslint", ".", "--format", "json"]))
        } else if has_marker(ctx, "Cargo.toml") {
            Some(CommandSpec::new(
                "cargo",
                &["clippy", "--all-targets", "--message-format", "short"],
            ))
        } else {
            None
        };
        configured_or(ctx.config.commands.lint.as_deref(), detected)
    }
}

impl Collector for LintCollector {
    fn dimension(&self) -> Dimension {
        Dimension::Linting
    }

    fn collect(&self, ctx: &ProbeContext<'_>) -> Result<Metrics> {
        let command = Self::command(ctx).ok_or_else(|| {
            TruthGateError::Other("no lint command configured or detected".to_string())
        })?;
        let commands = &ctx.config.commands;
        let output = ctx.runner.run(&command, ctx.root, commands.lint_timeout())?;
        timeout_error(&command, &output, commands.lint_timeout_secs)?;

        if let Some(metrics) = parse_lint_output(&output) {
            log::debug!(
                "lint: {} errors, {} warnings",
                metrics.errors,
                metrics.warnings
            );
            return Ok(Metrics::Linting(metrics));
        }
        Err(TruthGateError::Other(format!(
            "could not parse lint output from `{command}` (exit code {:?})",
            output.exit_code
        )))
    }

    fn fallback(&self) -> Metrics {
        Metrics::Linting(LintMetrics::default())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EslintFileResult {
    #[serde(default)]
    error_count: u64,
    #[serde(default)]
    warning_count: u64,
}

fn eslint_summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)\s+problems?\s+\((\d+)\s+errors?,\s+(\d+)\s+warnings?\)")
            .expect("eslint summary regex must compile")
    })
}

fn diagnostic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(?:\S+:\d+:\d+:\s+)?(error|warning)(?:\[[A-Za-z0-9_:]+\])?:\s+(.*)$")
            .expect("diagnostic regex must compile")
    })
}

fn tsc_error_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\berror TS\d+:").expect("tsc regex must compile"))
}

fn is_diagnostic_summary(message: &str) -> bool {
    message.starts_with("aborting due to")
        || message.starts_with("could not compile")
        || message.starts_with("build failed")
        || (message.contains("generated") && message.contains("warning"))
}

/// Count rustc-style `error:`/`warning:` diagnostics, ignoring cargo's summary lines.
pub fn count_diagnostics(output: &str) -> (u64, u64) {
    let mut errors = 0;
    let mut warnings = 0;
    for caps in diagnostic_re().captures_iter(output) {
        if is_diagnostic_summary(caps[2].trim()) {
            continue;
        }
        match &caps[1] {
            "error" => errors += 1,
            _ => warnings += 1,
        }
    }
    (errors, warnings)
}

/// Parse ESLint JSON, an ESLint summary line, or rustc-style diagnostics.
pub fn parse_lint_output(output: &CommandOutput) -> Option<LintMetrics> {
    if let Ok(results) = serde_json::from_str::<Vec<EslintFileResult>>(output.stdout.trim()) {
        return Some(LintMetrics {
            errors: results.iter().map(|r| r.error_count).sum(),
            warnings: results.iter().map(|r| r.warning_count).sum(),
            measured: true,
            tool: Some("eslint".to_string()),
        });
    }

    let merged = output.merged_output();
    if let Some(caps) = eslint_summary_re().captures(&merged) {
        return Some(LintMetrics {
            errors: caps[2].parse().ok()?,
            warnings: caps[3].parse().ok()?,
            measured: true,
            tool: Some("eslint".to_string()),
        });
    }

    let (errors, warnings) = count_diagnostics(&merged);
    if errors + warnings > 0 || output.success() {
        return Some(LintMetrics {
            errors,
            warnings,
            measured: true,
            tool: Some("rustc".to_string()),
        });
    }
    None
}

/// Checks build artifacts and, when configured, runs the build command.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuildCollector;

impl Collector for BuildCollector {
    fn dimension(&self) -> Dimension {
        Dimension::Build
    }

    fn collect(&self, ctx: &ProbeContext<'_>) -> Result<Metrics> {
        let artifacts: Vec<String> = ctx
            .config
            .build
            .artifacts
            .iter()
            .filter(|artifact| ctx.fs.exists(&ctx.root.join(artifact.as_str())))
            .cloned()
            .collect();

        let Some(command) = ctx.config.commands.build.as_deref().and_then(CommandSpec::parse)
        else {
            return Ok(Metrics::Build(BuildMetrics {
                success: !artifacts.is_empty(),
                error_count: 0,
                artifacts,
            }));
        };

        let commands = &ctx.config.commands;
        let output = ctx.runner.run(&command, ctx.root, commands.build_timeout())?;
        timeout_error(&command, &output, commands.build_timeout_secs)?;
        let merged = output.merged_output();
        let (diagnostics, _) = count_diagnostics(&merged);
        let tsc = tsc_error_re().find_iter(&merged).count() as u64;
        Ok(Metrics::Build(BuildMetrics {
            success: output.success(),
            error_count: diagnostics + tsc,
            artifacts,
        }))
    }

    fn fallback(&self) -> Metrics {
        Metrics::Build(BuildMetrics::default())
    }
}

const CI_CONFIG_FILES: &[&str] = &[
    ".gitlab-ci.yml",
    ".circleci/config.yml",
    "Jenkinsfile",
    "azure-pipelines.yml",
    ".travis.yml",
];

/// Finds CI configuration and queries the latest GitHub Actions run.
#[derive(Debug, Default, Clone, Copy)]
pub struct CicdCollector;

impl CicdCollector {
    fn latest_run(ctx: &ProbeContext<'_>) -> PipelineState {
        let command = CommandSpec::new(
            "gh",
            &["run", "list", "--limit", "1", "--json", "conclusion,status"],
        );
        match ctx
            .runner
            .run(&command, ctx.root, ctx.config.commands.probe_timeout())
        {
            Ok(output) if output.success() => parse_latest_run(&output.stdout),
            Ok(output) => {
                log::debug!("`{command}` exited with {:?}", output.exit_code);
                PipelineState::Unknown
            }
            Err(err) => {
                log::debug!("`{command}` unavailable: {err}");
                PipelineState::Unknown
            }
        }
    }
}

impl Collector for CicdCollector {
    fn dimension(&self) -> Dimension {
        Dimension::Cicd
    }

    fn collect(&self, ctx: &ProbeContext<'_>) -> Result<Metrics> {
        let mut github = Vec::new();
        for pattern in [".github/workflows/*.yml", ".github/workflows/*.yaml"] {
            github.extend(ctx.fs.glob(ctx.root, pattern)?);
        }
        let mut workflows: Vec<String> = github
            .iter()
            .map(|path| relative_display(path, ctx.root))
            .collect();
        workflows.extend(
            CI_CONFIG_FILES
                .iter()
                .filter(|file| has_marker(ctx, file))
                .map(|file| file.to_string()),
        );
        workflows.sort();

        let latest_run = if !github.is_empty() && ctx.config.cicd.query_latest_run {
            Self::latest_run(ctx)
        } else {
            PipelineState::Unknown
        };

        Ok(Metrics::Cicd(CicdMetrics {
            configured: !workflows.is_empty(),
            workflows,
            latest_run,
        }))
    }

    fn fallback(&self) -> Metrics {
        Metrics::Cicd(CicdMetrics::default())
    }
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    #[serde(default)]
    conclusion: Option<String>,
}

/// Map `gh run list --json conclusion` output to a pipeline state.
pub fn parse_latest_run(stdout: &str) -> PipelineState {
    let Ok(runs) = serde_json::from_str::<Vec<WorkflowRun>>(stdout.trim()) else {
        return PipelineState::Unknown;
    };
    match runs.first().and_then(|run| run.conclusion.as_deref()) {
        Some("success") => PipelineState::Passing,
        Some("failure" | "cancelled" | "timed_out" | "startup_failure") => PipelineState::Failing,
        _ => PipelineState::Unknown,
    }
}

pub(crate) fn relative_display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Checks that the required documentation artifacts exist.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocsCollector;

impl Collector for DocsCollector {
    fn dimension(&self) -> Dimension {
        Dimension::Documentation
    }

    fn collect(&self, ctx: &ProbeContext<'_>) -> Result<Metrics> {
        let required = &ctx.config.documentation.required;
        let (present, missing): (Vec<String>, Vec<String>) = required
            .iter()
            .cloned()
            .partition(|artifact| has_marker(ctx, artifact));
        let completeness = if required.is_empty() {
            1.0
        } else {
            present.len() as f64 / required.len() as f64
        };
        Ok(Metrics::Documentation(DocsMetrics {
            present,
            missing,
            completeness,
        }))
    }

    fn fallback(&self) -> Metrics {
        Metrics::Documentation(DocsMetrics::default())
    }
}

/// Probes AI CLIs with `--version`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AiCollector;

impl Collector for AiCollector {
    fn dimension(&self) -> Dimension {
        Dimension::Ai
    }

    fn collect(&self, ctx: &ProbeContext<'_>) -> Result<Metrics> {
        let mut metrics = AiMetrics::default();
        for tool in &ctx.config.ai.tools {
            metrics.probed.push(tool.clone());
            let command = CommandSpec::new(tool.as_str(), &["--version"]);
            match ctx
                .runner
                .run(&command, ctx.root, ctx.config.commands.probe_timeout())
            {
                Ok(output) if output.success() => metrics.available.push(tool.clone()),
                Ok(_) => log::debug!("{tool} --version failed"),
                Err(err) => log::debug!("{tool} not available: {err}"),
            }
        }
        Ok(Metrics::Ai(metrics))
    }

    fn fallback(&self) -> Metrics {
        Metrics::Ai(AiMetrics::default())
    }
}
