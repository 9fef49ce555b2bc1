//! Domain entities for truthgate.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::Weights;

/// Urgency tier shared by discrepancies and blockers.
///
/// Variants are declared most urgent first, so the derived ordering sorts
/// `Critical` before `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Binary trust failure or release-blocking breakage.
    Critical,
    /// Large divergence or a broken quality gate.
    High,
    /// Noticeable divergence.
    Medium,
    /// Minor divergence or hygiene issue.
    Low,
}

impl Severity {
    /// Upper-case label used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a documentation claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClaimKind {
    /// "100% production ready".
    ProductionReady,
    /// "554/555 tests passing", "99.8% tests passing".
    TestPassRate,
    /// "0 linting errors".
    ErrorCount,
    /// "100% complete", "✅ done".
    Completion,
    /// "Status: Production Ready".
    Status,
    /// "Overall: 87% ready".
    Percentage,
    /// "Build: passing".
    BuildStatus,
    /// "CI: passing".
    CicdStatus,
}

impl ClaimKind {
    /// Kebab-case identifier used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductionReady => "production-ready",
            Self::TestPassRate => "test-pass-rate",
            Self::ErrorCount => "error-count",
            Self::Completion => "completion",
            Self::Status => "status",
            Self::Percentage => "percentage",
            Self::BuildStatus => "build-status",
            Self::CicdStatus => "cicd-status",
        }
    }
}

impl fmt::Display for ClaimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which error counter an error-count claim refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorScope {
    /// Linter errors.
    Lint,
    /// Type-checker errors.
    Type,
    /// Compiler/build errors.
    Build,
    /// Unqualified "errors".
    General,
}

/// Discrete readiness classification derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessStatus {
    /// Score at or above the production threshold.
    ProductionReady,
    /// Score at or above the mostly-ready threshold.
    MostlyReady,
    /// Score at or above the development threshold.
    DevelopmentReady,
    /// Anything lower.
    Failing,
}

impl ReadinessStatus {
    /// Identifier form, e.g. `PRODUCTION_READY`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductionReady => "PRODUCTION_READY",
            Self::MostlyReady => "MOSTLY_READY",
            Self::DevelopmentReady => "DEVELOPMENT_READY",
            Self::Failing => "FAILING",
        }
    }

    /// Human form, e.g. `Production Ready`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ProductionReady => "Production Ready",
            Self::MostlyReady => "Mostly Ready",
            Self::DevelopmentReady => "Development Ready",
            Self::Failing => "Failing",
        }
    }
}

impl fmt::Display for ReadinessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pass/fail state of a build or CI pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// Last known result succeeded.
    Passing,
    /// Last known result failed.
    Failing,
    /// No result could be determined.
    Unknown,
}

impl PipelineState {
    /// Lower-case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passing => "passing",
            Self::Failing => "failing",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized value carried by a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClaimValue {
    /// A yes/no assertion.
    Flag {
        /// Asserted truth.
        value: bool,
    },
    /// A 0–1 ratio, optionally backed by counts.
    Ratio {
        /// The ratio.
        value: f64,
        /// Passed count when the claim was written as `passed/total`.
        #[serde(skip_serializing_if = "Option::is_none")]
        passed: Option<u64>,
        /// Total count when the claim was written as `passed/total`.
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
    },
    /// An error counter.
    Count {
        /// Asserted count.
        value: u64,
        /// Which counter.
        scope: ErrorScope,
    },
    /// A readiness status.
    Readiness {
        /// Asserted status.
        value: ReadinessStatus,
    },
    /// A build/CI state.
    Pipeline {
        /// Asserted state.
        value: PipelineState,
    },
}

/// A typed assertion extracted from a documentation line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    /// Claim category.
    #[serde(rename = "type")]
    pub kind: ClaimKind,
    /// Normalized value.
    pub value: ClaimValue,
    /// The trimmed source line.
    pub raw_text: String,
    /// Document the claim came from.
    pub source_file: PathBuf,
    /// 1-based line number.
    pub source_line: usize,
}

impl Claim {
    /// `file:line` locator.
    pub fn location(&self) -> String {
        format!("{}:{}", self.source_file.display(), self.source_line)
    }
}

/// A dimension of ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Test results.
    Tests,
    /// Linter results.
    Linting,
    /// Build artifacts/results.
    Build,
    /// CI/CD configuration and latest run.
    Cicd,
    /// Required documentation artifacts.
    Documentation,
    /// AI tool availability.
    Ai,
}

impl Dimension {
    /// Every dimension, in reporting order.
    pub const ALL: [Dimension; 6] = [
        Self::Tests,
        Self::Linting,
        Self::Build,
        Self::Cicd,
        Self::Documentation,
        Self::Ai,
    ];

    /// Snake-case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tests => "tests",
            Self::Linting => "linting",
            Self::Build => "build",
            Self::Cicd => "cicd",
            Self::Documentation => "documentation",
            Self::Ai => "ai",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Test run counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMetrics {
    /// Passed tests.
    pub passed: u64,
    /// Failed tests.
    pub failed: u64,
    /// Skipped or ignored tests.
    pub skipped: u64,
    /// All tests reported by the runner.
    pub total: u64,
    /// `passed / total`, zero when nothing ran.
    pub pass_rate: f64,
    /// Runner whose summary was parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
}

impl TestMetrics {
    /// Build metrics from counts, deriving the pass rate.
    pub fn from_counts(passed: u64, failed: u64, skipped: u64, total: u64) -> Self {
        let pass_rate = if total == 0 {
            0.0
        } else {
            passed as f64 / total as f64
        };
        Self {
            passed,
            failed,
            skipped,
            total,
            pass_rate,
            framework: None,
        }
    }
}

/// Linter counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintMetrics {
    /// Error diagnostics.
    pub errors: u64,
    /// Warning diagnostics.
    pub warnings: u64,
    /// Whether a linter actually ran.
    pub measured: bool,
    /// Linter whose output was parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

/// Build outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildMetrics {
    /// Whether the build is considered successful.
    pub success: bool,
    /// Compiler/type errors seen in build output.
    pub error_count: u64,
    /// Artifact paths found on disk.
    pub artifacts: Vec<String>,
}

/// CI/CD configuration and latest result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CicdMetrics {
    /// Whether any CI configuration exists.
    pub configured: bool,
    /// Workflow files found, relative to the project root.
    pub workflows: Vec<String>,
    /// State of the most recent run, when it could be queried.
    pub latest_run: PipelineState,
}

impl Default for CicdMetrics {
    fn default() -> Self {
        Self {
            configured: false,
            workflows: Vec::new(),
            latest_run: PipelineState::Unknown,
        }
    }
}

/// Required documentation artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocsMetrics {
    /// Required artifacts that exist.
    pub present: Vec<String>,
    /// Required artifacts that do not exist.
    pub missing: Vec<String>,
    /// `present / required`.
    pub completeness: f64,
}

/// AI tooling availability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiMetrics {
    /// Tools that answered a version probe.
    pub available: Vec<String>,
    /// Tools that were probed.
    pub probed: Vec<String>,
}

/// Measured state of one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dimension", rename_all = "snake_case")]
pub enum Metrics {
    /// Test results.
    Tests(TestMetrics),
    /// Linter results.
    Linting(LintMetrics),
    /// Build results.
    Build(BuildMetrics),
    /// CI/CD state.
    Cicd(CicdMetrics),
    /// Documentation completeness.
    Documentation(DocsMetrics),
    /// AI tooling.
    Ai(AiMetrics),
}

impl Metrics {
    /// The dimension these metrics describe.
    pub fn dimension(&self) -> Dimension {
        match self {
            Self::Tests(_) => Dimension::Tests,
            Self::Linting(_) => Dimension::Linting,
            Self::Build(_) => Dimension::Build,
            Self::Cicd(_) => Dimension::Cicd,
            Self::Documentation(_) => Dimension::Documentation,
            Self::Ai(_) => Dimension::Ai,
        }
    }
}

/// Where a snapshot's metrics came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    /// Measured during this run.
    Live,
    /// Last live value from the snapshot cache.
    Cached,
    /// Collector default after a failed probe with no cache.
    Default,
}

impl SnapshotSource {
    /// Lower-case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cached => "cached",
            Self::Default => "default",
        }
    }
}

/// One dimension's state for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Measured (or fallback) metrics.
    pub metrics: Metrics,
    /// Provenance of the metrics.
    pub source: SnapshotSource,
    /// Whether the live probe was killed for exceeding its timeout.
    pub timed_out: bool,
    /// Why the snapshot is not live, if it is not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl StatusSnapshot {
    /// A snapshot measured during this run.
    pub fn live(metrics: Metrics) -> Self {
        Self {
            metrics,
            source: SnapshotSource::Live,
            timed_out: false,
            note: None,
        }
    }

    /// The dimension of the snapshot.
    pub fn dimension(&self) -> Dimension {
        self.metrics.dimension()
    }

    /// Whether the snapshot was measured during this run.
    pub fn is_live(&self) -> bool {
        self.source == SnapshotSource::Live
    }
}

/// Weighted summary over all snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStatus {
    /// Weighted score in `[0, 1]`.
    pub score: f64,
    /// `score * 100`.
    pub percentage: f64,
    /// Step-function classification of `score`.
    pub status: ReadinessStatus,
    /// Per-dimension component scores.
    pub component_scores: BTreeMap<Dimension, f64>,
    /// Weights used.
    pub weights: Weights,
    /// Threshold violations, human readable.
    pub critical_issues: Vec<String>,
}

/// Snapshots plus the overall status derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    /// RFC 3339 timestamp of collection.
    pub collected_at: String,
    /// One snapshot per collected dimension, in dimension order.
    pub snapshots: Vec<StatusSnapshot>,
    /// Derived summary.
    pub overall: OverallStatus,
}

impl ProjectStatus {
    /// Snapshot for a dimension, if collected.
    pub fn snapshot(&self, dimension: Dimension) -> Option<&StatusSnapshot> {
        self.snapshots
            .iter()
            .find(|snapshot| snapshot.dimension() == dimension)
    }

    /// Test metrics, if collected.
    pub fn tests(&self) -> Option<&TestMetrics> {
        self.snapshots.iter().find_map(|s| match &s.metrics {
            Metrics::Tests(metrics) => Some(metrics),
            _ => None,
        })
    }

    /// Lint metrics, if collected.
    pub fn linting(&self) -> Option<&LintMetrics> {
        self.snapshots.iter().find_map(|s| match &s.metrics {
            Metrics::Linting(metrics) => Some(metrics),
            _ => None,
        })
    }

    /// Build metrics, if collected.
    pub fn build(&self) -> Option<&BuildMetrics> {
        self.snapshots.iter().find_map(|s| match &s.metrics {
            Metrics::Build(metrics) => Some(metrics),
            _ => None,
        })
    }

    /// CI/CD metrics, if collected.
    pub fn cicd(&self) -> Option<&CicdMetrics> {
        self.snapshots.iter().find_map(|s| match &s.metrics {
            Metrics::Cicd(metrics) => Some(metrics),
            _ => None,
        })
    }

    /// Documentation metrics, if collected.
    pub fn documentation(&self) -> Option<&DocsMetrics> {
        self.snapshots.iter().find_map(|s| match &s.metrics {
            Metrics::Documentation(metrics) => Some(metrics),
            _ => None,
        })
    }

    /// Snapshots that fell back to cached or default values.
    pub fn degraded(&self) -> Vec<&StatusSnapshot> {
        self.snapshots.iter().filter(|s| !s.is_live()).collect()
    }

    /// Whether any probe was killed for exceeding its timeout.
    pub fn has_timeouts(&self) -> bool {
        self.snapshots.iter().any(|s| s.timed_out)
    }
}

/// A mismatch between a claim and the measured status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discrepancy {
    /// Claim category.
    #[serde(rename = "type")]
    pub kind: ClaimKind,
    /// What the document asserts.
    pub claimed: serde_json::Value,
    /// What was measured.
    pub actual: serde_json::Value,
    /// Urgency.
    pub severity: Severity,
    /// `file:line` of the claim.
    pub source: String,
    /// The claim's source line.
    pub claim_text: String,
    /// Explanation of the comparison.
    pub context: String,
}

/// Kind of blocker.
///
/// Variants are declared in fix-first order; the derived ordering is the
/// secondary prioritization key after severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockerKind {
    /// The build is failing.
    BuildFailure,
    /// Test execution did not finish in time.
    TestTimeout,
    /// Tests are failing.
    TestFailures,
    /// No tests were found or run.
    NoTests,
    /// Known-vulnerable dependencies.
    SecurityVulnerability,
    /// The latest CI run failed.
    CiFailure,
    /// Linter errors.
    LintErrors,
    /// A test runner configured to match nothing.
    EmptyTestMatch,
    /// `.only` left in test files.
    FocusedTests,
    /// Dependency manifest without a lockfile.
    MissingLockfile,
    /// Installed tree does not match the manifest.
    DependencyMismatch,
    /// Pass rate below the configured minimum.
    LowPassRate,
    /// No `test` script in the package manifest.
    MissingTestScript,
    /// Test script succeeds when no tests run.
    PassWithNoTests,
    /// No CI workflow configured.
    MissingWorkflow,
    /// A CI job or step ignores failures.
    ContinueOnError,
    /// Lockfile lags the manifest.
    StaleLockfile,
    /// CI job without a timeout.
    WorkflowTimeout,
    /// CI setup without dependency caching.
    MissingCache,
    /// Lint or type checks suppressed in source.
    SuppressedChecks,
    /// Debug statements left in source.
    DebugStatements,
    /// Skipped tests.
    SkippedTests,
    /// Source files above the size threshold.
    OversizedFiles,
    /// TODO/FIXME markers above the threshold.
    TodoMarkers,
}

impl BlockerKind {
    /// Kebab-case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuildFailure => "build-failure",
            Self::TestTimeout => "test-timeout",
            Self::TestFailures => "test-failures",
            Self::NoTests => "no-tests",
            Self::SecurityVulnerability => "security-vulnerability",
            Self::CiFailure => "ci-failure",
            Self::LintErrors => "lint-errors",
            Self::EmptyTestMatch => "empty-test-match",
            Self::FocusedTests => "focused-tests",
            Self::MissingLockfile => "missing-lockfile",
            Self::DependencyMismatch => "dependency-mismatch",
            Self::LowPassRate => "low-pass-rate",
            Self::MissingTestScript => "missing-test-script",
            Self::PassWithNoTests => "pass-with-no-tests",
            Self::MissingWorkflow => "missing-workflow",
            Self::ContinueOnError => "continue-on-error",
            Self::StaleLockfile => "stale-lockfile",
            Self::WorkflowTimeout => "workflow-timeout",
            Self::MissingCache => "missing-cache",
            Self::SuppressedChecks => "suppressed-checks",
            Self::DebugStatements => "debug-statements",
            Self::SkippedTests => "skipped-tests",
            Self::OversizedFiles => "oversized-files",
            Self::TodoMarkers => "todo-markers",
        }
    }
}

impl fmt::Display for BlockerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An actionable issue found by deep inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blocker {
    /// Blocker category.
    #[serde(rename = "type")]
    pub kind: BlockerKind,
    /// Urgency.
    pub severity: Severity,
    /// What is wrong.
    pub message: String,
    /// What to do about it.
    pub action: String,
    /// Supporting data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Blocker {
    /// Create a blocker without details.
    pub fn new(
        kind: BlockerKind,
        severity: Severity,
        message: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            action: action.into(),
            details: None,
        }
    }

    /// Attach supporting data.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
