//! Tunable weights, tolerances, thresholds and probe settings.
//!
//! Values come from `truthgate.toml` at the project root (or an explicit
//! path) layered over built-in defaults; every section is optional.
//! `--strict` tightens tolerances on top of whatever was loaded.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::Dimension;
use crate::error::{Result, TruthGateError};
use crate::fs::FileSystem;

/// Default config file name looked up at the project root.
pub const CONFIG_FILE_NAME: &str = "truthgate.toml";

const WEIGHT_EPSILON: f64 = 1e-9;

/// Complete configuration for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruthConfig {
    /// Per-dimension weights for the overall score.
    pub weights: Weights,
    /// Allowed divergence before a ratio claim is a discrepancy.
    pub tolerances: Tolerances,
    /// Divergence bands for ratio discrepancy severity.
    pub severity: SeverityBands,
    /// Readiness and critical-issue thresholds.
    pub thresholds: Thresholds,
    /// Probe commands and timeouts.
    pub commands: Commands,
    /// Build probe settings.
    pub build: BuildConfig,
    /// CI/CD probe settings.
    pub cicd: CicdConfig,
    /// Documentation probe settings.
    pub documentation: DocsConfig,
    /// AI tooling probe settings.
    pub ai: AiConfig,
    /// Code-quality detector thresholds.
    pub quality: QualityConfig,
    /// Dependency detector settings.
    pub dependencies: DependencyConfig,
    /// Documentation updater target.
    pub updater: UpdaterConfig,
}

/// Weights per dimension; must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    /// Tests weight.
    pub tests: f64,
    /// Linting weight.
    pub linting: f64,
    /// Build weight.
    pub build: f64,
    /// CI/CD weight.
    pub cicd: f64,
    /// Documentation weight.
    pub documentation: f64,
    /// AI tooling weight.
    pub ai: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            tests: 0.30,
            linting: 0.25,
            build: 0.20,
            cicd: 0.15,
            documentation: 0.10,
            ai: 0.0,
        }
    }
}

impl Weights {
    /// Weight for a dimension.
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Tests => self.tests,
            Dimension::Linting => self.linting,
            Dimension::Build => self.build,
            Dimension::Cicd => self.cicd,
            Dimension::Documentation => self.documentation,
            Dimension::Ai => self.ai,
        }
    }

    /// Sum of all weights.
    pub fn sum(&self) -> f64 {
        Dimension::ALL.iter().map(|d| self.get(*d)).sum()
    }

    /// Reject negative weights and sums other than 1.
    pub fn validate(&self) -> Result<()> {
        if let Some(dimension) = Dimension::ALL.iter().find(|d| self.get(**d) < 0.0) {
            return Err(TruthGateError::InvalidConfig(format!(
                "weight for {dimension} is negative"
            )));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(TruthGateError::InvalidConfig(format!(
                "weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Tolerances for ratio claims.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Test pass-rate tolerance.
    pub pass_rate: f64,
    /// Overall percentage tolerance.
    pub percentage: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            pass_rate: 0.01,
            percentage: 0.05,
        }
    }
}

/// Divergence bands; anything past the tolerance but within `medium` is LOW.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityBands {
    /// Divergence above which severity is HIGH.
    pub high: f64,
    /// Divergence above which severity is MEDIUM.
    pub medium: f64,
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self {
            high: 0.10,
            medium: 0.05,
        }
    }
}

/// Readiness step function and critical-issue thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum score for PRODUCTION_READY.
    pub production_ready: f64,
    /// Minimum score for MOSTLY_READY.
    pub mostly_ready: f64,
    /// Minimum score for DEVELOPMENT_READY.
    pub development_ready: f64,
    /// Pass rate below which tests raise a critical issue.
    pub min_pass_rate: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            production_ready: 0.95,
            mostly_ready: 0.85,
            development_ready: 0.70,
            min_pass_rate: 0.95,
        }
    }
}

/// Probe commands; unset commands are auto-detected from project markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Commands {
    /// Test command line.
    pub test: Option<String>,
    /// Lint command line.
    pub lint: Option<String>,
    /// Build command line; when unset the build probe only stats artifacts.
    pub build: Option<String>,
    /// Timeout for the test command.
    pub test_timeout_secs: u64,
    /// Timeout for the lint command.
    pub lint_timeout_secs: u64,
    /// Timeout for the build command.
    pub build_timeout_secs: u64,
    /// Timeout for quick probes (`--version`, `gh run list`, `npm ls`).
    pub probe_timeout_secs: u64,
}

impl Default for Commands {
    fn default() -> Self {
        Self {
            test: None,
            lint: None,
            build: None,
            test_timeout_secs: 300,
            lint_timeout_secs: 120,
            build_timeout_secs: 300,
            probe_timeout_secs: 15,
        }
    }
}

impl Commands {
    /// Test timeout as a duration.
    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }

    /// Lint timeout as a duration.
    pub fn lint_timeout(&self) -> Duration {
        Duration::from_secs(self.lint_timeout_secs)
    }

    /// Build timeout as a duration.
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    /// Quick-probe timeout as a duration.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Build probe settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Paths whose existence indicates a successful build.
    pub artifacts: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            artifacts: ["dist", "build", "out", "target/release", "target/debug"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// CI/CD probe settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CicdConfig {
    /// Query the latest GitHub Actions run with `gh`.
    pub query_latest_run: bool,
}

impl Default for CicdConfig {
    fn default() -> Self {
        Self {
            query_latest_run: true,
        }
    }
}

/// Documentation probe settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    /// Required files or directories, relative to the root.
    pub required: Vec<String>,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            required: ["README.md", "CHANGELOG.md", "LICENSE", "CONTRIBUTING.md", "docs"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// AI tooling probe settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// CLIs probed with `--version`.
    pub tools: Vec<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            tools: vec!["claude".to_string()],
        }
    }
}

/// Code-quality detector thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Code lines above which a source file is oversized.
    pub max_file_lines: usize,
    /// TODO/FIXME markers tolerated before raising a blocker.
    pub max_todo_markers: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            max_file_lines: 800,
            max_todo_markers: 25,
        }
    }
}

/// Dependency detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyConfig {
    /// Run `npm ls --json` when a package manifest exists.
    pub npm_ls: bool,
    /// Run `npm audit --json` when a package manifest exists.
    pub npm_audit: bool,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            npm_ls: true,
            npm_audit: true,
        }
    }
}

/// Documentation updater target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Markdown file to rewrite, relative to the root.
    pub file: String,
    /// Heading text that anchors the rewritten section.
    pub heading: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            file: "README.md".to_string(),
            heading: "Project Status".to_string(),
        }
    }
}

impl TruthConfig {
    /// Parse and validate configuration text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration for a project.
    ///
    /// An explicit path must exist. Without one, `truthgate.toml` at the root
    /// is used when present, else the defaults.
    pub fn discover(fs: &dyn FileSystem, root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !fs.exists(path) {
                    return Err(TruthGateError::InvalidConfig(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => {
                let candidate: PathBuf = root.join(CONFIG_FILE_NAME);
                if !fs.exists(&candidate) {
                    log::debug!("no {CONFIG_FILE_NAME} found; using defaults");
                    return Ok(Self::default());
                }
                candidate
            }
        };
        log::info!("loading config from {}", path.display());
        Self::from_toml(&fs.read_to_string(&path)?)
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        let t = &self.thresholds;
        if !(t.production_ready >= t.mostly_ready && t.mostly_ready >= t.development_ready) {
            return Err(TruthGateError::InvalidConfig(
                "readiness thresholds must be descending".to_string(),
            ));
        }
        if self.severity.high < self.severity.medium {
            return Err(TruthGateError::InvalidConfig(
                "severity.high must not be below severity.medium".to_string(),
            ));
        }
        Ok(())
    }

    /// Halve the ratio tolerances.
    pub fn strict(mut self) -> Self {
        self.tolerances.pass_rate /= 2.0;
        self.tolerances.percentage /= 2.0;
        self
    }
}
