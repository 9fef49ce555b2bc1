//! Compares claims against the measured project status.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::{SeverityBands, TruthConfig};
use crate::domain::{
    Claim, ClaimKind, ClaimValue, Dimension, Discrepancy, ErrorScope, PipelineState,
    ProjectStatus, ReadinessStatus, Severity, SnapshotSource,
};

const EPSILON: f64 = 1e-9;

/// Discrepancy counts for one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    /// Claims checked.
    pub total_claims: usize,
    /// Claims that disagree with reality.
    pub total_discrepancies: usize,
    /// CRITICAL discrepancies.
    pub critical: usize,
    /// HIGH discrepancies.
    pub high: usize,
    /// MEDIUM discrepancies.
    pub medium: usize,
    /// LOW discrepancies.
    pub low: usize,
    /// Claims that held up.
    pub passed: usize,
    /// Claims whose dimension has no snapshot to compare against.
    #[serde(default)]
    pub unverifiable: usize,
}

/// Result of [`TruthValidator::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// Discrepancies in claim order.
    pub discrepancies: Vec<Discrepancy>,
    /// Counts.
    pub summary: ValidationSummary,
}

impl ValidationReport {
    /// Whether any claim disagreed.
    pub fn has_discrepancies(&self) -> bool {
        !self.discrepancies.is_empty()
    }
}

/// Severity of a ratio divergence, or `None` while within tolerance.
pub fn band(diff: f64, tolerance: f64, bands: &SeverityBands) -> Option<Severity> {
    if diff <= tolerance + EPSILON {
        None
    } else if diff > bands.high + EPSILON {
        Some(Severity::High)
    } else if diff > bands.medium + EPSILON {
        Some(Severity::Medium)
    } else {
        Some(Severity::Low)
    }
}

/// Claim-by-claim comparator.
pub struct TruthValidator<'a> {
    config: &'a TruthConfig,
}

impl<'a> TruthValidator<'a> {
    /// Validator using the config's tolerances and bands.
    pub fn new(config: &'a TruthConfig) -> Self {
        Self { config }
    }

    /// Check every claim. The output is a pure function of the inputs.
    pub fn validate(&self, claims: &[Claim], status: &ProjectStatus) -> ValidationReport {
        let discrepancies: Vec<Discrepancy> = claims
            .iter()
            .filter_map(|claim| self.check(claim, status))
            .collect();

        let unverifiable = claims
            .iter()
            .filter(|claim| is_unverifiable(claim, status))
            .count();
        let mut summary = ValidationSummary {
            total_claims: claims.len(),
            total_discrepancies: discrepancies.len(),
            passed: claims.len() - discrepancies.len() - unverifiable,
            unverifiable,
            ..ValidationSummary::default()
        };
        for discrepancy in &discrepancies {
            match discrepancy.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
            }
        }
        log::info!(
            "validated {} claims: {} discrepancies",
            summary.total_claims,
            summary.total_discrepancies
        );
        ValidationReport {
            discrepancies,
            summary,
        }
    }

    fn check(&self, claim: &Claim, status: &ProjectStatus) -> Option<Discrepancy> {
        let overall = &status.overall;
        let (claimed, actual, severity, context, dimension) = match (&claim.kind, &claim.value) {
            (ClaimKind::ProductionReady, ClaimValue::Flag { value: true }) => {
                if overall.status == ReadinessStatus::ProductionReady {
                    return None;
                }
                (
                    json!(ReadinessStatus::ProductionReady.label()),
                    json!(overall.status.label()),
                    Severity::Critical,
                    format!(
                        "overall score {:.1}% is {}; {} critical issue(s)",
                        overall.percentage,
                        overall.status.as_str(),
                        overall.critical_issues.len()
                    ),
                    None,
                )
            }
            (ClaimKind::TestPassRate, ClaimValue::Ratio { value, .. }) => {
                let actual = status.tests()?.pass_rate;
                let severity = band(
                    (value - actual).abs(),
                    self.config.tolerances.pass_rate,
                    &self.config.severity,
                )?;
                (
                    json!(value),
                    json!(actual),
                    severity,
                    format!(
                        "claimed pass rate {:.2}% vs measured {:.2}% (tolerance {:.2}%)",
                        value * 100.0,
                        actual * 100.0,
                        self.config.tolerances.pass_rate * 100.0
                    ),
                    Some(Dimension::Tests),
                )
            }
            (ClaimKind::Percentage, ClaimValue::Ratio { value, .. }) => {
                let severity = band(
                    (value - overall.score).abs(),
                    self.config.tolerances.percentage,
                    &self.config.severity,
                )?;
                (
                    json!(value),
                    json!(overall.score),
                    severity,
                    format!(
                        "claimed {:.1}% vs overall score {:.1}% (tolerance {:.1}%)",
                        value * 100.0,
                        overall.percentage,
                        self.config.tolerances.percentage * 100.0
                    ),
                    None,
                )
            }
            (ClaimKind::ErrorCount, ClaimValue::Count { value, scope }) => {
                let (actual, dimension, label) = match scope {
                    ErrorScope::Lint | ErrorScope::General => {
                        (status.linting()?.errors, Dimension::Linting, "lint")
                    }
                    ErrorScope::Type | ErrorScope::Build => {
                        (status.build()?.error_count, Dimension::Build, "build")
                    }
                };
                if actual == *value {
                    return None;
                }
                let severity = if actual > *value {
                    Severity::High
                } else {
                    Severity::Medium
                };
                (
                    json!(value),
                    json!(actual),
                    severity,
                    format!("claimed {value} errors, measured {actual} {label} errors"),
                    Some(dimension),
                )
            }
            (ClaimKind::Completion, ClaimValue::Flag { value: true }) => {
                if overall.critical_issues.is_empty() {
                    return None;
                }
                (
                    json!("complete"),
                    json!(overall.critical_issues),
                    Severity::High,
                    format!(
                        "{} critical issue(s) remain: {}",
                        overall.critical_issues.len(),
                        overall.critical_issues.join("; ")
                    ),
                    None,
                )
            }
            (ClaimKind::Status, ClaimValue::Readiness { value }) => {
                if *value == overall.status {
                    return None;
                }
                let severity = if *value == ReadinessStatus::ProductionReady {
                    Severity::Critical
                } else {
                    Severity::Medium
                };
                (
                    json!(value.as_str()),
                    json!(overall.status.as_str()),
                    severity,
                    format!(
                        "claimed {} but overall score {:.1}% is {}",
                        value.as_str(),
                        overall.percentage,
                        overall.status.as_str()
                    ),
                    None,
                )
            }
            (ClaimKind::BuildStatus, ClaimValue::Pipeline { value }) => {
                let actual = actual_build_state(status);
                pipeline_mismatch(*value, actual, "build").map(|(severity, context)| {
                    (
                        json!(value.as_str()),
                        json!(actual.as_str()),
                        severity,
                        context,
                        Some(Dimension::Build),
                    )
                })?
            }
            (ClaimKind::CicdStatus, ClaimValue::Pipeline { value }) => {
                let actual = status
                    .cicd()
                    .map(|cicd| cicd.latest_run)
                    .unwrap_or(PipelineState::Unknown);
                pipeline_mismatch(*value, actual, "latest CI run").map(|(severity, context)| {
                    (
                        json!(value.as_str()),
                        json!(actual.as_str()),
                        severity,
                        context,
                        Some(Dimension::Cicd),
                    )
                })?
            }
            _ => return None,
        };

        Some(Discrepancy {
            kind: claim.kind,
            claimed,
            actual,
            severity,
            source: claim.location(),
            claim_text: claim.raw_text.clone(),
            context: with_provenance(context, dimension, status),
        })
    }
}

/// Claims that need a dimension the status never measured.
fn is_unverifiable(claim: &Claim, status: &ProjectStatus) -> bool {
    match &claim.value {
        ClaimValue::Ratio { .. } if claim.kind == ClaimKind::TestPassRate => status.tests().is_none(),
        ClaimValue::Count { scope, .. } if claim.kind == ClaimKind::ErrorCount => match scope {
            ErrorScope::Lint | ErrorScope::General => status.linting().is_none(),
            ErrorScope::Type | ErrorScope::Build => status.build().is_none(),
        },
        _ => false,
    }
}

fn actual_build_state(status: &ProjectStatus) -> PipelineState {
    match status.snapshot(Dimension::Build) {
        Some(snapshot) if snapshot.source != SnapshotSource::Default => match status.build() {
            Some(build) if build.success => PipelineState::Passing,
            Some(_) => PipelineState::Failing,
            None => PipelineState::Unknown,
        },
        _ => PipelineState::Unknown,
    }
}

fn pipeline_mismatch(
    claimed: PipelineState,
    actual: PipelineState,
    what: &str,
) -> Option<(Severity, String)> {
    if claimed == actual {
        return None;
    }
    let severity = if actual == PipelineState::Unknown {
        Severity::Medium
    } else {
        Severity::High
    };
    Some((severity, format!("claimed {claimed}, {what} is {actual}")))
}

fn with_provenance(context: String, dimension: Option<Dimension>, status: &ProjectStatus) -> String {
    let degraded = match dimension {
        Some(dimension) => status
            .snapshot(dimension)
            .filter(|snapshot| !snapshot.is_live())
            .map(|snapshot| vec![snapshot])
            .unwrap_or_default(),
        None => status.degraded(),
    };
    if degraded.is_empty() {
        return context;
    }
    let labels: Vec<String> = degraded
        .iter()
        .map(|snapshot| format!("{} {}", snapshot.dimension(), snapshot.source.as_str()))
        .collect();
    format!("{context} (not measured live: {})", labels.join(", "))
}

/// Validate claims against a status with the given config.
pub fn validate(claims: &[Claim], status: &ProjectStatus, config: &TruthConfig) -> ValidationReport {
    TruthValidator::new(config).validate(claims, status)
}

/// Claim value rendered for display.
pub fn describe_claim(value: &ClaimValue) -> Value {
    match value {
        ClaimValue::Flag { value } => json!(value),
        ClaimValue::Ratio {
            value,
            passed: Some(passed),
            total: Some(total),
        } => json!(format!("{passed}/{total} ({:.1}%)", value * 100.0)),
        ClaimValue::Ratio { value, .. } => json!(format!("{:.1}%", value * 100.0)),
        ClaimValue::Count { value, .. } => json!(value),
        ClaimValue::Readiness { value } => json!(value.as_str()),
        ClaimValue::Pipeline { value } => json!(value.as_str()),
    }
}
