//! Report payloads and their text, Markdown and JSON renderings.

use std::fmt::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::claims::SkippedDocument;
use crate::detectors::BlockerReport;
use crate::domain::{Blocker, Metrics, ProjectStatus, Severity, StatusSnapshot};
use crate::validation::ValidationReport;

/// Output of the `status` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Project root.
    pub root: PathBuf,
    /// Aggregated status.
    pub status: ProjectStatus,
}

/// Output of the `validate` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRun {
    /// Project root.
    pub root: PathBuf,
    /// Documentation corpus that was parsed.
    pub docs: PathBuf,
    /// Whether strict tolerances were used.
    pub strict: bool,
    /// Documents scanned.
    pub documents: usize,
    /// Documents that could not be read.
    pub skipped: Vec<SkippedDocument>,
    /// Aggregated status the claims were compared against.
    pub status: ProjectStatus,
    /// Discrepancies and summary.
    pub validation: ValidationReport,
    /// Blockers, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockers: Option<BlockerReport>,
}

/// Output of the `blockers` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockersRun {
    /// Project root.
    pub root: PathBuf,
    /// Aggregated status the detectors read.
    pub status: ProjectStatus,
    /// Prioritized blockers.
    pub blockers: BlockerReport,
}

/// Render any serializable report payload as JSON.
pub fn render_json<T: Serialize + ?Sized>(payload: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(payload)
}

/// One-line summary of a dimension's metrics.
pub fn describe_metrics(metrics: &Metrics) -> String {
    match metrics {
        Metrics::Tests(tests) => format!(
            "{}/{} passed, {} failed, {} skipped ({:.1}%)",
            tests.passed,
            tests.total,
            tests.failed,
            tests.skipped,
            tests.pass_rate * 100.0
        ),
        Metrics::Linting(lint) if !lint.measured => "not measured".to_string(),
        Metrics::Linting(lint) => format!("{} errors, {} warnings", lint.errors, lint.warnings),
        Metrics::Build(build) if build.success => {
            format!("passing ({} artifacts)", build.artifacts.len())
        }
        Metrics::Build(build) => format!("failing ({} errors)", build.error_count),
        Metrics::Cicd(cicd) if !cicd.configured => "not configured".to_string(),
        Metrics::Cicd(cicd) => format!(
            "{} workflow(s), latest run {}",
            cicd.workflows.len(),
            cicd.latest_run
        ),
        Metrics::Documentation(docs) if docs.missing.is_empty() => {
            format!("{:.0}% complete", docs.completeness * 100.0)
        }
        Metrics::Documentation(docs) => format!(
            "{:.0}% complete, missing {}",
            docs.completeness * 100.0,
            docs.missing.join(", ")
        ),
        Metrics::Ai(ai) if ai.available.is_empty() => "no tools available".to_string(),
        Metrics::Ai(ai) => format!("available: {}", ai.available.join(", ")),
    }
}

fn snapshot_note(snapshot: &StatusSnapshot) -> String {
    let mut note = String::new();
    if !snapshot.is_live() {
        note.push_str(&format!(" [{}]", snapshot.source.as_str()));
    }
    if snapshot.timed_out {
        note.push_str(" [timed out]");
    }
    note
}

fn collection_notes(status: &ProjectStatus) -> Vec<String> {
    status
        .degraded()
        .into_iter()
        .map(|snapshot| {
            format!(
                "{}: {} ({})",
                snapshot.dimension(),
                snapshot.source.as_str(),
                snapshot.note.as_deref().unwrap_or("no live measurement")
            )
        })
        .collect()
}

/// Render the project status as console text.
pub fn render_status_text(status: &ProjectStatus) -> String {
    let mut output = String::new();
    let overall = &status.overall;
    let _ = writeln!(
        output,
        "Status: {} ({:.1}%)",
        overall.status.label(),
        overall.percentage
    );
    for snapshot in &status.snapshots {
        let dimension = snapshot.dimension();
        let score = overall
            .component_scores
            .get(&dimension)
            .copied()
            .unwrap_or_default();
        let _ = writeln!(
            output,
            "  {:<14} {:>5.1}%  {}{}",
            dimension.as_str(),
            score * 100.0,
            describe_metrics(&snapshot.metrics),
            snapshot_note(snapshot)
        );
    }
    append_text_list(&mut output, "Critical issues", &overall.critical_issues);
    append_text_list(&mut output, "Collection notes", &collection_notes(status));
    output
}

/// Render the project status as Markdown.
pub fn render_status_markdown(status: &ProjectStatus) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Project Status\n");
    append_status_table(&mut output, status);
    append_list(
        &mut output,
        "Critical issues",
        &status.overall.critical_issues,
        "No critical issues.",
    );
    append_list(
        &mut output,
        "Collection notes",
        &collection_notes(status),
        "All dimensions measured live.",
    );
    output
}

pub(crate) fn append_status_table(output: &mut String, status: &ProjectStatus) {
    let overall = &status.overall;
    let _ = writeln!(
        output,
        "**{}**: {:.1}% (collected {})\n",
        overall.status.label(),
        overall.percentage,
        status.collected_at
    );
    let _ = writeln!(output, "| Dimension | Score | Weight | Details |");
    let _ = writeln!(output, "|---|---|---|---|");
    for snapshot in &status.snapshots {
        let dimension = snapshot.dimension();
        let score = overall
            .component_scores
            .get(&dimension)
            .copied()
            .unwrap_or_default();
        let _ = writeln!(
            output,
            "| {} | {:.1}% | {:.2} | {}{} |",
            dimension.as_str(),
            score * 100.0,
            overall.weights.get(dimension),
            describe_metrics(&snapshot.metrics),
            snapshot_note(snapshot)
        );
    }
    let _ = writeln!(output);
}

/// Render a validation run as console text.
pub fn render_validation_text(run: &ValidationRun) -> String {
    let mut output = String::new();
    let summary = &run.validation.summary;
    let _ = writeln!(
        output,
        "Validated {} claims from {} documents{}: {} discrepancies ({} critical, {} high, {} medium, {} low)",
        summary.total_claims,
        run.documents,
        if run.strict { " (strict)" } else { "" },
        summary.total_discrepancies,
        summary.critical,
        summary.high,
        summary.medium,
        summary.low
    );
    if summary.unverifiable > 0 {
        let _ = writeln!(
            output,
            "{} claims could not be checked: dimension not measured",
            summary.unverifiable
        );
    }
    let _ = writeln!(
        output,
        "Actual: {} ({:.1}%)",
        run.status.overall.status.label(),
        run.status.overall.percentage
    );
    for discrepancy in &run.validation.discrepancies {
        let _ = writeln!(
            output,
            "  [{}] {} {}: claimed {}, actual {}\n      \"{}\"\n      {}",
            discrepancy.severity,
            discrepancy.kind,
            discrepancy.source,
            discrepancy.claimed,
            discrepancy.actual,
            discrepancy.claim_text,
            discrepancy.context
        );
    }
    if let Some(blockers) = &run.blockers {
        output.push_str(&render_blocker_lines(blockers));
    }
    let skipped: Vec<String> = run
        .skipped
        .iter()
        .map(|doc| format!("{}: {}", doc.path.display(), doc.reason))
        .collect();
    append_text_list(&mut output, "Skipped documents", &skipped);
    append_text_list(&mut output, "Collection notes", &collection_notes(&run.status));
    output
}

/// Render a validation run as Markdown.
pub fn render_validation_markdown(run: &ValidationRun) -> String {
    let mut output = String::new();
    let summary = &run.validation.summary;
    let _ = writeln!(output, "# Truth Validation Report\n");
    let _ = writeln!(output, "- Documents: {}", run.documents);
    let _ = writeln!(output, "- Claims: {}", summary.total_claims);
    let _ = writeln!(output, "- Passed: {}", summary.passed);
    if summary.unverifiable > 0 {
        let _ = writeln!(output, "- Unverifiable: {}", summary.unverifiable);
    }
    let _ = writeln!(
        output,
        "- Discrepancies: {} (critical {}, high {}, medium {}, low {})",
        summary.total_discrepancies, summary.critical, summary.high, summary.medium, summary.low
    );
    let _ = writeln!(output, "- Strict: {}\n", run.strict);

    let _ = writeln!(output, "## Discrepancies\n");
    if run.validation.discrepancies.is_empty() {
        let _ = writeln!(output, "No discrepancies found.\n");
    } else {
        let _ = writeln!(output, "| Severity | Type | Source | Claimed | Actual | Context |");
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for d in &run.validation.discrepancies {
            let _ = writeln!(
                output,
                "| {} | {} | `{}` | {} | {} | {} |",
                d.severity,
                d.kind,
                d.source,
                d.claimed,
                d.actual,
                d.context.replace('|', "\\|")
            );
        }
        let _ = writeln!(output);
    }

    let _ = writeln!(output, "## Actual Status\n");
    append_status_table(&mut output, &run.status);
    if let Some(blockers) = &run.blockers {
        append_blocker_section(&mut output, blockers);
    }
    let skipped: Vec<String> = run
        .skipped
        .iter()
        .map(|doc| format!("`{}`: {}", doc.path.display(), doc.reason))
        .collect();
    append_list(&mut output, "Skipped documents", &skipped, "None.");
    append_list(
        &mut output,
        "Collection notes",
        &collection_notes(&run.status),
        "All dimensions measured live.",
    );
    output
}

/// Render a blockers run as console text.
pub fn render_blockers_text(run: &BlockersRun) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Status: {} ({:.1}%)",
        run.status.overall.status.label(),
        run.status.overall.percentage
    );
    output.push_str(&render_blocker_lines(&run.blockers));
    append_text_list(&mut output, "Collection notes", &collection_notes(&run.status));
    output
}

/// Render a blockers run as Markdown.
pub fn render_blockers_markdown(run: &BlockersRun) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Blocker Report\n");
    let _ = writeln!(
        output,
        "**{}**: {:.1}%\n",
        run.status.overall.status.label(),
        run.status.overall.percentage
    );
    append_blocker_section(&mut output, &run.blockers);
    append_list(
        &mut output,
        "Collection notes",
        &collection_notes(&run.status),
        "All dimensions measured live.",
    );
    output
}

fn severity_counts(report: &BlockerReport) -> String {
    [Severity::Critical, Severity::High, Severity::Medium, Severity::Low]
        .iter()
        .map(|severity| format!("{} {}", report.count(*severity), severity.as_str().to_lowercase()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_blocker_lines(report: &BlockerReport) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Blockers: {} ({})",
        report.blockers.len(),
        severity_counts(report)
    );
    for (index, blocker) in report.blockers.iter().enumerate() {
        let _ = writeln!(
            output,
            "  {}. [{}] {}: {}\n      -> {}",
            index + 1,
            blocker.severity,
            blocker.kind,
            blocker.message,
            blocker.action
        );
    }
    let failures: Vec<String> = report
        .errors
        .iter()
        .map(|failure| format!("{}: {}", failure.detector, failure.message))
        .collect();
    append_text_list(&mut output, "Detector errors", &failures);
    output
}

fn append_blocker_section(output: &mut String, report: &BlockerReport) {
    let _ = writeln!(output, "## Blockers\n");
    if report.blockers.is_empty() {
        let _ = writeln!(output, "No blockers found.\n");
    } else {
        let _ = writeln!(output, "{}\n", severity_counts(report));
        for blocker in &report.blockers {
            append_blocker(output, blocker);
        }
        let _ = writeln!(output);
    }
    let failures: Vec<String> = report
        .errors
        .iter()
        .map(|failure| format!("{}: {}", failure.detector, failure.message))
        .collect();
    append_list(output, "Detector errors", &failures, "No detector errors.");
}

fn append_blocker(output: &mut String, blocker: &Blocker) {
    let _ = writeln!(
        output,
        "- **{}** `{}`: {}\n  - Action: {}",
        blocker.severity, blocker.kind, blocker.message, blocker.action
    );
}

fn append_text_list(output: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(output, "{title}:");
    for item in items {
        let _ = writeln!(output, "  - {item}");
    }
}

fn append_list(output: &mut String, title: &str, items: &[String], empty_message: &str) {
    if items.is_empty() {
        let _ = writeln!(output, "## {title}\n{empty_message}\n");
        return;
    }
    let _ = writeln!(output, "## {title}");
    for item in items {
        let _ = writeln!(output, "- {item}");
    }
    let _ = writeln!(output);
}
