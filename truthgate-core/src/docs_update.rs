//! Rewrites a marked status section in project documentation.

use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::UpdaterConfig;
use crate::domain::ProjectStatus;
use crate::error::{Result, TruthGateError};
use crate::fs::FileSystem;
use crate::report::append_status_table;
use crate::validation::ValidationSummary;

/// JSON-lines audit log of applied updates, relative to the project root.
pub const AUDIT_LOG: &str = ".truthgate/doc-updates.jsonl";

const GENERATED_PREFIX: &str = "_Generated by truthgate at ";

/// Whether two documents differ in anything other than the generated stamp.
fn differs_beyond_stamp(left: &str, right: &str) -> bool {
    left.lines()
        .filter(|line| !line.starts_with(GENERATED_PREFIX))
        .ne(right.lines().filter(|line| !line.starts_with(GENERATED_PREFIX)))
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(#{1,6})\s+(.*?)\s*#*\s*$").expect("heading regex must compile")
    })
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let caps = heading_re().captures(line)?;
    let level = caps.get(1)?.as_str().len();
    Some((level, caps.get(2)?.as_str()))
}

/// Replace the body under the heading titled `title` (case-insensitive).
///
/// The body runs to the next heading of the same or higher level. Returns
/// `None` when no such heading exists outside code fences.
pub fn replace_section(document: &str, title: &str, body: &str) -> Option<String> {
    let lines: Vec<&str> = document.lines().collect();
    let mut in_fence = false;
    let mut start = None;
    let mut end = lines.len();

    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        let Some((level, text)) = heading(line) else {
            continue;
        };
        match start {
            None if text.eq_ignore_ascii_case(title.trim()) => start = Some((index, level)),
            Some((_, anchor_level)) if level <= anchor_level => {
                end = index;
                break;
            }
            _ => {}
        }
    }

    let (anchor, _) = start?;
    let mut output = String::new();
    for line in &lines[..=anchor] {
        output.push_str(line);
        output.push('\n');
    }
    output.push('\n');
    output.push_str(body.trim());
    output.push('\n');
    if end < lines.len() {
        output.push('\n');
        for line in &lines[end..] {
            output.push_str(line);
            output.push('\n');
        }
    }
    Some(output)
}

/// Markdown body for the status section.
pub fn render_status_section(status: &ProjectStatus, summary: Option<&ValidationSummary>) -> String {
    let mut output = String::new();
    append_status_table(&mut output, status);
    if status.overall.critical_issues.is_empty() {
        let _ = writeln!(output, "No critical issues.");
    } else {
        let _ = writeln!(output, "Critical issues:");
        for issue in &status.overall.critical_issues {
            let _ = writeln!(output, "- {issue}");
        }
    }
    if let Some(summary) = summary {
        let _ = writeln!(
            output,
            "\nDocumentation claims: {} checked, {} discrepancies.",
            summary.total_claims, summary.total_discrepancies
        );
    }
    let _ = writeln!(output, "\n{GENERATED_PREFIX}{}._", status.collected_at);
    output
}

/// Outcome of a documentation update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocUpdate {
    /// File that was (or would be) rewritten.
    pub path: PathBuf,
    /// Heading that anchors the section.
    pub heading: String,
    /// Whether the contents differ from what is on disk.
    pub changed: bool,
    /// Whether the write was skipped.
    pub dry_run: bool,
    /// The full rewritten document.
    pub preview: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuditEntry<'a> {
    timestamp: String,
    file: &'a Path,
    heading: &'a str,
    changed: bool,
    score: f64,
    status: &'a str,
}

/// Applies status sections through the filesystem port.
pub struct DocsUpdater<'a> {
    fs: &'a dyn FileSystem,
}

impl<'a> DocsUpdater<'a> {
    /// Create an updater.
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs }
    }

    /// Rewrite the configured section with a fresh status rendering.
    ///
    /// A missing anchor is an error and nothing is written. Dry runs only
    /// return the preview.
    pub fn apply(
        &self,
        root: &Path,
        target: &UpdaterConfig,
        status: &ProjectStatus,
        summary: Option<&ValidationSummary>,
        dry_run: bool,
    ) -> Result<DocUpdate> {
        let path = root.join(&target.file);
        let original = self.fs.read_to_string(&path)?;
        let body = render_status_section(status, summary);
        let updated = replace_section(&original, &target.heading, &body).ok_or_else(|| {
            TruthGateError::Other(format!(
                "heading \"{}\" not found in {}",
                target.heading,
                path.display()
            ))
        })?;
        // A new stamp alone is not a change; keep the document as it is.
        let changed = differs_beyond_stamp(&original, &updated);
        let updated = if changed { updated } else { original };

        if !dry_run {
            if changed {
                self.fs.write(&path, &updated)?;
                log::info!("updated \"{}\" in {}", target.heading, path.display());
            }
            let entry = AuditEntry {
                timestamp: chrono::Utc::now().to_rfc3339(),
                file: Path::new(&target.file),
                heading: &target.heading,
                changed,
                score: status.overall.score,
                status: status.overall.status.as_str(),
            };
            let line = format!("{}\n", serde_json::to_string(&entry)?);
            self.fs.append(&root.join(AUDIT_LOG), &line)?;
        }

        Ok(DocUpdate {
            path,
            heading: target.heading.clone(),
            changed,
            dry_run,
            preview: updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::overall_status;
    use crate::config::TruthConfig;
    use crate::domain::{Metrics, StatusSnapshot, TestMetrics};
    use crate::fs::{MockFileSystem, StdFileSystem};

    fn status() -> ProjectStatus {
        let config = TruthConfig::default();
        let snapshots = vec![StatusSnapshot::live(Metrics::Tests(TestMetrics::from_counts(
            9, 1, 0, 10,
        )))];
        ProjectStatus {
            collected_at: "2026-01-01T00:00:00Z".to_string(),
            overall: overall_status(&snapshots, &config.weights, &config.thresholds),
            snapshots,
        }
    }

    const README: &str = "# Demo\n\nIntro.\n\n## Project status\n\n✅ 100% production ready\n\n### Details\nold\n\n## Usage\n\nRun it.\n";

    #[test]
    fn replaces_until_next_heading_of_same_level() {
        let updated = replace_section(README, "Project Status", "NEW BODY").expect("section");
        assert_eq!(
            updated,
            "# Demo\n\nIntro.\n\n## Project status\n\nNEW BODY\n\n## Usage\n\nRun it.\n"
        );
    }

    #[test]
    fn replaces_to_end_of_document() {
        let updated = replace_section("# A\n## Status\nold\n", "status", "new").expect("section");
        assert_eq!(updated, "# A\n## Status\n\nnew\n");
    }

    #[test]
    fn ignores_headings_inside_code_fences() {
        let doc = "```\n## Status\n```\n";
        assert!(replace_section(doc, "Status", "x").is_none());
    }

    #[test]
    fn missing_anchor_writes_nothing() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_to_string()
            .returning(|_| Ok("# Only a title\n".to_string()));
        fs.expect_write().never();
        fs.expect_append().never();
        let err = DocsUpdater::new(&fs)
            .apply(
                Path::new("/repo"),
                &UpdaterConfig::default(),
                &status(),
                None,
                false,
            )
            .expect_err("missing heading");
        assert!(err.to_string().contains("Project Status"));
    }

    #[test]
    fn dry_run_returns_preview_only() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_to_string()
            .returning(|_| Ok(README.to_string()));
        fs.expect_write().never();
        fs.expect_append().never();
        let update = DocsUpdater::new(&fs)
            .apply(
                Path::new("/repo"),
                &UpdaterConfig::default(),
                &status(),
                None,
                true,
            )
            .expect("update");
        assert!(update.dry_run);
        assert!(update.changed);
        assert!(update.preview.contains("| tests | 90.0% |"));
        assert!(update.preview.contains("## Usage"));
    }

    #[test]
    fn apply_writes_document_and_audit_log() {
        let root = tempfile::tempdir().expect("temp dir");
        std::fs::write(root.path().join("README.md"), README).expect("write");
        let fs = StdFileSystem::new();
        let summary = ValidationSummary {
            total_claims: 1,
            total_discrepancies: 1,
            critical: 1,
            ..ValidationSummary::default()
        };

        let update = DocsUpdater::new(&fs)
            .apply(
                root.path(),
                &UpdaterConfig::default(),
                &status(),
                Some(&summary),
                false,
            )
            .expect("update");

        let written = std::fs::read_to_string(root.path().join("README.md")).expect("read");
        assert_eq!(written, update.preview);
        assert!(written.contains("1 checked, 1 discrepancies"));
        assert!(!written.contains("100% production ready"));

        let log = std::fs::read_to_string(root.path().join(AUDIT_LOG)).expect("audit log");
        let entry: serde_json::Value =
            serde_json::from_str(log.lines().next().expect("line")).expect("json");
        assert_eq!(entry["file"], "README.md");
        assert_eq!(entry["changed"], true);
        assert_eq!(entry["status"], "FAILING");
    }

    #[test]
    fn reapplying_same_status_is_unchanged() {
        let root = tempfile::tempdir().expect("temp dir");
        std::fs::write(root.path().join("README.md"), README).expect("write");
        let fs = StdFileSystem::new();
        let updater = DocsUpdater::new(&fs);
        let target = UpdaterConfig::default();

        let first = updater
            .apply(root.path(), &target, &status(), None, false)
            .expect("first update");
        let later = ProjectStatus {
            collected_at: "2026-02-01T00:00:00Z".to_string(),
            ..status()
        };
        let second = updater
            .apply(root.path(), &target, &later, None, false)
            .expect("second update");

        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(second.preview, first.preview);
        let written = std::fs::read_to_string(root.path().join("README.md")).expect("read");
        assert!(written.contains("2026-01-01T00:00:00Z"));

        let log = std::fs::read_to_string(root.path().join(AUDIT_LOG)).expect("audit log");
        let changed: Vec<bool> = log
            .lines()
            .map(|line| {
                let entry: serde_json::Value = serde_json::from_str(line).expect("json");
                entry["changed"].as_bool().expect("changed flag")
            })
            .collect();
        assert_eq!(changed, vec![true, false]);
    }
}
