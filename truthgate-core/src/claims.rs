//! Claim extraction from markdown documentation.
//!
//! Each claim kind has one [`Extractor`] holding an ordered pattern list; the
//! first pattern that matches a line wins for that kind. [`extract_line`]
//! runs every extractor over a line, so one line can yield several kinds of
//! claim but never two of the same kind.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::domain::{Claim, ClaimKind, ClaimValue, ErrorScope, PipelineState, ReadinessStatus};
use crate::error::Result;
use crate::fs::FileSystem;

/// Claims found in a corpus plus the documents that could not be read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSet {
    /// Claims sorted by file, line, and kind.
    pub claims: Vec<Claim>,
    /// Documents scanned successfully.
    pub documents: usize,
    /// Documents skipped, with the reason.
    pub skipped: Vec<SkippedDocument>,
}

/// A document the parser could not read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDocument {
    /// Path of the document.
    pub path: PathBuf,
    /// Why it was skipped.
    pub reason: String,
}

/// One extractor per claim kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// "100% production ready", "✅ Production Ready".
    ProductionReady,
    /// "554/555 tests passing", "99.8% tests passing".
    TestPassRate,
    /// "0 linting errors", "no TypeScript errors".
    ErrorCount,
    /// "100% complete", "✅ Done".
    Completion,
    /// "Status: Mostly Ready".
    Status,
    /// "Overall: 87% ready".
    Percentage,
    /// "Build: passing".
    BuildStatus,
    /// "CI: passing".
    CicdStatus,
}

impl Extractor {
    /// Every extractor, in dispatch order.
    pub const ALL: [Extractor; 8] = [
        Self::ProductionReady,
        Self::TestPassRate,
        Self::ErrorCount,
        Self::Completion,
        Self::Status,
        Self::Percentage,
        Self::BuildStatus,
        Self::CicdStatus,
    ];

    /// Claim kind produced by this extractor.
    pub fn kind(&self) -> ClaimKind {
        match self {
            Self::ProductionReady => ClaimKind::ProductionReady,
            Self::TestPassRate => ClaimKind::TestPassRate,
            Self::ErrorCount => ClaimKind::ErrorCount,
            Self::Completion => ClaimKind::Completion,
            Self::Status => ClaimKind::Status,
            Self::Percentage => ClaimKind::Percentage,
            Self::BuildStatus => ClaimKind::BuildStatus,
            Self::CicdStatus => ClaimKind::CicdStatus,
        }
    }

    /// Extract this kind's value from a line, if the line asserts one.
    pub fn extract(&self, line: &str) -> Option<ClaimValue> {
        match self {
            Self::ProductionReady => extract_production_ready(line),
            Self::TestPassRate => extract_pass_rate(line),
            Self::ErrorCount => extract_error_count(line),
            Self::Completion => extract_completion(line),
            Self::Status => extract_status(line),
            Self::Percentage => extract_percentage(line),
            Self::BuildStatus => extract_build_status(line),
            Self::CicdStatus => extract_cicd_status(line),
        }
    }
}

/// Run every extractor over one line.
pub fn extract_line(line: &str) -> Vec<(ClaimKind, ClaimValue)> {
    Extractor::ALL
        .iter()
        .filter_map(|extractor| extractor.extract(line).map(|value| (extractor.kind(), value)))
        .collect()
}

/// Extract claims from one document's contents. Fenced code blocks are ignored.
pub fn parse_document(path: &Path, contents: &str) -> Vec<Claim> {
    let mut claims = Vec::new();
    let mut in_fence = false;
    for (index, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || trimmed.is_empty() {
            continue;
        }
        for (kind, value) in extract_line(trimmed) {
            claims.push(Claim {
                kind,
                value,
                raw_text: trimmed.to_string(),
                source_file: path.to_path_buf(),
                source_line: index + 1,
            });
        }
    }
    claims
}

/// Scans a documentation corpus for claims.
pub struct ClaimParser<'a> {
    fs: &'a dyn FileSystem,
}

impl<'a> ClaimParser<'a> {
    /// Create a parser over a filesystem.
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs }
    }

    /// Parse every markdown document under `root` (or `root` itself if it is a file).
    ///
    /// Unreadable documents are skipped and listed in the result; only a
    /// failure to list the corpus is an error.
    pub fn parse(&self, root: &Path) -> Result<ClaimSet> {
        let mut documents: Vec<PathBuf> = self
            .fs
            .list_files(root)?
            .into_iter()
            .filter(|path| is_markdown(path))
            .collect();
        documents.sort();

        let mut set = ClaimSet::default();
        for path in documents {
            let contents = match self.fs.read_to_string(&path) {
                Ok(contents) => contents,
                Err(err) => {
                    log::warn!("skipping {}: {err}", path.display());
                    set.skipped.push(SkippedDocument {
                        path,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            set.documents += 1;
            let display_path = relative_to(&path, root);
            set.claims.extend(parse_document(&display_path, &contents));
        }

        set.claims.sort_by(|a, b| {
            a.source_file
                .cmp(&b.source_file)
                .then(a.source_line.cmp(&b.source_line))
                .then(a.kind.cmp(&b.kind))
        });
        log::info!(
            "extracted {} claims from {} documents",
            set.claims.len(),
            set.documents
        );
        Ok(set)
    }
}

fn relative_to(path: &Path, root: &Path) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative.to_path_buf(),
        _ => path.to_path_buf(),
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            matches!(ext.as_str(), "md" | "markdown" | "mdx")
        })
        .unwrap_or(false)
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).expect("claim pattern must compile"))
        .collect()
}

fn first_match<'t>(patterns: &[Regex], line: &'t str) -> Option<Captures<'t>> {
    patterns.iter().find_map(|pattern| pattern.captures(line))
}

/// Words before a matched phrase that may negate it.
const NEGATION_WINDOW: usize = 3;

fn negation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:not|never|no|without)\b|n['’]t\b")
            .expect("negation regex must compile")
    })
}

/// Only a negation immediately ahead of the phrase counts; trailing
/// qualifiers such as "no longer behind a flag" leave the claim intact.
fn negated_before(line: &str, start: usize) -> bool {
    line[..start]
        .split_whitespace()
        .rev()
        .take(NEGATION_WINDOW)
        .any(|word| negation_re().is_match(word))
}

fn unnegated_match(patterns: &[Regex], line: &str) -> Option<ClaimValue> {
    let caps = first_match(patterns, line)?;
    if negated_before(line, caps.get(0)?.start()) {
        return None;
    }
    Some(ClaimValue::Flag { value: true })
}

fn parse_percent(text: &str) -> Option<f64> {
    let value: f64 = text.parse().ok()?;
    if (0.0..=100.0).contains(&value) {
        Some(value / 100.0)
    } else {
        None
    }
}

fn parse_count(text: &str) -> Option<u64> {
    match text.to_lowercase().as_str() {
        "zero" | "no" => Some(0),
        digits => digits.parse().ok(),
    }
}

fn production_ready_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile(&[
            r"(?i)\b100\s*%\s*production[\s_-]*ready\b",
            r"(?i)production[\s_-]*ready\s*(?:\*\*)?\s*[:\-]?\s*(?:✅|yes\b|true\b)",
            r"(?i)(?:✅|✔️?)\s*(?:\*\*)?\s*production[\s_-]*ready\b",
            r"(?i)\b(?:is|now|fully)\s+production[\s_-]*ready\b",
            r"(?i)\bready\s+for\s+production\b",
        ])
    })
}

fn extract_production_ready(line: &str) -> Option<ClaimValue> {
    unnegated_match(production_ready_patterns(), line)
}

fn pass_rate_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile(&[
            r"(?i)\b(?P<passed>\d+)\s*/\s*(?P<total>\d+)\s+(?:(?:unit|integration|e2e)\s+)?tests?\s+(?:are\s+)?(?:passing|passed|pass)\b",
            r"(?i)\b(?P<passed>\d+)\s+(?:of|out\s+of)\s+(?P<total>\d+)\s+(?:(?:unit|integration|e2e)\s+)?tests?\s+(?:are\s+)?(?:passing|passed|pass)\b",
            r"(?i)\b(?P<passed>\d+)\s*/\s*(?P<total>\d+)\s+(?:passing|passed)\b",
            r"(?i)\b(?P<percent>\d+(?:\.\d+)?)\s*%\s+(?:of\s+)?(?:(?:unit|integration|e2e)\s+)?tests?\s+(?:are\s+)?(?:passing|passed|pass)\b",
            r"(?i)\b(?P<percent>\d+(?:\.\d+)?)\s*%\s+(?:test\s+)?pass(?:ing)?\s+rate\b",
            r"(?i)\b(?:test\s+)?pass(?:ing)?\s+rate\s*(?:\*\*)?\s*[:=]?\s*(?:\*\*)?\s*(?P<percent>\d+(?:\.\d+)?)\s*%",
        ])
    })
}

fn extract_pass_rate(line: &str) -> Option<ClaimValue> {
    let caps = first_match(pass_rate_patterns(), line)?;
    if let (Some(passed), Some(total)) = (caps.name("passed"), caps.name("total")) {
        let passed: u64 = passed.as_str().parse().ok()?;
        let total: u64 = total.as_str().parse().ok()?;
        if total == 0 || passed > total {
            return None;
        }
        return Some(ClaimValue::Ratio {
            value: passed as f64 / total as f64,
            passed: Some(passed),
            total: Some(total),
        });
    }
    let value = parse_percent(caps.name("percent")?.as_str())?;
    Some(ClaimValue::Ratio {
        value,
        passed: None,
        total: None,
    })
}

fn error_count_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile(&[
            r"(?i)\b(?P<count>\d+|zero|no)\s+(?:(?P<scope>lint(?:ing)?|eslint|clippy|typescript|type|ts|build|compil(?:e|er|ation))\s+)?errors?\b",
            r"(?i)\b(?P<scope>lint(?:ing)?|eslint|clippy|typescript|type|ts|build|compil(?:e|er|ation))?\s*errors?\s*(?:\*\*)?\s*[:=]\s*(?:\*\*)?\s*(?P<count>\d+)\b",
        ])
    })
}

fn error_scope(text: Option<&str>) -> ErrorScope {
    let Some(text) = text else {
        return ErrorScope::General;
    };
    let text = text.to_lowercase();
    if text.starts_with("lint") || text == "eslint" || text == "clippy" {
        ErrorScope::Lint
    } else if text.starts_with("type") || text == "ts" {
        ErrorScope::Type
    } else {
        ErrorScope::Build
    }
}

fn extract_error_count(line: &str) -> Option<ClaimValue> {
    let caps = first_match(error_count_patterns(), line)?;
    let value = parse_count(caps.name("count")?.as_str())?;
    let scope = error_scope(caps.name("scope").map(|m| m.as_str()));
    Some(ClaimValue::Count { value, scope })
}

fn completion_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile(&[
            r"(?i)\b100\s*%\s*(?:complete|completed|done|finished)\b",
            r"(?i)(?:✅|✔️?)\s*(?:\*\*)?\s*(?:complete|completed|done|finished)\b",
            r"(?i)\b(?:fully|feature)[\s-]complete\b",
            r"(?i)\ball\s+(?:tasks|features|items|milestones|work)\s+(?:are\s+)?(?:complete|completed|done|finished)\b",
            r"(?i)\b(?:implementation|project|work)\s+(?:is\s+)?(?:complete|completed|finished)\b",
        ])
    })
}

fn extract_completion(line: &str) -> Option<ClaimValue> {
    unnegated_match(completion_patterns(), line)
}

fn status_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\bstatus\s*(?:\*\*)?\s*[:=\-]\s*(?:\*\*)?\s*(?:✅|⚠️?|❌|🟢|🟡|🔴)?\s*(?P<state>[a-z][a-z _-]*[a-z])",
        )
        .expect("status regex must compile")
    })
}

fn pipeline_status_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:build|ci|ci/cd|cicd|pipeline|workflow)\s+status\b")
            .expect("pipeline status regex must compile")
    })
}

/// Normalize a free-text readiness phrase.
pub fn normalize_readiness(text: &str) -> Option<ReadinessStatus> {
    let normalized = text
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if normalized.starts_with("not ") {
        return None;
    }
    if normalized.starts_with("production ready")
        || normalized == "production"
        || normalized.starts_with("ready for production")
    {
        Some(ReadinessStatus::ProductionReady)
    } else if ["mostly ready", "nearly ready", "almost ready"]
        .iter()
        .any(|prefix| normalized.starts_with(prefix))
    {
        Some(ReadinessStatus::MostlyReady)
    } else if ["development ready", "in development", "development", "in progress"]
        .iter()
        .any(|prefix| normalized.starts_with(prefix))
    {
        Some(ReadinessStatus::DevelopmentReady)
    } else if ["failing", "failed", "broken"]
        .iter()
        .any(|prefix| normalized.starts_with(prefix))
    {
        Some(ReadinessStatus::Failing)
    } else {
        None
    }
}

fn extract_status(line: &str) -> Option<ClaimValue> {
    if pipeline_status_label_re().is_match(line) {
        return None;
    }
    let caps = status_re().captures(line)?;
    let value = normalize_readiness(caps.name("state")?.as_str())?;
    Some(ClaimValue::Readiness { value })
}

fn percentage_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile(&[
            r"(?i)\b(?:overall|readiness|health|project)(?:\s+(?:score|readiness|health|completion))?\s*(?:\*\*)?\s*[:=]\s*(?:\*\*)?\s*(?P<percent>\d+(?:\.\d+)?)\s*%",
            r"(?i)\b(?P<percent>\d+(?:\.\d+)?)\s*%\s+(?P<production>production[\s_-]*)?(?:ready|healthy)\b",
            r"(?i)\b(?P<percent>\d+(?:\.\d+)?)\s*%\s+(?P<complete>complete|completed|done)\b",
        ])
    })
}

fn extract_percentage(line: &str) -> Option<ClaimValue> {
    let caps = first_match(percentage_patterns(), line)?;
    let value = parse_percent(caps.name("percent")?.as_str())?;
    // A full 100% of "production ready" or "complete" belongs to those extractors.
    let owned_elsewhere = caps.name("production").is_some() || caps.name("complete").is_some();
    if owned_elsewhere && value >= 1.0 {
        return None;
    }
    Some(ClaimValue::Ratio {
        value,
        passed: None,
        total: None,
    })
}

/// Normalize a build/CI state word or marker.
pub fn normalize_pipeline_state(text: &str) -> Option<PipelineState> {
    match text.to_lowercase().as_str() {
        "passing" | "passed" | "pass" | "successful" | "success" | "succeeding" | "succeeds"
        | "green" | "ok" | "working" | "clean" | "✅" => Some(PipelineState::Passing),
        "failing" | "failed" | "fails" | "broken" | "red" | "❌" => Some(PipelineState::Failing),
        _ => None,
    }
}

const STATE_WORDS: &str = "passing|passed|successful|success|succeeding|succeeds|green|ok|working|clean|failing|failed|fails|broken|red";

fn build_status_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        let patterns = [
            format!(
                r"(?i)\bbuilds?(?:\s+status)?\s*(?:\*\*)?\s*[:=\-]\s*(?:\*\*)?\s*(?:✅|❌)?\s*(?P<state>{STATE_WORDS})\b"
            ),
            format!(r"(?i)\bbuilds?\s+(?:is\s+)?(?P<state>{STATE_WORDS})\b"),
            r"(?i)\b(?P<state>successful|clean|passing|green|failing|broken)\s+builds?\b".to_string(),
            r"(?i)(?P<state>✅|❌)\s*(?:\*\*)?\s*builds?\b".to_string(),
        ];
        let refs: Vec<&str> = patterns.iter().map(String::as_str).collect();
        compile(&refs)
    })
}

fn extract_build_status(line: &str) -> Option<ClaimValue> {
    let caps = first_match(build_status_patterns(), line)?;
    let value = normalize_pipeline_state(caps.name("state")?.as_str())?;
    Some(ClaimValue::Pipeline { value })
}

const CI_PREFIX: &str = r"(?:ci/cd|cicd|ci|pipelines?|github\s+actions|workflows?)";

fn cicd_status_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        let patterns = [
            format!(
                r"(?i)\b{CI_PREFIX}(?:\s+status)?\s*(?:\*\*)?\s*[:=\-]\s*(?:\*\*)?\s*(?:✅|❌)?\s*(?P<state>{STATE_WORDS})\b"
            ),
            format!(r"(?i)\b{CI_PREFIX}\s+(?:is\s+|are\s+)?(?P<state>{STATE_WORDS})\b"),
            format!(r"(?i)(?P<state>✅|❌)\s*(?:\*\*)?\s*{CI_PREFIX}\b"),
        ];
        let refs: Vec<&str> = patterns.iter().map(String::as_str).collect();
        compile(&refs)
    })
}

fn extract_cicd_status(line: &str) -> Option<ClaimValue> {
    let caps = first_match(cicd_status_patterns(), line)?;
    let value = normalize_pipeline_state(caps.name("state")?.as_str())?;
    Some(ClaimValue::Pipeline { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TruthGateError;
    use crate::fs::MockFileSystem;

    fn kinds(line: &str) -> Vec<ClaimKind> {
        extract_line(line).into_iter().map(|(kind, _)| kind).collect()
    }

    fn ratio(value: &ClaimValue) -> f64 {
        match value {
            ClaimValue::Ratio { value, .. } => *value,
            other => panic!("expected ratio, got {other:?}"),
        }
    }

    #[test]
    fn production_ready_claim_is_extracted_once() {
        let claims = extract_line("✅ 100% production ready");
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].0, ClaimKind::ProductionReady);
        assert_eq!(claims[0].1, ClaimValue::Flag { value: true });
    }

    #[test]
    fn negated_production_ready_is_ignored() {
        assert!(kinds("The API is not production ready yet").is_empty());
        assert!(kinds("Search isn't ready for production").is_empty());
        assert!(!kinds("The API is not 100% production ready").contains(&ClaimKind::ProductionReady));
    }

    #[test]
    fn trailing_negation_keeps_claim() {
        assert!(
            kinds("✅ 100% production ready — no longer behind a feature flag")
                .contains(&ClaimKind::ProductionReady)
        );
        assert!(
            kinds("✅ Production Ready (we don't ship debug builds)")
                .contains(&ClaimKind::ProductionReady)
        );
        assert!(
            kinds("Status: ✅ 100% complete, not counting docs polish")
                .contains(&ClaimKind::Completion)
        );
    }

    #[test]
    fn ratio_pass_rate_keeps_counts() {
        let claims = extract_line("554/555 tests passing");
        assert_eq!(claims.len(), 1);
        match &claims[0].1 {
            ClaimValue::Ratio {
                value,
                passed,
                total,
            } => {
                assert!((value - 554.0 / 555.0).abs() < 1e-12);
                assert_eq!(*passed, Some(554));
                assert_eq!(*total, Some(555));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn percent_pass_rate_is_normalized() {
        let claims = extract_line("**99.8% tests passing**");
        assert_eq!(claims[0].0, ClaimKind::TestPassRate);
        assert!((ratio(&claims[0].1) - 0.998).abs() < 1e-12);

        let claims = extract_line("Pass rate: 97%");
        assert!((ratio(&claims[0].1) - 0.97).abs() < 1e-12);

        let claims = extract_line("12 of 16 integration tests pass");
        assert!((ratio(&claims[0].1) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn invalid_ratio_is_ignored() {
        assert!(kinds("5/0 tests passing").is_empty());
        assert!(kinds("9/5 tests passing").is_empty());
    }

    #[test]
    fn error_counts_carry_scope() {
        let cases = [
            ("0 linting errors", 0, ErrorScope::Lint),
            ("No TypeScript errors", 0, ErrorScope::Type),
            ("zero errors", 0, ErrorScope::General),
            ("3 build errors remain", 3, ErrorScope::Build),
            ("ESLint errors: 4", 4, ErrorScope::Lint),
        ];
        for (line, expected, scope) in cases {
            let claims = extract_line(line);
            let value = claims
                .iter()
                .find(|(kind, _)| *kind == ClaimKind::ErrorCount)
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| panic!("no error claim in {line:?}"));
            assert_eq!(
                value,
                ClaimValue::Count {
                    value: expected,
                    scope
                },
                "{line}"
            );
        }
    }

    #[test]
    fn completion_claims() {
        assert_eq!(kinds("Phase 3: ✅ Complete"), vec![ClaimKind::Completion]);
        assert_eq!(kinds("All tasks are done"), vec![ClaimKind::Completion]);
        assert_eq!(kinds("100% complete"), vec![ClaimKind::Completion]);
        assert!(kinds("Implementation is not complete").is_empty());
    }

    #[test]
    fn status_claims_normalize() {
        let claims = extract_line("**Status**: Production Ready");
        assert_eq!(
            claims,
            vec![(
                ClaimKind::Status,
                ClaimValue::Readiness {
                    value: ReadinessStatus::ProductionReady
                }
            )]
        );
        assert_eq!(
            extract_line("Status - mostly_ready")[0].1,
            ClaimValue::Readiness {
                value: ReadinessStatus::MostlyReady
            }
        );
        assert!(kinds("Status: unknown feelings").is_empty());
    }

    #[test]
    fn build_status_line_is_not_a_readiness_status() {
        let claims = extract_line("Build status: passing");
        assert_eq!(
            claims,
            vec![(
                ClaimKind::BuildStatus,
                ClaimValue::Pipeline {
                    value: PipelineState::Passing
                }
            )]
        );
    }

    #[test]
    fn ci_status_claims() {
        assert_eq!(
            extract_line("CI/CD: ✅ passing")[0],
            (
                ClaimKind::CicdStatus,
                ClaimValue::Pipeline {
                    value: PipelineState::Passing
                }
            )
        );
        assert_eq!(
            extract_line("GitHub Actions are failing")[0].1,
            ClaimValue::Pipeline {
                value: PipelineState::Failing
            }
        );
    }

    #[test]
    fn percentage_claims_skip_full_production_ready() {
        let claims = extract_line("Overall score: 87.5%");
        assert_eq!(claims[0].0, ClaimKind::Percentage);
        assert!((ratio(&claims[0].1) - 0.875).abs() < 1e-12);
        assert_eq!(kinds("85% production ready"), vec![ClaimKind::Percentage]);
        assert_eq!(kinds("100% complete"), vec![ClaimKind::Completion]);
    }

    #[test]
    fn one_line_can_yield_several_kinds() {
        let found = kinds("✅ Build passing, 120/120 tests passing, 0 lint errors");
        assert!(found.contains(&ClaimKind::BuildStatus));
        assert!(found.contains(&ClaimKind::TestPassRate));
        assert!(found.contains(&ClaimKind::ErrorCount));
    }

    #[test]
    fn parse_document_tracks_lines_and_skips_fences() {
        let contents = "# Title\n\n554/555 tests passing\n```\n0 lint errors\n```\n0 lint errors\n";
        let claims = parse_document(Path::new("README.md"), contents);
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0].source_line, 3);
        assert_eq!(claims[0].raw_text, "554/555 tests passing");
        assert_eq!(claims[1].source_line, 7);
        assert_eq!(claims[1].location(), "README.md:7");
    }

    fn corpus_fs(order: Vec<&'static str>) -> MockFileSystem {
        let mut fs = MockFileSystem::new();
        fs.expect_list_files().returning(move |_| {
            Ok(order.iter().map(|p| PathBuf::from(format!("/repo/{p}"))).collect())
        });
        fs.expect_read_to_string().returning(|path| {
            match path.to_string_lossy().as_ref() {
                "/repo/README.md" => Ok("✅ 100% production ready\n".to_string()),
                "/repo/docs/status.md" => Ok("Status: Mostly Ready\n0 lint errors\n".to_string()),
                "/repo/docs/broken.md" => Err(TruthGateError::Other("unreadable".to_string())),
                other => panic!("unexpected read {other}"),
            }
        });
        fs
    }

    #[test]
    fn parse_is_independent_of_discovery_order() {
        let forward = corpus_fs(vec!["README.md", "docs/status.md", "src/main.rs"]);
        let reverse = corpus_fs(vec!["src/main.rs", "docs/status.md", "README.md"]);

        let a = ClaimParser::new(&forward).parse(Path::new("/repo")).expect("parse");
        let b = ClaimParser::new(&reverse).parse(Path::new("/repo")).expect("parse");

        assert_eq!(a, b);
        assert_eq!(a.documents, 2);
        assert_eq!(a.claims.len(), 3);
        assert_eq!(a.claims[0].source_file, PathBuf::from("README.md"));
        assert_eq!(a.claims[1].source_file, PathBuf::from("docs/status.md"));
    }

    #[test]
    fn unreadable_document_is_skipped() {
        let fs = corpus_fs(vec!["README.md", "docs/broken.md"]);
        let set = ClaimParser::new(&fs).parse(Path::new("/repo")).expect("parse");
        assert_eq!(set.documents, 1);
        assert_eq!(set.skipped.len(), 1);
        assert_eq!(set.skipped[0].path, PathBuf::from("/repo/docs/broken.md"));
        assert_eq!(set.claims.len(), 1);
    }
}
