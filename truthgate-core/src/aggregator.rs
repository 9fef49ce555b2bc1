//! Runs the collectors and derives the weighted overall status.

use std::collections::BTreeMap;
use std::path::Path;

use rayon::prelude::*;

use crate::cache::{CacheEntry, SnapshotCache};
use crate::collector::{Collector, ProbeContext};
use crate::collectors::build_collectors;
use crate::config::{Thresholds, TruthConfig, Weights};
use crate::domain::{
    Dimension, Metrics, OverallStatus, PipelineState, ProjectStatus, ReadinessStatus,
    SnapshotSource, StatusSnapshot,
};
use crate::fs::FileSystem;
use crate::process::ProcessRunner;

const SCORE_EPSILON: f64 = 1e-9;

/// Collects every dimension and computes the overall status.
pub struct StatusAggregator<'a> {
    fs: &'a dyn FileSystem,
    runner: &'a dyn ProcessRunner,
    config: &'a TruthConfig,
    collectors: Vec<Box<dyn Collector>>,
    dry_run: bool,
}

impl<'a> StatusAggregator<'a> {
    /// Aggregator with the standard collectors.
    pub fn new(fs: &'a dyn FileSystem, runner: &'a dyn ProcessRunner, config: &'a TruthConfig) -> Self {
        Self::with_collectors(fs, runner, config, build_collectors())
    }

    /// Aggregator with a custom collector set.
    pub fn with_collectors(
        fs: &'a dyn FileSystem,
        runner: &'a dyn ProcessRunner,
        config: &'a TruthConfig,
        collectors: Vec<Box<dyn Collector>>,
    ) -> Self {
        Self {
            fs,
            runner,
            config,
            collectors,
            dry_run: false,
        }
    }

    /// Skip writing the snapshot cache.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run all collectors in parallel and aggregate.
    ///
    /// A failing collector degrades to its cached or default metrics; this
    /// never fails as a whole.
    pub fn collect(&self, root: &Path) -> ProjectStatus {
        let ctx = ProbeContext {
            root,
            fs: self.fs,
            runner: self.runner,
            config: self.config,
        };
        let cache = SnapshotCache::new(self.fs, root);
        let cached = cache.load();
        let collected_at = chrono::Utc::now().to_rfc3339();

        let mut snapshots: Vec<StatusSnapshot> = self
            .collectors
            .par_iter()
            .map(|collector| probe(collector.as_ref(), &ctx, &cached))
            .collect();
        snapshots.sort_by_key(StatusSnapshot::dimension);

        if !self.dry_run && snapshots.iter().any(StatusSnapshot::is_live) {
            if let Err(err) = cache.store(&snapshots, &collected_at) {
                log::warn!("could not write {}: {err}", cache.path().display());
            }
        }

        let overall = overall_status(&snapshots, &self.config.weights, &self.config.thresholds);
        log::info!(
            "overall score {:.3} ({})",
            overall.score,
            overall.status.as_str()
        );
        ProjectStatus {
            collected_at,
            snapshots,
            overall,
        }
    }
}

fn probe(
    collector: &dyn Collector,
    ctx: &ProbeContext<'_>,
    cached: &BTreeMap<Dimension, CacheEntry>,
) -> StatusSnapshot {
    let dimension = collector.dimension();
    let err = match collector.collect(ctx) {
        Ok(metrics) => return StatusSnapshot::live(metrics),
        Err(err) => err,
    };
    let timed_out = err.is_timeout();
    match cached.get(&dimension) {
        Some(entry) => {
            log::warn!("{dimension} probe failed ({err}); using cached value");
            StatusSnapshot {
                metrics: entry.metrics.clone(),
                source: SnapshotSource::Cached,
                timed_out,
                note: Some(format!(
                    "{err}; using cached value from {}",
                    entry.collected_at
                )),
            }
        }
        None => {
            log::warn!("{dimension} probe failed ({err}); using default");
            StatusSnapshot {
                metrics: collector.fallback(),
                source: SnapshotSource::Default,
                timed_out,
                note: Some(format!("{err}; no cached value, scored as default")),
            }
        }
    }
}

/// Health of one dimension in `[0, 1]`.
pub fn component_score(metrics: &Metrics) -> f64 {
    let score = match metrics {
        Metrics::Tests(tests) => tests.pass_rate,
        Metrics::Linting(lint) => bool_score(lint.measured && lint.errors == 0),
        Metrics::Build(build) => bool_score(build.success),
        Metrics::Cicd(cicd) => match cicd.latest_run {
            PipelineState::Failing => 0.0,
            _ => bool_score(cicd.configured),
        },
        Metrics::Documentation(docs) => docs.completeness,
        Metrics::Ai(ai) => bool_score(!ai.available.is_empty()),
    };
    score.clamp(0.0, 1.0)
}

fn bool_score(ok: bool) -> f64 {
    if ok { 1.0 } else { 0.0 }
}

/// Weighted sum of component scores, clamped to `[0, 1]`.
pub fn overall_score(components: &BTreeMap<Dimension, f64>, weights: &Weights) -> f64 {
    components
        .iter()
        .map(|(dimension, score)| score * weights.get(*dimension))
        .sum::<f64>()
        .clamp(0.0, 1.0)
}

/// Step function from score to readiness.
pub fn classify(score: f64, thresholds: &Thresholds) -> ReadinessStatus {
    if score + SCORE_EPSILON >= thresholds.production_ready {
        ReadinessStatus::ProductionReady
    } else if score + SCORE_EPSILON >= thresholds.mostly_ready {
        ReadinessStatus::MostlyReady
    } else if score + SCORE_EPSILON >= thresholds.development_ready {
        ReadinessStatus::DevelopmentReady
    } else {
        ReadinessStatus::Failing
    }
}

/// Threshold violations, skipping dimensions that only have default metrics.
pub fn critical_issues(snapshots: &[StatusSnapshot], thresholds: &Thresholds) -> Vec<String> {
    let mut issues = Vec::new();
    for snapshot in snapshots {
        if snapshot.dimension() == Dimension::Tests && snapshot.timed_out {
            issues.push("Test execution timed out".to_string());
        }
        if snapshot.source == SnapshotSource::Default {
            continue;
        }
        match &snapshot.metrics {
            Metrics::Tests(tests) if tests.total == 0 => {
                issues.push("No tests found".to_string());
            }
            Metrics::Tests(tests) if tests.pass_rate + SCORE_EPSILON < thresholds.min_pass_rate => {
                issues.push(format!(
                    "Test pass rate {:.1}% is below the {:.1}% minimum ({} failing)",
                    tests.pass_rate * 100.0,
                    thresholds.min_pass_rate * 100.0,
                    tests.failed
                ));
            }
            Metrics::Linting(lint) if lint.errors > 0 => {
                issues.push(format!("{} lint errors", lint.errors));
            }
            Metrics::Build(build) if !build.success => {
                issues.push("Build failing".to_string());
            }
            Metrics::Cicd(cicd) if cicd.latest_run == PipelineState::Failing => {
                issues.push("Latest CI run failed".to_string());
            }
            _ => {}
        }
    }
    issues
}

/// Derive the overall status from snapshots.
pub fn overall_status(
    snapshots: &[StatusSnapshot],
    weights: &Weights,
    thresholds: &Thresholds,
) -> OverallStatus {
    let component_scores: BTreeMap<Dimension, f64> = snapshots
        .iter()
        .map(|snapshot| (snapshot.dimension(), component_score(&snapshot.metrics)))
        .collect();
    let score = overall_score(&component_scores, weights);
    OverallStatus {
        score,
        percentage: score * 100.0,
        status: classify(score, thresholds),
        component_scores,
        weights: *weights,
        critical_issues: critical_issues(snapshots, thresholds),
    }
}
