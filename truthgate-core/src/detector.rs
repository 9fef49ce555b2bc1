//! Blocker detector trait definitions.

use std::path::Path;

use crate::config::TruthConfig;
use crate::domain::{Blocker, ProjectStatus};
use crate::error::Result;
use crate::fs::FileSystem;
use crate::process::ProcessRunner;

/// Inputs shared by every detector: ports, config and the aggregated status.
#[derive(Clone, Copy)]
pub struct DetectionContext<'a> {
    /// Project root.
    pub root: &'a Path,
    /// Filesystem port.
    pub fs: &'a dyn FileSystem,
    /// Process port.
    pub runner: &'a dyn ProcessRunner,
    /// Effective configuration.
    pub config: &'a TruthConfig,
    /// Status from the aggregator, borrowed read-only.
    pub status: &'a ProjectStatus,
}

/// Blockers from one detector plus the checks it could not complete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Findings {
    /// Blockers in discovery order.
    pub blockers: Vec<Blocker>,
    /// `check: error` for every check that failed.
    pub failed_checks: Vec<String>,
}

impl Findings {
    /// Fold in one check's outcome. A failed check never discards blockers
    /// found by the others.
    pub fn record(&mut self, check: &str, outcome: Result<Vec<Blocker>>) {
        match outcome {
            Ok(found) => self.blockers.extend(found),
            Err(err) => {
                log::warn!("{check} check failed: {err}");
                self.failed_checks.push(format!("{check}: {err}"));
            }
        }
    }
}

impl From<Vec<Blocker>> for Findings {
    fn from(blockers: Vec<Blocker>) -> Self {
        Self {
            blockers,
            failed_checks: Vec::new(),
        }
    }
}

/// Inspects one area of the project for blockers.
pub trait BlockerDetector: Send + Sync {
    /// Stable detector name (e.g. "test-suite").
    fn name(&self) -> &'static str;
    /// Return blockers in discovery order. `Err` means nothing could be checked.
    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Findings>;
}
