//! Collector trait definitions.

use std::path::Path;

use crate::config::TruthConfig;
use crate::domain::{Dimension, Metrics};
use crate::error::Result;
use crate::fs::FileSystem;
use crate::process::ProcessRunner;

/// Everything a probe may touch: the project root, the two ports, and the config.
#[derive(Clone, Copy)]
pub struct ProbeContext<'a> {
    /// Project root.
    pub root: &'a Path,
    /// Filesystem port.
    pub fs: &'a dyn FileSystem,
    /// Process port.
    pub runner: &'a dyn ProcessRunner,
    /// Effective configuration.
    pub config: &'a TruthConfig,
}

/// Measures one dimension of ground truth.
pub trait Collector: Send + Sync {
    /// Dimension this collector measures.
    fn dimension(&self) -> Dimension;
    /// Probe the project and return live metrics.
    ///
    /// Any error (including a timed-out subprocess) is recovered by the
    /// aggregator, so implementations should propagate rather than guess.
    fn collect(&self, ctx: &ProbeContext<'_>) -> Result<Metrics>;
    /// Metrics used when the probe fails and nothing is cached. Scores zero.
    fn fallback(&self) -> Metrics;
}
