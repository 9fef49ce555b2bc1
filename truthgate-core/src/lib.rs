#![deny(missing_docs)]
//! truthgate core library.
//!
//! Reconciles documentation claims with the measured state of a project:
//! claim extraction, status collection and scoring, discrepancy validation,
//! blocker detection, and report rendering.

pub mod aggregator;
pub mod cache;
pub mod claims;
pub mod collector;
pub mod collectors;
pub mod config;
pub mod detector;
pub mod detectors;
pub mod docs_update;
pub mod domain;
pub mod error;
pub mod fs;
pub mod inspector;
pub mod process;
pub mod report;
pub mod validation;

pub use aggregator::{StatusAggregator, classify, component_score, overall_status};
pub use cache::SnapshotCache;
pub use claims::{ClaimParser, ClaimSet, Extractor, SkippedDocument, extract_line};
pub use collector::{Collector, ProbeContext};
pub use collectors::build_collectors;
pub use config::{CONFIG_FILE_NAME, TruthConfig, Weights};
pub use detector::{BlockerDetector, DetectionContext, Findings};
pub use detectors::{BlockerReport, DetectorFailure, build_detectors, detect_blockers, prioritize};
pub use docs_update::{DocUpdate, DocsUpdater, render_status_section, replace_section};
pub use domain::{
    Blocker, BlockerKind, Claim, ClaimKind, ClaimValue, Dimension, Discrepancy, Metrics,
    OverallStatus, PipelineState, ProjectStatus, ReadinessStatus, Severity, SnapshotSource,
    StatusSnapshot,
};
pub use error::{Result, TruthGateError};
pub use fs::{FileSystem, StdFileSystem};
pub use process::{CommandOutput, CommandSpec, ProcessRunner, SystemProcessRunner};
pub use report::{
    BlockersRun, StatusReport, ValidationRun, render_blockers_markdown, render_blockers_text,
    render_json, render_status_markdown, render_status_text, render_validation_markdown,
    render_validation_text,
};
pub use validation::{TruthValidator, ValidationReport, ValidationSummary, validate};
