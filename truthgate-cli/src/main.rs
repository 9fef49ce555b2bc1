#![deny(missing_docs)]
//! truthgate command-line interface.
//!
//! Measures a project, compares its documentation claims against the
//! measurements, and reports discrepancies and production blockers.

use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use truthgate_core::{
    BlockerReport, BlockersRun, ClaimParser, DetectionContext, DocUpdate, DocsUpdater,
    FileSystem, ProcessRunner, ProjectStatus, ReadinessStatus, Severity, StatusAggregator,
    StatusReport, StdFileSystem, SystemProcessRunner, TruthConfig, ValidationRun,
    ValidationSummary, build_detectors, detect_blockers, render_blockers_markdown,
    render_blockers_text, render_json, render_status_markdown, render_status_text,
    render_validation_markdown, render_validation_text, validate,
};

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const EXIT_CLEAN: u8 = 0;
const EXIT_FINDINGS: u8 = 1;
const EXIT_SYSTEM: u8 = 2;

#[derive(Parser)]
#[command(
    name = "truthgate",
    version,
    about = "Check documentation claims against measured project status"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Debug)]
struct ProjectArgs {
    /// Project root to measure.
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Markdown file or directory holding the claims (defaults to the root).
    #[arg(long)]
    docs: Option<PathBuf>,
    /// Configuration file (defaults to truthgate.toml in the root).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Halve the ratio tolerances.
    #[arg(long)]
    strict: bool,
    /// Measure without writing the status cache or documentation.
    #[arg(long)]
    dry_run: bool,
    /// Log progress at info level.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Clone, Debug)]
struct OutputArgs {
    /// Output format for report data.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Shorthand for `--format json`.
    #[arg(long)]
    json: bool,
    /// Write the report to this file; a directory receives a timestamped JSON report.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
struct GateArgs {
    /// Exit with 1 when any discrepancy is found.
    #[arg(long)]
    exit_on_discrepancy: bool,
    /// Exit with 1 when the project is failing or has HIGH or CRITICAL blockers.
    /// Without `--with-blockers`, validate exits 1 on HIGH or CRITICAL discrepancies.
    #[arg(long)]
    exit_on_fail: bool,
    /// Bypass validation and exit cleanly.
    #[arg(
        long = "skip-validation",
        env = "SKIP_TRUTH_VALIDATION",
        value_parser = FalseyValueParser::new()
    )]
    skip_validation: bool,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Args, Clone, Debug)]
struct CommonArgs {
    #[command(flatten)]
    project: ProjectArgs,
    #[command(flatten)]
    output: OutputArgs,
    #[command(flatten)]
    gate: GateArgs,
}

#[derive(Subcommand, Clone, Debug)]
enum Commands {
    /// Measure and print the project's actual status.
    Status(CommonArgs),
    /// Compare documentation claims with the measured status.
    Validate {
        #[command(flatten)]
        common: CommonArgs,
        /// Also run the blocker detectors.
        #[arg(long)]
        with_blockers: bool,
    },
    /// Detect production blockers.
    Blockers(CommonArgs),
    /// Rewrite the configured documentation section with the measured status.
    UpdateDocs(CommonArgs),
}

impl Commands {
    fn common(&self) -> &CommonArgs {
        match self {
            Self::Status(common) | Self::Blockers(common) | Self::UpdateDocs(common) => common,
            Self::Validate { common, .. } => common,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Validate { .. } => "validation",
            Self::Blockers(_) => "blockers",
            Self::UpdateDocs(_) => "update-docs",
        }
    }
}

/// Result of the `update-docs` command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocsRun {
    root: PathBuf,
    status: ProjectStatus,
    validation: ValidationSummary,
    update: DocUpdate,
}

#[derive(Debug)]
enum Outcome {
    Status(StatusReport),
    Validation(ValidationRun),
    Blockers(BlockersRun),
    Docs(DocsRun),
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.command.common().project.verbose);

    match run(cli.command).await {
        Ok(code) => std::process::ExitCode::from(code),
        Err(err) => {
            eprintln!("truthgate: {err}");
            std::process::ExitCode::from(EXIT_SYSTEM)
        }
    }
}

#[cfg(test)]
fn main() {}

fn init_logging(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();
}

async fn run(command: Commands) -> CliResult<u8> {
    let common = command.common().clone();
    if common.gate.skip_validation {
        log::warn!(
            "SKIP_TRUTH_VALIDATION is set; skipping {} without measuring",
            command.kind()
        );
        return Ok(EXIT_CLEAN);
    }

    let kind = command.kind();
    // A panic inside the pipeline surfaces here as a JoinError.
    let outcome = tokio::task::spawn_blocking(move || execute(&command)).await??;

    emit_outcome(&outcome, kind, &common.output).await?;
    Ok(exit_code(&outcome, &common.gate))
}

fn execute(command: &Commands) -> CliResult<Outcome> {
    let fs = StdFileSystem::new();
    let runner = SystemProcessRunner::new();
    let project = &command.common().project;
    let config = load_config(&fs, project)?;

    let outcome = match command {
        Commands::Status(_) => Outcome::Status(StatusReport {
            root: project.root.clone(),
            status: collect_status(&fs, &runner, &config, project),
        }),
        Commands::Validate { with_blockers, .. } => Outcome::Validation(run_validation(
            &fs,
            &runner,
            &config,
            project,
            *with_blockers,
        )?),
        Commands::Blockers(_) => {
            let status = collect_status(&fs, &runner, &config, project);
            let blockers = run_detectors(&fs, &runner, &config, project, &status);
            Outcome::Blockers(BlockersRun {
                root: project.root.clone(),
                status,
                blockers,
            })
        }
        Commands::UpdateDocs(_) => Outcome::Docs(run_update(&fs, &runner, &config, project)?),
    };
    Ok(outcome)
}

fn load_config(fs: &dyn FileSystem, project: &ProjectArgs) -> CliResult<TruthConfig> {
    let config = TruthConfig::discover(fs, &project.root, project.config.as_deref())?;
    Ok(if project.strict { config.strict() } else { config })
}

fn collect_status(
    fs: &dyn FileSystem,
    runner: &dyn ProcessRunner,
    config: &TruthConfig,
    project: &ProjectArgs,
) -> ProjectStatus {
    StatusAggregator::new(fs, runner, config)
        .dry_run(project.dry_run)
        .collect(&project.root)
}

fn run_detectors(
    fs: &dyn FileSystem,
    runner: &dyn ProcessRunner,
    config: &TruthConfig,
    project: &ProjectArgs,
    status: &ProjectStatus,
) -> BlockerReport {
    let ctx = DetectionContext {
        root: &project.root,
        fs,
        runner,
        config,
        status,
    };
    detect_blockers(&build_detectors(), &ctx)
}

fn run_validation(
    fs: &dyn FileSystem,
    runner: &dyn ProcessRunner,
    config: &TruthConfig,
    project: &ProjectArgs,
    with_blockers: bool,
) -> CliResult<ValidationRun> {
    let docs = project.docs.clone().unwrap_or_else(|| project.root.clone());
    let claims = ClaimParser::new(fs).parse(&docs)?;
    let status = collect_status(fs, runner, config, project);
    let validation = validate(&claims.claims, &status, config);
    let blockers =
        with_blockers.then(|| run_detectors(fs, runner, config, project, &status));

    Ok(ValidationRun {
        root: project.root.clone(),
        docs,
        strict: project.strict,
        documents: claims.documents,
        skipped: claims.skipped,
        status,
        validation,
        blockers,
    })
}

fn run_update(
    fs: &dyn FileSystem,
    runner: &dyn ProcessRunner,
    config: &TruthConfig,
    project: &ProjectArgs,
) -> CliResult<DocsRun> {
    let run = run_validation(fs, runner, config, project, false)?;
    let update = DocsUpdater::new(fs).apply(
        &project.root,
        &config.updater,
        &run.status,
        Some(&run.validation.summary),
        project.dry_run,
    )?;
    Ok(DocsRun {
        root: run.root,
        status: run.status,
        validation: run.validation.summary,
        update,
    })
}

fn exit_code(outcome: &Outcome, gate: &GateArgs) -> u8 {
    match outcome {
        Outcome::Status(report) => {
            if gate.exit_on_fail && report.status.overall.status == ReadinessStatus::Failing {
                EXIT_FINDINGS
            } else {
                EXIT_CLEAN
            }
        }
        Outcome::Validation(run) => {
            let discrepancies = gate.exit_on_discrepancy && run.validation.has_discrepancies();
            let blocked = gate.exit_on_fail
                && match &run.blockers {
                    Some(blockers) => is_blocked(blockers),
                    None => run
                        .validation
                        .discrepancies
                        .iter()
                        .any(|d| matches!(d.severity, Severity::Critical | Severity::High)),
                };
            if discrepancies || blocked {
                EXIT_FINDINGS
            } else {
                EXIT_CLEAN
            }
        }
        Outcome::Blockers(run) => {
            if run.blockers.has(Severity::Critical) {
                EXIT_SYSTEM
            } else if run.blockers.has(Severity::High) {
                EXIT_FINDINGS
            } else {
                EXIT_CLEAN
            }
        }
        Outcome::Docs(run) => {
            if gate.exit_on_discrepancy && run.validation.total_discrepancies > 0 {
                EXIT_FINDINGS
            } else {
                EXIT_CLEAN
            }
        }
    }
}

fn is_blocked(report: &BlockerReport) -> bool {
    report.has(Severity::Critical) || report.has(Severity::High)
}

fn effective_format(output: &OutputArgs) -> OutputFormat {
    if output.json {
        OutputFormat::Json
    } else {
        output.format
    }
}

fn render_outcome(outcome: &Outcome, format: OutputFormat) -> CliResult<String> {
    let contents = match (outcome, format) {
        (Outcome::Status(report), OutputFormat::Text) => render_status_text(&report.status),
        (Outcome::Status(report), OutputFormat::Markdown) => {
            render_status_markdown(&report.status)
        }
        (Outcome::Validation(run), OutputFormat::Text) => render_validation_text(run),
        (Outcome::Validation(run), OutputFormat::Markdown) => render_validation_markdown(run),
        (Outcome::Blockers(run), OutputFormat::Text) => render_blockers_text(run),
        (Outcome::Blockers(run), OutputFormat::Markdown) => render_blockers_markdown(run),
        (Outcome::Docs(run), OutputFormat::Text) => render_update_text(run),
        (Outcome::Docs(run), OutputFormat::Markdown) => run.update.preview.clone(),
        (outcome, OutputFormat::Json) => format!("{}\n", render_outcome_json(outcome)?),
    };
    Ok(contents)
}

fn render_outcome_json(outcome: &Outcome) -> serde_json::Result<String> {
    match outcome {
        Outcome::Status(report) => render_json(report),
        Outcome::Validation(run) => render_json(run),
        Outcome::Blockers(run) => render_json(run),
        Outcome::Docs(run) => render_json(run),
    }
}

fn render_update_text(run: &DocsRun) -> String {
    let mut output = String::new();
    let update = &run.update;
    let verb = match (update.changed, update.dry_run) {
        (false, _) => "Already current",
        (true, true) => "Would update",
        (true, false) => "Updated",
    };
    let _ = writeln!(
        output,
        "{verb}: {} (section \"{}\")",
        update.path.display(),
        update.heading
    );
    let _ = writeln!(
        output,
        "Status: {} ({:.1}%)",
        run.status.overall.status.label(),
        run.status.overall.score * 100.0
    );
    let _ = writeln!(
        output,
        "Claims: {} checked, {} discrepancies",
        run.validation.total_claims, run.validation.total_discrepancies
    );
    output
}

async fn emit_outcome(outcome: &Outcome, kind: &str, output: &OutputArgs) -> CliResult<()> {
    let format = effective_format(output);
    let contents = render_outcome(outcome, format)?;
    match &output.output {
        Some(dir) if tokio::fs::metadata(dir).await.is_ok_and(|meta| meta.is_dir()) => {
            let path = dir.join(report_file_name(kind, chrono::Local::now()));
            let json = format!("{}\n", render_outcome_json(outcome)?);
            tokio::fs::write(&path, json).await?;
            log::info!("wrote {}", path.display());
            print!("{contents}");
        }
        Some(path) => write_report(path, contents).await?,
        None => print!("{contents}"),
    }
    Ok(())
}

async fn write_report(path: &Path, contents: String) -> CliResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, contents).await?;
    log::info!("wrote {}", path.display());
    Ok(())
}

fn report_file_name<Tz>(kind: &str, now: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{kind}-report-{}.json", now.format("%Y%m%d-%H%M%S"))
}
