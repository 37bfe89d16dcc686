//! RRSM CLI - Command-line interface for the RRSM sleep engine
//!
//! Commands:
//! - insight: Classify recent nights into one insight
//! - score: Compute the dashboard composite score
//! - validate: Report night rows that carry no usable metric
//! - doctor: Diagnose configuration and input readiness

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use rrsm_engine::adapter::{NightAdapter, NightRow};
use rrsm_engine::config::parse_utc_offset;
use rrsm_engine::pipeline::parse_request;
use rrsm_engine::types::ContextHints;
use rrsm_engine::{ComputeError, EngineConfig, InsightEngine, InsightRequest, ENGINE_VERSION};

/// RRSM - Sleep insights and scores from nightly logs
#[derive(Parser)]
#[command(name = "rrsm")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Turn nightly sleep logs into insights and scores", long_about = None)]
struct Cli {
    /// Log engine decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the most recent nights into one insight
    Insight {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: InputFormat,

        /// Request JSON file (days, primaryDriver, secondaryDriver, notes)
        #[arg(long)]
        request: Option<PathBuf>,

        /// Window in nights, clamped to 3-30
        #[arg(long)]
        days: Option<i64>,

        /// Primary driver hint
        #[arg(long)]
        primary_driver: Option<String>,

        /// Secondary driver hint
        #[arg(long)]
        secondary_driver: Option<String>,

        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,

        /// UTC offset for bedtimes (e.g. "+02:00")
        #[arg(long, env = "RRSM_UTC_OFFSET")]
        utc_offset: Option<String>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Compute the composite score over the most recent nights
    Score {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: InputFormat,

        /// Nights to score
        #[arg(long)]
        nights: Option<usize>,

        /// UTC offset for bedtimes (e.g. "+02:00")
        #[arg(long, env = "RRSM_UTC_OFFSET")]
        utc_offset: Option<String>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Report night rows that carry no usable metric
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and input readiness
    Doctor {
        /// Check that a nights file parses
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Detect from the first character
    Auto,
    /// JSON array of night rows
    Json,
    /// Newline-delimited JSON (one night per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), RrsmCliError> {
    match cli.command {
        Commands::Insight {
            input,
            input_format,
            request,
            days,
            primary_driver,
            secondary_driver,
            notes,
            utc_offset,
            output_format,
        } => {
            let mut insight_request = match request {
                Some(path) => parse_request(&fs::read_to_string(path)?)?,
                None => InsightRequest::default(),
            };
            apply_overrides(
                &mut insight_request,
                days,
                primary_driver,
                secondary_driver,
                notes,
            );
            cmd_insight(
                &input,
                input_format,
                &insight_request,
                utc_offset.as_deref(),
                output_format,
            )
        }

        Commands::Score {
            input,
            input_format,
            nights,
            utc_offset,
            output_format,
        } => cmd_score(
            &input,
            input_format,
            nights,
            utc_offset.as_deref(),
            output_format,
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { input, json } => cmd_doctor(input.as_deref(), json),
    }
}

/// Command-line flags win over the request file
fn apply_overrides(
    request: &mut InsightRequest,
    days: Option<i64>,
    primary_driver: Option<String>,
    secondary_driver: Option<String>,
    notes: Option<String>,
) {
    if days.is_some() {
        request.days = days;
    }
    let context: &mut ContextHints = &mut request.context;
    if let Some(value) = primary_driver {
        context.primary_driver = value;
    }
    if let Some(value) = secondary_driver {
        context.secondary_driver = value;
    }
    if let Some(value) = notes {
        context.notes = value;
    }
}

fn cmd_insight(
    input: &Path,
    input_format: InputFormat,
    request: &InsightRequest,
    utc_offset: Option<&str>,
    output_format: OutputFormat,
) -> Result<(), RrsmCliError> {
    let engine = build_engine(utc_offset)?;
    let rows = read_rows(input, input_format)?;
    let observations = NightAdapter::to_observations(&rows, engine.config().utc_offset);

    let response = engine.insights(&observations, request);
    info!(
        nights = response.window.count,
        days = response.window.days,
        "insight ready"
    );

    println!("{}", format_output(&response, &output_format)?);
    Ok(())
}

fn cmd_score(
    input: &Path,
    input_format: InputFormat,
    nights: Option<usize>,
    utc_offset: Option<&str>,
    output_format: OutputFormat,
) -> Result<(), RrsmCliError> {
    let engine = build_engine(utc_offset)?;
    let rows = read_rows(input, input_format)?;
    let observations = NightAdapter::to_observations(&rows, engine.config().utc_offset);

    let dashboard = engine.dashboard(&observations, nights)?;
    println!("{}", format_output(&dashboard, &output_format)?);
    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), RrsmCliError> {
    let rows = read_rows(input, input_format)?;
    let issues = NightAdapter::validate_rows(&rows);

    let report = ValidationReport {
        total_rows: rows.len(),
        usable_rows: rows.len() - issues.len(),
        flagged_rows: issues.len(),
        issues: issues
            .into_iter()
            .map(|issue| ValidationIssueDetail {
                index: issue.index,
                row_id: issue.row_id,
                problem: issue.problem,
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total rows:   {}", report.total_rows);
        println!("Usable rows:  {}", report.usable_rows);
        println!("Flagged rows: {}", report.flagged_rows);

        if !report.issues.is_empty() {
            println!("\nIssues:");
            for issue in &report.issues {
                println!(
                    "  - Row {} (index {}): {}",
                    issue.row_id.as_deref().unwrap_or("unknown"),
                    issue.index,
                    issue.problem
                );
            }
        }
    }

    if report.flagged_rows > 0 {
        Err(RrsmCliError::ValidationFailed(report.flagged_rows))
    } else {
        Ok(())
    }
}

fn cmd_doctor(input: Option<&Path>, json: bool) -> Result<(), RrsmCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("RRSM engine version {}", ENGINE_VERSION),
    });

    let config = EngineConfig::from_env();
    checks.push(DoctorCheck {
        name: "window".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "Insight window {} nights (allowed {}-{}), dashboard {} nights",
            config.default_window_days,
            config.min_window_days,
            config.max_window_days,
            config.dashboard_nights
        ),
    });

    checks.push(match std::env::var("RRSM_UTC_OFFSET") {
        Ok(raw) => match parse_utc_offset(&raw) {
            Ok(offset) => DoctorCheck {
                name: "utc_offset".to_string(),
                status: CheckStatus::Ok,
                message: format!("Bedtimes read at UTC{}", offset),
            },
            Err(e) => DoctorCheck {
                name: "utc_offset".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        },
        Err(_) => DoctorCheck {
            name: "utc_offset".to_string(),
            status: CheckStatus::Ok,
            message: "Bedtimes read at each row's own offset".to_string(),
        },
    });

    if let Some(path) = input {
        checks.push(check_input(path));
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass --input <file>)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (--input - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("RRSM Doctor Report");
        println!("==================");
        println!("Version: {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(RrsmCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_input(path: &Path) -> DoctorCheck {
    if !path.exists() {
        return DoctorCheck {
            name: "input".to_string(),
            status: CheckStatus::Warning,
            message: "Input file does not exist".to_string(),
        };
    }

    let parsed = fs::read_to_string(path)
        .map_err(|e| format!("Cannot read input file: {}", e))
        .and_then(|content| NightAdapter::parse(&content).map_err(|e| e.to_string()));

    match parsed {
        Ok(rows) if rows.is_empty() => DoctorCheck {
            name: "input".to_string(),
            status: CheckStatus::Warning,
            message: "Input file has no night rows".to_string(),
        },
        Ok(rows) => {
            let flagged = NightAdapter::validate_rows(&rows).len();
            DoctorCheck {
                name: "input".to_string(),
                status: if flagged > 0 {
                    CheckStatus::Warning
                } else {
                    CheckStatus::Ok
                },
                message: format!("{} night rows, {} flagged", rows.len(), flagged),
            }
        }
        Err(message) => DoctorCheck {
            name: "input".to_string(),
            status: CheckStatus::Error,
            message,
        },
    }
}

// Helper functions

fn build_engine(utc_offset: Option<&str>) -> Result<InsightEngine, RrsmCliError> {
    let mut config = EngineConfig::from_env();
    if let Some(raw) = utc_offset {
        config = config.with_utc_offset(parse_utc_offset(raw)?);
    }
    debug!(?config, "engine config");
    Ok(InsightEngine::with_config(config))
}

fn read_rows(input: &Path, input_format: InputFormat) -> Result<Vec<NightRow>, RrsmCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let rows = match input_format {
        InputFormat::Auto => NightAdapter::parse(&input_data)?,
        InputFormat::Json => NightAdapter::parse_array(&input_data)?,
        InputFormat::Ndjson => NightAdapter::parse_ndjson(&input_data)?,
    };
    debug!(rows = rows.len(), "read night rows");
    Ok(rows)
}

fn format_output<T: Serialize>(value: &T, format: &OutputFormat) -> Result<String, RrsmCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(value)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(value)?),
    }
}

// Error types

#[derive(Debug)]
enum RrsmCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for RrsmCliError {
    fn from(e: io::Error) -> Self {
        RrsmCliError::Io(e)
    }
}

impl From<ComputeError> for RrsmCliError {
    fn from(e: ComputeError) -> Self {
        RrsmCliError::Compute(e)
    }
}

impl From<serde_json::Error> for RrsmCliError {
    fn from(e: serde_json::Error) -> Self {
        RrsmCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<RrsmCliError> for CliError {
    fn from(e: RrsmCliError) -> Self {
        match e {
            RrsmCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            RrsmCliError::Compute(e @ ComputeError::InvalidOffset(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Use an offset like +02:00, -0530 or Z".to_string()),
            },
            RrsmCliError::Compute(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Input must be a JSON array or NDJSON of night objects".to_string()),
            },
            RrsmCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            RrsmCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} night rows flagged", count),
                hint: Some("Fix or drop the flagged rows and retry".to_string()),
            },
            RrsmCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct ValidationReport {
    total_rows: usize,
    usable_rows: usize,
    flagged_rows: usize,
    issues: Vec<ValidationIssueDetail>,
}

#[derive(Serialize)]
struct ValidationIssueDetail {
    index: usize,
    row_id: Option<String>,
    problem: String,
}

#[derive(Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
