//! Insights CLI - Command-line interface for Sleep Insights
//!
//! Commands:
//! - analyze: Analyze a daily log and print the insights report
//! - validate: Report fields the analyzer will drop or distrust
//! - log: Record habits and sleep for a day, writing the log back
//! - metrics: List selectable metrics
//! - doctor: Diagnose configuration and input files

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use sleep_insights::encoder::{InsightsReport, ReportStatus};
use sleep_insights::journal::{default_entry_date, default_habits, DailyLog, SleepMetrics};
use sleep_insights::schema::{IssueSeverity, RawLog, RawLogAdapter};
use sleep_insights::{
    logging, AnalyzerConfig, HabitDefinition, InsightError, InsightsProcessor, Metric, TimeOfDay,
    INSIGHTS_VERSION, PRODUCER_NAME,
};

/// Insights - Correlate daily habits with sleep outcomes
#[derive(Parser)]
#[command(name = "insights")]
#[command(version = INSIGHTS_VERSION)]
#[command(about = "Rank habits by their impact on sleep metrics", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a daily log and print the insights report
    Analyze {
        /// Daily log JSON file (use - for stdin)
        #[arg(short, long)]
        log: PathBuf,

        /// Habit definitions JSON file (defaults to the seeded habits)
        #[arg(long)]
        habits: Option<PathBuf>,

        /// Metric to analyze
        #[arg(short, long, default_value = "sleepScore")]
        metric: String,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        format: OutputFormat,

        /// Analyzer config TOML file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Report fields the analyzer will drop or distrust
    Validate {
        /// Daily log JSON file (use - for stdin)
        #[arg(short, long)]
        log: PathBuf,

        /// Habit definitions JSON file (defaults to the seeded habits)
        #[arg(long)]
        habits: Option<PathBuf>,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record habits and sleep for a day, writing the log back
    Log {
        /// Daily log JSON file (created if missing)
        #[arg(short, long)]
        log: PathBuf,

        /// Habit definitions JSON file (defaults to the seeded habits)
        #[arg(long)]
        habits: Option<PathBuf>,

        /// Day to edit (YYYY-MM-DD, defaults to yesterday)
        #[arg(long)]
        date: Option<String>,

        /// Toggle a habit done/not done
        #[arg(long, value_name = "ID")]
        toggle: Vec<String>,

        /// Set a habit value
        #[arg(long, value_name = "ID=VALUE")]
        set: Vec<String>,

        /// Sleep score; required to record the night's metrics
        #[arg(long)]
        sleep_score: Option<f64>,

        #[arg(long)]
        duration_hours: Option<f64>,

        #[arg(long)]
        duration_minutes: Option<f64>,

        #[arg(long)]
        deep_hours: Option<f64>,

        #[arg(long)]
        deep_minutes: Option<f64>,

        #[arg(long)]
        body_battery: Option<f64>,

        #[arg(long)]
        hrv: Option<f64>,

        #[arg(long)]
        rhr: Option<f64>,

        /// Bedtime (HH:MM)
        #[arg(long)]
        bedtime: Option<String>,

        #[arg(long, default_value = "")]
        notes: String,
    },

    /// List selectable metrics
    Metrics,

    /// Diagnose configuration and input files
    Doctor {
        /// Check an analyzer config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a daily log file
        #[arg(long)]
        log: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Human-readable summary
    Text,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(logging::level_for_verbosity(cli.verbose));

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<(), InsightsCliError> {
    match command {
        Commands::Analyze {
            log,
            habits,
            metric,
            format,
            config,
        } => cmd_analyze(&log, habits.as_deref(), &metric, format, config.as_deref()),
        Commands::Validate { log, habits, json } => cmd_validate(&log, habits.as_deref(), json),
        Commands::Log {
            log,
            habits,
            date,
            toggle,
            set,
            sleep_score,
            duration_hours,
            duration_minutes,
            deep_hours,
            deep_minutes,
            body_battery,
            hrv,
            rhr,
            bedtime,
            notes,
        } => {
            let bedtime = bedtime
                .map(|b| {
                    TimeOfDay::parse(&b)
                        .ok_or_else(|| InsightsCliError::Usage(format!("Invalid bedtime {b:?}, expected HH:MM")))
                })
                .transpose()?;
            let sleep = sleep_score.map(|sleep_score| SleepMetrics {
                sleep_score,
                duration_hours,
                duration_minutes,
                deep_hours,
                deep_minutes,
                body_battery,
                hrv,
                rhr,
                bedtime,
                notes,
            });
            cmd_log(&log, habits.as_deref(), date.as_deref(), &toggle, &set, sleep)
        }
        Commands::Metrics => cmd_metrics(),
        Commands::Doctor { config, log, json } => cmd_doctor(config.as_deref(), log.as_deref(), json),
    }
}

fn read_input(path: &Path) -> Result<String, InsightsCliError> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

/// The log is rewritten in place, so it must name a real file
fn check_log_path(path: &Path) -> Result<(), InsightsCliError> {
    if path.as_os_str() == "-" {
        return Err(InsightsCliError::Usage(
            "'log' edits the log file in place; stdin ('-') is not accepted for --log".to_string(),
        ));
    }
    Ok(())
}

/// Habit definitions from a file, falling back to the seeded set when none are defined
fn load_habits(path: Option<&Path>) -> Result<Vec<HabitDefinition>, InsightsCliError> {
    let habits = match path {
        Some(path) => RawLogAdapter::parse_habits(&read_input(path)?)?,
        None => Vec::new(),
    };
    if habits.is_empty() {
        tracing::info!("No habit definitions given, using the default habits");
        return Ok(default_habits());
    }
    Ok(habits)
}

fn cmd_analyze(
    log: &Path,
    habits: Option<&Path>,
    metric: &str,
    format: OutputFormat,
    config: Option<&Path>,
) -> Result<(), InsightsCliError> {
    let metric: Metric = metric.parse()?;
    let config = AnalyzerConfig::load_or_default(config)?;
    let habits = load_habits(habits)?;
    let raw = RawLogAdapter::parse_log(&read_input(log)?)?;
    let records = RawLogAdapter::to_records(&raw, &habits);

    let report = InsightsProcessor::with_config(config).report(&records, &habits, metric);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &InsightsReport) {
    println!("Sleep Insights: {}", report.metric.label);
    println!("==============");

    let summary = match (&report.status, &report.summary) {
        (ReportStatus::Ready, Some(summary)) => summary,
        _ => {
            println!("No data yet. Log a night with a sleep score to see insights.");
            return;
        }
    };

    println!("Entries:         {}", summary.entry_count);
    if let Some(avg) = &summary.recent_average_display {
        println!("7-day average:   {avg}");
    }
    if let Some(debt) = &summary.sleep_debt {
        println!("Sleep debt:      {}", debt.display);
    }
    match &summary.optimal_bedtime {
        Some(best) => println!(
            "Best bedtime:    {} (score {})",
            best.window, best.avg_sleep_score_display
        ),
        None => println!("Best bedtime:    not enough data"),
    }
    if let Some(top) = &summary.top_habit {
        println!("Top habit:       {} ({})", top.label, top.impact_display);
    }

    println!("\nHabits:");
    for row in &report.habits {
        let marker = if row.significant { "*" } else { " " };
        let detail = row.label_detail.as_deref().unwrap_or("");
        let impact = row.impact_display.as_deref().unwrap_or("n/a");
        println!(
            "  {marker} {:<32} {:>7}  {:?} (n={}) {detail}",
            row.label, impact, row.effect, row.present_count
        );
    }
}

fn cmd_validate(log: &Path, habits: Option<&Path>, json: bool) -> Result<(), InsightsCliError> {
    let habits = load_habits(habits)?;
    let raw = RawLogAdapter::parse_log(&read_input(log)?)?;
    let issues = RawLogAdapter::validate(&raw, &habits);

    let errors = issues
        .iter()
        .filter(|i| i.severity == IssueSeverity::Error)
        .count();
    let report = ValidationReport {
        total_days: raw.len(),
        warnings: issues.len() - errors,
        errors,
        issues,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Days:     {}", report.total_days);
        println!("Warnings: {}", report.warnings);
        println!("Errors:   {}", report.errors);

        if !report.issues.is_empty() {
            println!("\nIssues:");
            for issue in &report.issues {
                let icon = match issue.severity {
                    IssueSeverity::Warning => "[WARN]",
                    IssueSeverity::Error => "[ERR]",
                };
                println!("  {icon} {} {}: {}", issue.date, issue.field, issue.message);
            }
        }
    }

    if report.errors > 0 {
        Err(InsightsCliError::ValidationFailed(report.errors))
    } else {
        Ok(())
    }
}

fn cmd_log(
    log_path: &Path,
    habits: Option<&Path>,
    date: Option<&str>,
    toggle: &[String],
    set: &[String],
    sleep: Option<SleepMetrics>,
) -> Result<(), InsightsCliError> {
    check_log_path(log_path)?;
    let habits = load_habits(habits)?;
    let date = match date {
        Some(date) => RawLogAdapter::parse_date(date)?,
        None => default_entry_date(chrono::Local::now().date_naive()),
    };

    let mut raw: RawLog = if log_path.exists() {
        RawLogAdapter::parse_log(&fs::read_to_string(log_path)?)?
    } else {
        RawLog::new()
    };
    let mut journal = DailyLog::from_raw(&raw, &habits);

    for id in toggle {
        let done = journal.toggle_habit(date, id);
        tracing::info!(%date, habit = %id, done, "Toggled habit");
    }

    for assignment in set {
        let (id, value) = assignment
            .split_once('=')
            .ok_or_else(|| InsightsCliError::Usage(format!("Expected ID=VALUE, got {assignment:?}")))?;
        let habit = habits
            .iter()
            .find(|h| h.id == id)
            .ok_or_else(|| InsightsCliError::Usage(format!("Unknown habit {id:?}")))?;
        let stored = journal.set_habit_input(date, habit, value)?;
        tracing::info!(%date, habit = %id, value = ?stored, "Set habit value");
    }

    if let Some(sleep) = sleep {
        journal.record_sleep(date, sleep);
    }

    journal.ensure_day(date);
    journal.merge_day_into(date, &mut raw);
    fs::write(log_path, serde_json::to_string_pretty(&raw)?)?;

    println!(
        "{}: {:.0}% of habits done",
        date.format("%Y-%m-%d"),
        journal.consistency(date, &habits)
    );
    Ok(())
}

fn cmd_metrics() -> Result<(), InsightsCliError> {
    println!("{:<12} {:<14} {:<5} Better", "Key", "Label", "Unit");
    for metric in Metric::ALL {
        println!(
            "{:<12} {:<14} {:<5} {}",
            metric.key(),
            metric.label(),
            metric.unit(),
            if metric.inverse() { "lower" } else { "higher" }
        );
    }
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, log: Option<&Path>, json: bool) -> Result<(), InsightsCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "insights_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Sleep Insights version {INSIGHTS_VERSION}"),
    });

    if let Some(config_path) = config {
        let check = match AnalyzerConfig::load(config_path) {
            Ok(config) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid (min sample {}, window {} days)",
                    config.min_sample_size, config.recent_window_days
                ),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        };
        checks.push(check);
    }

    if let Some(log_path) = log {
        let check = if !log_path.exists() {
            DoctorCheck {
                name: "log".to_string(),
                status: CheckStatus::Warning,
                message: "Log file does not exist".to_string(),
            }
        } else {
            match fs::read_to_string(log_path)
                .map_err(InsightError::from)
                .and_then(|content| RawLogAdapter::parse_log(&content))
            {
                Ok(raw) => {
                    let scored = RawLogAdapter::to_records(&raw, &[])
                        .iter()
                        .filter(|r| r.is_eligible())
                        .count();
                    DoctorCheck {
                        name: "log".to_string(),
                        status: if scored > 0 { CheckStatus::Ok } else { CheckStatus::Warning },
                        message: format!("Log readable ({} days, {} with a sleep score)", raw.len(), scored),
                    }
                }
                Err(e) => DoctorCheck {
                    name: "log".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read log: {e}"),
                },
            }
        };
        checks.push(check);
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (--log - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: INSIGHTS_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Insights Doctor Report");
        println!("======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(InsightsCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error handling

enum InsightsCliError {
    Io(io::Error),
    Insight(InsightError),
    Json(serde_json::Error),
    Usage(String),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for InsightsCliError {
    fn from(e: io::Error) -> Self {
        InsightsCliError::Io(e)
    }
}

impl From<InsightError> for InsightsCliError {
    fn from(e: InsightError) -> Self {
        match e {
            InsightError::Io(e) => InsightsCliError::Io(e),
            other => InsightsCliError::Insight(other),
        }
    }
}

impl From<serde_json::Error> for InsightsCliError {
    fn from(e: serde_json::Error) -> Self {
        InsightsCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<InsightsCliError> for CliError {
    fn from(e: InsightsCliError) -> Self {
        match e {
            InsightsCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            InsightsCliError::Insight(e) => {
                let (code, hint) = match &e {
                    InsightError::UnknownMetric(_) => ("UNKNOWN_METRIC", "Run 'insights metrics' for valid keys"),
                    InsightError::InvalidConfig(_) | InsightError::TomlError(_) => {
                        ("CONFIG_ERROR", "Run 'insights doctor --config <file>' for details")
                    }
                    InsightError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
                    InsightError::DateParseError(_) => ("DATE_ERROR", "Dates use YYYY-MM-DD"),
                    InsightError::InvalidHabitValue(_) => ("HABIT_VALUE_ERROR", "Check the habit's declared type"),
                    _ => ("PARSE_ERROR", "Check input format"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            InsightsCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            InsightsCliError::Usage(msg) => CliError {
                code: "USAGE_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'insights help' for usage".to_string()),
            },
            InsightsCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{count} fields will be dropped by ingestion"),
                hint: Some("Fix the reported fields and retry".to_string()),
            },
            InsightsCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_days: usize,
    warnings: usize,
    errors: usize,
    issues: Vec<sleep_insights::ValidationIssue>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
