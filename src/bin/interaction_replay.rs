//! Interaction replay CLI - Command-line interface for Synheart Interaction
//!
//! Commands:
//! - replay: Drive a session from a recorded raw interaction file
//! - validate: Validate raw interaction schema
//! - config: Print or check engine configuration
//! - doctor: Diagnose environment and configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::cell::RefCell;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use synheart_interaction::clock::ManualClock;
use synheart_interaction::scheduler::ManualScheduler;
use synheart_interaction::schema::{RawEvent, RawEventReader, SCHEMA_VERSION};
use synheart_interaction::{
    InMemoryCaptureSource, ParticipantBehavior, TelemetryConfig, TelemetryError,
    TelemetrySession, PRODUCER_NAME, TELEMETRY_VERSION,
};

/// Interaction replay - Offline driver for the interaction telemetry engine
#[derive(Parser)]
#[command(name = "interaction-replay")]
#[command(author = "Synheart AI Inc")]
#[command(version = TELEMETRY_VERSION)]
#[command(about = "Replay recorded UI interactions into behavior snapshots", long_about = None)]
struct Cli {
    /// Log filter (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recording through a session and emit its snapshots
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Engine configuration JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Session ID reported in snapshots
        #[arg(long, default_value = "replay")]
        session_id: String,

        /// Participant ID reported in snapshots
        #[arg(long, default_value = "unknown")]
        participant_id: String,

        /// Write the final export document to this file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Validate raw interaction schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration, or check a configuration file
    Config {
        /// Configuration file to check
        #[arg(long)]
        check: Option<PathBuf>,
    },

    /// Diagnose environment and configuration
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one snapshot per line)
    Ndjson,
    /// JSON array of snapshots
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so snapshots can be piped from stdout
fn init_tracing(log_level: Option<&str>) {
    let env_filter = match log_level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}

fn run(cli: Cli) -> Result<(), ReplayCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            config,
            session_id,
            participant_id,
            export,
        } => cmd_replay(
            &input,
            &output,
            input_format,
            output_format,
            config.as_deref(),
            &session_id,
            &participant_id,
            export.as_deref(),
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Config { check } => cmd_config(check.as_deref()),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
    session_id: &str,
    participant_id: &str,
    export: Option<&Path>,
) -> Result<(), ReplayCliError> {
    let events = read_events(input, input_format)?;
    if events.is_empty() {
        return Err(ReplayCliError::NoEvents);
    }

    let failures = RawEventReader::validate_events(&events);
    if !failures.is_empty() {
        return Err(ReplayCliError::ValidationFailed(failures.len()));
    }

    let config = match config {
        Some(path) => TelemetryConfig::from_json(&fs::read_to_string(path)?)?,
        None => TelemetryConfig::default(),
    };

    // Replay runs on virtual time anchored at the first offset
    let origin = events.first().and_then(|e| e.at_ms).unwrap_or(0);
    let scheduler = ManualScheduler::new(ManualClock::new(origin));
    let source = InMemoryCaptureSource::new();
    let snapshots: Rc<RefCell<Vec<ParticipantBehavior>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&snapshots);

    let mut session = TelemetrySession::builder(session_id, participant_id)
        .config(config)
        .capture_source(source.clone())
        .scheduler(scheduler.clone())
        .clock(scheduler.clock())
        .observer(move |snapshot| sink.borrow_mut().push(snapshot))
        .build()?;

    session.start();
    let mut delivered = 0;
    for event in &events {
        scheduler.advance_to(event.at_ms.unwrap_or(origin));
        if source.dispatch(event) > 0 {
            delivered += 1;
        }
    }
    session.stop();

    info!(
        events = events.len(),
        delivered,
        snapshots = snapshots.borrow().len(),
        duration_ms = session.session_duration_ms(),
        "replay complete"
    );

    if let Some(export_path) = export {
        fs::write(export_path, session.export().to_json()?)?;
    }

    let output_data = format_output(&snapshots.borrow(), &output_format)?;
    write_output(output, &output_data)
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), ReplayCliError> {
    let events = read_events(input, input_format)?;
    let results = RawEventReader::validate_events(&events);

    // One event can fail more than one check
    let mut invalid_indices: Vec<usize> = results.iter().map(|r| r.index).collect();
    invalid_indices.dedup();

    let report = ValidationReport {
        schema_version: SCHEMA_VERSION.to_string(),
        total_events: events.len(),
        valid_events: events.len() - invalid_indices.len(),
        invalid_events: invalid_indices.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                event_type: r.event_type.clone(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Schema:         {}", report.schema_version);
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                let event_type = if err.event_type.is_empty() { "<missing>" } else { &err.event_type };
                println!("  - Event {} (index {}): {}", event_type, err.index, err.error);
            }
        }
    }

    if report.invalid_events > 0 {
        Err(ReplayCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_config(check: Option<&Path>) -> Result<(), ReplayCliError> {
    let config = match check {
        Some(path) => TelemetryConfig::from_json(&fs::read_to_string(path)?)?,
        None => TelemetryConfig::default(),
    };
    println!("{}", config.to_json()?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), ReplayCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} version {}", PRODUCER_NAME, TELEMETRY_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    if let Some(config_path) = config {
        let check = if !config_path.exists() {
            DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Configuration file does not exist".to_string(),
            }
        } else {
            match fs::read_to_string(config_path) {
                Ok(content) => match TelemetryConfig::from_json(&content) {
                    Ok(parsed) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Configuration valid (snapshot every {} ms, buffer {} events)",
                            parsed.snapshot_interval_ms, parsed.buffer.capacity
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: e.to_string(),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read configuration file: {}", e),
                },
            }
        };
        checks.push(check);
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass recordings with --input)".to_string(),
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
        producer: PRODUCER_NAME.to_string(),
        version: TELEMETRY_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Interaction Replay Doctor Report");
        println!("================================");
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
        Err(ReplayCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_events(input: &Path, input_format: InputFormat) -> Result<Vec<RawEvent>, ReplayCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let events = match input_format {
        InputFormat::Ndjson => RawEventReader::parse_ndjson(&input_data)?,
        InputFormat::Json => RawEventReader::parse_array(&input_data)?,
    };
    Ok(events)
}

fn write_output(output: &Path, data: &str) -> Result<(), ReplayCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn format_output(snapshots: &[ParticipantBehavior], format: &OutputFormat) -> Result<String, ReplayCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for snapshot in snapshots {
                lines.push(serde_json::to_string(snapshot)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(snapshots)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(snapshots)?),
    }
}

// Error types

#[derive(Debug)]
enum ReplayCliError {
    Io(io::Error),
    Engine(TelemetryError),
    Json(serde_json::Error),
    NoEvents,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for ReplayCliError {
    fn from(e: io::Error) -> Self {
        ReplayCliError::Io(e)
    }
}

impl From<TelemetryError> for ReplayCliError {
    fn from(e: TelemetryError) -> Self {
        ReplayCliError::Engine(e)
    }
}

impl From<serde_json::Error> for ReplayCliError {
    fn from(e: serde_json::Error) -> Self {
        ReplayCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ReplayCliError> for CliError {
    fn from(e: ReplayCliError) -> Self {
        match e {
            ReplayCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ReplayCliError::Engine(e) => {
                let (code, hint) = match &e {
                    TelemetryError::ParseError(_) | TelemetryError::JsonError(_) => (
                        "PARSE_ERROR",
                        "Ensure input matches the ui.raw_interaction.v1 schema",
                    ),
                    TelemetryError::InvalidConfig(_) => (
                        "CONFIG_ERROR",
                        "Run 'interaction-replay config' for a valid starting point",
                    ),
                    TelemetryError::ExportError(_) => ("EXPORT_ERROR", "Check the export path"),
                    _ => ("ENGINE_ERROR", "Re-run with --log-level debug for details"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            ReplayCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ReplayCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            ReplayCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Run 'interaction-replay validate' for details".to_string()),
            },
            ReplayCliError::DoctorFailed => CliError {
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
    schema_version: String,
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    event_type: String,
    error: String,
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
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
