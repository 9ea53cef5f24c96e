//! Focus CLI - Command-line interface for Synheart Focus
//!
//! Commands:
//! - features: Extract HRV features from beat intervals
//! - replay: Drive the signal pipeline from recorded heart-rate samples
//! - config: Print the default engine configuration
//! - doctor: Diagnose configuration and baseline files

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use synheart_focus::artifact::ArtifactFilter;
use synheart_focus::baseline::SubjectBaseline;
use synheart_focus::features;
use synheart_focus::{FeatureSchema, FocusConfig, FocusError, Sample, SignalPipeline};
use synheart_focus::{FOCUS_VERSION, PRODUCER_NAME};

/// Focus - On-device cognitive focus estimation from heart rate
#[derive(Parser)]
#[command(name = "focus")]
#[command(author = "Synheart AI Inc")]
#[command(version = FOCUS_VERSION)]
#[command(about = "Turn heart-rate streams into HRV features and focus context", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract HRV features from beat intervals (ms)
    Features {
        /// Input file path (use - for stdin); JSON array or whitespace separated
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Extract the 6-feature legacy schema
        #[arg(long)]
        legacy: bool,

        /// Motion magnitude (g) used for the quality score
        #[arg(long, default_value = "0.0")]
        motion: f64,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },

    /// Replay NDJSON heart-rate samples through the signal pipeline
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Extract the 6-feature legacy schema
        #[arg(long)]
        legacy: bool,

        /// Load baselines from file
        #[arg(long)]
        load_baselines: Option<PathBuf>,

        /// Save baselines to file after processing
        #[arg(long)]
        save_baselines: Option<PathBuf>,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Print the default engine configuration
    Config,

    /// Diagnose configuration and baseline files
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a baselines file
        #[arg(long)]
        baselines: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

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

fn run(cli: Cli) -> Result<(), FocusCliError> {
    match cli.command {
        Commands::Features {
            input,
            legacy,
            motion,
            pretty,
        } => cmd_features(&input, legacy, motion, pretty),
        Commands::Replay {
            input,
            config,
            legacy,
            load_baselines,
            save_baselines,
            flush,
        } => cmd_replay(
            &input,
            config.as_deref(),
            legacy,
            load_baselines.as_deref(),
            save_baselines.as_deref(),
            flush,
        ),
        Commands::Config => {
            println!("{}", FocusConfig::default().to_json()?);
            Ok(())
        }
        Commands::Doctor {
            config,
            baselines,
            json,
        } => cmd_doctor(config.as_deref(), baselines.as_deref(), json),
    }
}

fn read_input(input: &Path) -> Result<String, FocusCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn schema_for(legacy: bool) -> FeatureSchema {
    if legacy {
        FeatureSchema::Legacy6
    } else {
        FeatureSchema::Hrv24
    }
}

fn parse_intervals(data: &str) -> Result<Vec<f64>, FocusCliError> {
    let trimmed = data.trim();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    trimmed
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| FocusCliError::ParseError(format!("Invalid interval '{}'", t)))
        })
        .collect()
}

#[derive(serde::Serialize)]
struct FeatureReport {
    schema: FeatureSchema,
    intervals: usize,
    valid_intervals: usize,
    quality_score: f64,
    features: std::collections::BTreeMap<String, f64>,
}

fn cmd_features(
    input: &Path,
    legacy: bool,
    motion: f64,
    pretty: bool,
) -> Result<(), FocusCliError> {
    let intervals = parse_intervals(&read_input(input)?)?;
    if intervals.is_empty() {
        return Err(FocusCliError::NoIntervals);
    }

    let config = FocusConfig::default();
    let filter = ArtifactFilter::default();
    let kept = filter.filter(&intervals, motion, config.motion_threshold_g);
    if kept.len() < intervals.len() {
        warn!(
            rejected = intervals.len() - kept.len(),
            "intervals rejected as artifacts"
        );
    }

    let vector = features::extract(schema_for(legacy), &kept)?;
    let report = FeatureReport {
        schema: vector.schema,
        intervals: intervals.len(),
        valid_intervals: kept.len(),
        quality_score: filter.quality_score(&intervals, motion, config.motion_threshold_g),
        features: vector.to_map(),
    };

    let output = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", output);
    Ok(())
}

fn cmd_replay(
    input: &Path,
    config: Option<&Path>,
    legacy: bool,
    load_baselines: Option<&Path>,
    save_baselines: Option<&Path>,
    flush: bool,
) -> Result<(), FocusCliError> {
    let config = match config {
        Some(path) => FocusConfig::from_json(&fs::read_to_string(path)?)?,
        None => FocusConfig::default(),
    };
    let mut pipeline = SignalPipeline::new(config, schema_for(legacy))?;

    if let Some(baselines_path) = load_baselines {
        let baselines_json = fs::read_to_string(baselines_path)?;
        pipeline.baseline_mut().load_json(&baselines_json)?;
    }

    let reader: Box<dyn BufRead> = if input.to_string_lossy() == "-" {
        Box::new(io::BufReader::new(io::stdin()))
    } else {
        Box::new(io::BufReader::new(fs::File::open(input)?))
    };
    let mut stdout = io::stdout();
    let mut samples = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let sample: Sample = serde_json::from_str(line).map_err(|e| {
            FocusCliError::ParseError(format!(
                "Failed to parse sample on line {}: {}",
                index + 1,
                e
            ))
        })?;
        samples += 1;

        let cycle = match pipeline.push(sample) {
            Ok(Some(cycle)) => cycle,
            Ok(None) => continue,
            Err(FocusError::InvalidInput(reason)) => {
                warn!(line = index + 1, %reason, "dropping sample");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        pipeline.commit(&cycle);
        writeln!(stdout, "{}", serde_json::to_string(&cycle)?)?;
        if flush {
            stdout.flush()?;
        }
    }

    if samples == 0 {
        return Err(FocusCliError::NoSamples);
    }

    if let Some(baselines_path) = save_baselines {
        fs::write(baselines_path, pipeline.baseline().to_json()?)?;
    }

    Ok(())
}

fn cmd_doctor(
    config: Option<&Path>,
    baselines: Option<&Path>,
    json: bool,
) -> Result<(), FocusCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "focus_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Focus version {}", FOCUS_VERSION),
    });

    checks.push(DoctorCheck {
        name: "feature_schemas".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "HRV schema: {} features, legacy schema: {} features",
            FeatureSchema::Hrv24.len(),
            FeatureSchema::Legacy6.len()
        ),
    });

    if let Some(config_path) = config {
        checks.push(check_file("config", config_path, |content| {
            let config = FocusConfig::from_json(content)?;
            Ok(format!(
                "Config valid (window {}s, hop {}s)",
                config.window_duration_secs, config.hop_duration_secs
            ))
        }));
    }

    if let Some(baselines_path) = baselines {
        checks.push(check_file("baselines", baselines_path, |content| {
            let mut baseline = SubjectBaseline::default();
            baseline.load_json(content)?;
            Ok(format!(
                "Baselines valid (HR {:?}, {} samples; HRV {:?}, {} samples)",
                baseline.hr.state(),
                baseline.hr.sample_count(),
                baseline.hrv.state(),
                baseline.hrv.sample_count()
            ))
        }));
    }

    // Check stdin is available (for replay from a pipe)
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
            message: "stdin is a pipe (replay ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FOCUS_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Focus Doctor Report");
        println!("===================");
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
        Err(FocusCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_file<F>(name: &str, path: &Path, validate: F) -> DoctorCheck
where
    F: FnOnce(&str) -> Result<String, FocusError>,
{
    if !path.exists() {
        return DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: format!("{} does not exist", path.display()),
        };
    }

    let (status, message) = match fs::read_to_string(path) {
        Ok(content) => match validate(&content) {
            Ok(message) => (CheckStatus::Ok, message),
            Err(e) => (CheckStatus::Error, e.to_string()),
        },
        Err(e) => (CheckStatus::Error, format!("Cannot read file: {}", e)),
    };
    DoctorCheck {
        name: name.to_string(),
        status,
        message,
    }
}

// Error types

#[derive(Debug)]
enum FocusCliError {
    Io(io::Error),
    Focus(FocusError),
    Json(serde_json::Error),
    NoIntervals,
    NoSamples,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for FocusCliError {
    fn from(e: io::Error) -> Self {
        FocusCliError::Io(e)
    }
}

impl From<FocusError> for FocusCliError {
    fn from(e: FocusError) -> Self {
        FocusCliError::Focus(e)
    }
}

impl From<serde_json::Error> for FocusCliError {
    fn from(e: serde_json::Error) -> Self {
        FocusCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FocusCliError> for CliError {
    fn from(e: FocusCliError) -> Self {
        match e {
            FocusCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FocusCliError::Focus(FocusError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'focus config' for a valid starting point".to_string()),
            },
            FocusCliError::Focus(FocusError::InsufficientData(msg)) => CliError {
                code: "INSUFFICIENT_DATA".to_string(),
                message: msg,
                hint: Some("Provide more beat intervals".to_string()),
            },
            FocusCliError::Focus(e) => CliError {
                code: "FOCUS_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            FocusCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            FocusCliError::NoIntervals => CliError {
                code: "NO_INTERVALS".to_string(),
                message: "No beat intervals found in input".to_string(),
                hint: Some("Ensure input is not empty".to_string()),
            },
            FocusCliError::NoSamples => CliError {
                code: "NO_SAMPLES".to_string(),
                message: "No heart-rate samples found in input".to_string(),
                hint: Some(
                    "Provide one {\"timestamp\": ..., \"heart_rate_bpm\": ...} object per line"
                        .to_string(),
                ),
            },
            FocusCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            FocusCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

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
