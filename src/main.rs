//! Stepflow CLI Entry Point
//!
//! Provides command-line interface for workflow execution.
//!
//! # Usage
//!
//! ```bash
//! # Execute a workflow
//! stepflow burn_in.json
//!
//! # Check a workflow without running it
//! stepflow burn_in.yaml --validate
//!
//! # Run only step 3 and write statuses back to the file
//! stepflow burn_in.json --step 3 --save
//!
//! # Print a Gantt chart after the run
//! stepflow burn_in.json --timeline
//! ```

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use log::{error, info, warn};
use tokio::sync::broadcast::error::RecvError;

use stepflow::execution::{Engine, EngineEvent, RunReport, StepOutcome};
use stepflow::monitoring::ExecutionTimeline;
use stepflow::steps::builtin_registry;
use stepflow::variables::InMemoryVariableStore;
use stepflow::workflow::{
    load_workflow_file, save_workflow_file, validate_workflow, StepStatus, Workflow,
    WorkflowDocument,
};
use stepflow::{APP_NAME, VERSION};

/// Default workflow file used when none is specified.
const DEFAULT_WORKFLOW: &str = "workflow.json";

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    workflow_path: String,
    validate_only: bool,
    /// 1-based step number for single-step mode
    single_step: Option<usize>,
    save: bool,
    timeline: bool,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workflow_path: DEFAULT_WORKFLOW.to_string(),
            validate_only: false,
            single_step: None,
            save: false,
            timeline: false,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Sequential Workflow Stepper");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: stepflow [OPTIONS] <WORKFLOW_FILE>");
    println!();
    println!("Arguments:");
    println!("  <WORKFLOW_FILE>     Path to a workflow document (.json, .yaml, .yml)");
    println!();
    println!("Options:");
    println!("  --validate          Check the workflow without running it");
    println!("  --step N            Run only step N (1-based)");
    println!("  --save              Write step statuses back to the workflow file");
    println!("  --timeline          Print an execution timeline after the run");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  stepflow burn_in.json");
    println!("  stepflow burn_in.yaml --validate");
    println!("  stepflow burn_in.json --step 3 --save");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional_seen = false;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--validate" => config.validate_only = true,
            "--save" => config.save = true,
            "--timeline" => config.timeline = true,
            "--verbose" | "-v" => config.verbose = true,
            "--step" => {
                i += 1;
                if i >= args.len() {
                    return Err("--step requires a step number".to_string());
                }
                let number: usize = args[i]
                    .parse()
                    .map_err(|_| format!("Invalid step number: {}", args[i]))?;
                if number == 0 {
                    return Err("Step numbers start at 1".to_string());
                }
                config.single_step = Some(number);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if positional_seen {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.workflow_path = arg.clone();
                positional_seen = true;
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Prints the outcome of a full run.
fn print_report(report: &RunReport, workflow: &Workflow) {
    println!();
    println!("{}", "Run report".bold());
    for entry in &report.outcomes {
        let marker = if entry.skipped {
            "SKIP".yellow()
        } else if entry.success {
            " OK ".green()
        } else {
            "FAIL".red()
        };
        println!(
            "  [{}] {:>3} {:<14} {} ({:.2?})",
            marker,
            entry.index + 1,
            entry.name,
            entry.message,
            entry.duration
        );
    }

    let pending = workflow
        .steps()
        .iter()
        .filter(|s| s.status() == StepStatus::Pending)
        .count();

    println!();
    println!(
        "  Steps: {} total, {} completed, {} skipped, {} not run",
        report.total_steps,
        report.completed_steps,
        report.skipped_steps(),
        pending
    );
    println!("  Duration: {:.2?}", report.duration);

    let summary = if report.success {
        report.message.green().bold()
    } else if report.cancelled {
        report.message.yellow().bold()
    } else {
        report.message.red().bold()
    };
    println!("  {}", summary);
}

/// Prints the outcome of a single-step run.
fn print_single(number: usize, step_type: &str, outcome: &StepOutcome) {
    let marker = if outcome.success {
        " OK ".green()
    } else {
        "FAIL".red()
    };
    println!();
    println!(
        "  [{}] {:>3} {:<14} {} ({:.2?})",
        marker, number, step_type, outcome.message, outcome.duration
    );
    if let Some(detail) = &outcome.error {
        println!("        {}", detail.dimmed());
    }
}

/// Collects engine events into a timeline until the engine is dropped.
fn spawn_timeline(engine: &Engine) -> tokio::task::JoinHandle<ExecutionTimeline> {
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        let mut timeline = ExecutionTimeline::new();
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let EngineEvent::Progress {
                        current,
                        total,
                        label,
                    } = &event
                    {
                        log::debug!("Progress {}/{}: {}", current, total, label);
                    }
                    timeline.record(&event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Timeline missed {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        timeline
    })
}

/// Main application entry point. Returns whether the run succeeded.
async fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);
    print_banner();

    // Load workflow
    info!("Loading workflow: {}", config.workflow_path);
    let document = load_workflow_file(&config.workflow_path).map_err(|e| {
        error!("Failed to load workflow: {}", e);
        format!(
            "Could not load workflow from '{}': {}",
            config.workflow_path, e
        )
    })?;
    let mut workflow = document.to_workflow()?;
    let variables = InMemoryVariableStore::from_records(&document.variables)?;

    info!(
        "Workflow loaded: {} ({} steps, {} variables)",
        workflow.classification,
        workflow.len(),
        document.variables.len()
    );

    let registry = Arc::new(builtin_registry());

    if config.validate_only {
        let issues = validate_workflow(&workflow, &registry);
        if issues.is_empty() {
            println!("{}", "Workflow is valid".green().bold());
            return Ok(true);
        }
        for issue in &issues {
            println!("  {} {}", "-".red(), issue);
        }
        println!("{}", format!("{} issue(s) found", issues.len()).red().bold());
        return Ok(false);
    }

    let engine = Arc::new(Engine::new(registry, Arc::new(variables)));
    let timeline_task = config.timeline.then(|| spawn_timeline(&engine));

    // Ctrl-C requests a cooperative stop
    let stopper = Arc::clone(&engine);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received");
            stopper.stop();
        }
    });

    let success = match config.single_step {
        Some(number) => {
            let outcome = engine.execute_single_step(&mut workflow, number - 1).await?;
            let step_type = workflow
                .get_step(number - 1)
                .map(|s| s.step_type.clone())
                .unwrap_or_default();
            print_single(number, &step_type, &outcome);
            outcome.success
        }
        None => {
            let report = engine.execute_workflow(&mut workflow).await?;
            print_report(&report, &workflow);
            report.success
        }
    };

    ctrl_c.abort();
    let _ = ctrl_c.await;
    drop(engine);

    if let Some(task) = timeline_task {
        let timeline = task.await?;
        println!("{}", timeline.gantt_chart());
    }

    if config.save {
        let updated = WorkflowDocument::from_workflow(
            &workflow,
            document.metadata.project.clone(),
            document.variables.clone(),
        );
        save_workflow_file(&updated, &config.workflow_path)?;
        info!("Statuses saved to {}", config.workflow_path);
    }

    Ok(success)
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
