use clap::{Parser, Subcommand};
use flagsim_core::diagnostics::{format_diagnostic, format_parse_error};
use flagsim_core::{analyze_scene, parse_scene, read_scene, run_scene, SimError};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flagsim")]
#[command(about = "FlagSim - cloth flag simulation driven by scene files", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides this.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scene and print its detector values
    Run {
        /// Path to the scene file
        file: PathBuf,
    },
    /// Parse and analyze a scene without running it
    Check {
        /// Path to the scene file
        file: PathBuf,
    },
    /// Re-run a scene every time the file changes
    Watch {
        /// Path to the scene file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match cli.command {
        Commands::Run { file } => run_file(&file),
        Commands::Check { file } => check_file(&file),
        Commands::Watch { file } => watch_file(&file),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_file(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = read_scene(file)?;
    let result = match run_scene(&source) {
        Ok(result) => result,
        Err(e) => return Err(render_error(e, &source).into()),
    };

    for warning in result.warnings.iter() {
        eprintln!("{}", format_diagnostic(warning, &source));
    }

    // Print detector results
    for detector in result.detectors {
        println!("{} = {}", detector.name, detector.value);
    }

    Ok(())
}

fn check_file(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = read_scene(file)?;
    let scene = parse_scene(&source).map_err(|e| format_parse_error(&e, &source))?;
    let diagnostics = analyze_scene(&scene);

    for diagnostic in diagnostics.iter() {
        eprintln!("{}", format_diagnostic(diagnostic, &source));
    }

    if diagnostics.has_errors() {
        return Err(format!("{} error(s) found", diagnostics.error_count()).into());
    }
    println!("{}: ok", file.display());
    Ok(())
}

fn watch_file(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let file = fs::canonicalize(file)?;
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res| {
        // The receiver only goes away when we are shutting down
        let _ = tx.send(res);
    })?;
    watcher.watch(&file, RecursiveMode::NonRecursive)?;
    info!(path = %file.display(), "watching scene");

    report_run(&file);
    for event in rx {
        match event {
            Ok(Event {
                kind: EventKind::Modify(_),
                paths,
                ..
            }) if paths.contains(&file) => {
                println!("--- {} changed ---", file.display());
                report_run(&file);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "file watcher error"),
        }
    }

    Ok(())
}

/// Run once and print the outcome without stopping the watch loop
fn report_run(file: &Path) {
    if let Err(e) = run_file(file) {
        eprintln!("Error: {}", e);
    }
}

fn render_error(error: SimError, source: &str) -> String {
    match error {
        SimError::Parse(e) => format_parse_error(&e, source),
        SimError::Analysis(diagnostics) => {
            let lines: Vec<String> = diagnostics
                .iter()
                .map(|d| format!("  {}", format_diagnostic(d, source)))
                .collect();
            format!(
                "scene has {} error(s):\n{}",
                diagnostics.error_count(),
                lines.join("\n")
            )
        }
        other => other.to_string(),
    }
}
