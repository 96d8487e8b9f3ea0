//! # CDICALC CLI Application
//!
//! Line-oriented front end of the calculator. Without arguments it runs an
//! interactive prompt; with `--set` or `--json` it applies the edits, prints
//! the form and exits.
//!
//! ```text
//! cdicalc --set xray_energy=10keV --set crystal_size=250nm --json
//! cdicalc --config id01.json -v
//! ```

mod commands;

use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use cdicalc_core::{EngineSettings, Session};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use commands::Reply;

/// CDICALC - coherent X-ray diffraction experiment calculator
#[derive(Parser, Debug)]
#[command(name = "cdicalc")]
#[command(version)]
#[command(about = "Compute sampling, geometry and coherence parameters for CDI experiments")]
struct Cli {
    /// Config file to load before anything else
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Edit a field, e.g. --set crystal_size="250 nm" (repeatable, applied in order)
    #[arg(short, long = "set", value_name = "FIELD=TEXT")]
    set: Vec<String>,

    /// Print the form as JSON and exit
    #[arg(long)]
    json: bool,

    /// Blank results of a division by zero instead of showing ERROR
    #[arg(long)]
    zero_as_empty: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Also write debug logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(cli: &Cli) -> Result<()> {
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_writer(io::stderr)
        .with_filter(filter);

    let file_layer = match &cli.log_file {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(EnvFilter::new("debug")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry().with(stderr_layer).with(file_layer).init();
    Ok(())
}

fn run_script(session: &mut Session, cli: &Cli) -> Result<()> {
    for assignment in &cli.set {
        let (name, text) = commands::parse_assignment(assignment)?;
        let report = session.edit(&name, &text).with_context(|| format!("applying --set {}", assignment))?;
        tracing::info!(field = %report.field, changed = report.changed.len(), "applied");
    }

    if cli.json {
        let snapshot = serde_json::json!({
            "fields": session.snapshot(),
            "status": session.status(),
        });
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("{}", commands::render_form(session));
    }
    Ok(())
}

fn run_interactive(session: &mut Session) -> Result<()> {
    println!("CDICALC - coherent diffraction imaging calculator");
    println!("Type 'help' for commands, 'show' for the form.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match commands::execute(session, &line) {
            Ok(Reply::Print(text)) => {
                if !text.is_empty() {
                    println!("{}", text);
                }
            }
            Ok(Reply::Quit) => break,
            Err(e) => eprintln!("error: {:#}", e),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let settings = if cli.zero_as_empty {
        EngineSettings::zero_as_empty()
    } else {
        EngineSettings::default()
    };
    let mut session = Session::new(settings);

    if let Some(path) = &cli.config {
        let count = session
            .load_config(path)
            .with_context(|| format!("loading config {}", path.display()))?;
        tracing::info!(path = %path.display(), fields = count, "config loaded");
    }

    if cli.json || !cli.set.is_empty() {
        run_script(&mut session, &cli)
    } else {
        run_interactive(&mut session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_repeated_sets() {
        let cli = Cli::try_parse_from([
            "cdicalc",
            "--set",
            "xray_energy=10 keV",
            "-s",
            "crystal_size=250 nm",
            "--json",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.set.len(), 2);
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(!cli.zero_as_empty);
    }

    #[test]
    fn test_script_applies_edits_in_order() {
        let cli = Cli::try_parse_from(["cdicalc", "-s", "xray_energy=10 keV", "-s", "xray_wavelength=2 angstrom"]).unwrap();
        let mut session = Session::new(EngineSettings::default());
        run_script(&mut session, &cli).unwrap();
        assert_eq!(session.text("xray_wavelength").unwrap(), "2 angstrom");
        assert_eq!(session.text("xray_energy").unwrap(), "6.20 keV");
    }
}
