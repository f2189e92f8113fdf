//! Tether CLI - demo host for the event loop and fault dialogs.
//!
//! # Architecture
//!
//! The binary wires [`tether_engine`] (application, bridge, fault sources) to
//! [`tether_tui`] (the terminal dialog):
//!
//! ```text
//! main() -> config -> tracing (+ DiagnosticLayer) -> panic hook
//!        -> Application::init(PromptHandler) -> block_on(demo::run())
//! ```
//!
//! All logging goes to `~/.tether/logs/tether.log`; the terminal belongs to
//! the dialogs.

mod demo;

use anyhow::{Context, Result, bail};
use std::{
    env,
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::Mutex,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tether_config::TetherConfig;
use tether_engine::{
    AppSettings, Application, DiagnosticLayer, DisplayMode, install_panic_hook,
};
use tether_tui::PromptHandler;

const USAGE: &str = "usage: tether [--non-interactive]";

#[derive(Debug, Default)]
struct Args {
    non_interactive: bool,
    help: bool,
}

impl Args {
    fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Args::default();
        for arg in args {
            match arg.as_str() {
                "--non-interactive" => parsed.non_interactive = true,
                "-h" | "--help" => parsed.help = true,
                other => bail!("unknown argument: {other}\n{USAGE}"),
            }
        }
        Ok(parsed)
    }
}

fn init_tracing(config: &TetherConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let diagnostics = DiagnosticLayer::from_config(&config.notify);

    let (log_file, init_warnings) = open_tether_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(diagnostics)
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: keep the dialogs working but never write logs over them.
    tracing_subscriber::registry()
        .with(diagnostics)
        .with(env_filter)
        .init();
}

fn open_tether_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in tether_log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn tether_log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.tether/logs/tether.log
    if let Some(data_dir) = tether_config::data_dir() {
        candidates.push(data_dir.join("logs").join("tether.log"));
    }

    // Fallback: ./.tether/logs/tether.log
    candidates.push(PathBuf::from(".tether").join("logs").join("tether.log"));

    candidates
}

fn main() -> Result<()> {
    let args = Args::parse(env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    let config = TetherConfig::load_or_default().context("failed to load configuration")?;
    init_tracing(&config);
    install_panic_hook(config.notify.capture_backtrace);

    let mut settings = AppSettings::from_config(&config);
    if args.non_interactive {
        settings.mode = DisplayMode::Recording;
    }

    let app = Application::init(PromptHandler::new(), settings)
        .context("failed to start the application")?;
    let report = app.block_on(demo::run())?;
    drop(app);

    tracing::info!(total = report.total, diagnostic = ?report.diagnostic, "Demo finished");
    println!("{report}");
    Ok(())
}
