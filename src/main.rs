#![forbid(unsafe_code)]

mod clock;
mod constants;
mod geometry;
mod platform;
mod settings;
mod tray;
mod x11_utils;

use std::fs;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn, Level as TraceLevel};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::FmtSubscriber;
use x11rb::connection::Connection;

use clock::ClockWindow;
use constants::app;
use settings::SettingsStore;
use x11_utils::{AppContext, CachedAtoms};

/// Floating clock overlay for X11
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Detach from the terminal and exit
    #[arg(long)]
    background: bool,

    /// Stay attached to the terminal (what a detached child runs)
    #[arg(long)]
    foreground: bool,
}

/// Relaunch ourselves detached so closing the terminal does not take
/// the clock with it.
fn launch_background() -> Result<()> {
    let exe = std::env::current_exe().context("Failed to locate own executable")?;
    let child = Command::new(exe)
        .arg("--foreground")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .context("Failed to spawn background process")?;
    info!(pid = child.id(), "Clock started in background");
    Ok(())
}

fn open_log_file() -> Result<RollingFileAppender> {
    let dir = dirs::data_local_dir()
        .context("No local data directory available for logs")?
        .join(app::CONFIG_DIR)
        .join(app::LOG_DIR);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(app::NAME)
        .filename_suffix("log")
        .max_log_files(app::LOG_FILE_LIMIT)
        .build(&dir)
        .context("Failed to create rolling log appender")
}

/// Console logging, teed into a daily-rolling file when one can be
/// opened. A missing file log never blocks startup.
fn init_logging(level: TraceLevel) -> Result<Option<WorkerGuard>> {
    match open_log_file() {
        Ok(appender) => {
            let (file_writer, guard) = tracing_appender::non_blocking(appender);
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(std::io::stdout.and(file_writer))
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to install logging subscriber")?;
            Ok(Some(guard))
        }
        Err(e) => {
            let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to install logging subscriber")?;
            warn!(error = ?e, "File logging unavailable, logging to console only");
            Ok(None)
        }
    }
}

fn run(shutdown: &AtomicBool) -> Result<()> {
    let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X server")?;
    let screen = &conn.setup().roots[screen_num];
    info!(
        "Connected to X11: screen={screen_num}, dimensions={}x{}",
        screen.width_in_pixels, screen.height_in_pixels
    );

    // Pre-cache atoms once at startup (eliminates roundtrip overhead)
    let atoms = CachedAtoms::new(&conn)?;
    let ctx = AppContext {
        conn: &conn,
        screen,
        atoms: &atoms,
    };

    let wm = platform::detect(&ctx);
    let settings = SettingsStore::open_default()?;
    info!(path = %settings.path().display(), "Using settings file");

    let mut clock = ClockWindow::new(ctx, wm, settings)?;
    clock.run(shutdown)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };
    let _log_guard = init_logging(log_level)?;

    if cli.background && !cli.foreground {
        if let Err(e) = launch_background() {
            error!(error = ?e, "Failed to start in background");
            return Err(e.into());
        }
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))
        .context("Failed to register SIGINT handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown))
        .context("Failed to register SIGTERM handler")?;

    if let Err(e) = run(&shutdown) {
        error!(error = ?e, "Fatal error");
        return Err(e.into());
    }
    Ok(())
}
