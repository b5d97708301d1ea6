use std::path::PathBuf;
use std::sync::OnceLock;

use gopher_tui::location::Location;

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const USAGE: &str = "gopher-tui - Browse Gopherspace from the terminal.\n\n\
usage: gopher-tui [url]\n\n  \
--version, -V        Show version and exit\n  \
--help,    -h        Show this help message";

enum Cli {
    Exit(i32),
    Browse(Option<Location>),
}

fn main() {
    let start = match handle_cli_flags(std::env::args().skip(1)) {
        Cli::Exit(code) => std::process::exit(code),
        Cli::Browse(start) => start,
    };

    init_logging();
    tracing::info!(version = gopher_tui::VERSION, "gopher-tui starting");

    if let Err(err) = gopher_tui::run(start) {
        tracing::error!(error = ?err, "application error");
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
    tracing::info!("gopher-tui exited");
}

fn handle_cli_flags(args: impl Iterator<Item = String>) -> Cli {
    let mut url: Option<String> = None;
    for arg in args {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("gopher-tui {}", gopher_tui::VERSION);
                return Cli::Exit(0);
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return Cli::Exit(0);
            }
            other if other.starts_with('-') || other.starts_with('/') => {
                eprintln!("{USAGE}");
                return Cli::Exit(1);
            }
            _ => {
                if url.is_some() {
                    eprintln!("Invalid parameters list.");
                    return Cli::Exit(1);
                }
                url = Some(arg);
            }
        }
    }

    match url.map(|raw| Location::parse_supported(&raw)).transpose() {
        Ok(start) => Cli::Browse(start),
        Err(_) => {
            eprintln!("Invalid URL!");
            Cli::Exit(1)
        }
    }
}

/// Logs go to a file since the browser owns the terminal. Without a
/// writable file there is no logging at all.
fn init_logging() {
    let Some(path) = log_path() else {
        return;
    };
    if let Some(dir) = path.parent() {
        if std::fs::create_dir_all(dir).is_err() {
            return;
        }
    }
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    else {
        return;
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(non_blocking)
        .init();
    let _ = LOG_GUARD.set(guard);
    tracing::info!(path = %path.display(), "logging initialized");
}

fn log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("gopher-tui").join("gopher-tui.log"))
}
