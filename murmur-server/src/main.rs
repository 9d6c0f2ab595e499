//! murmur-server entry point.
//!
//! `serve` (the default) keeps models resident and answers line-delimited
//! JSON commands on stdin/stdout. `init`, `transcribe` and `status` run one
//! request and print a single pretty-printed JSON object.

mod commands;
mod logging;
mod settings;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use murmur_core::{resolve_engine, Server, ShutdownFlag, StopReason, TranscriptionPipeline};
use tracing::{error, info, warn};

use commands::{print_response, run_once, OneShot};
use logging::LogFile;
use settings::{log_dir, read_settings, ServerSettings, ENV_USER_DATA};

#[derive(Debug, Parser)]
#[command(name = "murmur-server", version, about = "Resident speech transcription server")]
struct Cli {
    /// JSON settings file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Serve line-delimited JSON commands on stdin/stdout
    Serve,
    /// Load the models once and report the outcome
    Init,
    /// Transcribe one audio file
    Transcribe {
        #[arg(long, value_name = "PATH")]
        audio: String,
        /// Option overrides as a JSON object
        #[arg(long, value_name = "JSON")]
        options: Option<String>,
    },
    /// Report engine and model status
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut settings_errors = Vec::new();
    let mut settings = match cli.config.as_deref().map(read_settings).transpose() {
        Ok(settings) => settings.unwrap_or_default(),
        Err(e) => {
            settings_errors.push(format!("{e:#}; using default settings"));
            ServerSettings::default()
        }
    };
    settings_errors.extend(settings.apply_env_overrides(|key| std::env::var(key).ok()));
    settings.normalize();

    let dir = log_dir(std::env::var_os(ENV_USER_DATA).map(PathBuf::from));
    match logging::init(&settings.log_filter, &dir) {
        LogFile::Opened(path) => info!(log_file = %path.display(), "logging initialized"),
        LogFile::Unavailable { path, error } => {
            warn!("cannot open log file {}: {error}; logging to stderr only", path.display())
        }
    }
    for message in &settings_errors {
        warn!("{message}");
    }

    info!(
        engine = %settings.engine,
        punctuation_mode = ?settings.punctuation_mode,
        "murmur-server starting"
    );
    let pipeline =
        TranscriptionPipeline::new(settings.engine_config(), resolve_engine(&settings.engine));
    let shutdown = ShutdownFlag::new();
    let mut server = Server::new(pipeline, shutdown.clone());

    let request = match cli.mode.unwrap_or(Mode::Serve) {
        Mode::Serve => return serve(&mut server, &shutdown),
        Mode::Init => OneShot::Init,
        Mode::Transcribe { audio, options } => OneShot::Transcribe { audio, options },
        Mode::Status => OneShot::Status,
    };

    let response = run_once(&mut server, request);
    match print_response(io::stdout().lock(), &response) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("failed to write response: {e}");
            ExitCode::FAILURE
        }
    }
}

fn serve(server: &mut Server, shutdown: &ShutdownFlag) -> ExitCode {
    if let Err(e) = shutdown.install_signal_handlers() {
        warn!("failed to install signal handlers: {e}");
    }

    let result = server.run(io::stdin().lock(), io::stdout().lock());
    match result {
        Ok(reason) => {
            let why = match reason {
                StopReason::EndOfInput => "end of input",
                StopReason::ExitCommand => "exit command",
                StopReason::Shutdown => "shutdown signal",
            };
            info!(reason = why, "server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("server stopped: cannot write response: {e}");
            ExitCode::FAILURE
        }
    }
}
