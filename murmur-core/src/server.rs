//! `Server`: the protocol loop and per-command dispatch.
//!
//! ## Loop
//!
//! ```text
//! startup: initialize() ─► first response line (success or failure)
//! Running:
//!     shutdown requested? ─► Stopped
//!     read line ─► EOF ─► Stopped
//!               ─► blank ─► (no response)
//!               ─► parse ─► dispatch ─► one response line, flushed
//!                                     └─ exit ─► Stopped
//! ```
//!
//! Every failure inside dispatch, including a panic, becomes a failure
//! response for that command; the loop keeps running.

use std::io::{self, BufRead, Write};
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, info, warn};

use crate::{
    engine::{pipeline::TranscriptionPipeline, InitOutcome},
    error::MurmurError,
    ipc::{Action, Command, Response},
    shutdown::ShutdownFlag,
};

/// Whether the loop keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Why `run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfInput,
    ExitCommand,
    Shutdown,
}

/// Process-wide server context. Constructed once at entry and owned by the
/// protocol loop.
#[derive(Debug)]
pub struct Server {
    pipeline: TranscriptionPipeline,
    shutdown: ShutdownFlag,
}

impl Server {
    pub fn new(pipeline: TranscriptionPipeline, shutdown: ShutdownFlag) -> Self {
        Self { pipeline, shutdown }
    }

    pub fn pipeline(&self) -> &TranscriptionPipeline {
        &self.pipeline
    }

    /// Eager initialization attempt, as a response.
    pub fn startup(&mut self) -> Response {
        self.guarded("init", |server| server.initialize())
    }

    /// Run the protocol until end of input, `exit`, or a shutdown request.
    ///
    /// The startup response is written before the first read.
    ///
    /// # Errors
    /// Returns an error only if a response cannot be written.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> io::Result<StopReason> {
        info!("server started");
        let startup = self.startup();
        write_response(&mut output, &startup)?;

        let mut buf = Vec::new();
        loop {
            if self.shutdown.is_requested() {
                info!("shutdown requested");
                return Ok(StopReason::Shutdown);
            }

            buf.clear();
            match input.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    debug!("end of input");
                    return Ok(StopReason::EndOfInput);
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("failed to read command: {e}");
                    return Ok(StopReason::EndOfInput);
                }
            }

            let Some((response, flow)) = self.handle_bytes(&buf) else {
                continue;
            };
            write_response(&mut output, &response)?;
            if flow == Flow::Stop {
                return Ok(StopReason::ExitCommand);
            }
        }
    }

    /// Handle one raw input line. `None` for blank lines.
    pub fn handle_bytes(&mut self, raw: &[u8]) -> Option<(Response, Flow)> {
        match std::str::from_utf8(raw) {
            Ok(line) => self.handle_line(line),
            Err(e) => {
                warn!("dropping non UTF-8 command line");
                let err = MurmurError::MalformedCommand(format!("command is not valid UTF-8: {e}"));
                Some((Response::failure(&err), Flow::Continue))
            }
        }
    }

    /// Handle one input line. `None` for blank lines.
    pub fn handle_line(&mut self, line: &str) -> Option<(Response, Flow)> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        match Command::parse(line) {
            Ok(command) => Some(self.execute(command)),
            Err(e) => {
                warn!("rejected command: {e}");
                Some((Response::failure(&e), Flow::Continue))
            }
        }
    }

    /// Dispatch a parsed command.
    pub fn execute(&mut self, command: Command) -> (Response, Flow) {
        match command.action {
            Action::Transcribe => {
                let response = self.guarded("transcribe", |server| {
                    match server
                        .pipeline
                        .transcribe(command.audio_path.as_deref(), command.options.as_ref())
                    {
                        Ok(transcript) => Response::transcript(transcript),
                        Err(e) => Response::failure(&e),
                    }
                });
                (response, Flow::Continue)
            }
            Action::Status => {
                let response = self.guarded("status", |server| {
                    Response::status(&server.pipeline.status())
                });
                (response, Flow::Continue)
            }
            Action::Exit => {
                info!("exit command received");
                (Response::message("server exiting"), Flow::Stop)
            }
        }
    }

    /// Run `initialize()` and describe the outcome.
    pub fn initialize(&mut self) -> Response {
        match self.pipeline.initialize() {
            Ok(InitOutcome::Loaded) => Response::message("models initialized"),
            Ok(InitOutcome::AlreadyReady) => Response::message("models already initialized"),
            Err(e) => Response::failure(&e),
        }
    }

    /// Loop-boundary catch-all: a panic becomes a generic failure response.
    fn guarded<F>(&mut self, action: &str, f: F) -> Response
    where
        F: FnOnce(&mut Self) -> Response,
    {
        match panic::catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(response) => response,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(action, "command panicked: {message}");
                Response::internal(message, format!("panicked while handling `{action}`"))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn write_response<W: Write>(output: &mut W, response: &Response) -> io::Result<()> {
    let line = response.to_line().map_err(io::Error::other)?;
    output.write_all(line.as_bytes())?;
    output.write_all(b"\n")?;
    output.flush()
}
