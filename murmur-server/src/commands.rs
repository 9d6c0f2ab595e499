//! One-shot commands: run a single request and print the response.

use std::io::{self, Write};

use murmur_core::ipc::Action;
use murmur_core::{Command, MurmurError, OptionOverrides, Response, Server};

/// A single request taken from the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum OneShot {
    Init,
    Transcribe {
        audio: String,
        options: Option<String>,
    },
    Status,
}

/// Run one request against a fresh server.
pub fn run_once(server: &mut Server, request: OneShot) -> Response {
    match request {
        OneShot::Init => server.startup(),
        OneShot::Status => server.execute(command(Action::Status, None, None)).0,
        OneShot::Transcribe { audio, options } => {
            let overrides = match options.as_deref().map(parse_options).transpose() {
                Ok(overrides) => overrides,
                Err(e) => return Response::failure(&e),
            };
            server
                .execute(command(Action::Transcribe, Some(audio), overrides))
                .0
        }
    }
}

/// Write `response` as pretty-printed JSON followed by a newline.
pub fn print_response<W: Write>(mut out: W, response: &Response) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response).map_err(io::Error::other)?;
    writeln!(out, "{json}")?;
    out.flush()
}

fn parse_options(raw: &str) -> Result<OptionOverrides, MurmurError> {
    serde_json::from_str(raw)
        .map_err(|e| MurmurError::MalformedCommand(format!("invalid --options: {e}")))
}

fn command(action: Action, audio_path: Option<String>, options: Option<OptionOverrides>) -> Command {
    Command {
        action,
        audio_path,
        options,
    }
}
