//! Line-delimited JSON protocol spoken over stdin/stdout.
//!
//! One command object per input line, exactly one response object per
//! command. Field names are snake_case on the wire.

pub mod commands;
pub mod responses;

pub use commands::{Action, Command, OptionOverrides, TranscribeOptions};
pub use responses::{Response, ResponseBody};
