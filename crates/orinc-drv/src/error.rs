//! Errors the driver itself can raise, on top of the typed errors each
//! compilation phase already returns (`LexError`, `ParseError`, `EmitError`).
//! Those three are folded into [`DriverError::Diagnostic`] — a string
//! already rendered with [`orinc_util::Diagnostic::render`] — rather than
//! carried as nested variants, since by the time the driver sees one there
//! is nothing left to do with it but print it and exit.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("usage: orinc <path>")]
    MissingArgument,

    #[error("usage: orinc <path> (no additional arguments expected)")]
    UnexpectedArgument,

    #[error("could not read '{path}': {source}")]
    ReadSource { path: PathBuf, #[source] source: std::io::Error },

    #[error("could not write '{path}': {source}")]
    WriteOutput { path: PathBuf, #[source] source: std::io::Error },

    #[error("{0}")]
    Diagnostic(String),

    #[error("failed to run '{tool}': {source}")]
    Spawn { tool: &'static str, #[source] source: std::io::Error },

    #[error("llc exited with {status}")]
    Llc { status: ExitStatus },

    #[error("linker exited with {status}")]
    Link { status: ExitStatus },
}
