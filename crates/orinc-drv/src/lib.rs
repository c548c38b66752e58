//! Driver for the Orin compiler (§6): reads a single source file, runs it
//! through lexing, parsing and emission, then hands the resulting LLVM IR
//! to `llc` and the system linker to produce a native executable.
//!
//! There is exactly one entry point users of this crate need,
//! [`run`] — everything else is the pipeline it drives.

mod error;
mod pipeline;

pub use error::DriverError;
pub use pipeline::compile_file;

use std::path::Path;

use tracing::info;

/// Parse `orinc <path>` out of an argument iterator (the first item is the
/// program name, as in `std::env::args`) and run the compiler on it.
pub fn run(mut args: impl Iterator<Item = String>) -> Result<(), DriverError> {
    args.next();
    let path = args.next().ok_or(DriverError::MissingArgument)?;
    if args.next().is_some() {
        return Err(DriverError::UnexpectedArgument);
    }

    let exe = compile_file(Path::new(&path))?;
    info!(executable = %exe.display(), "compilation finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_argument_is_rejected() {
        let err = run(["orinc".to_string()].into_iter()).unwrap_err();
        assert!(matches!(err, DriverError::MissingArgument));
    }

    #[test]
    fn extra_arguments_are_rejected() {
        let args = ["orinc".to_string(), "a.orin".to_string(), "b.orin".to_string()];
        let err = run(args.into_iter()).unwrap_err();
        assert!(matches!(err, DriverError::UnexpectedArgument));
    }
}
