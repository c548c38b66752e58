//! Drives one source file through every compilation phase: read, lex,
//! parse, emit, `llc`, link (§6). The first phase to fail wins — there is
//! no error recovery and no partial artifact is left behind by a failed
//! lex/parse/emit phase.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use tracing::{debug, info};

use orinc_gen::Emitter;
use orinc_lex::Lexer;
use orinc_par::Parser;
use orinc_util::{Diagnostic, SourceFile, Span};

use crate::error::DriverError;

/// Compile `path` to a native executable alongside it, returning the
/// executable's path. The intermediate `.ll` and `.o` files are removed on
/// success; a failure past IR emission leaves them in place for inspection.
pub fn compile_file(path: &Path) -> Result<PathBuf, DriverError> {
    let stem = basename(path);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let ll_path = dir.join(format!("{stem}.ll"));
    let obj_path = dir.join(format!("{stem}.o"));
    let exe_path = dir.join(&stem);

    info!(file = %path.display(), "reading source");
    let content = std::fs::read_to_string(path)
        .map_err(|source| DriverError::ReadSource { path: path.to_path_buf(), source })?;
    let file = SourceFile::new(path.to_string_lossy().into_owned(), &content);

    info!("lexing");
    let tokens = Lexer::new(&file)
        .lex_all()
        .map_err(|e| diagnostic(&file, e.span(), &e))?;
    debug!(count = tokens.len(), "lexed tokens");

    info!("parsing");
    let mut program = Parser::new(tokens)
        .parse_program()
        .map_err(|e| diagnostic(&file, e.span().unwrap_or(Span::DUMMY), &e))?;

    info!("emitting IR");
    let context = inkwell::context::Context::create();
    let triple = host_triple();
    let ir = Emitter::new(&context, &stem, &triple)
        .compile(&mut program)
        .map_err(|e| diagnostic(&file, e.span().unwrap_or(Span::DUMMY), &e))?;

    std::fs::write(&ll_path, ir)
        .map_err(|source| DriverError::WriteOutput { path: ll_path.clone(), source })?;

    info!(path = %ll_path.display(), "invoking llc");
    run_tool(
        "llc",
        Command::new("llc").arg("-filetype=obj").arg(&ll_path).arg("-o").arg(&obj_path),
        |status| DriverError::Llc { status },
    )?;

    info!(path = %obj_path.display(), "invoking linker");
    run_tool("gcc", Command::new("gcc").arg(&obj_path).arg("-o").arg(&exe_path), |status| {
        DriverError::Link { status }
    })?;

    let _ = std::fs::remove_file(&ll_path);
    let _ = std::fs::remove_file(&obj_path);

    Ok(exe_path)
}

fn run_tool(
    tool: &'static str,
    mut command: Command,
    on_failure: impl FnOnce(ExitStatus) -> DriverError,
) -> Result<(), DriverError> {
    let status = command.status().map_err(|source| DriverError::Spawn { tool, source })?;
    if !status.success() {
        return Err(on_failure(status));
    }
    Ok(())
}

fn diagnostic(file: &SourceFile, span: Span, err: &impl std::fmt::Display) -> DriverError {
    let diag = Diagnostic::error(err.to_string(), span);
    DriverError::Diagnostic(diag.render(file))
}

fn basename(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("a.out").to_string()
}

/// Default target triple for the embedded module, matching the running
/// host unless overridden by `TARGET` — `llc` still reads the triple back
/// out of the `.ll` file it's given.
fn host_triple() -> String {
    std::env::var("TARGET").unwrap_or_else(|_| {
        if cfg!(target_os = "linux") {
            "x86_64-unknown-linux-gnu".to_string()
        } else if cfg!(target_os = "macos") {
            "x86_64-apple-darwin".to_string()
        } else if cfg!(target_os = "windows") {
            "x86_64-pc-windows-msvc".to_string()
        } else {
            "x86_64-unknown-unknown".to_string()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_strips_directory_and_extension() {
        assert_eq!(basename(Path::new("/tmp/dir/hello.orin")), "hello");
        assert_eq!(basename(Path::new("hello.orin")), "hello");
    }

    #[test]
    fn missing_source_file_is_a_read_error() {
        let err = compile_file(Path::new("/nonexistent/path/does-not-exist.orin")).unwrap_err();
        assert!(matches!(err, DriverError::ReadSource { .. }));
    }

    #[test]
    fn lex_error_is_rendered_as_a_diagnostic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.orin");
        std::fs::write(&path, "int x = @;").expect("write");
        let err = compile_file(&path).unwrap_err();
        match err {
            DriverError::Diagnostic(msg) => assert!(msg.contains("error")),
            other => panic!("expected a rendered diagnostic, got {other:?}"),
        }
    }
}
