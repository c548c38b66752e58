//! Shared error scaffolding reused by every pipeline stage's own error enum.

use thiserror::Error;

/// Raised when a diagnostic asks to render a position that does not exist
/// in the backing `SourceFile` (used only defensively — the lexer/parser
/// never manufacture positions outside the buffer they read from).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("line {line} out of range (file has {max_lines} lines)")]
    LineOutOfRange { line: u32, max_lines: u32 },
}
