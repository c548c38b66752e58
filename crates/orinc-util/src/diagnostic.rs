//! Diagnostic rendering.
//!
//! The lexer, parser and emitter report failures as typed `thiserror` error
//! enums (`LexError`, `ParseError`, `EmitError`) so callers can match on the
//! failure kind. The driver turns the first one it sees into a
//! [`Diagnostic`] for display — this module owns only that last rendering
//! step, not control flow.

use std::fmt;

use crate::span::{SourceFile, Span};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "error"),
            Level::Warning => write!(f, "warning"),
            Level::Note => write!(f, "note"),
        }
    }
}

/// A renderable compiler diagnostic: a message anchored to a span, with an
/// optional source snippet.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self { level: Level::Error, message: message.into(), span }
    }

    /// Render as `error: <message>\n  --> <line>:<column>\n  | <source line>`.
    pub fn render(&self, file: &SourceFile) -> String {
        let line_text = file.line_text(self.span.start.line);
        let caret_pad = " ".repeat(self.span.start.column.saturating_sub(1) as usize);
        format!(
            "{}: {}\n  --> {}:{}\n   |\n   | {}\n   | {}^",
            self.level, self.message, self.span.start.line, self.span.start.column, line_text, caret_pad
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (at {})", self.level, self.message, self.span.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Position;

    #[test]
    fn render_includes_message_and_line() {
        let file = SourceFile::new("t.orin", "int x = ;\n");
        let span = Span::new(Position::new(8, 1, 9), Position::new(9, 1, 10));
        let diag = Diagnostic::error("expected expression", span);
        let rendered = diag.render(&file);
        assert!(rendered.contains("expected expression"));
        assert!(rendered.contains("int x = ;"));
    }
}
