//! Errors the lexer can raise. All are fatal: the driver reports them as a
//! [`orinc_util::Diagnostic`] and exits non-zero rather than attempting to
//! recover and keep scanning.

use orinc_util::Span;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LexError {
    #[error("unterminated string literal")]
    UnterminatedString { span: Span },

    #[error("unterminated character literal")]
    UnterminatedChar { span: Span },

    #[error("unexpected character '{ch}'")]
    UnexpectedChar { ch: char, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnterminatedString { span }
            | LexError::UnterminatedChar { span }
            | LexError::UnexpectedChar { span, .. } => *span,
        }
    }
}
