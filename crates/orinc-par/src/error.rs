use orinc_lex::TokenKind;
use orinc_util::Span;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("expected {expected}, found '{found}'")]
    UnexpectedToken { expected: String, found: String, span: Span },

    #[error("expected {expected_kind:?}, found '{found}'")]
    WrongKind { expected_kind: TokenKind, found: String, span: Span },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::UnexpectedToken { span, .. } => Some(*span),
            ParseError::WrongKind { span, .. } => Some(*span),
            ParseError::UnexpectedEof { .. } => None,
        }
    }
}
