//! Errors the emitter can raise. Every one of these corresponds to a case
//! the original emitter left silent (marked only by a `// Error ...`
//! comment) — here each is rejected with a diagnostic and aborts emission.

use orinc_util::Span;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("'{name}' is already declared in this scope")]
    Redeclaration { name: String, span: Span },

    #[error("unknown template '{name}'")]
    UnknownTemplate { name: String, span: Span },

    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String, span: Span },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String, span: Span },

    #[error("division by zero")]
    DivisionByZero { span: Span },

    #[error("unknown field '{field}' on template '{template}'")]
    UnknownField { template: String, field: String, span: Span },

    #[error("'{name}' is not callable")]
    NotCallable { name: String, span: Span },

    #[error("LLVM operation failed: {0}")]
    Llvm(String),
}

impl EmitError {
    pub fn span(&self) -> Option<Span> {
        match self {
            EmitError::Redeclaration { span, .. }
            | EmitError::UnknownTemplate { span, .. }
            | EmitError::UndefinedVariable { span, .. }
            | EmitError::TypeMismatch { span, .. }
            | EmitError::DivisionByZero { span }
            | EmitError::UnknownField { span, .. }
            | EmitError::NotCallable { span, .. } => Some(*span),
            EmitError::Llvm(_) => None,
        }
    }
}
