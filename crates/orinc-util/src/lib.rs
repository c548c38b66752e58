//! orinc-util — shared foundation for the Orin compiler.
//!
//! Every other `orinc-*` crate depends on this one for:
//! - source position/span tracking ([`span`])
//! - diagnostic rendering ([`diagnostic`])
//! - identifier interning ([`symbol`])
//!
//! Nothing in here is specific to Orin's grammar or IR — it is the same kind
//! of small, dependency-light foundation crate a multi-phase compiler keeps
//! underneath its lexer/parser/codegen crates so they share one notion of
//! "where in the source did this come from" and "what error type do I
//! return".

pub mod diagnostic;
pub mod error;
pub mod span;
pub mod symbol;

pub use diagnostic::{Diagnostic, Level};
pub use span::{Position, SourceFile, Span};
pub use symbol::Symbol;
