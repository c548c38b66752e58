use orinc_util::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Character,
    Operator,
    Separator,
    Eof,
}

/// A single lexical token. `lexeme` is always the exact source text the
/// token was scanned from — for `String`/`Character` that means escape
/// sequences are kept as written (`\n` stays two characters); unescaping is
/// the parser's job, not the lexer's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Self { kind, lexeme: lexeme.into(), span }
    }

    pub fn is(&self, kind: TokenKind, lexeme: &str) -> bool {
        self.kind == kind && self.lexeme == lexeme
    }
}
