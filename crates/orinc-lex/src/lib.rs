//! Lexer for Orin source text.
//!
//! The lexer's entire public surface is [`Lexer::lex_all`]: it owns a
//! [`Cursor`] over the source file's code points and produces a flat
//! `Vec<Token>`, stopping at the first malformed token rather than trying to
//! resynchronize and keep scanning. The parser never sees partial/garbage
//! token streams — either lexing succeeds completely or it fails with a
//! [`LexError`].

mod cursor;
mod error;
mod token;

pub use error::LexError;
pub use token::{Token, TokenKind};

use cursor::Cursor;
use orinc_util::{SourceFile, Span};

const TWO_CHAR_OPERATORS: &[&str] = &["==", "!=", ">=", "<=", "&&", "||"];
const ONE_CHAR_OPERATORS: &[char] = &['+', '-', '*', '/', '=', '>', '<', '!', '|', '&', '%'];
const SEPARATORS: &[char] = &[':', ';', ',', '.', '(', ')', '{', '}', '[', ']'];

pub struct Lexer<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Lexer<'a> {
    pub fn new(file: &'a SourceFile) -> Self {
        Self { cursor: Cursor::new(file.chars()) }
    }

    /// Consume the entire source file and return its tokens, or the first
    /// lex error encountered.
    pub fn lex_all(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            if self.cursor.at_end() {
                break;
            }
            tokens.push(self.next_token()?);
        }
        Ok(tokens)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.cursor.peek(0) {
                c if c.is_whitespace() => {
                    self.cursor.consume();
                }
                '/' if self.cursor.peek(1) == '/' => {
                    while self.cursor.peek(0) != '\n' && !self.cursor.at_end() {
                        self.cursor.consume();
                    }
                }
                '/' if self.cursor.peek(1) == '*' => {
                    self.cursor.consume();
                    self.cursor.consume();
                    while !self.cursor.at_end()
                        && !(self.cursor.peek(0) == '*' && self.cursor.peek(1) == '/')
                    {
                        self.cursor.consume();
                    }
                    if !self.cursor.at_end() {
                        self.cursor.consume();
                        self.cursor.consume();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        let start = self.cursor.position();
        let c = self.cursor.peek(0);
        match c {
            c if is_identifier_start(c) => Ok(self.lex_identifier(start)),
            c if c.is_ascii_digit() => Ok(self.lex_number(start)),
            '"' => self.lex_string(start),
            '\'' => self.lex_char(start),
            c if ONE_CHAR_OPERATORS.contains(&c) => Ok(self.lex_operator(start)),
            c if SEPARATORS.contains(&c) => {
                self.cursor.consume();
                let span = Span::new(start, self.cursor.position());
                Ok(Token::new(TokenKind::Separator, c.to_string(), span))
            }
            c => {
                self.cursor.consume();
                let span = Span::new(start, self.cursor.position());
                Err(LexError::UnexpectedChar { ch: c, span })
            }
        }
    }

    fn lex_identifier(&mut self, start: orinc_util::Position) -> Token {
        let mut lexeme = String::new();
        while is_identifier_continue(self.cursor.peek(0)) {
            lexeme.push(self.cursor.consume());
        }
        let span = Span::new(start, self.cursor.position());
        Token::new(TokenKind::Identifier, lexeme, span)
    }

    fn lex_number(&mut self, start: orinc_util::Position) -> Token {
        let mut lexeme = String::new();
        while self.cursor.peek(0).is_ascii_digit() {
            lexeme.push(self.cursor.consume());
        }
        if self.cursor.peek(0) == '.' && self.cursor.peek(1).is_ascii_digit() {
            lexeme.push(self.cursor.consume());
            while self.cursor.peek(0).is_ascii_digit() {
                lexeme.push(self.cursor.consume());
            }
        }
        let span = Span::new(start, self.cursor.position());
        Token::new(TokenKind::Number, lexeme, span)
    }

    fn lex_string(&mut self, start: orinc_util::Position) -> Result<Token, LexError> {
        let mut lexeme = String::new();
        self.cursor.consume(); // opening quote
        loop {
            match self.cursor.peek(0) {
                '"' => {
                    self.cursor.consume();
                    let span = Span::new(start, self.cursor.position());
                    return Ok(Token::new(TokenKind::String, lexeme, span));
                }
                '\0' | '\n' => {
                    let span = Span::new(start, self.cursor.position());
                    return Err(LexError::UnterminatedString { span });
                }
                '\\' => {
                    lexeme.push(self.cursor.consume());
                    if !self.cursor.at_end() {
                        lexeme.push(self.cursor.consume());
                    }
                }
                _ => lexeme.push(self.cursor.consume()),
            }
        }
    }

    fn lex_char(&mut self, start: orinc_util::Position) -> Result<Token, LexError> {
        let mut lexeme = String::new();
        self.cursor.consume(); // opening quote
        loop {
            match self.cursor.peek(0) {
                '\'' => {
                    self.cursor.consume();
                    let span = Span::new(start, self.cursor.position());
                    return Ok(Token::new(TokenKind::Character, lexeme, span));
                }
                '\0' | '\n' => {
                    let span = Span::new(start, self.cursor.position());
                    return Err(LexError::UnterminatedChar { span });
                }
                '\\' => {
                    lexeme.push(self.cursor.consume());
                    if !self.cursor.at_end() {
                        lexeme.push(self.cursor.consume());
                    }
                }
                _ => lexeme.push(self.cursor.consume()),
            }
        }
    }

    fn lex_operator(&mut self, start: orinc_util::Position) -> Token {
        let two: String = [self.cursor.peek(0), self.cursor.peek(1)].iter().collect();
        if TWO_CHAR_OPERATORS.contains(&two.as_str()) {
            self.cursor.consume();
            self.cursor.consume();
            let span = Span::new(start, self.cursor.position());
            return Token::new(TokenKind::Operator, two, span);
        }
        let c = self.cursor.consume();
        let span = Span::new(start, self.cursor.position());
        Token::new(TokenKind::Operator, c.to_string(), span)
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        let file = SourceFile::new("test", src);
        Lexer::new(&file).lex_all().expect("lex should succeed")
    }

    #[test]
    fn identifiers_and_keywords_are_plain_identifiers() {
        let tokens = lex("template foo_bar");
        assert_eq!(tokens.len(), 2);
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Identifier));
        assert_eq!(tokens[0].lexeme, "template");
        assert_eq!(tokens[1].lexeme, "foo_bar");
    }

    #[test]
    fn integer_and_float_numbers() {
        let tokens = lex("42 3.14");
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].lexeme, "42");
        assert_eq!(tokens[1].lexeme, "3.14");
    }

    #[test]
    fn trailing_dot_is_not_part_of_number() {
        let tokens = lex("1.x");
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].lexeme, "1");
        assert_eq!(tokens[1].kind, TokenKind::Separator);
        assert_eq!(tokens[1].lexeme, ".");
    }

    #[test]
    fn string_literal_keeps_escapes_raw() {
        let tokens = lex(r#""hi\n\"there\"""#);
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].lexeme, r#"hi\n\"there\""#);
    }

    #[test]
    fn unterminated_string_at_eof_is_fatal() {
        let file = SourceFile::new("test", "\"abc");
        let err = Lexer::new(&file).lex_all().unwrap_err();
        assert!(matches!(err, LexError::UnterminatedString { .. }));
    }

    #[test]
    fn unterminated_string_at_newline_is_fatal() {
        let file = SourceFile::new("test", "\"abc\ndef\"");
        let err = Lexer::new(&file).lex_all().unwrap_err();
        assert!(matches!(err, LexError::UnterminatedString { .. }));
    }

    #[test]
    fn character_literal() {
        let tokens = lex(r"'a' '\n'");
        assert_eq!(tokens[0].kind, TokenKind::Character);
        assert_eq!(tokens[0].lexeme, "a");
        assert_eq!(tokens[1].lexeme, r"\n");
    }

    #[test]
    fn two_char_operators_take_priority_over_one_char() {
        let tokens = lex("== != >= <= && || = ! > < + - * / % & |");
        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(
            lexemes,
            vec![
                "==", "!=", ">=", "<=", "&&", "||", "=", "!", ">", "<", "+", "-", "*", "/", "%",
                "&", "|"
            ]
        );
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Operator));
    }

    #[test]
    fn separators() {
        let tokens = lex(": ; , . ( ) { } [ ]");
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Separator));
        assert_eq!(tokens.len(), 10);
    }

    #[test]
    fn line_and_block_comments_are_skipped() {
        let tokens = lex("// comment\nfoo /* block\n comment */ bar");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].lexeme, "foo");
        assert_eq!(tokens[1].lexeme, "bar");
    }

    #[test]
    fn span_line_advances_past_comment_newline() {
        let tokens = lex("// c\nfoo");
        assert_eq!(tokens[0].span.start.line, 2);
    }

    #[test]
    fn unexpected_character_is_fatal() {
        let file = SourceFile::new("test", "@");
        let err = Lexer::new(&file).lex_all().unwrap_err();
        assert!(matches!(err, LexError::UnexpectedChar { ch: '@', .. }));
    }

    #[test]
    fn token_spans_cover_their_lexeme() {
        let tokens = lex("foobar");
        let tok = &tokens[0];
        assert_eq!(tok.span.start.raw, 0);
        assert_eq!(tok.span.end.raw, 6);
    }
}
