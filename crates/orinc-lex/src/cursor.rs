//! Code point cursor used by the lexer.
//!
//! Source text is read as a `Vec<char>` rather than scanned byte-by-byte so
//! the lexer is UTF-capable without special-casing multi-byte sequences:
//! every `peek`/`consume` moves exactly one code point and the `(line,
//! column)` counters stay in lock-step with `raw`.

use orinc_util::Position;

pub struct Cursor<'a> {
    chars: &'a [char],
    pos: Position,
}

impl<'a> Cursor<'a> {
    pub fn new(chars: &'a [char]) -> Self {
        Self { chars, pos: Position::START }
    }

    pub fn position(&self) -> Position {
        self.pos
    }

    /// The code point `k` positions ahead of the cursor, or `'\0'` past the
    /// end of input. `'\0'` cannot appear in real source (it is not valid
    /// UTF-8 text a user would type for this language), so it doubles
    /// safely as the end-of-input sentinel the original grammar checks for.
    pub fn peek(&self, k: usize) -> char {
        self.chars.get(self.pos.raw + k).copied().unwrap_or('\0')
    }

    /// Consume and return the current code point, advancing line/column
    /// bookkeeping across newlines.
    pub fn consume(&mut self) -> char {
        let c = self.peek(0);
        if c != '\0' {
            self.pos.raw += 1;
            if c == '\n' {
                self.pos.line += 1;
                self.pos.column = 1;
            } else {
                self.pos.column += 1;
            }
        }
        c
    }

    pub fn at_end(&self) -> bool {
        self.pos.raw >= self.chars.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_line_and_column() {
        let chars: Vec<char> = "ab\ncd".chars().collect();
        let mut cur = Cursor::new(&chars);
        assert_eq!(cur.consume(), 'a');
        assert_eq!(cur.consume(), 'b');
        assert_eq!(cur.position().line, 1);
        assert_eq!(cur.consume(), '\n');
        assert_eq!(cur.position().line, 2);
        assert_eq!(cur.position().column, 1);
        assert_eq!(cur.consume(), 'c');
        assert_eq!(cur.position().column, 2);
    }

    #[test]
    fn peek_past_end_is_nul() {
        let chars: Vec<char> = "a".chars().collect();
        let cur = Cursor::new(&chars);
        assert_eq!(cur.peek(5), '\0');
    }
}
