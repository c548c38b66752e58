//! Expression parsing: precedence climbing over the binary operator table,
//! postfix chains (`.member`, `[index]`, `(args)`), and primary dispatch.

use orinc_lex::TokenKind;
use orinc_util::Symbol;

use crate::ast::*;
use crate::error::ParseError;
use crate::items;
use crate::{PResult, Parser};

pub(crate) fn parse_expr(p: &mut Parser) -> PResult<Expr> {
    parse_binary(p, 0)
}

/// Left-associative precedence climbing: at each level, parse the next
/// tighter level first, then keep folding in operators at this level.
fn parse_binary(p: &mut Parser, min_prec: u8) -> PResult<Expr> {
    let mut left = if min_prec >= 4 { parse_postfix(p)? } else { parse_binary(p, min_prec + 1)? };

    loop {
        let op = match p.peek(0) {
            Some(tok) if tok.kind == TokenKind::Operator => BinaryOp::from_lexeme(&tok.lexeme),
            _ => None,
        };
        let op = match op {
            Some(op) if op.precedence() == min_prec => op,
            _ => break,
        };
        p.consume();
        let right = if min_prec >= 4 { parse_postfix(p)? } else { parse_binary(p, min_prec + 1)? };
        let span = left.span().merge(right.span());
        left = Expr::Binary(BinaryExpr { op, left: Box::new(left), right: Box::new(right), span });
    }
    Ok(left)
}

/// Primary expression followed by any chain of `.ident`, `[expr]`, `(args)`,
/// applied left to right.
fn parse_postfix(p: &mut Parser) -> PResult<Expr> {
    let mut expr = parse_unary(p)?;
    loop {
        if p.matches(0, TokenKind::Separator, &["."]) {
            p.consume();
            let member_tok = p.expect(TokenKind::Identifier, None)?;
            let member = Symbol::intern(&member_tok.lexeme);
            let span = expr.span().merge(member_tok.span);
            expr = Expr::ObjectAccess(ObjectAccess { object: Box::new(expr), member, span });
        } else if p.matches(0, TokenKind::Separator, &["["]) {
            p.consume();
            let index = parse_expr(p)?;
            let end = p.expect(TokenKind::Separator, Some("]"))?.span;
            let span = expr.span().merge(end);
            expr = Expr::ArrayAccess(ArrayAccess { array: Box::new(expr), index: Box::new(index), span });
        } else if p.matches(0, TokenKind::Separator, &["("]) {
            p.consume();
            let args = parse_arg_list(p)?;
            let end = p.expect(TokenKind::Separator, Some(")"))?.span;
            let span = expr.span().merge(end);
            expr = Expr::Call(CallExpr { callee: Box::new(expr), args, span });
        } else {
            break;
        }
    }
    Ok(expr)
}

fn parse_arg_list(p: &mut Parser) -> PResult<Vec<Expr>> {
    let mut args = Vec::new();
    if p.matches(0, TokenKind::Separator, &[")"]) {
        return Ok(args);
    }
    args.push(parse_expr(p)?);
    while p.matches(0, TokenKind::Separator, &[","]) {
        p.consume();
        args.push(parse_expr(p)?);
    }
    Ok(args)
}

/// Unary expressions (`!`, `-`) bind tighter than any binary operator but
/// are themselves above the primary/postfix chain.
fn parse_unary(p: &mut Parser) -> PResult<Expr> {
    if p.matches(0, TokenKind::Operator, &["!", "-"]) {
        let op_tok = p.consume();
        let op = if op_tok.lexeme == "!" { UnaryOp::Not } else { UnaryOp::Neg };
        let value = parse_unary(p)?;
        let span = op_tok.span.merge(value.span());
        return Ok(Expr::Unary(UnaryExpr { op, value: Box::new(value), span }));
    }
    parse_primary(p)
}

/// Primary dispatch, in priority order: parenthesized expression, `make`,
/// literals (bool/number/string/char/anonymous function), variable access.
fn parse_primary(p: &mut Parser) -> PResult<Expr> {
    if p.matches(0, TokenKind::Separator, &["("]) {
        p.consume();
        let inner = parse_expr(p)?;
        p.expect(TokenKind::Separator, Some(")"))?;
        return Ok(inner);
    }
    if p.matches(0, TokenKind::Identifier, &["make"]) {
        return parse_make_expr(p);
    }
    if p.matches(0, TokenKind::Identifier, &["true", "false"]) {
        let tok = p.consume();
        return Ok(Expr::BoolLit(BoolLit { value: tok.lexeme == "true", span: tok.span }));
    }
    if p.matches(0, TokenKind::Identifier, &["func"]) {
        let func = items::parse_anon_func(p)?;
        return Ok(Expr::FuncLit(Box::new(func)));
    }
    match p.peek(0).map(|t| t.kind) {
        Some(TokenKind::Number) => {
            let tok = p.consume();
            let is_float = tok.lexeme.contains('.');
            Ok(Expr::NumLit(NumLit { text: tok.lexeme, is_float, span: tok.span }))
        }
        Some(TokenKind::String) => {
            let tok = p.consume();
            Ok(Expr::StringLit(StringLit { value: unescape(&tok.lexeme), span: tok.span }))
        }
        Some(TokenKind::Character) => {
            let tok = p.consume();
            let unescaped = unescape(&tok.lexeme);
            let value = unescaped.chars().next().unwrap_or('\0');
            Ok(Expr::CharLit(CharLit { value, span: tok.span }))
        }
        Some(TokenKind::Identifier) => {
            let tok = p.consume();
            let name = Symbol::intern(&tok.lexeme);
            Ok(Expr::VarAccess(VarAccess { name, span: tok.span }))
        }
        _ => match p.peek(0) {
            Some(tok) => Err(ParseError::UnexpectedToken {
                expected: "expression".to_string(),
                found: tok.lexeme.clone(),
                span: tok.span,
            }),
            None => Err(ParseError::UnexpectedEof { expected: "expression".to_string() }),
        },
    }
}

fn parse_make_expr(p: &mut Parser) -> PResult<Expr> {
    let start = p.expect(TokenKind::Identifier, Some("make"))?.span;
    let name_tok = p.expect(TokenKind::Identifier, None)?;
    let template = Symbol::intern(&name_tok.lexeme);
    p.expect(TokenKind::Separator, Some("("))?;
    let args = parse_arg_list(p)?;
    let end = p.expect(TokenKind::Separator, Some(")"))?.span;
    Ok(Expr::Make(MakeExpr { template, args, span: start.merge(end) }))
}

/// `\\` → `\`, `\n` → newline, `\"` → `"`, `\'` → `'`. Any other escape
/// passes through unchanged (the backslash and the following character are
/// both kept).
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::unescape;

    #[test]
    fn unescape_known_sequences() {
        assert_eq!(unescape(r#"hi\n\"there\""#), "hi\n\"there\"");
        assert_eq!(unescape(r"a\\b"), r"a\b");
    }

    #[test]
    fn unescape_passes_through_unknown_sequences() {
        assert_eq!(unescape(r"\t"), r"\t");
    }
}
