//! `Block`, `Node`, `Stmt` and its alternatives.

use orinc_lex::TokenKind;

use crate::ast::*;
use crate::items;
use crate::{PResult, Parser};

pub(crate) fn parse_block(p: &mut Parser) -> PResult<Block> {
    let start = p.expect(TokenKind::Separator, Some("{"))?.span;
    let mut stmts = Vec::new();
    while !p.matches(0, TokenKind::Separator, &["}"]) {
        stmts.push(parse_node(p)?);
    }
    let end = p.expect(TokenKind::Separator, Some("}"))?.span;
    Ok(Block { stmts, span: start.merge(end) })
}

/// `Node := Stmt ';'? | (VarDecl ';')`. Keyword-led statements
/// (`if`/`return`/`for`) are unambiguous; everything else is either a
/// `VarDecl` or an expression statement (`AssignStmt`/`CallStmt`), resolved
/// speculatively so a failed `VarDecl` attempt never swallows tokens.
fn parse_node(p: &mut Parser) -> PResult<Stmt> {
    if p.matches(0, TokenKind::Identifier, &["if"]) {
        return Ok(Stmt::If(parse_if_stmt(p)?));
    }
    if p.matches(0, TokenKind::Identifier, &["return"]) {
        let stmt = parse_return_stmt(p)?;
        consume_optional_semicolon(p);
        return Ok(Stmt::Return(stmt));
    }
    if p.matches(0, TokenKind::Identifier, &["for"]) {
        return Ok(Stmt::Loop(parse_loop_stmt(p)?));
    }

    if let Some(decl) = p.try_parse(|p| {
        let decl = items::parse_var_decl(p)?;
        p.expect(TokenKind::Separator, Some(";"))?;
        Ok(decl)
    }) {
        return Ok(Stmt::VarDecl(decl));
    }

    let stmt = parse_assign_or_call(p)?;
    consume_optional_semicolon(p);
    Ok(stmt)
}

fn consume_optional_semicolon(p: &mut Parser) {
    if p.matches(0, TokenKind::Separator, &[";"]) {
        p.consume();
    }
}

/// `AssignStmt := Expr '=' Expr`, `CallStmt := Call` — both start with an
/// expression, so the expression is parsed once and then classified by
/// whether `=` follows.
fn parse_assign_or_call(p: &mut Parser) -> PResult<Stmt> {
    let target = crate::expr::parse_expr(p)?;
    if p.matches(0, TokenKind::Operator, &["="]) {
        p.consume();
        let value = crate::expr::parse_expr(p)?;
        let span = target.span().merge(value.span());
        return Ok(Stmt::Assign(AssignStmt { target, value, span }));
    }
    match target {
        Expr::Call(call) => {
            let span = call.span;
            Ok(Stmt::Call(CallStmt { call, span }))
        }
        other => Err(crate::error::ParseError::UnexpectedToken {
            expected: "assignment or call statement".to_string(),
            found: format!("{other:?}"),
            span: other.span(),
        }),
    }
}

fn parse_loop_post(p: &mut Parser) -> PResult<LoopPost> {
    let stmt = parse_assign_or_call(p)?;
    match stmt {
        Stmt::Assign(a) => Ok(LoopPost::Assign(a)),
        Stmt::Call(c) => Ok(LoopPost::Call(c)),
        _ => unreachable!("parse_assign_or_call only produces Assign or Call"),
    }
}

fn parse_if_stmt(p: &mut Parser) -> PResult<IfStmt> {
    let start = p.expect(TokenKind::Identifier, Some("if"))?.span;
    p.expect(TokenKind::Separator, Some("("))?;
    let cond = crate::expr::parse_expr(p)?;
    p.expect(TokenKind::Separator, Some(")"))?;
    let body = parse_block(p)?;
    let mut span = start.merge(body.span);
    let else_branch = if p.matches(0, TokenKind::Identifier, &["else"]) {
        p.consume();
        let branch = if p.matches(0, TokenKind::Identifier, &["if"]) {
            ElseBranch::If(Box::new(parse_if_stmt(p)?))
        } else {
            ElseBranch::Block(parse_block(p)?)
        };
        let branch_span = match &branch {
            ElseBranch::If(i) => i.span,
            ElseBranch::Block(b) => b.span,
        };
        span = span.merge(branch_span);
        Some(branch)
    } else {
        None
    };
    Ok(IfStmt { cond, body, else_branch, span })
}

/// `LoopStmt := 'for' '(' VarDecl? ';' Expr ';' (Assign|CallStmt)? ')' Block`.
fn parse_loop_stmt(p: &mut Parser) -> PResult<LoopStmt> {
    let start = p.expect(TokenKind::Identifier, Some("for"))?.span;
    p.expect(TokenKind::Separator, Some("("))?;
    let init = if p.matches(0, TokenKind::Separator, &[";"]) {
        None
    } else {
        Some(Box::new(items::parse_var_decl(p)?))
    };
    p.expect(TokenKind::Separator, Some(";"))?;
    let cond = crate::expr::parse_expr(p)?;
    p.expect(TokenKind::Separator, Some(";"))?;
    let post = if p.matches(0, TokenKind::Separator, &[")"]) {
        None
    } else {
        Some(parse_loop_post(p)?)
    };
    p.expect(TokenKind::Separator, Some(")"))?;
    let body = parse_block(p)?;
    let span = start.merge(body.span);
    Ok(LoopStmt { init, cond, post, body, span })
}

fn parse_return_stmt(p: &mut Parser) -> PResult<ReturnStmt> {
    let start = p.expect(TokenKind::Identifier, Some("return"))?.span;
    let mut span = start;
    let value = if p.matches(0, TokenKind::Separator, &[";"])
        || p.matches(0, TokenKind::Separator, &["}"])
        || p.peek(0).is_none()
    {
        None
    } else {
        let expr = crate::expr::parse_expr(p)?;
        span = span.merge(expr.span());
        Some(expr)
    };
    Ok(ReturnStmt { value, span })
}
