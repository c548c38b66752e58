//! `Decl`, `TemplateDecl`, `FuncDecl`/`FuncSignature`/`AnonFunc`, `ParamList`
//! and `TypeRef` parsing.

use orinc_lex::TokenKind;
use orinc_util::Symbol;

use crate::ast::*;
use crate::{PResult, Parser};

pub(crate) fn parse_decl(p: &mut Parser) -> PResult<Decl> {
    if p.matches(0, TokenKind::Identifier, &["tmpl"]) {
        return Ok(Decl::Template(parse_template(p)?));
    }
    if p.matches(0, TokenKind::Identifier, &["func"]) {
        if let Some(func) = p.try_parse(parse_named_func_decl) {
            return Ok(Decl::Func(func));
        }
    }
    let decl = parse_var_decl(p)?;
    p.expect(TokenKind::Separator, Some(";"))?;
    Ok(Decl::Var(decl))
}

fn parse_template(p: &mut Parser) -> PResult<Template> {
    let start = p.expect(TokenKind::Identifier, Some("tmpl"))?.span;
    let name_tok = p.expect(TokenKind::Identifier, None)?;
    let name = Symbol::intern(&name_tok.lexeme);
    p.expect(TokenKind::Separator, Some("{"))?;

    let mut constructor = None;
    let mut methods = Vec::new();
    let mut fields = Vec::new();
    while !p.matches(0, TokenKind::Separator, &["}"]) {
        if p.matches(0, TokenKind::Identifier, &["constructor"]) {
            constructor = Some(parse_constructor(p)?);
        } else if p.matches(0, TokenKind::Identifier, &["func"]) {
            methods.push(parse_named_func_decl(p)?);
        } else {
            let field = parse_var_decl(p)?;
            p.expect(TokenKind::Separator, Some(";"))?;
            fields.push(field);
        }
    }
    let end = p.expect(TokenKind::Separator, Some("}"))?.span;
    Ok(Template { name, constructor, methods, fields, span: start.merge(end) })
}

fn parse_constructor(p: &mut Parser) -> PResult<Constructor> {
    let start = p.expect(TokenKind::Identifier, Some("constructor"))?.span;
    p.expect(TokenKind::Operator, Some("<"))?;
    p.expect(TokenKind::Separator, Some("("))?;
    let params = parse_param_list(p)?;
    p.expect(TokenKind::Separator, Some(")"))?;
    let body = crate::stmt::parse_block(p)?;
    let span = start.merge(body.span);
    Ok(Constructor { params, body, span })
}

/// `FuncSignature Block`, i.e. a function declaration that names itself —
/// used both for top-level functions and template methods.
fn parse_named_func_decl(p: &mut Parser) -> PResult<FuncNode> {
    let signature = parse_func_signature(p)?;
    let body = crate::stmt::parse_block(p)?;
    let span = signature.span.merge(body.span);
    Ok(FuncNode { signature, body, anon: false, span })
}

fn parse_func_signature(p: &mut Parser) -> PResult<FuncSignature> {
    let start = p.expect(TokenKind::Identifier, Some("func"))?.span;
    p.expect(TokenKind::Separator, Some("("))?;
    let params = parse_param_list(p)?;
    p.expect(TokenKind::Separator, Some(")"))?;
    p.expect(TokenKind::Operator, Some(">"))?;
    let name_tok = p.expect(TokenKind::Identifier, None)?;
    let name = Symbol::intern(&name_tok.lexeme);
    p.expect(TokenKind::Operator, Some(">"))?;
    p.expect(TokenKind::Separator, Some("("))?;
    let ret = parse_optional_type_ref(p)?;
    let end = p.expect(TokenKind::Separator, Some(")"))?.span;
    Ok(FuncSignature { name, params, ret, span: start.merge(end) })
}

/// `'func' '(' ParamList ')' '>' '(' TypeRef? ')' Block` — a function
/// literal with no name, used in expression position.
pub(crate) fn parse_anon_func(p: &mut Parser) -> PResult<FuncNode> {
    let start = p.expect(TokenKind::Identifier, Some("func"))?.span;
    p.expect(TokenKind::Separator, Some("("))?;
    let params = parse_param_list(p)?;
    p.expect(TokenKind::Separator, Some(")"))?;
    p.expect(TokenKind::Operator, Some(">"))?;
    p.expect(TokenKind::Separator, Some("("))?;
    let ret = parse_optional_type_ref(p)?;
    p.expect(TokenKind::Separator, Some(")"))?;
    let body = crate::stmt::parse_block(p)?;
    let span = start.merge(body.span);
    let signature = FuncSignature { name: Symbol::intern(""), params, ret, span };
    Ok(FuncNode { signature, body, anon: true, span })
}

pub(crate) fn parse_param_list(p: &mut Parser) -> PResult<Vec<VarDecl>> {
    let mut params = Vec::new();
    if p.matches(0, TokenKind::Separator, &[")"]) {
        return Ok(params);
    }
    params.push(parse_var_decl(p)?);
    while p.matches(0, TokenKind::Separator, &[","]) {
        p.consume();
        params.push(parse_var_decl(p)?);
    }
    Ok(params)
}

pub(crate) fn parse_var_decl(p: &mut Parser) -> PResult<VarDecl> {
    let ty = parse_type_ref(p)?;
    let name_tok = p.expect(TokenKind::Identifier, None)?;
    let name = Symbol::intern(&name_tok.lexeme);
    let mut span = ty.span().merge(name_tok.span);
    let value = if p.matches(0, TokenKind::Operator, &["="]) {
        p.consume();
        let expr = crate::expr::parse_expr(p)?;
        span = span.merge(expr.span());
        Some(expr)
    } else {
        None
    };
    Ok(VarDecl { ty, name, value, span })
}

/// `TypeRef := FuncType | ArrayType | NamedType`.
pub(crate) fn parse_type_ref(p: &mut Parser) -> PResult<TypeRef> {
    if p.matches(0, TokenKind::Separator, &["["]) {
        let start = p.consume().span;
        p.expect(TokenKind::Separator, Some("]"))?;
        let element = parse_type_ref(p)?;
        let span = start.merge(element.span());
        return Ok(TypeRef::Array(Box::new(ArrayType { element, span })));
    }
    if p.matches(0, TokenKind::Identifier, &["func"]) {
        return Ok(TypeRef::Func(Box::new(parse_func_type(p)?)));
    }
    let name_tok = p.expect(TokenKind::Identifier, None)?;
    let name = Symbol::intern(&name_tok.lexeme);
    Ok(TypeRef::Named(NamedType { name, span: name_tok.span }))
}

/// `'func' '(' TypeList ')' '>' '(' TypeRef? ')'` — a function-pointer type
/// reference, distinct from [`parse_func_signature`] in that it never names
/// itself.
fn parse_func_type(p: &mut Parser) -> PResult<FuncType> {
    let start = p.expect(TokenKind::Identifier, Some("func"))?.span;
    p.expect(TokenKind::Separator, Some("("))?;
    let mut params = Vec::new();
    if !p.matches(0, TokenKind::Separator, &[")"]) {
        params.push(parse_type_ref(p)?);
        while p.matches(0, TokenKind::Separator, &[","]) {
            p.consume();
            params.push(parse_type_ref(p)?);
        }
    }
    p.expect(TokenKind::Separator, Some(")"))?;
    p.expect(TokenKind::Operator, Some(">"))?;
    p.expect(TokenKind::Separator, Some("("))?;
    let ret = parse_optional_type_ref(p)?;
    let end = p.expect(TokenKind::Separator, Some(")"))?.span;
    Ok(FuncType { params, ret, span: start.merge(end) })
}

fn parse_optional_type_ref(p: &mut Parser) -> PResult<Option<TypeRef>> {
    if p.matches(0, TokenKind::Separator, &[")"]) {
        Ok(None)
    } else {
        Ok(Some(parse_type_ref(p)?))
    }
}
