//! Lowers an Orin [`ast::Program`] to textual LLVM IR.
//!
//! Emission happens in two passes over the program's top-level
//! declarations (§4.5): pass 1 declares every template, function and
//! constructor/method signature so forward references resolve; pass 2 fills
//! in bodies. A builder cursor, the current function, and the current scope
//! are the only pieces of mutable emission state, bundled in [`Emitter`]
//! rather than threaded as separate arguments through every lowering
//! function.

mod error;
mod expr;
mod ir_type;
mod mangle;
mod scope;
mod stdlib;
mod stmt;

pub use error::EmitError;
pub use ir_type::Ty;

use std::collections::HashMap;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::{FunctionValue, PointerValue};
use orinc_par::ast;
use orinc_util::Symbol;

use ir_type::TypeMap;
use scope::Scope;

pub struct FuncInfo<'ctx> {
    pub func: FunctionValue<'ctx>,
    pub params: Vec<Ty>,
    pub ret: Option<Ty>,
}

pub struct Emitter<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    type_map: TypeMap<'ctx>,
    scope: Scope<'ctx>,
    current_function: Option<FunctionValue<'ctx>>,
    current_return: Option<Ty>,
    current_params: HashMap<Symbol, (PointerValue<'ctx>, Ty)>,
    functions: HashMap<Symbol, FuncInfo<'ctx>>,
    globals: HashMap<Symbol, (PointerValue<'ctx>, Ty)>,
    stdlib: stdlib::Stdlib<'ctx>,
    declared_free_functions: std::collections::HashSet<Symbol>,
}

type EResult<T> = Result<T, EmitError>;

impl<'ctx> Emitter<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str, target_triple: &str) -> Self {
        let module = context.create_module(module_name);
        let triple = inkwell::targets::TargetTriple::create(target_triple);
        module.set_triple(&triple);
        let builder = context.create_builder();
        let mut type_map = TypeMap::new(context);

        let stdlib = stdlib::inject(context, &module, &builder, &mut type_map);

        // `printf`/`malloc` are callable from Orin source as ordinary free
        // functions (§4.6); `llvm.memcpy.p0i8.p0i8.i32` is not a valid Orin
        // identifier and stays reachable only through `self.stdlib`.
        let mut functions = HashMap::new();
        functions.insert(
            Symbol::intern("printf"),
            FuncInfo { func: stdlib.printf, params: vec![Ty::pointer(Ty::Char)], ret: Some(Ty::Int) },
        );
        functions.insert(
            Symbol::intern("malloc"),
            FuncInfo { func: stdlib.malloc, params: vec![Ty::Int], ret: Some(Ty::pointer(Ty::Char)) },
        );

        Self {
            context,
            module,
            builder,
            type_map,
            scope: Scope::new(),
            current_function: None,
            current_return: None,
            current_params: HashMap::new(),
            functions,
            globals: HashMap::new(),
            stdlib,
            declared_free_functions: std::collections::HashSet::new(),
        }
    }

    /// Lower the whole program and return the module's textual IR.
    ///
    /// Methods have their AST signature name rewritten in place to the
    /// mangled form during declaration — the one deliberate exception to
    /// treating the AST as read-only during emission (§5).
    pub fn compile(mut self, program: &mut ast::Program) -> EResult<String> {
        self.declare_pass(program)?;
        self.define_pass(program)?;
        Ok(self.module.print_to_string().to_string())
    }

    // ---- Pass 1: declaration -----------------------------------------

    fn declare_pass(&mut self, program: &mut ast::Program) -> EResult<()> {
        for decl in &program.decls {
            if let ast::Decl::Template(t) = decl {
                if self.type_map.has_template(t.name) {
                    return Err(EmitError::Redeclaration { name: t.name.to_string(), span: t.span });
                }
                self.type_map.declare_template(t.name);
            }
        }
        for decl in program.decls.iter_mut() {
            match decl {
                ast::Decl::Template(t) => self.declare_template_body(t)?,
                ast::Decl::Func(f) => self.declare_free_function(f)?,
                ast::Decl::Var(_) => {}
            }
        }
        Ok(())
    }

    fn declare_template_body(&mut self, t: &mut ast::Template) -> EResult<()> {
        let mut fields = Vec::with_capacity(t.fields.len());
        for field in &t.fields {
            let ty = self.type_map.resolve(&field.ty, field.span)?;
            fields.push((field.name, ty));
        }
        self.type_map.define_template_fields(t.name, fields);

        if let Some(ctor) = &t.constructor {
            let mut param_tys = Vec::with_capacity(ctor.params.len() + 1);
            param_tys.push(self.type_map.llvm_type(&Ty::pointer(Ty::Record(t.name))).into());
            let mut logical_params = Vec::with_capacity(ctor.params.len());
            for p in &ctor.params {
                let ty = self.type_map.resolve(&p.ty, p.span)?;
                param_tys.push(self.type_map.llvm_type(&ty).into());
                logical_params.push(ty);
            }
            let fn_ty = self.context.void_type().fn_type(&param_tys, false);
            let func = self.module.add_function(&mangle::constructor_name(t.name.as_str()), fn_ty, None);
            self.context.append_basic_block(func, "entry");
            self.type_map.set_constructor(t.name, func, logical_params);
        }

        for method in t.methods.iter_mut() {
            let mangled = mangle::method_name(t.name.as_str(), method.signature.name.as_str());
            let ret = match &method.signature.ret {
                Some(r) => Some(self.type_map.resolve(r, method.span)?),
                None => None,
            };
            let mut param_tys = vec![self.type_map.llvm_type(&Ty::pointer(Ty::Record(t.name))).into()];
            let mut logical_params = Vec::with_capacity(method.signature.params.len());
            for p in &method.signature.params {
                let ty = self.type_map.resolve(&p.ty, p.span)?;
                param_tys.push(self.type_map.llvm_type(&ty).into());
                logical_params.push(ty);
            }
            let llvm_ret = ret.as_ref().map(|t| self.type_map.llvm_type(t));
            let fn_ty = match &llvm_ret {
                Some(r) => r.fn_type(&param_tys, false),
                None => self.context.void_type().fn_type(&param_tys, false),
            };
            let func = self.module.add_function(&mangled, fn_ty, None);
            self.context.append_basic_block(func, "entry");
            method.signature.name = Symbol::intern(&mangled);
            self.type_map.add_method(
                t.name,
                Symbol::intern(&mangled),
                ir_type::MethodInfo { func, params: logical_params, ret },
            );
        }
        Ok(())
    }

    fn declare_free_function(&mut self, f: &ast::FuncNode) -> EResult<()> {
        // Checked against other *user* declarations only — naming a function
        // `printf` collides with the runtime and is mangled away by
        // `mangle::free_function_name`, not rejected as a redeclaration.
        if !self.declared_free_functions.insert(f.signature.name) {
            return Err(EmitError::Redeclaration { name: f.signature.name.to_string(), span: f.span });
        }
        let mangled = mangle::free_function_name(f.signature.name.as_str());
        let ret = match &f.signature.ret {
            Some(r) => Some(self.type_map.resolve(r, f.span)?),
            None => None,
        };
        let mut param_tys = Vec::with_capacity(f.signature.params.len());
        let mut logical_params = Vec::with_capacity(f.signature.params.len());
        for p in &f.signature.params {
            let ty = self.type_map.resolve(&p.ty, p.span)?;
            param_tys.push(self.type_map.llvm_type(&ty).into());
            logical_params.push(ty);
        }
        let llvm_ret = ret.as_ref().map(|t| self.type_map.llvm_type(t));
        let fn_ty = match &llvm_ret {
            Some(r) => r.fn_type(&param_tys, false),
            None => self.context.void_type().fn_type(&param_tys, false),
        };
        let func = self.module.add_function(&mangled, fn_ty, None);
        self.context.append_basic_block(func, "entry");
        self.functions.insert(f.signature.name, FuncInfo { func, params: logical_params, ret });
        Ok(())
    }

    // ---- Pass 2: definition -------------------------------------------

    fn define_pass(&mut self, program: &mut ast::Program) -> EResult<()> {
        for decl in program.decls.iter() {
            if let ast::Decl::Var(v) = decl {
                self.define_global(v)?;
            }
        }
        for decl in program.decls.iter() {
            match decl {
                ast::Decl::Func(f) => self.define_function(f, &f.signature.params, f.signature.ret.as_ref(), &f.body, None)?,
                ast::Decl::Template(t) => self.define_template(t)?,
                ast::Decl::Var(_) => {}
            }
        }
        Ok(())
    }

    fn define_global(&mut self, v: &ast::VarDecl) -> EResult<()> {
        if self.globals.contains_key(&v.name) {
            return Err(EmitError::Redeclaration { name: v.name.to_string(), span: v.span });
        }
        let ty = self.type_map.resolve(&v.ty, v.span)?;
        let llvm_ty = self.type_map.llvm_type(&ty);
        let global = self.module.add_global(llvm_ty, None, v.name.as_str());
        if ty.is_pointer() {
            global.set_initializer(&self.type_map.llvm_type(&ty).into_pointer_type().const_null());
        }
        self.globals.insert(v.name, (global.as_pointer_value(), ty));
        Ok(())
    }

    fn define_template(&mut self, t: &ast::Template) -> EResult<()> {
        if let Some(ctor) = &t.constructor {
            let (func, params) = self
                .type_map
                .template(t.name)
                .and_then(|layout| layout.constructor.clone())
                .expect("constructor declared in pass 1");
            self.define_function_body(func, &ctor.params, None, &ctor.body, Some((t.name, params[..].to_vec())))?;
        }
        for method in &t.methods {
            let info = self
                .type_map
                .template(t.name)
                .and_then(|layout| layout.methods.get(&method.signature.name))
                .cloned()
                .expect("method declared in pass 1");
            self.define_function_body(
                info.func,
                &method.signature.params,
                info.ret.as_ref(),
                &method.body,
                Some((t.name, info.params.clone())),
            )?;
        }
        Ok(())
    }

    /// `this_template` is `Some((template, ())` for constructors/methods,
    /// whose mangled function always takes the receiver as parameter 0.
    fn define_function(
        &mut self,
        f: &ast::FuncNode,
        params: &[ast::VarDecl],
        ret: Option<&ast::TypeRef>,
        body: &ast::Block,
        this_template: Option<(Symbol, Vec<Ty>)>,
    ) -> EResult<()> {
        let info = self
            .functions
            .get(&f.signature.name)
            .map(|i| (i.func, i.ret.clone()))
            .expect("free function declared in pass 1");
        let ret_ty = match ret {
            Some(r) => Some(self.type_map.resolve(r, f.span)?),
            None => info.1,
        };
        self.define_function_body(info.0, params, ret_ty.as_ref(), body, this_template)
    }

    fn define_function_body(
        &mut self,
        func: FunctionValue<'ctx>,
        params: &[ast::VarDecl],
        ret: Option<&Ty>,
        body: &ast::Block,
        this_template: Option<(Symbol, Vec<Ty>)>,
    ) -> EResult<()> {
        let entry = func.get_first_basic_block().expect("entry block created in pass 1");
        self.builder.position_at_end(entry);
        self.scope = Scope::new();
        self.current_function = Some(func);
        self.current_return = ret.cloned();
        self.current_params.clear();

        let mut llvm_param_idx = 0u32;
        if let Some((template, _)) = &this_template {
            let this_ty = Ty::pointer(Ty::Record(*template));
            let llvm_ty = self.type_map.llvm_type(&this_ty);
            let slot = self.build_alloca(llvm_ty, "this")?;
            let incoming = func.get_nth_param(0).expect("this parameter");
            self.store(slot, incoming)?;
            self.current_params.insert(Symbol::intern("this"), (slot, this_ty));
            llvm_param_idx = 1;
        }

        for param in params {
            let ty = self.type_map.resolve(&param.ty, param.span)?;
            let llvm_ty = self.type_map.llvm_type(&ty);
            let slot = self.build_alloca(llvm_ty, param.name.as_str())?;
            let incoming = func.get_nth_param(llvm_param_idx).expect("declared parameter");
            self.store(slot, incoming)?;
            self.current_params.insert(param.name, (slot, ty));
            llvm_param_idx += 1;
        }

        let terminated = self.lower_block(body)?;
        if !terminated {
            if ret.is_some() {
                // A non-void function whose body fell through without a
                // `return` is not well-formed; the grammar only guarantees
                // termination is checked, not that one is unreachable.
                self.builder.build_unreachable().map_err(|e| EmitError::Llvm(e.to_string()))?;
            } else {
                self.builder.build_return(None).map_err(|e| EmitError::Llvm(e.to_string()))?;
            }
        }
        Ok(())
    }

    // ---- shared IR-building helpers -----------------------------------

    pub(crate) fn build_alloca(
        &self,
        ty: inkwell::types::BasicTypeEnum<'ctx>,
        name: &str,
    ) -> EResult<PointerValue<'ctx>> {
        self.builder.build_alloca(ty, name).map_err(|e| EmitError::Llvm(e.to_string()))
    }

    pub(crate) fn store(
        &self,
        ptr: PointerValue<'ctx>,
        value: impl inkwell::values::BasicValue<'ctx>,
    ) -> EResult<()> {
        self.builder.build_store(ptr, value).map_err(|e| EmitError::Llvm(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use orinc_lex::Lexer;
    use orinc_par::Parser;
    use orinc_util::SourceFile;

    use super::Emitter;

    /// Runs `src` through the real lexer and parser and returns the
    /// emitted module's textual IR, or the `Display` of whatever error
    /// stopped it, for tests to grep over.
    fn emit(src: &str) -> Result<String, String> {
        let file = SourceFile::new("test.orin".to_string(), src);
        let tokens = Lexer::new(&file).lex_all().map_err(|e| e.to_string())?;
        let mut program = Parser::new(tokens).parse_program().map_err(|e| e.to_string())?;
        let context = inkwell::context::Context::create();
        Emitter::new(&context, "test", "x86_64-unknown-linux-gnu")
            .compile(&mut program)
            .map_err(|e| e.to_string())
    }

    #[test]
    fn hello_record_stores_a_field_through_malloc() {
        let ir = emit("tmpl Foo { int x; } func()>main>() { Foo f = make Foo(); f.x = 42; return; }")
            .expect("module should emit");
        assert!(ir.contains("define"), "no function defined:\n{ir}");
        assert!(ir.contains("call ptr @malloc"), "constructor should allocate via malloc:\n{ir}");
        assert!(ir.contains("store i32 42"), "field store missing:\n{ir}");
        assert!(!ir.contains("--printf") && !ir.contains("--malloc"), "runtime externs must not be mangled:\n{ir}");
    }

    #[test]
    fn arithmetic_promotes_int_to_float() {
        let ir = emit("func()>main>(int) { return 1 + 2.0; }").expect("module should emit");
        assert!(ir.contains("fadd"), "int operand should promote before the add:\n{ir}");
    }

    #[test]
    fn if_else_both_branches_return() {
        let ir = emit(
            "func(int n)>classify>(int) { if (n > 0) { return 1; } else { return 0; } }",
        )
        .expect("module should emit");
        // Neither arm falls through, so the merge block the parser's `if`
        // produces should have been pruned rather than left unreachable.
        assert!(ir.contains("ret i32 1"));
        assert!(ir.contains("ret i32 0"));
    }

    #[test]
    fn string_concat_calls_the_runtime_helper() {
        let ir = emit(r#"func()>main>() { string s = "a" + "b"; return; }"#)
            .expect("module should emit");
        assert!(ir.contains("call ptr @llvm.memcpy.p0i8.p0i8.i32"), "concat should memcpy both operands:\n{ir}");
        assert!(
            ir.contains("declare ptr @llvm.memcpy.p0i8.p0i8.i32(ptr, ptr, i32, i32, i1)"),
            "memcpy must carry its align parameter:\n{ir}"
        );
        // The concatenated length is a's bytes (length minus its own NUL)
        // plus b's length (which already includes b's NUL), not a's raw
        // stored length plus b's — that would double-count a's NUL.
        assert!(
            ir.contains("add i32 %a_bytes, %b_len"),
            "concat length should be a_bytes + b_len, not a_len + b_len:\n{ir}"
        );
    }

    #[test]
    fn record_pointer_equality_does_not_panic() {
        let ir = emit(
            "tmpl Foo { int x; } \
             func()>main>(int) { Foo a = make Foo(); Foo b = make Foo(); if (a == b) { return 1; } return 0; }",
        )
        .expect("pointer equality should emit rather than panic");
        assert!(ir.contains("ptrtoint"), "pointer equality should compare via ptrtoint:\n{ir}");
        assert!(ir.contains("icmp eq i64"), "pointer equality should use integer equality:\n{ir}");
    }

    #[test]
    fn method_call_dispatches_to_the_mangled_name() {
        let ir = emit(
            "tmpl Foo { int x; func()>bump>() { x = x + 1; return; } } \
             func()>main>() { Foo f = make Foo(); f.bump(); return; }",
        )
        .expect("module should emit");
        assert!(ir.contains("@\"-Foo-bump\"") || ir.contains("@-Foo-bump"), "method should mangle to -Foo-bump:\n{ir}");
    }

    #[test]
    fn printf_is_callable_from_user_source() {
        let ir = emit(r#"func()>main>() { printf("hi"); return; }"#).expect("module should emit");
        assert!(ir.contains("call i32 (ptr, ...) @printf"), "printf should be reachable as a free call:\n{ir}");
        assert!(!ir.contains("@\"--printf\""), "printf's own symbol must stay unmangled:\n{ir}");
    }

    #[test]
    fn undeclared_variable_is_rejected() {
        let err = emit("func()>main>() { x = 1; return; }").unwrap_err();
        assert!(err.contains("x"), "error should name the undefined variable: {err}");
    }

    #[test]
    fn static_zero_modulo_is_rejected_like_division() {
        let err = emit("func()>main>(int) { return 5 % 0; }").unwrap_err();
        assert!(err.contains("division by zero"), "modulo by a constant zero should be rejected too: {err}");
    }

    #[test]
    fn redeclaring_a_template_is_rejected() {
        let err = emit("tmpl Foo { int x; } tmpl Foo { int y; } func()>main>() { return; }")
            .unwrap_err();
        assert!(!err.is_empty());
    }
}
