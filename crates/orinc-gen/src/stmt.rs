//! Statement lowering (§4.5). Every `lower_*` returns whether the statement
//! terminates its block (ends in `return`, or every arm of an `if`/`loop`
//! does) so callers can decide whether a trailing implicit return is needed.

use orinc_par::ast;

use crate::ir_type::Ty;
use crate::{EResult, EmitError, Emitter};

impl<'ctx> Emitter<'ctx> {
    /// Returns `true` if the block is guaranteed to have emitted a
    /// terminator (so the builder's insertion point is no longer live).
    pub(crate) fn lower_block(&mut self, block: &ast::Block) -> EResult<bool> {
        self.scope.push();
        let mut terminated = false;
        for stmt in &block.stmts {
            if terminated {
                break;
            }
            terminated = self.lower_stmt(stmt)?;
        }
        self.scope.pop();
        Ok(terminated)
    }

    fn lower_stmt(&mut self, stmt: &ast::Stmt) -> EResult<bool> {
        match stmt {
            ast::Stmt::VarDecl(v) => self.lower_var_decl(v).map(|_| false),
            ast::Stmt::Assign(a) => self.lower_assign(a).map(|_| false),
            ast::Stmt::Call(c) => self.lower_call_stmt(c).map(|_| false),
            ast::Stmt::Return(r) => self.lower_return(r),
            ast::Stmt::If(i) => self.lower_if(i),
            ast::Stmt::Loop(l) => self.lower_loop(l),
        }
    }

    fn lower_var_decl(&mut self, v: &ast::VarDecl) -> EResult<()> {
        if self.scope.declared(v.name) {
            return Err(EmitError::Redeclaration { name: v.name.to_string(), span: v.span });
        }
        let ty = self.type_map.resolve(&v.ty, v.span)?;
        let llvm_ty = self.type_map.llvm_type(&ty);
        let slot = self.build_alloca(llvm_ty, v.name.as_str())?;

        match &v.value {
            Some(init) => {
                let (val, val_ty) = self.lower_expr(init)?;
                let converted = self.convert(val, &val_ty, &ty, v.span)?;
                self.store(slot, converted)?;
            }
            None => {
                if ty.is_pointer() {
                    let null = self.type_map.llvm_type(&ty).into_pointer_type().const_null();
                    self.store(slot, null)?;
                }
                // Non-pointer locals with no initializer are left
                // uninitialized until the first assignment.
            }
        }

        self.scope.declare(v.name, slot, ty);
        Ok(())
    }

    fn lower_assign(&mut self, a: &ast::AssignStmt) -> EResult<()> {
        let (target_ptr, target_ty) = self.lower_lvalue(&a.target)?;
        let (val, val_ty) = self.lower_expr(&a.value)?;
        let converted = self.convert(val, &val_ty, &target_ty, a.span)?;
        self.store(target_ptr, converted)
    }

    fn lower_call_stmt(&mut self, c: &ast::CallStmt) -> EResult<()> {
        self.lower_expr(&ast::Expr::Call(c.call.clone())).map(|_| ())
    }

    fn lower_return(&mut self, r: &ast::ReturnStmt) -> EResult<bool> {
        match (&r.value, self.current_return.clone()) {
            (Some(expr), Some(ret_ty)) => {
                let (val, val_ty) = self.lower_expr(expr)?;
                let converted = self.convert(val, &val_ty, &ret_ty, r.span)?;
                self.builder.build_return(Some(&converted)).map_err(|e| EmitError::Llvm(e.to_string()))?;
            }
            (None, None) => {
                self.builder.build_return(None).map_err(|e| EmitError::Llvm(e.to_string()))?;
            }
            (Some(_), None) => {
                return Err(EmitError::TypeMismatch {
                    expected: "void".into(),
                    found: "value".into(),
                    span: r.span,
                })
            }
            (None, Some(ret_ty)) => {
                return Err(EmitError::TypeMismatch {
                    expected: format!("{:?}", ret_ty),
                    found: "void".into(),
                    span: r.span,
                })
            }
        }
        Ok(true)
    }

    fn lower_if(&mut self, stmt: &ast::IfStmt) -> EResult<bool> {
        let (cond_val, cond_ty) = self.lower_expr(&stmt.cond)?;
        if cond_ty != Ty::Boolean {
            return Err(EmitError::TypeMismatch {
                expected: "boolean".into(),
                found: format!("{:?}", cond_ty),
                span: stmt.span,
            });
        }
        let func = self.current_function.expect("inside a function body");
        let then_block = self.context.append_basic_block(func, "then");
        let else_block = self.context.append_basic_block(func, "else");
        let exit_block = self.context.append_basic_block(func, "endif");

        self.builder
            .build_conditional_branch(cond_val.into_int_value(), then_block, else_block)
            .map_err(|e| EmitError::Llvm(e.to_string()))?;

        self.builder.position_at_end(then_block);
        let then_terminated = self.lower_block(&stmt.body)?;
        if !then_terminated {
            self.builder.build_unconditional_branch(exit_block).map_err(|e| EmitError::Llvm(e.to_string()))?;
        }

        self.builder.position_at_end(else_block);
        let else_terminated = match &stmt.else_branch {
            Some(ast::ElseBranch::Block(b)) => self.lower_block(b)?,
            Some(ast::ElseBranch::If(nested)) => self.lower_if(nested)?,
            None => false,
        };
        if !else_terminated {
            self.builder.build_unconditional_branch(exit_block).map_err(|e| EmitError::Llvm(e.to_string()))?;
        }

        let terminated = then_terminated && else_terminated;
        if terminated {
            exit_block
                .remove_from_function()
                .map_err(|_| EmitError::Llvm("failed to remove unreachable endif block".into()))?;
        } else {
            self.builder.position_at_end(exit_block);
        }
        Ok(terminated)
    }

    fn lower_loop(&mut self, stmt: &ast::LoopStmt) -> EResult<bool> {
        self.scope.push();
        if let Some(init) = &stmt.init {
            self.lower_var_decl(init)?;
        }

        let func = self.current_function.expect("inside a function body");
        let cond_block = self.context.append_basic_block(func, "loop_cond");
        let body_block = self.context.append_basic_block(func, "loop_body");
        let exit_block = self.context.append_basic_block(func, "loop_exit");

        self.builder.build_unconditional_branch(cond_block).map_err(|e| EmitError::Llvm(e.to_string()))?;
        self.builder.position_at_end(cond_block);
        let (cond_val, cond_ty) = self.lower_expr(&stmt.cond)?;
        if cond_ty != Ty::Boolean {
            return Err(EmitError::TypeMismatch {
                expected: "boolean".into(),
                found: format!("{:?}", cond_ty),
                span: stmt.span,
            });
        }
        self.builder
            .build_conditional_branch(cond_val.into_int_value(), body_block, exit_block)
            .map_err(|e| EmitError::Llvm(e.to_string()))?;

        self.builder.position_at_end(body_block);
        let body_terminated = self.lower_block(&stmt.body)?;
        if !body_terminated {
            match &stmt.post {
                Some(ast::LoopPost::Assign(a)) => self.lower_assign(a)?,
                Some(ast::LoopPost::Call(c)) => self.lower_call_stmt(c)?,
                None => {}
            }
            self.builder.build_unconditional_branch(cond_block).map_err(|e| EmitError::Llvm(e.to_string()))?;
        }

        self.builder.position_at_end(exit_block);
        self.scope.pop();
        // A `for` can always fall through via the condition becoming false,
        // so it never counts as terminating its enclosing block.
        Ok(false)
    }
}
