//! Expression lowering (§4.5): literals, variable/field access, calls,
//! `make`, unary and binary operators. Every helper here returns the
//! `BasicValueEnum` plus the [`Ty`] the emitter needs to keep driving
//! conversions — `inkwell` alone can't tell a `string` pointer from a record
//! pointer.

use inkwell::values::{BasicValue, BasicValueEnum, PointerValue};
use inkwell::{FloatPredicate, IntPredicate};
use orinc_par::ast;
use orinc_util::Symbol;

use crate::ir_type::Ty;
use crate::mangle;
use crate::stdlib::STRING_TEMPLATE;
use crate::{EResult, EmitError, Emitter};

impl<'ctx> Emitter<'ctx> {
    pub(crate) fn lower_expr(&mut self, expr: &ast::Expr) -> EResult<(BasicValueEnum<'ctx>, Ty)> {
        match expr {
            ast::Expr::NumLit(n) => self.lower_num_lit(n),
            ast::Expr::BoolLit(b) => {
                let v = self.context.bool_type().const_int(b.value as u64, false);
                Ok((v.into(), Ty::Boolean))
            }
            ast::Expr::CharLit(c) => {
                let v = self.context.i8_type().const_int((c.value as u32 & 0xFF) as u64, false);
                Ok((v.into(), Ty::Char))
            }
            ast::Expr::StringLit(s) => {
                let ptr = self.generate_string_literal(&s.value)?;
                Ok((ptr.into(), Ty::string()))
            }
            ast::Expr::VarAccess(v) => self.lower_var_access(v),
            ast::Expr::ObjectAccess(o) => self.lower_object_access(o),
            ast::Expr::ArrayAccess(a) => self.lower_array_access(a),
            ast::Expr::Call(c) => self.lower_call(c),
            ast::Expr::Make(m) => self.lower_make(m),
            ast::Expr::Unary(u) => self.lower_unary(u),
            ast::Expr::Binary(b) => self.lower_binary(b),
            ast::Expr::FuncLit(_) => {
                // Anonymous function literals as values are not reachable
                // from any of the emitted scenarios; declaring one at
                // top level already goes through declare_free_function.
                Err(EmitError::NotCallable { name: "<anonymous function>".into(), span: expr.span() })
            }
        }
    }

    fn lower_num_lit(&mut self, n: &ast::NumLit) -> EResult<(BasicValueEnum<'ctx>, Ty)> {
        if n.is_float {
            let v: f64 = n.text.parse().map_err(|_| EmitError::TypeMismatch {
                expected: "float literal".into(),
                found: n.text.clone(),
                span: n.span,
            })?;
            Ok((self.context.f32_type().const_float(v).into(), Ty::Float))
        } else {
            let v: i64 = n.text.parse().map_err(|_| EmitError::TypeMismatch {
                expected: "int literal".into(),
                found: n.text.clone(),
                span: n.span,
            })?;
            Ok((self.context.i32_type().const_int(v as u64, true).into(), Ty::Int))
        }
    }

    fn lower_var_access(&mut self, v: &ast::VarAccess) -> EResult<(BasicValueEnum<'ctx>, Ty)> {
        let (ptr, ty) = self.resolve_var(v.name).ok_or_else(|| EmitError::UndefinedVariable {
            name: v.name.to_string(),
            span: v.span,
        })?;
        let llvm_ty = self.type_map.llvm_type(&ty);
        let loaded =
            self.builder.build_load(llvm_ty, ptr, v.name.as_str()).map_err(|e| EmitError::Llvm(e.to_string()))?;
        Ok((loaded, ty))
    }

    /// Looks up a name in the current function's parameters, then the
    /// lexical scope, then module globals — in that order (§4.3).
    pub(crate) fn resolve_var(&self, name: Symbol) -> Option<(PointerValue<'ctx>, Ty)> {
        if let Some((ptr, ty)) = self.current_params.get(&name) {
            return Some((*ptr, ty.clone()));
        }
        if let Some((ptr, ty)) = self.scope.lookup(name) {
            return Some((ptr, ty.clone()));
        }
        self.globals.get(&name).cloned()
    }

    fn object_address(&mut self, o: &ast::ObjectAccess) -> EResult<(PointerValue<'ctx>, Symbol, Ty)> {
        let (obj_val, obj_ty) = self.lower_expr(&o.object)?;
        let template = match &obj_ty {
            Ty::Pointer(inner) => match inner.as_ref() {
                Ty::Record(name) => *name,
                _ => {
                    return Err(EmitError::UnknownField {
                        template: format!("{:?}", obj_ty),
                        field: o.member.to_string(),
                        span: o.span,
                    })
                }
            },
            _ => {
                return Err(EmitError::UnknownField {
                    template: format!("{:?}", obj_ty),
                    field: o.member.to_string(),
                    span: o.span,
                })
            }
        };
        let layout = self
            .type_map
            .template(template)
            .ok_or_else(|| EmitError::UnknownTemplate { name: template.to_string(), span: o.span })?;
        let (idx, field_ty) = layout.field(o.member).ok_or_else(|| EmitError::UnknownField {
            template: template.to_string(),
            field: o.member.to_string(),
            span: o.span,
        })?;
        let field_ty = field_ty.clone();
        let field_ptr = self
            .builder
            .build_struct_gep(layout.struct_ty, obj_val.into_pointer_value(), idx, o.member.as_str())
            .map_err(|e| EmitError::Llvm(e.to_string()))?;
        Ok((field_ptr, template, field_ty))
    }

    fn lower_object_access(&mut self, o: &ast::ObjectAccess) -> EResult<(BasicValueEnum<'ctx>, Ty)> {
        let (field_ptr, _template, field_ty) = self.object_address(o)?;
        let llvm_ty = self.type_map.llvm_type(&field_ty);
        let loaded = self
            .builder
            .build_load(llvm_ty, field_ptr, o.member.as_str())
            .map_err(|e| EmitError::Llvm(e.to_string()))?;
        Ok((loaded, field_ty))
    }

    fn lower_array_access(&mut self, a: &ast::ArrayAccess) -> EResult<(BasicValueEnum<'ctx>, Ty)> {
        let (array_val, array_ty) = self.lower_expr(&a.array)?;
        let elem_ty = match &array_ty {
            Ty::Pointer(inner) => inner.as_ref().clone(),
            _ => {
                return Err(EmitError::TypeMismatch {
                    expected: "array".into(),
                    found: format!("{:?}", array_ty),
                    span: a.span,
                })
            }
        };
        let (index_val, index_ty) = self.lower_expr(&a.index)?;
        if !index_ty.is_int() {
            return Err(EmitError::TypeMismatch {
                expected: "int".into(),
                found: format!("{:?}", index_ty),
                span: a.span,
            });
        }
        let elem_llvm_ty = self.type_map.llvm_type(&elem_ty);
        let elem_ptr = unsafe {
            self.builder
                .build_gep(
                    elem_llvm_ty,
                    array_val.into_pointer_value(),
                    &[index_val.into_int_value()],
                    "elem_ptr",
                )
                .map_err(|e| EmitError::Llvm(e.to_string()))?
        };
        let loaded = self
            .builder
            .build_load(elem_llvm_ty, elem_ptr, "elem")
            .map_err(|e| EmitError::Llvm(e.to_string()))?;
        Ok((loaded, elem_ty))
    }

    /// Address of an lvalue (assignment target): `VarAccess`, `ObjectAccess`
    /// or `ArrayAccess`.
    pub(crate) fn lower_lvalue(&mut self, expr: &ast::Expr) -> EResult<(PointerValue<'ctx>, Ty)> {
        match expr {
            ast::Expr::VarAccess(v) => self
                .resolve_var(v.name)
                .ok_or_else(|| EmitError::UndefinedVariable { name: v.name.to_string(), span: v.span }),
            ast::Expr::ObjectAccess(o) => {
                let (ptr, _template, ty) = self.object_address(o)?;
                Ok((ptr, ty))
            }
            ast::Expr::ArrayAccess(a) => {
                let (array_val, array_ty) = self.lower_expr(&a.array)?;
                let elem_ty = match &array_ty {
                    Ty::Pointer(inner) => inner.as_ref().clone(),
                    _ => {
                        return Err(EmitError::TypeMismatch {
                            expected: "array".into(),
                            found: format!("{:?}", array_ty),
                            span: a.span,
                        })
                    }
                };
                let (index_val, _) = self.lower_expr(&a.index)?;
                let elem_llvm_ty = self.type_map.llvm_type(&elem_ty);
                let elem_ptr = unsafe {
                    self.builder
                        .build_gep(
                            elem_llvm_ty,
                            array_val.into_pointer_value(),
                            &[index_val.into_int_value()],
                            "elem_ptr",
                        )
                        .map_err(|e| EmitError::Llvm(e.to_string()))?
                };
                Ok((elem_ptr, elem_ty))
            }
            _ => Err(EmitError::TypeMismatch {
                expected: "assignable expression".into(),
                found: "expression".into(),
                span: expr.span(),
            }),
        }
    }

    fn lower_call(&mut self, call: &ast::CallExpr) -> EResult<(BasicValueEnum<'ctx>, Ty)> {
        match call.callee.as_ref() {
            ast::Expr::ObjectAccess(o) => self.lower_method_call(o, &call.args, call.span),
            ast::Expr::VarAccess(v) => self.lower_free_call(v.name, &call.args, call.span),
            _ => Err(EmitError::NotCallable { name: "<expression>".into(), span: call.span }),
        }
    }

    fn lower_free_call(
        &mut self,
        name: Symbol,
        args: &[ast::Expr],
        span: orinc_util::Span,
    ) -> EResult<(BasicValueEnum<'ctx>, Ty)> {
        let info = self
            .functions
            .get(&name)
            .map(|i| (i.func, i.params.clone(), i.ret.clone()))
            .ok_or_else(|| EmitError::UndefinedVariable { name: name.to_string(), span })?;
        let (func, params, ret) = info;
        let is_extern = func.count_basic_blocks() == 0;
        let mut arg_values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let (val, ty) = self.lower_expr(arg)?;
            let converted = match params.get(i) {
                Some(expected) => self.convert(val, &ty, expected, span)?,
                None => val,
            };
            let converted = if is_extern && ty == Ty::string() {
                self.unbox_string_arg(converted.into_pointer_value())?.into()
            } else {
                converted
            };
            arg_values.push(converted.into());
        }
        let call_site = self
            .builder
            .build_call(func, &arg_values, "call")
            .map_err(|e| EmitError::Llvm(e.to_string()))?;
        let value = call_site.try_as_basic_value().left();
        match (value, ret) {
            (Some(v), Some(ty)) => Ok((v, ty)),
            (None, None) => Ok((self.context.i32_type().const_int(0, false).into(), Ty::Int)),
            _ => Err(EmitError::TypeMismatch {
                expected: "matching call return type".into(),
                found: name.to_string(),
                span,
            }),
        }
    }

    fn lower_method_call(
        &mut self,
        o: &ast::ObjectAccess,
        args: &[ast::Expr],
        span: orinc_util::Span,
    ) -> EResult<(BasicValueEnum<'ctx>, Ty)> {
        let (receiver_val, receiver_ty) = self.lower_expr(&o.object)?;
        let template = match &receiver_ty {
            Ty::Pointer(inner) => match inner.as_ref() {
                Ty::Record(name) => *name,
                _ => return Err(EmitError::NotCallable { name: o.member.to_string(), span }),
            },
            _ => return Err(EmitError::NotCallable { name: o.member.to_string(), span }),
        };
        let mangled = Symbol::intern(&mangle::method_name(template.as_str(), o.member.as_str()));
        let layout = self
            .type_map
            .template(template)
            .ok_or_else(|| EmitError::UnknownTemplate { name: template.to_string(), span })?;
        let method = layout
            .methods
            .get(&mangled)
            .cloned()
            .ok_or_else(|| EmitError::NotCallable { name: o.member.to_string(), span })?;

        let mut arg_values = vec![receiver_val.into()];
        for (i, arg) in args.iter().enumerate() {
            let (val, ty) = self.lower_expr(arg)?;
            let converted = match method.params.get(i) {
                Some(expected) => self.convert(val, &ty, expected, span)?,
                None => val,
            };
            arg_values.push(converted.into());
        }
        let call_site = self
            .builder
            .build_call(method.func, &arg_values, "method_call")
            .map_err(|e| EmitError::Llvm(e.to_string()))?;
        match (call_site.try_as_basic_value().left(), method.ret) {
            (Some(v), Some(ty)) => Ok((v, ty)),
            (None, None) => Ok((self.context.i32_type().const_int(0, false).into(), Ty::Int)),
            _ => Err(EmitError::TypeMismatch {
                expected: "matching method return type".into(),
                found: o.member.to_string(),
                span,
            }),
        }
    }

    /// Replace a `pointer(string)` argument with its raw C string, for
    /// calls into externs declared with zero basic blocks (§4.5).
    fn unbox_string_arg(&self, string_ptr: PointerValue<'ctx>) -> EResult<PointerValue<'ctx>> {
        let string_name = Symbol::intern(STRING_TEMPLATE);
        let layout = self.type_map.template(string_name).expect("string template injected");
        let (idx, _) = layout.field(Symbol::intern("data")).expect("data field");
        let data_ptr = self
            .builder
            .build_struct_gep(layout.struct_ty, string_ptr, idx, "data_ptr")
            .map_err(|e| EmitError::Llvm(e.to_string()))?;
        let loaded = self
            .builder
            .build_load(self.context.ptr_type(inkwell::AddressSpace::default()), data_ptr, "cstr")
            .map_err(|e| EmitError::Llvm(e.to_string()))?;
        Ok(loaded.into_pointer_value())
    }

    fn lower_make(&mut self, m: &ast::MakeExpr) -> EResult<(BasicValueEnum<'ctx>, Ty)> {
        let layout = self
            .type_map
            .template(m.template)
            .ok_or_else(|| EmitError::UnknownTemplate { name: m.template.to_string(), span: m.span })?;
        let struct_ty = layout.struct_ty;
        let fields = layout.fields.clone();
        let constructor = layout.constructor.clone();

        let size = struct_ty.size_of().ok_or_else(|| EmitError::TypeMismatch {
            expected: "sized template".into(),
            found: m.template.to_string(),
            span: m.span,
        })?;
        let raw = self
            .builder
            .build_call(self.stdlib.malloc, &[size.into()], "make_raw")
            .map_err(|e| EmitError::Llvm(e.to_string()))?
            .try_as_basic_value()
            .left()
            .expect("malloc returns a value")
            .into_pointer_value();

        for (idx, (_, field_ty)) in fields.iter().enumerate() {
            if field_ty.is_pointer() {
                let field_ptr = self
                    .builder
                    .build_struct_gep(struct_ty, raw, idx as u32, "init_field")
                    .map_err(|e| EmitError::Llvm(e.to_string()))?;
                let null = self.type_map.llvm_type(field_ty).into_pointer_type().const_null();
                self.store(field_ptr, null)?;
            }
        }

        if let Some((ctor_func, ctor_params)) = constructor {
            let mut call_args: Vec<inkwell::values::BasicMetadataValueEnum> = vec![raw.into()];
            for (i, arg) in m.args.iter().enumerate() {
                let (val, ty) = self.lower_expr(arg)?;
                let converted = match ctor_params.get(i) {
                    Some(expected) => self.convert(val, &ty, expected, m.span)?,
                    None => val,
                };
                call_args.push(converted.into());
            }
            self.builder
                .build_call(ctor_func, &call_args, "ctor_call")
                .map_err(|e| EmitError::Llvm(e.to_string()))?;
        }

        Ok((raw.into(), Ty::pointer(Ty::Record(m.template))))
    }

    fn lower_unary(&mut self, u: &ast::UnaryExpr) -> EResult<(BasicValueEnum<'ctx>, Ty)> {
        let (val, ty) = self.lower_expr(&u.value)?;
        match u.op {
            ast::UnaryOp::Not => {
                if ty != Ty::Boolean {
                    return Err(EmitError::TypeMismatch {
                        expected: "boolean".into(),
                        found: format!("{:?}", ty),
                        span: u.span,
                    });
                }
                let one = self.context.bool_type().const_int(1, false);
                let result = self
                    .builder
                    .build_xor(val.into_int_value(), one, "not")
                    .map_err(|e| EmitError::Llvm(e.to_string()))?;
                Ok((result.into(), Ty::Boolean))
            }
            ast::UnaryOp::Neg => match ty {
                Ty::Int => {
                    let result = self
                        .builder
                        .build_int_neg(val.into_int_value(), "neg")
                        .map_err(|e| EmitError::Llvm(e.to_string()))?;
                    Ok((result.into(), Ty::Int))
                }
                Ty::Float => {
                    let result = self
                        .builder
                        .build_float_neg(val.into_float_value(), "fneg")
                        .map_err(|e| EmitError::Llvm(e.to_string()))?;
                    Ok((result.into(), Ty::Float))
                }
                _ => Err(EmitError::TypeMismatch {
                    expected: "int or float".into(),
                    found: format!("{:?}", ty),
                    span: u.span,
                }),
            },
        }
    }

    fn lower_binary(&mut self, b: &ast::BinaryExpr) -> EResult<(BasicValueEnum<'ctx>, Ty)> {
        let (left_val, left_ty) = self.lower_expr(&b.left)?;
        let (right_val, right_ty) = self.lower_expr(&b.right)?;

        if left_ty == Ty::string() && right_ty == Ty::string() && b.op == ast::BinaryOp::Add {
            let result = self.generate_string_concat(left_val.into_pointer_value(), right_val.into_pointer_value())?;
            return Ok((result.into(), Ty::string()));
        }

        if matches!(b.op, ast::BinaryOp::And | ast::BinaryOp::Or) {
            if left_ty != Ty::Boolean || right_ty != Ty::Boolean {
                return Err(EmitError::TypeMismatch {
                    expected: "boolean".into(),
                    found: format!("{:?} / {:?}", left_ty, right_ty),
                    span: b.span,
                });
            }
            let result = match b.op {
                ast::BinaryOp::And => self
                    .builder
                    .build_and(left_val.into_int_value(), right_val.into_int_value(), "and"),
                ast::BinaryOp::Or => self
                    .builder
                    .build_or(left_val.into_int_value(), right_val.into_int_value(), "or"),
                _ => unreachable!(),
            }
            .map_err(|e| EmitError::Llvm(e.to_string()))?;
            return Ok((result.into(), Ty::Boolean));
        }

        let common = self.type_map.common_numeric(&left_ty, &right_ty).ok_or_else(|| EmitError::TypeMismatch {
            expected: format!("{:?}", left_ty),
            found: format!("{:?}", right_ty),
            span: b.span,
        })?;
        let left_conv = self.convert(left_val, &left_ty, &common, b.span)?;
        let right_conv = self.convert(right_val, &right_ty, &common, b.span)?;

        let is_cmp = matches!(
            b.op,
            ast::BinaryOp::Eq | ast::BinaryOp::Ne | ast::BinaryOp::Gt | ast::BinaryOp::Lt | ast::BinaryOp::Ge | ast::BinaryOp::Le
        );

        if common.is_float() {
            if is_cmp {
                let pred = match b.op {
                    ast::BinaryOp::Eq => FloatPredicate::OEQ,
                    ast::BinaryOp::Ne => FloatPredicate::ONE,
                    ast::BinaryOp::Gt => FloatPredicate::OGT,
                    ast::BinaryOp::Lt => FloatPredicate::OLT,
                    ast::BinaryOp::Ge => FloatPredicate::OGE,
                    ast::BinaryOp::Le => FloatPredicate::OLE,
                    _ => unreachable!(),
                };
                let result = self
                    .builder
                    .build_float_compare(pred, left_conv.into_float_value(), right_conv.into_float_value(), "fcmp")
                    .map_err(|e| EmitError::Llvm(e.to_string()))?;
                return Ok((result.into(), Ty::Boolean));
            }
            let l = left_conv.into_float_value();
            let r = right_conv.into_float_value();
            let result = match b.op {
                ast::BinaryOp::Add => self.builder.build_float_add(l, r, "fadd"),
                ast::BinaryOp::Sub => self.builder.build_float_sub(l, r, "fsub"),
                ast::BinaryOp::Mul => self.builder.build_float_mul(l, r, "fmul"),
                ast::BinaryOp::Div => self.builder.build_float_div(l, r, "fdiv"),
                ast::BinaryOp::Mod => self.builder.build_float_rem(l, r, "frem"),
                _ => unreachable!(),
            }
            .map_err(|e| EmitError::Llvm(e.to_string()))?;
            return Ok((result.into(), Ty::Float));
        }

        if is_cmp && common.is_pointer() {
            // §4.5: `==`/`!=` apply to any identically-typed IR value using
            // integer equality — records and `string`s are always seen
            // through a pointer, so compare the addresses, not `<`/`>`.
            if !matches!(b.op, ast::BinaryOp::Eq | ast::BinaryOp::Ne) {
                return Err(EmitError::TypeMismatch {
                    expected: "numeric operand".to_string(),
                    found: format!("{:?}", common),
                    span: b.span,
                });
            }
            let pred = if b.op == ast::BinaryOp::Eq { IntPredicate::EQ } else { IntPredicate::NE };
            let int_ty = self.context.i64_type();
            let l = self
                .builder
                .build_ptr_to_int(left_conv.into_pointer_value(), int_ty, "ptr_cmp_l")
                .map_err(|e| EmitError::Llvm(e.to_string()))?;
            let r = self
                .builder
                .build_ptr_to_int(right_conv.into_pointer_value(), int_ty, "ptr_cmp_r")
                .map_err(|e| EmitError::Llvm(e.to_string()))?;
            let result = self
                .builder
                .build_int_compare(pred, l, r, "ptr_icmp")
                .map_err(|e| EmitError::Llvm(e.to_string()))?;
            return Ok((result.into(), Ty::Boolean));
        }

        if is_cmp {
            let pred = match b.op {
                ast::BinaryOp::Eq => IntPredicate::EQ,
                ast::BinaryOp::Ne => IntPredicate::NE,
                ast::BinaryOp::Gt => IntPredicate::SGT,
                ast::BinaryOp::Lt => IntPredicate::SLT,
                ast::BinaryOp::Ge => IntPredicate::SGE,
                ast::BinaryOp::Le => IntPredicate::SLE,
                _ => unreachable!(),
            };
            let result = self
                .builder
                .build_int_compare(pred, left_conv.into_int_value(), right_conv.into_int_value(), "icmp")
                .map_err(|e| EmitError::Llvm(e.to_string()))?;
            return Ok((result.into(), Ty::Boolean));
        }

        if matches!(b.op, ast::BinaryOp::Div | ast::BinaryOp::Mod) {
            if let Some(rhs_const) = right_conv.into_int_value().get_sign_extended_constant() {
                if rhs_const == 0 {
                    return Err(EmitError::DivisionByZero { span: b.span });
                }
            }
        }

        let l = left_conv.into_int_value();
        let r = right_conv.into_int_value();
        let result = match b.op {
            ast::BinaryOp::Add => self.builder.build_int_add(l, r, "add"),
            ast::BinaryOp::Sub => self.builder.build_int_sub(l, r, "sub"),
            ast::BinaryOp::Mul => self.builder.build_int_mul(l, r, "mul"),
            ast::BinaryOp::Div => self.builder.build_int_signed_div(l, r, "sdiv"),
            ast::BinaryOp::Mod => self.builder.build_int_signed_rem(l, r, "srem"),
            _ => unreachable!(),
        }
        .map_err(|e| EmitError::Llvm(e.to_string()))?;
        Ok((result.into(), Ty::Int))
    }

    /// Implicit conversion (§4.4): `int` widens to `float` on demand,
    /// everything else must already match.
    pub(crate) fn convert(
        &self,
        value: BasicValueEnum<'ctx>,
        from: &Ty,
        to: &Ty,
        span: orinc_util::Span,
    ) -> EResult<BasicValueEnum<'ctx>> {
        if from == to {
            return Ok(value);
        }
        match (from, to) {
            (Ty::Int, Ty::Float) => {
                let converted = self
                    .builder
                    .build_signed_int_to_float(value.into_int_value(), self.context.f32_type(), "itof")
                    .map_err(|e| EmitError::Llvm(e.to_string()))?;
                Ok(converted.as_basic_value_enum())
            }
            (Ty::Pointer(_), Ty::Pointer(_)) => Ok(value),
            _ => Err(EmitError::TypeMismatch {
                expected: format!("{:?}", to),
                found: format!("{:?}", from),
                span,
            }),
        }
    }
}
