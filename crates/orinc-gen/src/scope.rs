//! Lexical scope chain (§4.3). Separate from the AST and owned entirely by
//! the emitter; entry into any block pushes a child frame, exit pops it.

use std::collections::HashMap;

use inkwell::values::PointerValue;
use orinc_util::Symbol;

use crate::ir_type::Ty;

pub struct Scope<'ctx> {
    frames: Vec<HashMap<Symbol, (PointerValue<'ctx>, Ty)>>,
}

impl<'ctx> Scope<'ctx> {
    pub fn new() -> Self {
        Self { frames: vec![HashMap::new()] }
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
        debug_assert!(!self.frames.is_empty(), "popped the root scope frame");
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn declare(&mut self, name: Symbol, ptr: PointerValue<'ctx>, ty: Ty) {
        self.frames.last_mut().expect("at least one frame").insert(name, (ptr, ty));
    }

    pub fn declared(&self, name: Symbol) -> bool {
        self.frames.last().expect("at least one frame").contains_key(&name)
    }

    pub fn lookup(&self, name: Symbol) -> Option<(PointerValue<'ctx>, &Ty)> {
        for frame in self.frames.iter().rev() {
            if let Some((ptr, ty)) = frame.get(&name) {
                return Some((*ptr, ty));
            }
        }
        None
    }
}

impl<'ctx> Default for Scope<'ctx> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;

    #[test]
    fn lookup_walks_outward() {
        let context = Context::create();
        let module = context.create_module("t");
        let fn_ty = context.void_type().fn_type(&[], false);
        let func = module.add_function("f", fn_ty, None);
        let block = context.append_basic_block(func, "entry");
        let builder = context.create_builder();
        builder.position_at_end(block);

        let mut scope = Scope::new();
        let ptr = builder.build_alloca(context.i32_type(), "x").unwrap();
        scope.declare(Symbol::intern("x"), ptr, Ty::Int);

        scope.push();
        assert!(!scope.declared(Symbol::intern("x")));
        assert!(scope.lookup(Symbol::intern("x")).is_some());
        scope.pop();
    }

    #[test]
    fn declared_checks_only_current_frame() {
        let context = Context::create();
        let module = context.create_module("t");
        let fn_ty = context.void_type().fn_type(&[], false);
        let func = module.add_function("f", fn_ty, None);
        let block = context.append_basic_block(func, "entry");
        let builder = context.create_builder();
        builder.position_at_end(block);

        let mut scope = Scope::new();
        let ptr = builder.build_alloca(context.i32_type(), "x").unwrap();
        scope.declare(Symbol::intern("shadow_test_x"), ptr, Ty::Int);
        assert!(scope.declared(Symbol::intern("shadow_test_x")));

        scope.push();
        assert!(!scope.declared(Symbol::intern("shadow_test_x")));
    }
}
