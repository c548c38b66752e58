//! Built-in runtime injected ahead of user code (§4.6): the C functions the
//! emitter calls out to directly, and the `string` template every string
//! literal and concatenation produces.
//!
//! Grounded on the teacher's `declare_gc_functions` in `llvm.rs`, which
//! populates the module with externs before any user function is compiled.
//! Here the surface is cut down to what string handling actually needs.

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::values::FunctionValue;
use inkwell::AddressSpace;
use orinc_util::Symbol;

use crate::ir_type::{MethodInfo, Ty, TypeMap};
use crate::mangle;
use crate::{EResult, Emitter};

pub(crate) const STRING_TEMPLATE: &str = "string";

pub struct Stdlib<'ctx> {
    pub printf: FunctionValue<'ctx>,
    pub malloc: FunctionValue<'ctx>,
    pub memcpy: FunctionValue<'ctx>,
    pub string_len: FunctionValue<'ctx>,
    pub string_to_cstr: FunctionValue<'ctx>,
}

/// Declares the runtime externs and the `string` template, then fills in
/// its two built-in methods. Called once from [`Emitter::new`], before any
/// field of `Emitter` itself exists — it only ever touches the module,
/// builder and type map being assembled into that struct.
pub(crate) fn inject<'ctx>(
    context: &'ctx Context,
    module: &Module<'ctx>,
    builder: &Builder<'ctx>,
    type_map: &mut TypeMap<'ctx>,
) -> Stdlib<'ctx> {
    let ptr_ty = context.ptr_type(AddressSpace::default());
    let i32_ty = context.i32_type();
    let bool_ty = context.bool_type();

    // These are declared under their literal runtime names, not run through
    // `mangle::free_function_name` — that mangling exists for a *user*
    // function whose name collides with one of these, not for the runtime
    // symbol itself.
    let printf_ty = i32_ty.fn_type(&[ptr_ty.into()], true);
    let printf = module.add_function("printf", printf_ty, Some(Linkage::External));

    let malloc_ty = ptr_ty.fn_type(&[i32_ty.into()], false);
    let malloc = module.add_function("malloc", malloc_ty, Some(Linkage::External));

    let memcpy_ty = ptr_ty.fn_type(
        &[ptr_ty.into(), ptr_ty.into(), i32_ty.into(), i32_ty.into(), bool_ty.into()],
        false,
    );
    let memcpy =
        module.add_function("llvm.memcpy.p0i8.p0i8.i32", memcpy_ty, Some(Linkage::External));

    let string_name = Symbol::intern(STRING_TEMPLATE);
    let struct_ty = type_map.declare_template(string_name);
    type_map.define_template_fields(
        string_name,
        vec![
            (Symbol::intern("data"), Ty::pointer(Ty::Char)),
            (Symbol::intern("length"), Ty::Int),
            (Symbol::intern("capacity"), Ty::Int),
            (Symbol::intern("reserved"), Ty::Int),
        ],
    );
    debug_assert_eq!(struct_ty.get_field_types().len(), 4);

    let len_ty = i32_ty.fn_type(&[ptr_ty.into()], false);
    let string_len = module.add_function(&mangle::method_name(STRING_TEMPLATE, "len"), len_ty, None);
    build_string_len_body(context, builder, type_map, string_len, string_name);
    type_map.add_method(
        string_name,
        Symbol::intern(&mangle::method_name(STRING_TEMPLATE, "len")),
        MethodInfo { func: string_len, params: vec![], ret: Some(Ty::Int) },
    );

    let to_cstr_ty = ptr_ty.fn_type(&[ptr_ty.into()], false);
    let string_to_cstr =
        module.add_function(&mangle::method_name(STRING_TEMPLATE, "toCStr"), to_cstr_ty, None);
    build_string_to_cstr_body(context, builder, type_map, string_to_cstr, string_name);
    type_map.add_method(
        string_name,
        Symbol::intern(&mangle::method_name(STRING_TEMPLATE, "toCStr")),
        MethodInfo { func: string_to_cstr, params: vec![], ret: Some(Ty::pointer(Ty::Char)) },
    );

    Stdlib { printf, malloc, memcpy, string_len, string_to_cstr }
}

fn build_string_len_body<'ctx>(
    context: &'ctx Context,
    builder: &Builder<'ctx>,
    type_map: &TypeMap<'ctx>,
    func: FunctionValue<'ctx>,
    string_name: Symbol,
) {
    let entry = context.append_basic_block(func, "entry");
    builder.position_at_end(entry);
    let this = func.get_nth_param(0).expect("this").into_pointer_value();
    let layout = type_map.template(string_name).expect("string template");
    let (idx, _) = layout.field(Symbol::intern("length")).expect("length field");
    let field_ptr = builder
        .build_struct_gep(layout.struct_ty, this, idx, "length_ptr")
        .expect("struct gep on string");
    let length = builder.build_load(context.i32_type(), field_ptr, "length").expect("load length");
    let one = context.i32_type().const_int(1, false);
    let result =
        builder.build_int_sub(length.into_int_value(), one, "len_minus_nul").expect("sub");
    builder.build_return(Some(&result)).expect("return");
}

fn build_string_to_cstr_body<'ctx>(
    context: &'ctx Context,
    builder: &Builder<'ctx>,
    type_map: &TypeMap<'ctx>,
    func: FunctionValue<'ctx>,
    string_name: Symbol,
) {
    let entry = context.append_basic_block(func, "entry");
    builder.position_at_end(entry);
    let this = func.get_nth_param(0).expect("this").into_pointer_value();
    let layout = type_map.template(string_name).expect("string template");
    let (idx, _) = layout.field(Symbol::intern("data")).expect("data field");
    let field_ptr = builder
        .build_struct_gep(layout.struct_ty, this, idx, "data_ptr")
        .expect("struct gep on string");
    let data = builder
        .build_load(context.ptr_type(AddressSpace::default()), field_ptr, "data")
        .expect("load data");
    builder.build_return(Some(&data)).expect("return");
}

impl<'ctx> Emitter<'ctx> {
    /// Heap-allocate a `string` record containing `text` plus a NUL
    /// terminator (§4.6).
    pub(crate) fn generate_string_literal(&self, text: &str) -> EResult<inkwell::values::PointerValue<'ctx>> {
        let context = self.context;
        let i32_ty = context.i32_type();
        let bytes = text.as_bytes();
        let len_with_nul = bytes.len() as u32 + 1;

        let data = self
            .builder
            .build_call(
                self.stdlib.malloc,
                &[i32_ty.const_int(len_with_nul as u64, false).into()],
                "str_data",
            )
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?
            .try_as_basic_value()
            .left()
            .expect("malloc returns a value")
            .into_pointer_value();

        for (i, byte) in bytes.iter().enumerate() {
            let char_ptr = unsafe {
                self.builder
                    .build_gep(context.i8_type(), data, &[i32_ty.const_int(i as u64, false)], "char_ptr")
                    .map_err(|e| crate::EmitError::Llvm(e.to_string()))?
            };
            self.store(char_ptr, context.i8_type().const_int(*byte as u64, false))?;
        }
        let nul_ptr = unsafe {
            self.builder
                .build_gep(
                    context.i8_type(),
                    data,
                    &[i32_ty.const_int(bytes.len() as u64, false)],
                    "nul_ptr",
                )
                .map_err(|e| crate::EmitError::Llvm(e.to_string()))?
        };
        self.store(nul_ptr, context.i8_type().const_int(0, false))?;

        self.build_string_record(data, len_with_nul as i32)
    }

    /// Wrap a raw `data`/`length` pair (length includes the NUL) in a
    /// heap-allocated `string` record.
    fn build_string_record(
        &self,
        data: inkwell::values::PointerValue<'ctx>,
        length: i32,
    ) -> EResult<inkwell::values::PointerValue<'ctx>> {
        let string_name = Symbol::intern(STRING_TEMPLATE);
        let layout = self.type_map.template(string_name).expect("string template injected");
        let size = layout.struct_ty.size_of().expect("sized struct");
        let record = self
            .builder
            .build_call(self.stdlib.malloc, &[size.into()], "str_record")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?
            .try_as_basic_value()
            .left()
            .expect("malloc returns a value")
            .into_pointer_value();
        let record = self
            .builder
            .build_pointer_cast(
                record,
                self.context.ptr_type(AddressSpace::default()),
                "str_record_cast",
            )
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;

        let i32_ty = self.context.i32_type();
        let (data_idx, _) = layout.field(Symbol::intern("data")).expect("data field");
        let (len_idx, _) = layout.field(Symbol::intern("length")).expect("length field");
        let (cap_idx, _) = layout.field(Symbol::intern("capacity")).expect("capacity field");

        let data_ptr = self
            .builder
            .build_struct_gep(layout.struct_ty, record, data_idx, "data_ptr")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;
        self.store(data_ptr, data)?;
        let len_ptr = self
            .builder
            .build_struct_gep(layout.struct_ty, record, len_idx, "length_ptr")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;
        self.store(len_ptr, i32_ty.const_int(length as u64, false))?;
        let cap_ptr = self
            .builder
            .build_struct_gep(layout.struct_ty, record, cap_idx, "capacity_ptr")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;
        self.store(cap_ptr, i32_ty.const_int(length as u64, false))?;

        Ok(record)
    }

    /// Concatenate two `string` records into a freshly allocated third
    /// (§4.6): combined length, a `memcpy` of each source's bytes (minus the
    /// first source's NUL), then a fresh NUL terminator.
    pub(crate) fn generate_string_concat(
        &self,
        a: inkwell::values::PointerValue<'ctx>,
        b: inkwell::values::PointerValue<'ctx>,
    ) -> EResult<inkwell::values::PointerValue<'ctx>> {
        let string_name = Symbol::intern(STRING_TEMPLATE);
        let layout = self.type_map.template(string_name).expect("string template injected");
        let i32_ty = self.context.i32_type();
        let (data_idx, _) = layout.field(Symbol::intern("data")).expect("data field");
        let (len_idx, _) = layout.field(Symbol::intern("length")).expect("length field");

        let a_len_ptr = self
            .builder
            .build_struct_gep(layout.struct_ty, a, len_idx, "a_len_ptr")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;
        let a_len = self
            .builder
            .build_load(i32_ty, a_len_ptr, "a_len")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?
            .into_int_value();
        let b_len_ptr = self
            .builder
            .build_struct_gep(layout.struct_ty, b, len_idx, "b_len_ptr")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;
        let b_len = self
            .builder
            .build_load(i32_ty, b_len_ptr, "b_len")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?
            .into_int_value();

        let one = i32_ty.const_int(1, false);
        let a_bytes = self
            .builder
            .build_int_sub(a_len, one, "a_bytes")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;
        let total = self
            .builder
            .build_int_add(a_bytes, b_len, "total_len")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;

        let data = self
            .builder
            .build_call(self.stdlib.malloc, &[total.into()], "concat_data")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?
            .try_as_basic_value()
            .left()
            .expect("malloc returns a value")
            .into_pointer_value();

        let a_data_ptr = self
            .builder
            .build_struct_gep(layout.struct_ty, a, data_idx, "a_data_ptr")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;
        let a_data = self
            .builder
            .build_load(self.context.ptr_type(AddressSpace::default()), a_data_ptr, "a_data")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;
        let b_data_ptr = self
            .builder
            .build_struct_gep(layout.struct_ty, b, data_idx, "b_data_ptr")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;
        let b_data = self
            .builder
            .build_load(self.context.ptr_type(AddressSpace::default()), b_data_ptr, "b_data")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;

        let align = i32_ty.const_int(1, false);
        let bool_false = self.context.bool_type().const_int(0, false);
        self.builder
            .build_call(
                self.stdlib.memcpy,
                &[data.into(), a_data.into(), a_bytes.into(), align.into(), bool_false.into()],
                "",
            )
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;

        let dst_tail = unsafe {
            self.builder
                .build_gep(self.context.i8_type(), data, &[a_bytes], "dst_tail")
                .map_err(|e| crate::EmitError::Llvm(e.to_string()))?
        };
        self.builder
            .build_call(
                self.stdlib.memcpy,
                &[dst_tail.into(), b_data.into(), b_len.into(), align.into(), bool_false.into()],
                "",
            )
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;

        self.build_string_record_from_len(data, total)
    }

    fn build_string_record_from_len(
        &self,
        data: inkwell::values::PointerValue<'ctx>,
        length: inkwell::values::IntValue<'ctx>,
    ) -> EResult<inkwell::values::PointerValue<'ctx>> {
        let string_name = Symbol::intern(STRING_TEMPLATE);
        let layout = self.type_map.template(string_name).expect("string template injected");
        let size = layout.struct_ty.size_of().expect("sized struct");
        let record = self
            .builder
            .build_call(self.stdlib.malloc, &[size.into()], "str_record")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?
            .try_as_basic_value()
            .left()
            .expect("malloc returns a value")
            .into_pointer_value();

        let (data_idx, _) = layout.field(Symbol::intern("data")).expect("data field");
        let (len_idx, _) = layout.field(Symbol::intern("length")).expect("length field");
        let (cap_idx, _) = layout.field(Symbol::intern("capacity")).expect("capacity field");

        let data_ptr = self
            .builder
            .build_struct_gep(layout.struct_ty, record, data_idx, "data_ptr")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;
        self.store(data_ptr, data)?;
        let len_ptr = self
            .builder
            .build_struct_gep(layout.struct_ty, record, len_idx, "length_ptr")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;
        self.store(len_ptr, length)?;
        let cap_ptr = self
            .builder
            .build_struct_gep(layout.struct_ty, record, cap_idx, "capacity_ptr")
            .map_err(|e| crate::EmitError::Llvm(e.to_string()))?;
        self.store(cap_ptr, length)?;

        Ok(record)
    }
}
