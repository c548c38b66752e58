//! AST-type → IR-type resolution (§4.4 of the design this emitter follows).
//!
//! [`Ty`] is the emitter's own notion of a type — thin enough to drive
//! implicit conversion and field lookup without re-deriving that
//! information from an `inkwell` type every time. [`TypeMap`] owns the
//! template registry and turns a [`Ty`] into the `inkwell` type actually
//! used to build IR.

use indexmap::IndexMap;
use inkwell::context::Context;
use inkwell::types::{BasicTypeEnum, StructType};
use inkwell::AddressSpace;
use orinc_par::ast::TypeRef;
use orinc_util::{Span, Symbol};

use crate::error::EmitError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    Int,
    Char,
    Float,
    Boolean,
    /// A template's record type, always seen through `Pointer`.
    Record(Symbol),
    Pointer(Box<Ty>),
    Func(Vec<Ty>, Option<Box<Ty>>),
}

impl Ty {
    pub fn pointer(inner: Ty) -> Ty {
        Ty::Pointer(Box::new(inner))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Ty::Float)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Ty::Int)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Ty::Pointer(_))
    }

    pub fn string() -> Ty {
        Ty::Pointer(Box::new(Ty::Record(Symbol::intern("string"))))
    }
}

#[derive(Clone)]
pub struct MethodInfo<'ctx> {
    pub func: inkwell::values::FunctionValue<'ctx>,
    pub params: Vec<Ty>,
    pub ret: Option<Ty>,
}

pub struct TemplateLayout<'ctx> {
    pub struct_ty: StructType<'ctx>,
    pub fields: Vec<(Symbol, Ty)>,
    pub constructor: Option<(inkwell::values::FunctionValue<'ctx>, Vec<Ty>)>,
    pub methods: IndexMap<Symbol, MethodInfo<'ctx>>,
}

impl<'ctx> TemplateLayout<'ctx> {
    pub fn field(&self, name: Symbol) -> Option<(u32, &Ty)> {
        self.fields.iter().position(|(n, _)| *n == name).map(|i| (i as u32, &self.fields[i].1))
    }
}

pub struct TypeMap<'ctx> {
    context: &'ctx Context,
    templates: IndexMap<Symbol, TemplateLayout<'ctx>>,
}

impl<'ctx> TypeMap<'ctx> {
    pub fn new(context: &'ctx Context) -> Self {
        Self { context, templates: IndexMap::new() }
    }

    pub fn declare_template(&mut self, name: Symbol) -> StructType<'ctx> {
        let struct_ty = self.context.opaque_struct_type(name.as_str());
        self.templates.insert(
            name,
            TemplateLayout {
                struct_ty,
                fields: Vec::new(),
                constructor: None,
                methods: IndexMap::new(),
            },
        );
        struct_ty
    }

    pub fn define_template_fields(&mut self, name: Symbol, fields: Vec<(Symbol, Ty)>) {
        let field_llvm_types: Vec<BasicTypeEnum<'ctx>> =
            fields.iter().map(|(_, ty)| self.llvm_type(ty)).collect();
        let layout = self.templates.get_mut(&name).expect("template must be declared first");
        layout.struct_ty.set_body(&field_llvm_types, false);
        layout.fields = fields;
    }

    pub fn set_constructor(
        &mut self,
        name: Symbol,
        func: inkwell::values::FunctionValue<'ctx>,
        params: Vec<Ty>,
    ) {
        if let Some(layout) = self.templates.get_mut(&name) {
            layout.constructor = Some((func, params));
        }
    }

    pub fn add_method(&mut self, template: Symbol, method_name: Symbol, info: MethodInfo<'ctx>) {
        if let Some(layout) = self.templates.get_mut(&template) {
            layout.methods.insert(method_name, info);
        }
    }

    pub fn template(&self, name: Symbol) -> Option<&TemplateLayout<'ctx>> {
        self.templates.get(&name)
    }

    pub fn has_template(&self, name: Symbol) -> bool {
        self.templates.contains_key(&name)
    }

    /// `TypeRef := FuncType | ArrayType | NamedType` → [`Ty`].
    pub fn resolve(&self, type_ref: &TypeRef, span: Span) -> Result<Ty, EmitError> {
        match type_ref {
            TypeRef::Named(named) => self.resolve_named(named.name, span),
            TypeRef::Array(arr) => {
                let elem = self.resolve(&arr.element, span)?;
                Ok(Ty::pointer(elem))
            }
            TypeRef::Func(func) => {
                let params =
                    func.params.iter().map(|p| self.resolve(p, span)).collect::<Result<_, _>>()?;
                let ret = match &func.ret {
                    Some(r) => Some(Box::new(self.resolve(r, span)?)),
                    None => None,
                };
                Ok(Ty::pointer(Ty::Func(params, ret)))
            }
        }
    }

    fn resolve_named(&self, name: Symbol, span: Span) -> Result<Ty, EmitError> {
        match name.as_str() {
            "int" => Ok(Ty::Int),
            "char" => Ok(Ty::Char),
            "float" => Ok(Ty::Float),
            "boolean" => Ok(Ty::Boolean),
            _ => {
                if self.has_template(name) {
                    Ok(Ty::pointer(Ty::Record(name)))
                } else {
                    Err(EmitError::UnknownTemplate { name: name.to_string(), span })
                }
            }
        }
    }

    pub fn llvm_type(&self, ty: &Ty) -> BasicTypeEnum<'ctx> {
        match ty {
            Ty::Int => self.context.i32_type().into(),
            Ty::Char => self.context.i8_type().into(),
            Ty::Float => self.context.f32_type().into(),
            Ty::Boolean => self.context.bool_type().into(),
            Ty::Record(name) => self
                .templates
                .get(name)
                .map(|t| t.struct_ty.into())
                .unwrap_or_else(|| self.context.i8_type().into()),
            Ty::Pointer(_) => self.context.ptr_type(AddressSpace::default()).into(),
            Ty::Func(..) => self.context.ptr_type(AddressSpace::default()).into(),
        }
    }

    /// Implicit conversion on binary operands (§4.4): if one side is `int`
    /// and the other `float`, the result type is `float`. Otherwise the
    /// operands must already agree.
    pub fn common_numeric(&self, left: &Ty, right: &Ty) -> Option<Ty> {
        match (left, right) {
            (Ty::Int, Ty::Int) => Some(Ty::Int),
            (Ty::Float, Ty::Float) => Some(Ty::Float),
            (Ty::Int, Ty::Float) | (Ty::Float, Ty::Int) => Some(Ty::Float),
            _ if left == right => Some(left.clone()),
            _ => None,
        }
    }
}
