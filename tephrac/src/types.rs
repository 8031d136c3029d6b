//! Type resolution.
//!
//! Maps front-end type descriptors onto backend-representable types. Every
//! descriptor resolves exactly once per node identity: results are memoized
//! in a side table keyed by [`NodeId`], and repeat resolution returns the
//! identical cached instance.

use std::collections::HashMap;
use std::rc::Rc;

use inkwell::context::Context;
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FunctionType};
use inkwell::AddressSpace;

use crate::ast::{BuiltinKind, TypeDesc, TypeDescKind};
use crate::error::CompileError;
use crate::tree::NodeId;

/// The backend representation a descriptor resolves to.
///
/// Function types are not first-class values in LLVM, so they get their own
/// arm rather than being squeezed into the basic-type universe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackendType<'ctx> {
    Basic(BasicTypeEnum<'ctx>),
    Function(FunctionType<'ctx>),
}

/// A resolved type: the backend type plus the metadata the emitters need.
///
/// `is_logical` marks booleans, which share the 8-bit representation with
/// small integers but keep distinct semantics downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedType<'ctx> {
    pub ty: BackendType<'ctx>,
    pub is_signed: bool,
    pub is_logical: bool,
}

impl<'ctx> ResolvedType<'ctx> {
    fn basic_ty(ty: BasicTypeEnum<'ctx>) -> Self {
        ResolvedType {
            ty: BackendType::Basic(ty),
            is_signed: false,
            is_logical: false,
        }
    }

    /// The value-representable form, if this type has one.
    pub fn basic(&self) -> Option<BasicTypeEnum<'ctx>> {
        match self.ty {
            BackendType::Basic(ty) => Some(ty),
            BackendType::Function(_) => None,
        }
    }

    pub fn function(&self) -> Option<FunctionType<'ctx>> {
        match self.ty {
            BackendType::Function(ty) => Some(ty),
            BackendType::Basic(_) => None,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self.ty, BackendType::Basic(BasicTypeEnum::FloatType(_)))
    }
}

/// Resolves descriptors against one LLVM context, memoizing by node identity.
pub struct TypeResolver<'ctx> {
    context: &'ctx Context,
    cache: HashMap<NodeId, Rc<ResolvedType<'ctx>>>,
}

impl<'ctx> TypeResolver<'ctx> {
    pub fn new(context: &'ctx Context) -> Self {
        TypeResolver {
            context,
            cache: HashMap::new(),
        }
    }

    /// Resolve `desc`, returning the cached instance on repeat calls.
    pub fn resolve(&mut self, desc: &TypeDesc) -> Result<Rc<ResolvedType<'ctx>>, CompileError> {
        if let Some(cached) = self.cache.get(&desc.node) {
            return Ok(Rc::clone(cached));
        }
        let resolved = Rc::new(self.resolve_uncached(desc)?);
        self.cache.insert(desc.node, Rc::clone(&resolved));
        Ok(resolved)
    }

    fn resolve_uncached(&mut self, desc: &TypeDesc) -> Result<ResolvedType<'ctx>, CompileError> {
        match &desc.kind {
            TypeDescKind::Builtin {
                bytes,
                subkind: BuiltinKind::Float,
                ..
            } => match bytes {
                4 => Ok(ResolvedType::basic_ty(self.context.f32_type().into())),
                8 => Ok(ResolvedType::basic_ty(self.context.f64_type().into())),
                other => Err(CompileError::type_error(
                    desc.node,
                    format!("unsupported floating-point width of {other} bytes"),
                )),
            },
            TypeDescKind::Builtin {
                bytes,
                subkind: BuiltinKind::Integer,
                signed,
            } => {
                if *bytes == 0 {
                    return Err(CompileError::type_error(
                        desc.node,
                        "integer byte width must be nonzero",
                    ));
                }
                let ty = self.context.custom_width_int_type(bytes * 8);
                Ok(ResolvedType {
                    ty: BackendType::Basic(ty.into()),
                    is_signed: *signed,
                    is_logical: false,
                })
            }
            TypeDescKind::Builtin {
                subkind: BuiltinKind::Logical,
                ..
            } => Ok(ResolvedType {
                ty: BackendType::Basic(self.context.i8_type().into()),
                is_signed: false,
                is_logical: true,
            }),
            TypeDescKind::Pointer { base } => {
                let base = self.resolve(base)?;
                let ty: BasicTypeEnum = match base.ty {
                    BackendType::Basic(inner) => inner.ptr_type(AddressSpace::default()).into(),
                    BackendType::Function(inner) => inner.ptr_type(AddressSpace::default()).into(),
                };
                Ok(ResolvedType::basic_ty(ty))
            }
            TypeDescKind::FuncType { params, returns } => {
                let ret = match returns.len() {
                    0 => None,
                    1 => {
                        let ret = self.resolve(&returns[0])?;
                        Some(ret.basic().ok_or_else(|| {
                            CompileError::type_error(
                                returns[0].node,
                                "return type is not a value type",
                            )
                        })?)
                    }
                    n => {
                        return Err(CompileError::arity(
                            desc.node,
                            format!("{n} return values are not supported"),
                        ))
                    }
                };

                let mut args: Vec<BasicMetadataTypeEnum> = Vec::with_capacity(params.len());
                for param in params {
                    let param_ty = self.resolve(param)?;
                    let basic = param_ty.basic().ok_or_else(|| {
                        CompileError::type_error(param.node, "parameter type is not a value type")
                    })?;
                    args.push(basic.into());
                }

                let fn_ty = match ret {
                    Some(ret) => ret.fn_type(&args, false),
                    None => self.context.void_type().fn_type(&args, false),
                };
                Ok(ResolvedType {
                    ty: BackendType::Function(fn_ty),
                    is_signed: false,
                    is_logical: false,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(index: usize, kind: TypeDescKind) -> TypeDesc {
        TypeDesc {
            node: NodeId::new(index),
            kind,
        }
    }

    fn builtin(index: usize, bytes: u32, subkind: BuiltinKind, signed: bool) -> TypeDesc {
        desc(
            index,
            TypeDescKind::Builtin {
                bytes,
                subkind,
                signed,
            },
        )
    }

    #[test]
    fn resolution_is_memoized_by_identity() {
        let context = Context::create();
        let mut resolver = TypeResolver::new(&context);
        let f32_desc = builtin(0, 4, BuiltinKind::Float, false);

        let first = resolver.resolve(&f32_desc).unwrap();
        let second = resolver.resolve(&f32_desc).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn distinct_descriptors_resolve_to_distinct_identities() {
        let context = Context::create();
        let mut resolver = TypeResolver::new(&context);
        let i32_desc = builtin(0, 4, BuiltinKind::Integer, true);
        let i8_desc = builtin(1, 1, BuiltinKind::Integer, true);

        let a = resolver.resolve(&i32_desc).unwrap();
        let b = resolver.resolve(&i8_desc).unwrap();
        assert!(!Rc::ptr_eq(&a, &b));
        assert_ne!(a.ty, b.ty);
    }

    #[test]
    fn float_widths_other_than_4_and_8_fail() {
        let context = Context::create();
        let mut resolver = TypeResolver::new(&context);
        let bad = builtin(0, 3, BuiltinKind::Float, false);
        assert!(matches!(
            resolver.resolve(&bad),
            Err(CompileError::Type { .. })
        ));
    }

    #[test]
    fn integer_width_and_signedness_carry_through() {
        let context = Context::create();
        let mut resolver = TypeResolver::new(&context);

        let u16_desc = builtin(0, 2, BuiltinKind::Integer, false);
        let resolved = resolver.resolve(&u16_desc).unwrap();
        assert!(!resolved.is_signed);
        match resolved.basic() {
            Some(BasicTypeEnum::IntType(ty)) => assert_eq!(ty.get_bit_width(), 16),
            other => panic!("expected an int type, got {other:?}"),
        }

        let i64_desc = builtin(1, 8, BuiltinKind::Integer, true);
        assert!(resolver.resolve(&i64_desc).unwrap().is_signed);
    }

    #[test]
    fn logical_is_a_flagged_byte() {
        let context = Context::create();
        let mut resolver = TypeResolver::new(&context);
        let logical = builtin(0, 1, BuiltinKind::Logical, false);

        let resolved = resolver.resolve(&logical).unwrap();
        assert!(resolved.is_logical);
        match resolved.basic() {
            Some(BasicTypeEnum::IntType(ty)) => assert_eq!(ty.get_bit_width(), 8),
            other => panic!("expected an int type, got {other:?}"),
        }
    }

    #[test]
    fn pointer_wraps_its_base() {
        let context = Context::create();
        let mut resolver = TypeResolver::new(&context);
        let ptr = desc(
            1,
            TypeDescKind::Pointer {
                base: Box::new(builtin(0, 8, BuiltinKind::Float, false)),
            },
        );
        let resolved = resolver.resolve(&ptr).unwrap();
        assert!(matches!(
            resolved.basic(),
            Some(BasicTypeEnum::PointerType(_))
        ));
    }

    #[test]
    fn return_arity_law() {
        let context = Context::create();
        let mut resolver = TypeResolver::new(&context);
        let f32_ret = || builtin(0, 4, BuiltinKind::Float, false);

        let void_fn = desc(
            10,
            TypeDescKind::FuncType {
                params: vec![],
                returns: vec![],
            },
        );
        let resolved = resolver.resolve(&void_fn).unwrap();
        assert!(resolved.function().unwrap().get_return_type().is_none());

        let single = desc(
            11,
            TypeDescKind::FuncType {
                params: vec![],
                returns: vec![f32_ret()],
            },
        );
        let resolved = resolver.resolve(&single).unwrap();
        assert!(matches!(
            resolved.function().unwrap().get_return_type(),
            Some(BasicTypeEnum::FloatType(_))
        ));

        let double = desc(
            12,
            TypeDescKind::FuncType {
                params: vec![],
                returns: vec![f32_ret(), f32_ret()],
            },
        );
        assert!(matches!(
            resolver.resolve(&double),
            Err(CompileError::Arity { node, .. }) if node == NodeId::new(12)
        ));
    }

    #[test]
    fn zero_width_integer_is_rejected() {
        let context = Context::create();
        let mut resolver = TypeResolver::new(&context);
        let bad = builtin(0, 0, BuiltinKind::Integer, false);
        assert!(matches!(
            resolver.resolve(&bad),
            Err(CompileError::Type { .. })
        ));
    }
}
