//! `core` dialect: the module op and builtin types.

use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::module::IrModule;
use crate::refs::{RegionRef, TypeRef};
use crate::symbol::Symbol;
use crate::types::{Attribute, TypeData};

crate::symbols! {
    DIALECT_NAME => "core",
    MODULE => "module",
    ATTR_SYM_NAME => "sym_name",
    I1 => "i1",
    I64 => "i64",
    F64 => "f64",
    NIL => "nil",
    PTR => "ptr",
    FUNC => "func",
}

/// Create a `core.module` owning `body`.
pub fn module(ctx: &mut IrContext, loc: Location, name: Symbol, body: RegionRef) -> IrModule {
    let op = OperationDataBuilder::new(loc, DIALECT_NAME(), MODULE())
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(name))
        .region(body)
        .create(ctx);
    IrModule(op)
}

pub fn i1(ctx: &mut IrContext) -> TypeRef {
    ctx.types.simple(DIALECT_NAME(), I1())
}

pub fn i64(ctx: &mut IrContext) -> TypeRef {
    ctx.types.simple(DIALECT_NAME(), I64())
}

pub fn f64(ctx: &mut IrContext) -> TypeRef {
    ctx.types.simple(DIALECT_NAME(), F64())
}

pub fn nil(ctx: &mut IrContext) -> TypeRef {
    ctx.types.simple(DIALECT_NAME(), NIL())
}

pub fn ptr(ctx: &mut IrContext) -> TypeRef {
    ctx.types.simple(DIALECT_NAME(), PTR())
}

/// Function type `core.func(ret, params...)`.
pub fn func_type(
    ctx: &mut IrContext,
    ret: TypeRef,
    params: impl IntoIterator<Item = TypeRef>,
) -> TypeRef {
    let data = TypeData::new(DIALECT_NAME(), FUNC())
        .with_param(ret)
        .with_params(params);
    ctx.types.intern(data)
}

/// Return type of a `core.func` type.
pub fn func_return_type(ctx: &IrContext, func_ty: TypeRef) -> Option<TypeRef> {
    let data = ctx.types.get(func_ty);
    if data.is(DIALECT_NAME(), FUNC()) {
        data.params.first().copied()
    } else {
        None
    }
}
