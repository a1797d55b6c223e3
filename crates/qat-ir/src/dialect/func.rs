//! `func` dialect: functions, calls and returns.

use crate::context::{IrContext, OperationDataBuilder};
use crate::dialect::{DialectOp, core};
use crate::location::Location;
use crate::refs::{BlockRef, RegionRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

crate::symbols! {
    DIALECT_NAME => "func",
    FUNC => "func",
    CALL => "call",
    RETURN => "return",
    ATTR_SYM_NAME => "sym_name",
    ATTR_TYPE => "type",
    ATTR_CALLEE => "callee",
}

crate::dialect_op!(
    /// `func.func @name(%args...) -> ret { body }`
    Func => "func"."func"
);

impl Func {
    pub fn name(&self, ctx: &IrContext) -> Option<Symbol> {
        ctx.op(self.0)
            .attr(ATTR_SYM_NAME())
            .and_then(Attribute::as_symbol)
    }

    /// Function type (`core.func(ret, params...)`).
    pub fn ty(&self, ctx: &IrContext) -> Option<TypeRef> {
        ctx.op(self.0).attr(ATTR_TYPE()).and_then(Attribute::as_type)
    }

    pub fn body(&self, ctx: &IrContext) -> Option<RegionRef> {
        ctx.op(self.0).regions.first().copied()
    }

    /// Blocks of the body, in layout order. Empty for declarations.
    pub fn blocks(&self, ctx: &IrContext) -> Vec<BlockRef> {
        self.body(ctx)
            .map(|r| ctx.region(r).blocks.to_vec())
            .unwrap_or_default()
    }

    /// A function without a body region (or with an empty one) is an
    /// external declaration.
    pub fn is_declaration(&self, ctx: &IrContext) -> bool {
        self.blocks(ctx).is_empty()
    }
}

crate::dialect_op!(
    /// `%r = func.call %args... {callee = @f} : ty`
    Call => "func"."call"
);

impl Call {
    pub fn callee(&self, ctx: &IrContext) -> Option<Symbol> {
        ctx.op(self.0)
            .attr(ATTR_CALLEE())
            .and_then(Attribute::as_symbol)
    }

    pub fn args<'a>(&self, ctx: &'a IrContext) -> &'a [ValueRef] {
        ctx.op_operands(self.0)
    }

    pub fn result(&self, ctx: &IrContext) -> Option<ValueRef> {
        ctx.op_results(self.0).first().copied()
    }
}

crate::dialect_op!(Return => "func"."return");

/// Create a function. `func_ty` is a `core.func(ret, params...)` type.
pub fn func(
    ctx: &mut IrContext,
    loc: Location,
    name: Symbol,
    func_ty: TypeRef,
    body: RegionRef,
) -> Func {
    let op = OperationDataBuilder::new(loc, DIALECT_NAME(), FUNC())
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(name))
        .attr(ATTR_TYPE(), Attribute::Type(func_ty))
        .region(body)
        .create(ctx);
    Func::wrap(op)
}

/// Call `callee`. A `core.nil` (or absent) result type produces no result value.
pub fn call(
    ctx: &mut IrContext,
    loc: Location,
    callee: Symbol,
    args: impl IntoIterator<Item = ValueRef>,
    result_ty: Option<TypeRef>,
) -> Call {
    let nil = core::nil(ctx);
    let mut builder = OperationDataBuilder::new(loc, DIALECT_NAME(), CALL())
        .attr(ATTR_CALLEE(), Attribute::Symbol(callee))
        .operands(args);
    if let Some(ty) = result_ty.filter(|&ty| ty != nil) {
        builder = builder.result(ty);
    }
    Call::wrap(builder.create(ctx))
}

pub fn r#return(
    ctx: &mut IrContext,
    loc: Location,
    values: impl IntoIterator<Item = ValueRef>,
) -> Return {
    let op = OperationDataBuilder::new(loc, DIALECT_NAME(), RETURN())
        .operands(values)
        .create(ctx);
    Return::wrap(op)
}
