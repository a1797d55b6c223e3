//! `arith` dialect: integer constants and arithmetic.

use crate::context::{IrContext, OperationDataBuilder};
use crate::dialect::{DialectOp, core};
use crate::location::Location;
use crate::refs::{OpRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

crate::symbols! {
    DIALECT_NAME => "arith",
    CONST => "const",
    ADD => "add",
    SUB => "sub",
    MUL => "mul",
    XOR => "xor",
    NOT => "not",
    CMP_EQ => "cmp_eq",
    ATTR_VALUE => "value",
}

crate::dialect_op!(
    /// `%r = arith.const {value = N} : ty`
    Const => "arith"."const"
);

impl Const {
    pub fn value(&self, ctx: &IrContext) -> Option<u64> {
        ctx.op(self.0).attr(ATTR_VALUE()).and_then(Attribute::as_int)
    }

    pub fn result(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

crate::dialect_op!(Not => "arith"."not");

impl Not {
    pub fn result(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

/// Create an integer constant.
pub fn r#const(ctx: &mut IrContext, loc: Location, ty: TypeRef, value: u64) -> Const {
    let op = OperationDataBuilder::new(loc, DIALECT_NAME(), CONST())
        .attr(ATTR_VALUE(), Attribute::IntBits(value))
        .result(ty)
        .create(ctx);
    Const::wrap(op)
}

fn binary(
    ctx: &mut IrContext,
    loc: Location,
    name: Symbol,
    lhs: ValueRef,
    rhs: ValueRef,
    ty: TypeRef,
) -> OpRef {
    OperationDataBuilder::new(loc, DIALECT_NAME(), name)
        .operand(lhs)
        .operand(rhs)
        .result(ty)
        .create(ctx)
}

pub fn add(ctx: &mut IrContext, loc: Location, lhs: ValueRef, rhs: ValueRef, ty: TypeRef) -> OpRef {
    binary(ctx, loc, ADD(), lhs, rhs, ty)
}

pub fn sub(ctx: &mut IrContext, loc: Location, lhs: ValueRef, rhs: ValueRef, ty: TypeRef) -> OpRef {
    binary(ctx, loc, SUB(), lhs, rhs, ty)
}

pub fn mul(ctx: &mut IrContext, loc: Location, lhs: ValueRef, rhs: ValueRef, ty: TypeRef) -> OpRef {
    binary(ctx, loc, MUL(), lhs, rhs, ty)
}

pub fn xor(ctx: &mut IrContext, loc: Location, lhs: ValueRef, rhs: ValueRef, ty: TypeRef) -> OpRef {
    binary(ctx, loc, XOR(), lhs, rhs, ty)
}

/// Boolean negation; result has the operand's type.
pub fn not(ctx: &mut IrContext, loc: Location, value: ValueRef) -> Not {
    let ty = ctx.value_ty(value);
    let op = OperationDataBuilder::new(loc, DIALECT_NAME(), NOT())
        .operand(value)
        .result(ty)
        .create(ctx);
    Not::wrap(op)
}

/// Equality comparison producing `core.i1`.
pub fn cmp_eq(ctx: &mut IrContext, loc: Location, lhs: ValueRef, rhs: ValueRef) -> OpRef {
    let i1 = core::i1(ctx);
    binary(ctx, loc, CMP_EQ(), lhs, rhs, i1)
}
