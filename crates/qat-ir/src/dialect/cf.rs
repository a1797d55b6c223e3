//! `cf` dialect: unstructured control flow.

use crate::context::{IrContext, OperationDataBuilder};
use crate::dialect::DialectOp;
use crate::location::Location;
use crate::refs::{BlockRef, ValueRef};

crate::symbols! {
    DIALECT_NAME => "cf",
    BR => "br",
    COND_BR => "cond_br",
}

crate::dialect_op!(Br => "cf"."br");
crate::dialect_op!(CondBr => "cf"."cond_br");

/// Unconditional branch passing `args` to `dest`'s block arguments.
pub fn br(
    ctx: &mut IrContext,
    loc: Location,
    dest: BlockRef,
    args: impl IntoIterator<Item = ValueRef>,
) -> Br {
    let op = OperationDataBuilder::new(loc, DIALECT_NAME(), BR())
        .operands(args)
        .successor(dest)
        .create(ctx);
    Br::wrap(op)
}

pub fn cond_br(
    ctx: &mut IrContext,
    loc: Location,
    cond: ValueRef,
    then_dest: BlockRef,
    else_dest: BlockRef,
) -> CondBr {
    let op = OperationDataBuilder::new(loc, DIALECT_NAME(), COND_BR())
        .operand(cond)
        .successor(then_dest)
        .successor(else_dest)
        .create(ctx);
    CondBr::wrap(op)
}
