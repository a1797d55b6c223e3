//! `mem` dialect: stack slots, loads and stores.

use crate::context::{IrContext, OperationDataBuilder};
use crate::dialect::{DialectOp, core};
use crate::location::Location;
use crate::refs::{TypeRef, ValueRef};

crate::symbols! {
    DIALECT_NAME => "mem",
    ALLOCA => "alloca",
    LOAD => "load",
    STORE => "store",
}

crate::dialect_op!(Alloca => "mem"."alloca");
crate::dialect_op!(
    /// `%v = mem.load %ptr : ty`
    Load => "mem"."load"
);
crate::dialect_op!(
    /// `mem.store %value, %ptr`
    Store => "mem"."store"
);

impl Load {
    pub fn pointer(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn result(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

pub fn alloca(ctx: &mut IrContext, loc: Location) -> Alloca {
    let ptr = core::ptr(ctx);
    let op = OperationDataBuilder::new(loc, DIALECT_NAME(), ALLOCA())
        .result(ptr)
        .create(ctx);
    Alloca::wrap(op)
}

pub fn load(ctx: &mut IrContext, loc: Location, pointer: ValueRef, ty: TypeRef) -> Load {
    let op = OperationDataBuilder::new(loc, DIALECT_NAME(), LOAD())
        .operand(pointer)
        .result(ty)
        .create(ctx);
    Load::wrap(op)
}

pub fn store(ctx: &mut IrContext, loc: Location, value: ValueRef, pointer: ValueRef) -> Store {
    let op = OperationDataBuilder::new(loc, DIALECT_NAME(), STORE())
        .operand(value)
        .operand(pointer)
        .create(ctx);
    Store::wrap(op)
}
