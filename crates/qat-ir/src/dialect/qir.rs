//! `qir` dialect: statically addressed qubits and results.
//!
//! A profile that forbids runtime allocation refers to qubits and result
//! slots by a fixed index. These ops materialize such references.

use crate::context::{IrContext, OperationDataBuilder};
use crate::dialect::DialectOp;
use crate::location::Location;
use crate::refs::{TypeRef, ValueRef};
use crate::types::Attribute;

crate::symbols! {
    DIALECT_NAME => "qir",
    QUBIT_REF => "qubit_ref",
    RESULT_REF => "result_ref",
    QUBIT_ARRAY => "qubit_array",
    ATTR_INDEX => "index",
    ATTR_OFFSET => "offset",
    ATTR_SIZE => "size",
    QUBIT => "qubit",
    RESULT => "result",
    ARRAY => "array",
    STRING => "string",
}

crate::dialect_op!(
    /// `%q = qir.qubit_ref {index = N} : qir.qubit`
    QubitRef => "qir"."qubit_ref"
);
crate::dialect_op!(
    /// `%r = qir.result_ref {index = N} : qir.result`
    ResultRef => "qir"."result_ref"
);
crate::dialect_op!(
    /// `%a = qir.qubit_array {offset = N, size = M} : qir.array`
    QubitArray => "qir"."qubit_array"
);

impl QubitRef {
    pub fn index(&self, ctx: &IrContext) -> Option<u64> {
        ctx.op(self.0).attr(ATTR_INDEX()).and_then(Attribute::as_int)
    }

    pub fn result(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

impl ResultRef {
    pub fn index(&self, ctx: &IrContext) -> Option<u64> {
        ctx.op(self.0).attr(ATTR_INDEX()).and_then(Attribute::as_int)
    }

    pub fn result(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

impl QubitArray {
    pub fn offset(&self, ctx: &IrContext) -> Option<u64> {
        ctx.op(self.0).attr(ATTR_OFFSET()).and_then(Attribute::as_int)
    }

    pub fn size(&self, ctx: &IrContext) -> Option<u64> {
        ctx.op(self.0).attr(ATTR_SIZE()).and_then(Attribute::as_int)
    }

    pub fn result(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

pub fn qubit_type(ctx: &mut IrContext) -> TypeRef {
    ctx.types.simple(DIALECT_NAME(), QUBIT())
}

pub fn result_type(ctx: &mut IrContext) -> TypeRef {
    ctx.types.simple(DIALECT_NAME(), RESULT())
}

pub fn array_type(ctx: &mut IrContext) -> TypeRef {
    ctx.types.simple(DIALECT_NAME(), ARRAY())
}

pub fn string_type(ctx: &mut IrContext) -> TypeRef {
    ctx.types.simple(DIALECT_NAME(), STRING())
}

pub fn qubit_ref(ctx: &mut IrContext, loc: Location, index: u64) -> QubitRef {
    let ty = qubit_type(ctx);
    let op = OperationDataBuilder::new(loc, DIALECT_NAME(), QUBIT_REF())
        .attr(ATTR_INDEX(), Attribute::IntBits(index))
        .result(ty)
        .create(ctx);
    QubitRef::wrap(op)
}

pub fn result_ref(ctx: &mut IrContext, loc: Location, index: u64) -> ResultRef {
    let ty = result_type(ctx);
    let op = OperationDataBuilder::new(loc, DIALECT_NAME(), RESULT_REF())
        .attr(ATTR_INDEX(), Attribute::IntBits(index))
        .result(ty)
        .create(ctx);
    ResultRef::wrap(op)
}

/// A contiguous block of `size` qubits starting at `offset`.
pub fn qubit_array(ctx: &mut IrContext, loc: Location, offset: u64, size: u64) -> QubitArray {
    let ty = array_type(ctx);
    let op = OperationDataBuilder::new(loc, DIALECT_NAME(), QUBIT_ARRAY())
        .attr(ATTR_OFFSET(), Attribute::IntBits(offset))
        .attr(ATTR_SIZE(), Attribute::IntBits(size))
        .result(ty)
        .create(ctx);
    QubitArray::wrap(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Span;
    use crate::refs::PathRef;
    use cranelift_entity::EntityRef;

    fn dummy_location() -> Location {
        Location::new(PathRef::new(0), Span::default())
    }

    #[test]
    fn qubit_ref_round_trip() {
        let mut ctx = IrContext::new();
        let q = qubit_ref(&mut ctx, dummy_location(), 3);

        let again = QubitRef::from_op(&ctx, q.op_ref()).expect("should match qir.qubit_ref");
        assert_eq!(again, q);
        assert_eq!(q.index(&ctx), Some(3));
        let qubit = qubit_type(&mut ctx);
        assert_eq!(ctx.value_ty(q.result(&ctx)), qubit);
        assert!(ResultRef::from_op(&ctx, q.op_ref()).is_none());
    }

    #[test]
    fn qubit_array_attributes() {
        let mut ctx = IrContext::new();
        let a = qubit_array(&mut ctx, dummy_location(), 4, 8);
        assert_eq!(a.offset(&ctx), Some(4));
        assert_eq!(a.size(&ctx), Some(8));
    }
}
