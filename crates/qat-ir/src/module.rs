//! Module wrapper.

use crate::context::IrContext;
use crate::dialect::func::Func;
use crate::dialect::{DialectOp, core};
use crate::refs::{BlockRef, OpRef, RegionRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

/// Thin wrapper around an `OpRef` pointing to a `core.module` operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IrModule(pub OpRef);

impl IrModule {
    /// Wrap `op`, verifying it is a `core.module`.
    pub fn new(ctx: &IrContext, op: OpRef) -> Option<Self> {
        ctx.op(op)
            .is(core::DIALECT_NAME(), core::MODULE())
            .then_some(IrModule(op))
    }

    pub fn op(self) -> OpRef {
        self.0
    }

    pub fn body(self, ctx: &IrContext) -> Option<RegionRef> {
        ctx.op(self.0).regions.first().copied()
    }

    pub fn first_block(self, ctx: &IrContext) -> Option<BlockRef> {
        let region = self.body(ctx)?;
        ctx.region(region).blocks.first().copied()
    }

    /// Top-level operations in the module body.
    pub fn ops(self, ctx: &IrContext) -> Vec<OpRef> {
        self.first_block(ctx)
            .map(|b| ctx.block(b).ops.to_vec())
            .unwrap_or_default()
    }

    /// All `func.func` operations, definitions and declarations alike.
    pub fn functions(self, ctx: &IrContext) -> Vec<Func> {
        self.ops(ctx)
            .into_iter()
            .filter_map(|op| Func::from_op(ctx, op))
            .collect()
    }

    /// Look up a function by name.
    pub fn function(self, ctx: &IrContext, name: Symbol) -> Option<Func> {
        self.functions(ctx)
            .into_iter()
            .find(|f| f.name(ctx) == Some(name))
    }

    pub fn name(self, ctx: &IrContext) -> Option<Symbol> {
        ctx.op(self.0)
            .attr(core::ATTR_SYM_NAME())
            .and_then(Attribute::as_symbol)
    }
}
