//! Recursive operation traversal.

use std::ops::ControlFlow;

use crate::context::IrContext;
use crate::dialect::DialectOp;
use crate::refs::{BlockRef, OpRef, RegionRef};

/// Controls whether to descend into children during a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    /// Continue walking and descend into nested regions.
    Advance,
    /// Skip the nested regions of the current operation.
    Skip,
}

/// Walk all operations in a region recursively.
pub fn walk_region<B>(
    ctx: &IrContext,
    region: RegionRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    for &block in &ctx.region(region).blocks {
        walk_block(ctx, block, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk all operations in a block recursively.
pub fn walk_block<B>(
    ctx: &IrContext,
    block: BlockRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    for &op in &ctx.block(block).ops {
        walk_op(ctx, op, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk an operation and its nested regions recursively.
pub fn walk_op<B>(
    ctx: &IrContext,
    op: OpRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    match f(op) {
        ControlFlow::Break(b) => return ControlFlow::Break(b),
        ControlFlow::Continue(WalkAction::Skip) => return ControlFlow::Continue(()),
        ControlFlow::Continue(WalkAction::Advance) => {}
    }
    for &region in &ctx.op(op).regions {
        walk_region(ctx, region, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk operations of a specific kind in a region.
pub fn walk_typed<T, B>(
    ctx: &IrContext,
    region: RegionRef,
    f: &mut dyn FnMut(T) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()>
where
    T: DialectOp,
{
    walk_region(ctx, region, &mut |op| match T::from_op(ctx, op) {
        Some(typed) => f(typed),
        None => ControlFlow::Continue(WalkAction::Advance),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::func::Call;
    use crate::parser::parse_test_module;

    const NESTED: &str = r#"core.module @m {
  func.func @main() -> core.nil {
    %0 = arith.const {value = 1} : core.i64
    func.call %0 {callee = @foo}
    func.call {callee = @bar}
    func.return
  }
  func.func @other() -> core.nil {
    func.call {callee = @foo}
    func.return
  }
}
"#;

    #[test]
    fn walk_region_finds_all_ops() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(&mut ctx, NESTED);
        let body = module.body(&ctx).expect("module has a body");

        let mut count = 0;
        let _ = walk_region::<()>(&ctx, body, &mut |_op| {
            count += 1;
            ControlFlow::Continue(WalkAction::Advance)
        });
        // 2 funcs + 4 + 2 ops inside them
        assert_eq!(count, 8);
    }

    #[test]
    fn walk_with_early_exit() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(&mut ctx, NESTED);
        let body = module.body(&ctx).expect("module has a body");

        let mut visited = 0;
        let result = walk_region::<()>(&ctx, body, &mut |_op| {
            visited += 1;
            ControlFlow::Break(())
        });

        assert!(result.is_break());
        assert_eq!(visited, 1);
    }

    #[test]
    fn walk_skip_nested_regions() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(&mut ctx, NESTED);
        let body = module.body(&ctx).expect("module has a body");

        let mut visited = 0;
        let _ = walk_region::<()>(&ctx, body, &mut |_op| {
            visited += 1;
            ControlFlow::Continue(WalkAction::Skip)
        });
        assert_eq!(visited, 2);
    }

    #[test]
    fn walk_typed_visits_calls_only() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(&mut ctx, NESTED);
        let body = module.body(&ctx).expect("module has a body");

        let mut callees = Vec::new();
        let _ = walk_typed::<Call, ()>(&ctx, body, &mut |call| {
            callees.extend(call.callee(&ctx).map(|s| s.to_string()));
            ControlFlow::Continue(WalkAction::Advance)
        });
        assert_eq!(callees, ["foo", "bar", "foo"]);
    }
}
