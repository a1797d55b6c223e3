//! Operand patterns: structural templates matched against instructions.
//!
//! A pattern is a tree. The root is matched against an instruction; its
//! children are matched against that instruction's operands, and a child
//! that is itself structural only matches an operand produced by an
//! instruction of the right kind. Matching never backtracks and never
//! touches the IR.
//!
//! A structural pattern with an empty child list is a leaf: only its kind
//! (opcode or callee) is checked and any number of operands is accepted.
//! With a non-empty child list the operand count must equal the child count,
//! unless the last child is [`OperandPattern::Rest`], which absorbs the tail.

use qat_ir::dialect::{DialectOp, arith, func, is_terminator, mem};
use qat_ir::{IrContext, OpRef, Symbol, ValueRef};
use smallvec::SmallVec;

use crate::captures::{Captured, Captures};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperandPattern {
    /// Matches anything.
    Any { capture: Option<Symbol> },
    /// Matches the remaining operands of the enclosing pattern.
    Rest { capture: Option<Symbol> },
    /// Matches an `arith.const`.
    Constant { capture: Option<Symbol> },
    Instruction {
        dialect: Symbol,
        name: Symbol,
        operands: Vec<OperandPattern>,
        capture: Option<Symbol>,
    },
    /// Matches a `func.call` to `callee`.
    Call {
        callee: Symbol,
        args: Vec<OperandPattern>,
        capture: Option<Symbol>,
    },
    Load {
        source: Box<OperandPattern>,
        capture: Option<Symbol>,
    },
    Store {
        value: Box<OperandPattern>,
        pointer: Box<OperandPattern>,
        capture: Option<Symbol>,
    },
    /// Matches any block terminator.
    Terminator {
        operands: Vec<OperandPattern>,
        capture: Option<Symbol>,
    },
}

impl OperandPattern {
    /// Attach a capture label, replacing any previous one.
    pub fn capture(mut self, label: impl Into<Symbol>) -> Self {
        *self.capture_slot() = Some(label.into());
        self
    }

    pub fn capture_label(&self) -> Option<Symbol> {
        match self {
            OperandPattern::Any { capture }
            | OperandPattern::Rest { capture }
            | OperandPattern::Constant { capture }
            | OperandPattern::Instruction { capture, .. }
            | OperandPattern::Call { capture, .. }
            | OperandPattern::Load { capture, .. }
            | OperandPattern::Store { capture, .. }
            | OperandPattern::Terminator { capture, .. } => *capture,
        }
    }

    fn capture_slot(&mut self) -> &mut Option<Symbol> {
        match self {
            OperandPattern::Any { capture }
            | OperandPattern::Rest { capture }
            | OperandPattern::Constant { capture }
            | OperandPattern::Instruction { capture, .. }
            | OperandPattern::Call { capture, .. }
            | OperandPattern::Load { capture, .. }
            | OperandPattern::Store { capture, .. }
            | OperandPattern::Terminator { capture, .. } => capture,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, OperandPattern::Rest { .. })
    }

    /// Child patterns in operand order.
    pub fn children(&self) -> SmallVec<[&OperandPattern; 4]> {
        match self {
            OperandPattern::Any { .. }
            | OperandPattern::Rest { .. }
            | OperandPattern::Constant { .. } => SmallVec::new(),
            OperandPattern::Instruction { operands, .. }
            | OperandPattern::Terminator { operands, .. } => operands.iter().collect(),
            OperandPattern::Call { args, .. } => args.iter().collect(),
            OperandPattern::Load { source, .. } => smallvec::smallvec![&**source],
            OperandPattern::Store { value, pointer, .. } => {
                smallvec::smallvec![&**value, &**pointer]
            }
        }
    }

    /// Whether `Rest` may appear as the last child of this pattern.
    pub(crate) fn accepts_rest_tail(&self) -> bool {
        matches!(
            self,
            OperandPattern::Instruction { .. }
                | OperandPattern::Call { .. }
                | OperandPattern::Terminator { .. }
        )
    }

    // ------------------------------------------------------------------
    // Matching
    // ------------------------------------------------------------------

    /// Match against the instruction `op`. Captures are discarded on failure.
    pub fn match_op(&self, ctx: &IrContext, op: OpRef) -> Option<Captures> {
        let mut captures = Captures::new();
        self.match_op_into(ctx, op, &mut captures)
            .then_some(captures)
    }

    /// Match against an operand value, adding to `captures`.
    ///
    /// Structural patterns only match values produced by an instruction of
    /// their kind; block arguments match only `Any`.
    pub fn match_value(&self, ctx: &IrContext, value: ValueRef, captures: &mut Captures) -> bool {
        match self {
            OperandPattern::Any { capture } => bind(captures, *capture, Captured::Value(value)),
            OperandPattern::Rest { capture } => bind(
                captures,
                *capture,
                Captured::Values(SmallVec::from_slice(&[value])),
            ),
            _ => match ctx.defining_op(value) {
                Some(producer) => self.match_op_into(ctx, producer, captures),
                None => false,
            },
        }
    }

    fn match_op_into(&self, ctx: &IrContext, op: OpRef, captures: &mut Captures) -> bool {
        let data = ctx.op(op);
        let operands = ctx.op_operands(op);
        let matched = match self {
            OperandPattern::Any { .. } | OperandPattern::Rest { .. } => true,
            OperandPattern::Constant { .. } => arith::Const::matches(ctx, op),
            OperandPattern::Instruction {
                dialect,
                name,
                operands: children,
                ..
            } => data.is(*dialect, *name) && match_operands(ctx, children, operands, captures),
            OperandPattern::Call { callee, args, .. } => {
                func::Call::from_op(ctx, op).and_then(|c| c.callee(ctx)) == Some(*callee)
                    && match_operands(ctx, args, operands, captures)
            }
            OperandPattern::Load { source, .. } => {
                mem::Load::matches(ctx, op)
                    && matches!(operands, [ptr] if source.match_value(ctx, *ptr, captures))
            }
            OperandPattern::Store { value, pointer, .. } => {
                mem::Store::matches(ctx, op)
                    && matches!(operands, [v, ptr]
                        if value.match_value(ctx, *v, captures)
                            && pointer.match_value(ctx, *ptr, captures))
            }
            OperandPattern::Terminator {
                operands: children,
                ..
            } => is_terminator(data) && match_operands(ctx, children, operands, captures),
        };
        matched && bind(captures, self.capture_label(), Captured::Op(op))
    }
}

fn bind(captures: &mut Captures, label: Option<Symbol>, captured: Captured) -> bool {
    match label {
        Some(label) => captures.insert(label, captured),
        None => true,
    }
}

fn match_operands(
    ctx: &IrContext,
    patterns: &[OperandPattern],
    values: &[ValueRef],
    captures: &mut Captures,
) -> bool {
    let Some((last, fixed)) = patterns.split_last() else {
        return true;
    };

    if let OperandPattern::Rest { capture } = last {
        if values.len() < fixed.len() {
            return false;
        }
        let (head, tail) = values.split_at(fixed.len());
        return fixed
            .iter()
            .zip(head)
            .all(|(p, &v)| p.match_value(ctx, v, captures))
            && bind(captures, *capture, Captured::Values(SmallVec::from_slice(tail)));
    }

    values.len() == patterns.len()
        && patterns
            .iter()
            .zip(values)
            .all(|(p, &v)| p.match_value(ctx, v, captures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::*;
    use qat_ir::parser::parse_test_module;

    const SAMPLE: &str = r#"
core.module @m {
  func.func @f(%0: qir.qubit) -> core.nil {
    %1 = arith.const {value = 3} : core.i64
    %2 = func.call %1 {callee = @__quantum__rt__qubit_allocate_array} : qir.array
    %3 = func.call %2, %1 {callee = @__quantum__rt__array_get_element_ptr_1d} : core.ptr
    %4 = mem.load %3 : qir.qubit
    func.call %4, %0 {callee = @__quantum__qis__cnot__body}
    %5 = arith.add %1, %1 : core.i64
    mem.store %5, %3
    func.return
  }
}
"#;

    fn ops(ctx: &mut IrContext) -> Vec<OpRef> {
        let module = parse_test_module(ctx, SAMPLE);
        let f = module.functions(ctx)[0];
        ctx.block(f.blocks(ctx)[0]).ops.to_vec()
    }

    #[test]
    fn leaves_depend_only_on_kind() {
        let mut ctx = IrContext::new();
        let ops = ops(&mut ctx);

        assert!(any().match_op(&ctx, ops[0]).is_some());
        assert!(constant().match_op(&ctx, ops[0]).is_some());
        assert!(constant().match_op(&ctx, ops[1]).is_none());
        // A leaf call ignores the argument count.
        assert!(call_to("__quantum__qis__cnot__body").match_op(&ctx, ops[4]).is_some());
        assert!(call_to("__quantum__qis__h__body").match_op(&ctx, ops[4]).is_none());
        assert!(op("arith", "add").match_op(&ctx, ops[5]).is_some());
        assert!(terminator(vec![]).match_op(&ctx, ops[7]).is_some());
        assert!(terminator(vec![]).match_op(&ctx, ops[5]).is_none());
    }

    #[test]
    fn arity_must_match_without_rest() {
        let mut ctx = IrContext::new();
        let ops = ops(&mut ctx);

        let one_arg = call("__quantum__qis__cnot__body", vec![any()]);
        assert!(one_arg.match_op(&ctx, ops[4]).is_none());

        let two_args = call("__quantum__qis__cnot__body", vec![any(), any()]);
        assert!(two_args.match_op(&ctx, ops[4]).is_some());

        let rest_tail = call("__quantum__qis__cnot__body", vec![rest().capture("tail")]);
        let caps = rest_tail.match_op(&ctx, ops[4]).unwrap();
        assert_eq!(caps.values("tail").unwrap().len(), 2);

        let too_many_fixed = call(
            "__quantum__qis__cnot__body",
            vec![any(), any(), any(), rest()],
        );
        assert!(too_many_fixed.match_op(&ctx, ops[4]).is_none());
    }

    #[test]
    fn nested_patterns_follow_producers_and_union_captures() {
        let mut ctx = IrContext::new();
        let ops = ops(&mut ctx);

        let pattern = load(call(
            "__quantum__rt__array_get_element_ptr_1d",
            vec![
                call("__quantum__rt__qubit_allocate_array", vec![constant()]).capture("array"),
                constant().capture("index"),
            ],
        ))
        .capture("load");

        let caps = pattern.match_op(&ctx, ops[3]).unwrap();
        assert_eq!(caps.len(), 3);
        assert_eq!(caps.op(&ctx, "array"), Ok(ops[1]));
        assert_eq!(caps.constant(&ctx, "index"), Ok(3));
        assert_eq!(caps.op(&ctx, "load"), Ok(ops[3]));
    }

    #[test]
    fn block_arguments_only_match_any() {
        let mut ctx = IrContext::new();
        let ops = ops(&mut ctx);

        let with_const = call("__quantum__qis__cnot__body", vec![any(), constant()]);
        assert!(with_const.match_op(&ctx, ops[4]).is_none());

        let with_any = call(
            "__quantum__qis__cnot__body",
            vec![load(any()), any().capture("control")],
        );
        let caps = with_any.match_op(&ctx, ops[4]).unwrap();
        assert!(matches!(caps.get("control"), Some(Captured::Value(_))));
    }

    #[test]
    fn store_matches_value_then_pointer() {
        let mut ctx = IrContext::new();
        let ops = ops(&mut ctx);

        let pattern = store(op("arith", "add").capture("sum"), any());
        let caps = pattern.match_op(&ctx, ops[6]).unwrap();
        assert_eq!(caps.op(&ctx, "sum"), Ok(ops[5]));

        let swapped = store(any(), op("arith", "add"));
        assert!(swapped.match_op(&ctx, ops[6]).is_none());
    }

    #[test]
    fn colliding_labels_fail_the_match() {
        let mut ctx = IrContext::new();
        let ops = ops(&mut ctx);

        let pattern = instruction(
            "arith",
            "add",
            vec![any().capture("x"), any().capture("x")],
        );
        assert!(pattern.match_op(&ctx, ops[5]).is_none());
    }

    #[test]
    fn matching_leaves_ir_untouched() {
        let mut ctx = IrContext::new();
        let ops = ops(&mut ctx);
        let before = ctx.block(ctx.op(ops[0]).parent_block.unwrap()).ops.to_vec();

        let pattern = load(call("__quantum__rt__array_get_element_ptr_1d", vec![rest()]));
        for &op in &ops {
            let _ = pattern.match_op(&ctx, op);
        }
        let after = ctx.block(ctx.op(ops[0]).parent_block.unwrap()).ops.to_vec();
        assert_eq!(before, after);
    }
}
