//! Named bindings produced by a successful match.

use qat_ir::dialect::DialectOp;
use qat_ir::dialect::arith;
use qat_ir::{IrContext, OpRef, Symbol, ValueRef};
use smallvec::SmallVec;

use crate::error::ActionError;

/// What a capture label is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Captured {
    /// A matched instruction, either the root or the producer of an operand.
    Op(OpRef),
    /// An operand value matched by `any()`.
    Value(ValueRef),
    /// The operands swallowed by a trailing `rest()`.
    Values(SmallVec<[ValueRef; 4]>),
}

/// Label to capture map, fresh for every match attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    entries: SmallVec<[(Symbol, Captured); 8]>,
}

impl Captures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `label`. Returns `false` if it is already bound.
    pub fn insert(&mut self, label: Symbol, captured: Captured) -> bool {
        if self.contains(label) {
            return false;
        }
        self.entries.push((label, captured));
        true
    }

    /// Merge `other` into `self`, failing on the first label collision.
    pub fn merge(&mut self, other: Captures) -> bool {
        other
            .entries
            .into_iter()
            .all(|(label, captured)| self.insert(label, captured))
    }

    pub fn contains(&self, label: Symbol) -> bool {
        self.entries.iter().any(|(l, _)| *l == label)
    }

    pub fn get(&self, label: impl Into<Symbol>) -> Option<&Captured> {
        let label = label.into();
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, c)| c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.entries.iter().map(|(l, _)| *l)
    }

    fn require(&self, label: Symbol) -> Result<&Captured, ActionError> {
        self.get(label).ok_or(ActionError::MissingCapture(label))
    }

    /// The captured instruction. A captured value resolves to its producer.
    pub fn op(&self, ctx: &IrContext, label: impl Into<Symbol>) -> Result<OpRef, ActionError> {
        let label = label.into();
        match self.require(label)? {
            Captured::Op(op) => Ok(*op),
            Captured::Value(v) => ctx.defining_op(*v).ok_or(ActionError::CaptureKind {
                label,
                expected: "an instruction",
            }),
            Captured::Values(_) => Err(ActionError::CaptureKind {
                label,
                expected: "an instruction",
            }),
        }
    }

    /// The captured value. A captured instruction must have exactly one result.
    pub fn value(
        &self,
        ctx: &IrContext,
        label: impl Into<Symbol>,
    ) -> Result<ValueRef, ActionError> {
        let label = label.into();
        let kind_error = ActionError::CaptureKind {
            label,
            expected: "a single value",
        };
        match self.require(label)? {
            Captured::Value(v) => Ok(*v),
            Captured::Op(op) => match ctx.op_results(*op) {
                [v] => Ok(*v),
                _ => Err(kind_error),
            },
            Captured::Values(_) => Err(kind_error),
        }
    }

    /// Values captured by a `rest()` tail.
    pub fn values(&self, label: impl Into<Symbol>) -> Result<&[ValueRef], ActionError> {
        let label = label.into();
        match self.require(label)? {
            Captured::Values(vs) => Ok(vs),
            _ => Err(ActionError::CaptureKind {
                label,
                expected: "a list of values",
            }),
        }
    }

    /// Integer payload of a captured `arith.const`.
    pub fn constant(&self, ctx: &IrContext, label: impl Into<Symbol>) -> Result<u64, ActionError> {
        let label = label.into();
        let op = self.op(ctx, label)?;
        arith::Const::from_op(ctx, op)
            .and_then(|c| c.value(ctx))
            .ok_or(ActionError::CaptureKind {
                label,
                expected: "an integer constant",
            })
    }
}
