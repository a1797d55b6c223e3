//! Structural validation of a module.
//!
//! Two checks:
//!
//! 1. **Scope**: every operand inside a function refers to a value defined
//!    in that function's region tree (block arguments and op results).
//! 2. **Use-chains**: the use-chain stored in `IrContext` agrees exactly with
//!    the operand lists of the operations in the module.
//!
//! Rewrites that forget an RAUW or erase a still-used producer show up here.

use std::collections::HashSet;
use std::fmt;
use std::ops::ControlFlow;

use derive_more::Display;

use crate::context::IrContext;
use crate::dialect::full_name;
use crate::module::IrModule;
use crate::refs::{BlockRef, OpRef, RegionRef, ValueDef, ValueRef};
use crate::walk::{self, WalkAction};

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ValidationError {
    /// An operand refers to a value defined outside the enclosing function.
    #[display("operand #{operand_index} of {consumer} in @{function} is out of scope: {value}")]
    OutOfScope {
        function: String,
        consumer: String,
        operand_index: usize,
        value: String,
    },
    /// An operand has no matching use-chain entry.
    #[display("operand #{operand_index} of {consumer} uses {value:?} without a use-chain entry")]
    MissingUse {
        consumer: String,
        operand_index: u32,
        value: ValueRef,
    },
    /// A use-chain entry points at an operand that does not hold the value.
    #[display("use-chain of {value:?} is stale for operand #{operand_index} of {user:?}")]
    StaleUse {
        value: ValueRef,
        user: OpRef,
        operand_index: u32,
    },
}

#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn merge(mut self, other: ValidationResult) -> Self {
        self.errors.extend(other.errors);
        self
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return f.write_str("validation passed");
        }
        writeln!(f, "{} validation error(s):", self.errors.len())?;
        for err in &self.errors {
            writeln!(f, "  - {err}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Scope
// ============================================================================

fn collect_defined_in_region(ctx: &IrContext, region: RegionRef, defined: &mut HashSet<ValueRef>) {
    for &block in &ctx.region(region).blocks {
        defined.extend(ctx.block_args(block).iter().copied());
        for &op in &ctx.block(block).ops {
            defined.extend(ctx.op_results(op).iter().copied());
            for &nested in &ctx.op(op).regions {
                collect_defined_in_region(ctx, nested, defined);
            }
        }
    }
}

fn describe_value(ctx: &IrContext, v: ValueRef) -> String {
    match ctx.value_def(v) {
        ValueDef::OpResult(op, idx) => format!("result #{idx} of {}", full_name(ctx.op(op))),
        ValueDef::BlockArg(block, idx) => format!("argument #{idx} of block {block}"),
    }
}

/// Check that every operand refers to a value defined in its own function.
pub fn validate_value_scope(ctx: &IrContext, module: IrModule) -> ValidationResult {
    let mut errors = Vec::new();

    for func in module.functions(ctx) {
        let Some(body) = func.body(ctx) else {
            continue;
        };
        let name = func
            .name(ctx)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "<unnamed>".to_owned());

        let mut defined = HashSet::new();
        collect_defined_in_region(ctx, body, &mut defined);

        let _ = walk::walk_region::<()>(ctx, body, &mut |op| {
            for (i, &operand) in ctx.op_operands(op).iter().enumerate() {
                if !defined.contains(&operand) {
                    errors.push(ValidationError::OutOfScope {
                        function: name.clone(),
                        consumer: full_name(ctx.op(op)),
                        operand_index: i,
                        value: describe_value(ctx, operand),
                    });
                }
            }
            ControlFlow::Continue(WalkAction::Advance)
        });
    }

    ValidationResult { errors }
}

// ============================================================================
// Use-chains
// ============================================================================

fn collect_block_args(ctx: &IrContext, block: BlockRef, values: &mut HashSet<ValueRef>) {
    values.extend(ctx.block_args(block).iter().copied());
    for &op in &ctx.block(block).ops {
        for &region in &ctx.op(op).regions {
            for &inner in &ctx.region(region).blocks {
                collect_block_args(ctx, inner, values);
            }
        }
    }
}

/// Check that the stored use-chains match the actual operands, both ways.
pub fn validate_use_chains(ctx: &IrContext, module: IrModule) -> ValidationResult {
    let mut errors = Vec::new();
    let Some(body) = module.body(ctx) else {
        return ValidationResult { errors };
    };

    let mut actual: HashSet<(ValueRef, OpRef, u32)> = HashSet::new();
    let mut values: HashSet<ValueRef> = HashSet::new();
    let _ = walk::walk_region::<()>(ctx, body, &mut |op| {
        for (idx, &operand) in ctx.op_operands(op).iter().enumerate() {
            actual.insert((operand, op, idx as u32));
            values.insert(operand);
        }
        values.extend(ctx.op_results(op).iter().copied());
        ControlFlow::Continue(WalkAction::Advance)
    });
    for &block in &ctx.region(body).blocks {
        collect_block_args(ctx, block, &mut values);
    }

    for &(value, op, idx) in &actual {
        let recorded = ctx
            .uses(value)
            .iter()
            .any(|u| u.user == op && u.operand_index == idx);
        if !recorded {
            errors.push(ValidationError::MissingUse {
                consumer: full_name(ctx.op(op)),
                operand_index: idx,
                value,
            });
        }
    }

    for &value in &values {
        for u in ctx.uses(value) {
            // Uses by detached ops outside the module are stale too.
            if !actual.contains(&(value, u.user, u.operand_index)) {
                errors.push(ValidationError::StaleUse {
                    value,
                    user: u.user,
                    operand_index: u.operand_index,
                });
            }
        }
    }

    ValidationResult { errors }
}

/// Run every check.
pub fn validate_all(ctx: &IrContext, module: IrModule) -> ValidationResult {
    validate_value_scope(ctx, module).merge(validate_use_chains(ctx, module))
}
