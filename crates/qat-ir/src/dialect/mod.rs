//! Dialect definitions: typed op wrappers and builder functions.
//!
//! | Dialect | Ops |
//! |---------|-----|
//! | `core`  | `module` |
//! | `arith` | `const`, `add`, `sub`, `mul`, `xor`, `not`, `cmp_eq` |
//! | `func`  | `func`, `call`, `return` |
//! | `mem`   | `alloca`, `load`, `store` |
//! | `cf`    | `br`, `cond_br` |
//! | `qir`   | `qubit_ref`, `result_ref`, `qubit_array` |

use crate::context::{IrContext, OperationData};
use crate::refs::OpRef;
use crate::symbol::Symbol;

pub mod arith;
pub mod cf;
pub mod core;
pub mod func;
pub mod mem;
pub mod qir;

/// Trait for typed operation wrappers.
pub trait DialectOp: Sized + Copy {
    const DIALECT_NAME: &'static str;
    const OP_NAME: &'static str;

    fn wrap(op: OpRef) -> Self;
    fn op_ref(&self) -> OpRef;

    fn matches(ctx: &IrContext, op: OpRef) -> bool {
        ctx.op(op).is(
            Symbol::new(Self::DIALECT_NAME),
            Symbol::new(Self::OP_NAME),
        )
    }

    /// Wrap `op` if it is an operation of this kind.
    fn from_op(ctx: &IrContext, op: OpRef) -> Option<Self> {
        Self::matches(ctx, op).then(|| Self::wrap(op))
    }
}

/// Define a typed wrapper struct implementing [`DialectOp`].
#[doc(hidden)]
#[macro_export]
macro_rules! dialect_op {
    ($(#[$meta:meta])* $ty:ident => $dialect:literal . $name:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $ty($crate::OpRef);

        impl $crate::dialect::DialectOp for $ty {
            const DIALECT_NAME: &'static str = $dialect;
            const OP_NAME: &'static str = $name;

            fn wrap(op: $crate::OpRef) -> Self {
                Self(op)
            }

            fn op_ref(&self) -> $crate::OpRef {
                self.0
            }
        }
    };
}

/// Whether the operation ends a basic block.
pub fn is_terminator(data: &OperationData) -> bool {
    (data.dialect == func::DIALECT_NAME() && data.name == func::RETURN())
        || (data.dialect == cf::DIALECT_NAME()
            && (data.name == cf::BR() || data.name == cf::COND_BR()))
}

/// Full `dialect.name` of an operation, for diagnostics.
pub fn full_name(data: &OperationData) -> String {
    format!("{}.{}", data.dialect, data.name)
}
