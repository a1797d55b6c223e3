//! Shorthand constructors for [`OperandPattern`] trees.
//!
//! ```ignore
//! // %q = mem.load (func.call @__quantum__rt__array_get_element_ptr_1d %arr, %idx)
//! let pattern = load(call(
//!     "__quantum__rt__array_get_element_ptr_1d",
//!     vec![any().capture("array"), constant().capture("index")],
//! ));
//! ```

use qat_ir::Symbol;

use crate::pattern::OperandPattern;

pub fn any() -> OperandPattern {
    OperandPattern::Any { capture: None }
}

pub fn rest() -> OperandPattern {
    OperandPattern::Rest { capture: None }
}

pub fn constant() -> OperandPattern {
    OperandPattern::Constant { capture: None }
}

pub fn instruction(
    dialect: impl Into<Symbol>,
    name: impl Into<Symbol>,
    operands: Vec<OperandPattern>,
) -> OperandPattern {
    OperandPattern::Instruction {
        dialect: dialect.into(),
        name: name.into(),
        operands,
        capture: None,
    }
}

/// An instruction of the given kind with any operands.
pub fn op(dialect: impl Into<Symbol>, name: impl Into<Symbol>) -> OperandPattern {
    instruction(dialect, name, Vec::new())
}

pub fn call(callee: impl Into<Symbol>, args: Vec<OperandPattern>) -> OperandPattern {
    OperandPattern::Call {
        callee: callee.into(),
        args,
        capture: None,
    }
}

/// A call to `callee` with any arguments.
pub fn call_to(callee: impl Into<Symbol>) -> OperandPattern {
    call(callee, Vec::new())
}

pub fn load(source: OperandPattern) -> OperandPattern {
    OperandPattern::Load {
        source: Box::new(source),
        capture: None,
    }
}

pub fn store(value: OperandPattern, pointer: OperandPattern) -> OperandPattern {
    OperandPattern::Store {
        value: Box::new(value),
        pointer: Box::new(pointer),
        capture: None,
    }
}

pub fn terminator(operands: Vec<OperandPattern>) -> OperandPattern {
    OperandPattern::Terminator {
        operands,
        capture: None,
    }
}

/// `pattern` bound to `label`; reads better than a trailing `.capture()` in
/// deeply nested trees.
pub fn captured(label: impl Into<Symbol>, pattern: OperandPattern) -> OperandPattern {
    pattern.capture(label)
}
