//! Error types for rule construction, allocation and rule application.

use derive_more::{Display, Error, From};
use qat_ir::Symbol;

/// A rule whose pattern is malformed. Raised when the rule is built.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum RuleError {
    #[display("rule `{rule}` captures `{label}` more than once")]
    DuplicateCapture { rule: String, label: Symbol },

    #[display("rule `{rule}` uses a rest pattern outside the last operand position")]
    MisplacedRest { rule: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum AllocationError {
    #[display("all {capacity} statically allocated indices are in use")]
    Exhausted { capacity: u64 },

    #[display("block of {size} indices exceeds the limit of {limit}")]
    BlockTooLarge { size: u64, limit: u64 },

    #[display("static allocation does not support release")]
    ReleaseUnsupported,

    #[display("index {_0} is not currently allocated")]
    NotAllocated(#[error(not(source))] u64),
}

/// Failure inside a rule action.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error, From)]
pub enum ActionError {
    #[display("{_0}")]
    #[from]
    Allocation(AllocationError),

    #[display("no capture named `{_0}`")]
    MissingCapture(#[error(not(source))] Symbol),

    #[display("capture `{label}` is not {expected}")]
    CaptureKind { label: Symbol, expected: &'static str },

    #[display("replacement has {found} results but the original has {expected}")]
    ResultCountMismatch { expected: usize, found: usize },

    #[display("cannot erase {_0}: its results are still used")]
    ResultsInUse(#[error(not(source))] String),

    #[display("{_0} was removed from its block during the action")]
    MatchedOpDetached(#[error(not(source))] String),

    #[display("{_0} already belongs to a block and cannot be inserted")]
    AlreadyAttached(#[error(not(source))] String),

    #[display("{_0} is inserted more than once")]
    StagedTwice(#[error(not(source))] String),

    #[display("unsupported: {_0}")]
    Unsupported(#[error(not(source))] String),
}

/// Failure of the rule transformation pass. Mutations applied before the
/// failure stay in the module.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum TransformError {
    #[display("rule `{rule}` failed on {op} in @{function}: {source}")]
    Action {
        rule: String,
        function: String,
        op: String,
        source: ActionError,
    },

    #[display("no rule handles {op} in @{function}")]
    Unmatched { function: String, op: String },
}
