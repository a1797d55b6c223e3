//! Pattern-directed rewriting of QIR modules.
//!
//! A [`RuleSet`] is an ordered list of [`Rule`]s, each an [`OperandPattern`]
//! paired with an action. The [`RuleTransformationPass`] walks a module once,
//! applies the first matching rule to each instruction, and hands the action a
//! [`Rewriter`] positioned on the match. Actions that need fresh qubit or
//! result indices draw them from a [`SharedAllocationManager`].
//!
//! [`RuleSetFactory`] assembles the standard QIR adaptation rules from a
//! [`FactoryConfig`].

pub mod allocation;
pub mod captures;
pub mod error;
pub mod factory;
pub mod notation;
pub mod pass;
pub mod pattern;
pub mod rewriter;
pub mod rule;

pub use allocation::{AllocationManager, AllocationMode, MAX_BLOCK_SIZE, SharedAllocationManager};
pub use captures::{Captured, Captures};
pub use error::{ActionError, AllocationError, RuleError, TransformError};
pub use factory::{BASE_PROFILE_CALLEES, BASE_PROFILE_OPS, FactoryConfig, RuleSetFactory};
pub use pass::{RuleTransformationPass, TransformStats};
pub use pattern::OperandPattern;
pub use rewriter::Rewriter;
pub use rule::{Action, Rule, RuleSet, UnmatchedPolicy};
