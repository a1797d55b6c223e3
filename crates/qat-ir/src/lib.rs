//! Arena-based mutable SSA IR for quantum programs.
//!
//! A module holds functions (`func.func`), a function body holds basic
//! blocks, and blocks hold operations. All entities live in an [`IrContext`]
//! and are referred to by small `Copy` handles. Use-chains are maintained on
//! every mutation, which makes replace-all-uses and dead-producer checks
//! cheap for the rewriting engine built on top.

pub mod context;
pub mod dialect;
pub mod location;
pub mod module;
pub mod parser;
pub mod pass;
pub mod printer;
pub mod refs;
pub mod symbol;
pub mod types;
pub mod validation;
pub mod walk;

pub use context::{BlockData, IrContext, OperationData, OperationDataBuilder, RegionData, Use};
pub use location::{Location, PathTable, Span};
pub use module::IrModule;
pub use parser::ParseError;
pub use refs::{BlockRef, OpRef, PathRef, RegionRef, TypeRef, ValueDef, ValueRef};
pub use symbol::Symbol;
pub use types::{Attribute, TypeData, TypeInterner};
pub use walk::WalkAction;
