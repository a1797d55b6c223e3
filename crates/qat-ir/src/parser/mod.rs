//! Text format parser.
//!
//! Parsing happens in two stages:
//!
//! 1. [`raw`] combinators turn text into unresolved `Raw*` structures.
//! 2. `IrBuilder` resolves value names and block labels and creates the
//!    arena entities.
//!
//! The accepted format is exactly what [`crate::printer`] emits.

pub(crate) mod raw;

use std::collections::{BTreeMap, HashMap, HashSet};

use winnow::prelude::*;

pub use self::raw::ParseError;
use self::raw::{RawAttribute, RawBlock, RawOperation, RawRegion, RawType};
use crate::context::{IrContext, OperationDataBuilder};
use crate::dialect::{core, func};
use crate::location::{Location, Span};
use crate::module::IrModule;
use crate::refs::*;
use crate::symbol::Symbol;
use crate::types::{Attribute, TypeData};

type Scopes = (HashMap<String, ValueRef>, HashMap<String, BlockRef>);

struct IrBuilder<'a> {
    ctx: &'a mut IrContext,
    path: PathRef,
    input_len: usize,
    /// Value name (without `%`) to value.
    value_map: HashMap<String, ValueRef>,
    /// Block label (without `^`) to block.
    block_map: HashMap<String, BlockRef>,
}

impl<'a> IrBuilder<'a> {
    fn new(ctx: &'a mut IrContext, source_name: &str, input_len: usize) -> Self {
        let path = ctx.paths.intern(source_name);
        Self {
            ctx,
            path,
            input_len,
            value_map: HashMap::new(),
            block_map: HashMap::new(),
        }
    }

    fn offset_of(&self, raw: &RawOperation<'_>) -> usize {
        self.input_len - raw.remaining
    }

    fn location_of(&self, raw: &RawOperation<'_>) -> Location {
        let start = self.offset_of(raw);
        Location::new(self.path, Span::new(start, start))
    }

    fn error(&self, raw: &RawOperation<'_>, message: String) -> ParseError {
        ParseError {
            message,
            offset: self.offset_of(raw),
        }
    }

    // ------------------------------------------------------------------
    // Types and attributes
    // ------------------------------------------------------------------

    fn build_type(&mut self, raw: &RawType<'_>) -> TypeRef {
        let dialect = Symbol::from_dynamic(raw.dialect);
        let mut data = TypeData::new(dialect, Symbol::from_dynamic(raw.name));
        for param in &raw.params {
            data = data.with_param(self.build_type(param));
        }
        for (key, value) in &raw.attrs {
            data = data.with_attr(Symbol::from_dynamic(key), self.build_attribute(value));
        }
        self.ctx.types.intern(data)
    }

    fn build_attribute(&mut self, raw: &RawAttribute<'_>) -> Attribute {
        match raw {
            RawAttribute::Bool(b) => Attribute::Bool(*b),
            RawAttribute::Int(n) => Attribute::IntBits(*n),
            RawAttribute::Float(f) => Attribute::FloatBits(f.to_bits()),
            RawAttribute::String(s) => Attribute::String(s.clone()),
            RawAttribute::Symbol(s) => Attribute::Symbol(Symbol::from_dynamic(s)),
            RawAttribute::Type(t) => Attribute::Type(self.build_type(t)),
            RawAttribute::List(items) => {
                Attribute::List(items.iter().map(|a| self.build_attribute(a)).collect())
            }
            RawAttribute::Unit => Attribute::Unit,
        }
    }

    // ------------------------------------------------------------------
    // Regions and blocks
    // ------------------------------------------------------------------

    fn save_scopes(&self) -> Scopes {
        (self.value_map.clone(), self.block_map.clone())
    }

    fn restore_scopes(&mut self, (values, blocks): Scopes) {
        self.value_map = values;
        self.block_map = blocks;
    }

    /// Build a region. `entry_args` come from a function signature and
    /// become the entry block's arguments.
    fn build_region(
        &mut self,
        owner: &RawOperation<'_>,
        raw: &RawRegion<'_>,
        entry_args: &[(&str, RawType<'_>)],
    ) -> Result<RegionRef, ParseError> {
        let saved = self.save_scopes();
        let result = self.build_region_inner(owner, raw, entry_args);
        self.restore_scopes(saved);
        result
    }

    fn build_region_inner(
        &mut self,
        owner: &RawOperation<'_>,
        raw: &RawRegion<'_>,
        entry_args: &[(&str, RawType<'_>)],
    ) -> Result<RegionRef, ParseError> {
        let location = self.location_of(owner);

        // Create every block up front so successors can refer forward.
        let mut labels = HashSet::new();
        let mut blocks = Vec::with_capacity(raw.blocks.len());
        for (i, raw_block) in raw.blocks.iter().enumerate() {
            if !labels.insert(raw_block.label) {
                let message = format!("duplicate block label '^{}'", raw_block.label);
                return Err(self.error(owner, message));
            }

            let args = self.block_args(owner, i, raw_block, entry_args)?;
            let mut names = HashSet::new();
            let mut arg_types = Vec::with_capacity(args.len());
            for (name, ty) in &args {
                if !names.insert(*name) {
                    return Err(self.error(owner, format!("duplicate block argument '%{name}'")));
                }
                arg_types.push(self.build_type(ty));
            }

            let block = self.ctx.create_block(location, arg_types);
            self.block_map.insert(raw_block.label.to_owned(), block);
            for (j, (name, _)) in args.iter().enumerate() {
                let value = self.ctx.block_arg(block, j as u32);
                self.value_map.insert((*name).to_owned(), value);
            }
            blocks.push(block);
        }

        for (raw_block, &block) in raw.blocks.iter().zip(&blocks) {
            for raw_op in &raw_block.ops {
                let op = self.build_operation(raw_op)?;
                self.ctx.push_op(block, op);
            }
        }

        Ok(self.ctx.create_region(location, blocks))
    }

    /// Arguments of block `index`. The entry block takes the signature's
    /// parameters unless it declares its own, in which case they must agree.
    fn block_args<'r>(
        &mut self,
        owner: &RawOperation<'_>,
        index: usize,
        raw_block: &RawBlock<'r>,
        entry_args: &[(&'r str, RawType<'r>)],
    ) -> Result<Vec<(&'r str, RawType<'r>)>, ParseError> {
        if index != 0 || entry_args.is_empty() || raw_block.args.is_empty() {
            return Ok(if index == 0 && raw_block.args.is_empty() {
                entry_args.to_vec()
            } else {
                raw_block.args.clone()
            });
        }

        if raw_block.args.len() != entry_args.len() {
            return Err(self.error(
                owner,
                format!(
                    "entry block has {} arguments but the signature has {}",
                    raw_block.args.len(),
                    entry_args.len()
                ),
            ));
        }
        let pairs = raw_block.args.iter().zip(entry_args);
        for (j, ((_, block_ty), (_, param_ty))) in pairs.enumerate() {
            if self.build_type(block_ty) != self.build_type(param_ty) {
                return Err(self.error(
                    owner,
                    format!("entry block argument {j} does not match the signature type"),
                ));
            }
        }
        Ok(raw_block.args.clone())
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    fn build_operation(&mut self, raw: &RawOperation<'_>) -> Result<OpRef, ParseError> {
        let dialect = Symbol::from_dynamic(raw.dialect);
        let op_name = Symbol::from_dynamic(raw.op_name);

        let operands = raw
            .operands
            .iter()
            .map(|name| {
                self.value_map.get(*name).copied().ok_or_else(|| {
                    self.error(
                        raw,
                        format!("undefined value '%{name}' in '{}.{}'", raw.dialect, raw.op_name),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let result_types: Vec<TypeRef> =
            raw.result_types.iter().map(|t| self.build_type(t)).collect();
        if !raw.results.is_empty() && raw.results.len() != result_types.len() {
            return Err(self.error(
                raw,
                format!(
                    "'{}.{}' names {} results but declares {} result types",
                    raw.dialect,
                    raw.op_name,
                    raw.results.len(),
                    result_types.len()
                ),
            ));
        }

        let mut attributes: BTreeMap<Symbol, Attribute> = raw
            .attributes
            .iter()
            .map(|(k, v)| (Symbol::from_dynamic(k), self.build_attribute(v)))
            .collect();
        if let Some(name) = &raw.sym_name {
            attributes.insert(func::ATTR_SYM_NAME(), Attribute::Symbol(Symbol::from_dynamic(name)));
        }

        // A signature `(%a: T, ...) -> R` becomes `type = core.func(R, T...)`.
        if raw.return_type.is_some() || !raw.func_params.is_empty() {
            let ret = match &raw.return_type {
                Some(t) => self.build_type(t),
                None => core::nil(self.ctx),
            };
            let params: Vec<TypeRef> =
                raw.func_params.iter().map(|(_, t)| self.build_type(t)).collect();
            let func_ty = core::func_type(self.ctx, ret, params);
            attributes.insert(func::ATTR_TYPE(), Attribute::Type(func_ty));
        }

        let successors = raw
            .successors
            .iter()
            .map(|label| {
                self.block_map.get(*label).copied().ok_or_else(|| {
                    self.error(raw, format!("undefined block '^{label}'"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut regions = Vec::with_capacity(raw.regions.len());
        for (i, region) in raw.regions.iter().enumerate() {
            let entry_args = if i == 0 { &raw.func_params[..] } else { &[] };
            regions.push(self.build_region(raw, region, entry_args)?);
        }

        let mut builder = OperationDataBuilder::new(self.location_of(raw), dialect, op_name)
            .operands(operands)
            .results(result_types);
        for (k, v) in attributes {
            builder = builder.attr(k, v);
        }
        for r in regions {
            builder = builder.region(r);
        }
        for b in successors {
            builder = builder.successor(b);
        }
        let op = builder.create(self.ctx);

        for (i, name) in raw.results.iter().enumerate() {
            if self.value_map.contains_key(*name) {
                return Err(self.error(raw, format!("value '%{name}' is defined twice")));
            }
            let value = self.ctx.op_result(op, i as u32);
            self.value_map.insert((*name).to_owned(), value);
        }

        Ok(op)
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Parse a single top-level operation. `source_name` is recorded in the
/// locations of the created entities.
pub fn parse_op(ctx: &mut IrContext, source_name: &str, input: &str) -> Result<OpRef, ParseError> {
    let mut remaining = input;
    let offset = |rest: &str| input.len() - rest.len();

    let raw_op = raw::raw_operation
        .parse_next(&mut remaining)
        .map_err(|e| ParseError {
            message: format!("syntax error: {e}"),
            offset: offset(remaining),
        })?;

    let _ = raw::ws.parse_next(&mut remaining);
    if !remaining.is_empty() {
        return Err(ParseError {
            message: "trailing input after top-level operation".to_owned(),
            offset: offset(remaining),
        });
    }

    IrBuilder::new(ctx, source_name, input.len()).build_operation(&raw_op)
}

/// Parse a `core.module` from text.
pub fn parse_module(
    ctx: &mut IrContext,
    source_name: &str,
    input: &str,
) -> Result<IrModule, ParseError> {
    let op = parse_op(ctx, source_name, input)?;
    IrModule::new(ctx, op).ok_or_else(|| ParseError {
        message: format!("expected a core.module, found {}", crate::dialect::full_name(ctx.op(op))),
        offset: 0,
    })
}

/// Parse a module for tests, panicking with the input on failure.
pub fn parse_test_module(ctx: &mut IrContext, input: &str) -> IrModule {
    parse_module(ctx, "test.qir", input.trim()).unwrap_or_else(|e| {
        panic!(
            "failed to parse test IR at offset {}:\n  {}\n\nInput:\n{}",
            e.offset, e.message, input
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{DialectOp, arith, qir};
    use crate::printer::print_module;

    fn assert_roundtrip(text: &str) {
        let mut ctx = IrContext::new();
        let module = parse_test_module(&mut ctx, text);
        let printed = print_module(&ctx, module.op());
        assert_eq!(printed.trim(), text.trim(), "printer output differs from input");

        let mut ctx2 = IrContext::new();
        let reparsed = parse_test_module(&mut ctx2, &printed);
        assert_eq!(print_module(&ctx2, reparsed.op()), printed);
    }

    #[test]
    fn roundtrip_bell_program() {
        assert_roundtrip(
            r#"
core.module @bell {
  func.func @main() -> core.nil {
    %0 = func.call {callee = @__quantum__rt__qubit_allocate} : qir.qubit
    %1 = func.call {callee = @__quantum__rt__qubit_allocate} : qir.qubit
    func.call %0 {callee = @__quantum__qis__h__body}
    func.call %0, %1 {callee = @__quantum__qis__cnot__body}
    %2 = func.call %0 {callee = @__quantum__qis__m__body} : qir.result
    func.call %0 {callee = @__quantum__rt__qubit_release}
    func.call %1 {callee = @__quantum__rt__qubit_release}
    func.return
  }
}
"#,
        );
    }

    #[test]
    fn roundtrip_memory_and_arrays() {
        assert_roundtrip(
            r#"
core.module @arrays {
  func.func @run(%0: core.i64) -> core.i64 {
    %1 = arith.const {value = 4} : core.i64
    %2 = func.call %1 {callee = @__quantum__rt__qubit_allocate_array} : qir.array
    %3 = arith.const {value = 2} : core.i64
    %4 = func.call %2, %3 {callee = @__quantum__rt__array_get_element_ptr_1d} : core.ptr
    %5 = mem.load %4 : qir.qubit
    func.call %5 {callee = @__quantum__qis__x__body}
    func.return %0
  }
}
"#,
        );
    }

    #[test]
    fn parsed_ops_expose_typed_views() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(
            &mut ctx,
            r#"
core.module @m {
  func.func @f() -> core.nil {
    %0 = arith.const {value = 7} : core.i64
    %1 = qir.qubit_ref {index = 3} : qir.qubit
    func.return
  }
}
"#,
        );
        assert_eq!(module.name(&ctx), Some(Symbol::new("m")));
        let f = module.function(&ctx, Symbol::new("f")).unwrap();
        let ops = ctx.block(f.blocks(&ctx)[0]).ops.to_vec();
        let c = arith::Const::from_op(&ctx, ops[0]).unwrap();
        assert_eq!(c.value(&ctx), Some(7));
        let q = qir::QubitRef::from_op(&ctx, ops[1]).unwrap();
        assert_eq!(q.index(&ctx), Some(3));
        let nil = core::nil(&mut ctx);
        let ty = f.ty(&ctx).unwrap();
        assert_eq!(core::func_return_type(&ctx, ty), Some(nil));
    }

    #[test]
    fn locations_record_offsets() {
        let mut ctx = IrContext::new();
        let text = "core.module @m {\n  func.func @f() -> core.nil {\n    func.return\n  }\n}";
        let module = parse_module(&mut ctx, "loc.qir", text).unwrap();
        let f = module.functions(&ctx)[0];
        let ret = ctx.block(f.blocks(&ctx)[0]).ops[0];
        let loc = ctx.op(ret).location;
        assert_eq!(&text[loc.span.start..loc.span.start + 11], "func.return");
        assert_eq!(ctx.paths.get(loc.path), "loc.qir");
    }

    #[test]
    fn undefined_value_is_reported() {
        let mut ctx = IrContext::new();
        let text = r#"
core.module @m {
  func.func @f() -> core.nil {
    func.call %9 {callee = @g}
  }
}
"#;
        let err = parse_module(&mut ctx, "t.qir", text).unwrap_err();
        assert!(err.message.contains("undefined value '%9'"), "{err}");
        assert_eq!(&text[err.offset..err.offset + 9], "func.call");
    }

    #[test]
    fn duplicate_value_is_rejected() {
        let mut ctx = IrContext::new();
        let text = r#"
core.module @m {
  func.func @f() -> core.nil {
    %0 = arith.const {value = 1} : core.i64
    %0 = arith.const {value = 2} : core.i64
  }
}
"#;
        let err = parse_module(&mut ctx, "t.qir", text).unwrap_err();
        assert!(err.message.contains("defined twice"), "{err}");
    }

    #[test]
    fn trailing_input_is_rejected() {
        let mut ctx = IrContext::new();
        let err = parse_module(&mut ctx, "t.qir", "core.module @m {\n}\n}").unwrap_err();
        assert!(err.message.contains("trailing input"));
    }

    #[test]
    fn non_module_root_is_rejected() {
        let mut ctx = IrContext::new();
        let err = parse_module(&mut ctx, "t.qir", "func.return").unwrap_err();
        assert!(err.message.contains("expected a core.module"));
    }
}
