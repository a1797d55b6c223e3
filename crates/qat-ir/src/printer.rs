//! Text format printer.
//!
//! ```text
//! core.module @bell {
//!   func.func @main() -> core.nil {
//!     %0 = func.call {callee = @__quantum__rt__qubit_allocate} : qir.qubit
//!     func.call %0 {callee = @__quantum__qis__h__body}
//!     func.return
//!   }
//! }
//! ```
//!
//! Function definitions print their entry block arguments as the signature.
//! Declarations (no body) print their parameter types the same way.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write;

use crate::context::IrContext;
use crate::dialect::{core, func};
use crate::refs::*;
use crate::symbol::Symbol;
use crate::types::Attribute;

/// Value numbering and block labeling state.
struct PrintState<'a> {
    ctx: &'a IrContext,
    value_names: HashMap<ValueRef, String>,
    block_labels: HashMap<BlockRef, String>,
    next_value_num: usize,
    next_block_num: usize,
}

impl<'a> PrintState<'a> {
    fn new(ctx: &'a IrContext) -> Self {
        Self {
            ctx,
            value_names: HashMap::new(),
            block_labels: HashMap::new(),
            next_value_num: 0,
            next_block_num: 0,
        }
    }

    fn assign_value_name(&mut self, v: ValueRef) -> String {
        let name = format!("%{}", self.next_value_num);
        self.next_value_num += 1;
        self.value_names.insert(v, name.clone());
        name
    }

    fn value_name(&self, v: ValueRef) -> &str {
        self.value_names.get(&v).map(|s| s.as_str()).unwrap_or("%?")
    }

    fn assign_block_label(&mut self, b: BlockRef) {
        let label = format!("^bb{}", self.next_block_num);
        self.next_block_num += 1;
        self.block_labels.insert(b, label);
    }

    fn block_label(&self, b: BlockRef) -> &str {
        self.block_labels
            .get(&b)
            .map(|s| s.as_str())
            .unwrap_or("^bb?")
    }

    fn reset_numbering(&mut self) {
        self.next_value_num = 0;
        self.next_block_num = 0;
        self.value_names.clear();
        self.block_labels.clear();
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Print a single operation (and its regions) as IR text.
pub fn print_op(ctx: &IrContext, op: OpRef) -> String {
    let mut out = String::new();
    // fmt::Write for String never fails.
    let _ = print_operation(&mut PrintState::new(ctx), &mut out, op, 0);
    out
}

/// Print a type as IR text.
pub fn print_type(ctx: &IrContext, ty: TypeRef) -> String {
    let mut out = String::new();
    let _ = write_type(ctx, &mut out, ty);
    out
}

/// Print a module (root operation with nested functions) as IR text.
pub fn print_module(ctx: &IrContext, root: OpRef) -> String {
    let mut out = String::new();
    let _ = print_module_op(&mut PrintState::new(ctx), &mut out, root);
    out
}

// ============================================================================
// Types and attributes
// ============================================================================

fn write_type(ctx: &IrContext, f: &mut impl Write, ty: TypeRef) -> fmt::Result {
    let data = ctx.types.get(ty);
    write!(f, "{}.{}", data.dialect, data.name)?;
    if !data.params.is_empty() {
        f.write_char('(')?;
        for (i, &param) in data.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_type(ctx, f, param)?;
        }
        f.write_char(')')?;
    } else if !data.attrs.is_empty() {
        // Empty parens signal that attrs follow
        f.write_str("()")?;
    }
    if !data.attrs.is_empty() {
        f.write_str(" {")?;
        write_attr_entries(ctx, f, data.attrs.iter())?;
        f.write_char('}')?;
    }
    Ok(())
}

fn write_attr_entries<'a>(
    ctx: &IrContext,
    f: &mut impl Write,
    entries: impl Iterator<Item = (&'a Symbol, &'a Attribute)>,
) -> fmt::Result {
    for (i, (key, val)) in entries.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key} = ")?;
        write_attribute(ctx, f, val)?;
    }
    Ok(())
}

fn write_attribute(ctx: &IrContext, f: &mut impl Write, attr: &Attribute) -> fmt::Result {
    match attr {
        Attribute::Unit => f.write_str("unit"),
        Attribute::Bool(b) => write!(f, "{b}"),
        Attribute::IntBits(v) => write!(f, "{v}"),
        Attribute::FloatBits(bits) => {
            let v = f64::from_bits(*bits);
            let s = format!("{v}");
            f.write_str(&s)?;
            // Keep a decimal point on finite whole numbers so they re-parse as floats
            if v.is_finite() && !s.contains(['.', 'e', 'E']) {
                f.write_str(".0")?;
            }
            Ok(())
        }
        Attribute::String(s) => {
            f.write_char('"')?;
            write_escaped_string(f, s)?;
            f.write_char('"')
        }
        Attribute::Symbol(sym) => write_symbol(f, *sym),
        Attribute::Type(ty) => write_type(ctx, f, *ty),
        Attribute::List(list) => {
            f.write_char('[')?;
            for (i, item) in list.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_attribute(ctx, f, item)?;
            }
            f.write_char(']')
        }
    }
}

fn write_escaped_string(f: &mut impl Write, s: &str) -> fmt::Result {
    for ch in s.chars() {
        match ch {
            '\\' => f.write_str("\\\\")?,
            '"' => f.write_str("\\\"")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            '\0' => f.write_str("\\0")?,
            c if c.is_control() => write!(f, "\\x{:02x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

fn write_symbol(f: &mut impl Write, sym: Symbol) -> fmt::Result {
    sym.with_str(|s| {
        let needs_quoting = s.is_empty() || !s.chars().all(|c| c.is_alphanumeric() || c == '_');
        if needs_quoting {
            f.write_str("@\"")?;
            write_escaped_string(f, s)?;
            f.write_char('"')
        } else {
            write!(f, "@{s}")
        }
    })
}

// ============================================================================
// Operations
// ============================================================================

fn print_operation(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let data = state.ctx.op(op);
    if data.is(core::DIALECT_NAME(), core::MODULE()) {
        return print_module_op(state, f, op);
    }
    if data.is(func::DIALECT_NAME(), func::FUNC()) {
        return print_func_op(state, f, op, indent);
    }
    print_generic_op(state, f, op, indent)
}

fn print_generic_op(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let indent_str = " ".repeat(indent);
    f.write_str(&indent_str)?;

    let results = state.ctx.op_results(op);
    if !results.is_empty() {
        for (i, &v) in results.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let name = state.assign_value_name(v);
            f.write_str(&name)?;
        }
        f.write_str(" = ")?;
    }

    let data = state.ctx.op(op);
    write!(f, "{}.{}", data.dialect, data.name)?;

    let operands = state.ctx.op_operands(op);
    for (i, &v) in operands.iter().enumerate() {
        f.write_str(if i == 0 { " " } else { ", " })?;
        f.write_str(state.value_name(v))?;
    }

    if !data.successors.is_empty() {
        f.write_str(" [")?;
        for (i, &b) in data.successors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(state.block_label(b))?;
        }
        f.write_char(']')?;
    }

    if !data.attributes.is_empty() {
        f.write_str(" {")?;
        write_attr_entries(state.ctx, f, data.attributes.iter())?;
        f.write_char('}')?;
    }

    let result_types = state.ctx.op_result_types(op);
    if !result_types.is_empty() {
        f.write_str(" : ")?;
        for (i, &ty) in result_types.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_type(state.ctx, f, ty)?;
        }
    }

    let regions = state.ctx.op(op).regions.clone();
    for region in regions {
        f.write_str(" {\n")?;
        print_blocks(state, f, region, indent, false)?;
        write!(f, "{indent_str}}}")?;
    }

    f.write_char('\n')
}

/// Print the blocks of a region at `indent + 2`, labels at `indent`.
///
/// With `entry_args_in_signature`, the entry block's arguments were already
/// printed as a function signature and its label may be elided.
fn print_blocks(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    region: RegionRef,
    indent: usize,
    entry_args_in_signature: bool,
) -> fmt::Result {
    let blocks: Vec<BlockRef> = state.ctx.region(region).blocks.to_vec();
    for &block in &blocks {
        state.assign_block_label(block);
    }

    let elide_entry = blocks.len() == 1
        && (entry_args_in_signature || state.ctx.block_args(blocks[0]).is_empty());

    let indent_str = " ".repeat(indent);
    for (i, &block) in blocks.iter().enumerate() {
        if !(i == 0 && elide_entry) {
            if i > 0 {
                f.write_char('\n')?;
            }
            write!(f, "{indent_str}{}", state.block_label(block))?;
            let args = state.ctx.block_args(block).to_vec();
            if !args.is_empty() && !(i == 0 && entry_args_in_signature) {
                f.write_char('(')?;
                for (j, &arg) in args.iter().enumerate() {
                    if j > 0 {
                        f.write_str(", ")?;
                    }
                    let name = state.assign_value_name(arg);
                    write!(f, "{name}: ")?;
                    write_type(state.ctx, f, state.ctx.value_ty(arg))?;
                }
                f.write_char(')')?;
            }
            f.write_str(":\n")?;
        }

        let ops = state.ctx.block(block).ops.to_vec();
        for op in ops {
            print_operation(state, f, op, indent + 2)?;
        }
    }
    Ok(())
}

fn print_module_op(state: &mut PrintState<'_>, f: &mut impl Write, op: OpRef) -> fmt::Result {
    let data = state.ctx.op(op);
    f.write_str("core.module")?;
    if let Some(name) = data.attr(core::ATTR_SYM_NAME()).and_then(Attribute::as_symbol) {
        f.write_char(' ')?;
        write_symbol(f, name)?;
    }

    let Some(&region) = data.regions.first() else {
        return f.write_char('\n');
    };
    f.write_str(" {\n")?;
    let blocks = state.ctx.region(region).blocks.to_vec();
    for block in blocks {
        let ops = state.ctx.block(block).ops.to_vec();
        for child in ops {
            state.reset_numbering();
            print_operation(state, f, child, 2)?;
        }
    }
    f.write_str("}\n")
}

fn print_func_op(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let indent_str = " ".repeat(indent);
    let ctx = state.ctx;
    let data = ctx.op(op);

    write!(f, "{indent_str}func.func")?;
    if let Some(name) = data.attr(func::ATTR_SYM_NAME()).and_then(Attribute::as_symbol) {
        f.write_char(' ')?;
        write_symbol(f, name)?;
    }

    state.reset_numbering();

    let func_ty = data.attr(func::ATTR_TYPE()).and_then(Attribute::as_type);
    let body = data.regions.first().copied();
    let entry = body.and_then(|r| ctx.region(r).blocks.first().copied());

    // Signature: entry block args for definitions, param types for declarations
    f.write_char('(')?;
    match entry {
        Some(entry) => {
            for (i, &arg) in ctx.block_args(entry).iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                let name = state.assign_value_name(arg);
                write!(f, "{name}: ")?;
                write_type(ctx, f, ctx.value_ty(arg))?;
            }
        }
        None => {
            let params = func_ty
                .map(|t| ctx.types.get(t).params.iter().skip(1).copied().collect::<Vec<_>>())
                .unwrap_or_default();
            for (i, param) in params.into_iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "%{i}: ")?;
                write_type(ctx, f, param)?;
            }
        }
    }
    f.write_char(')')?;

    if let Some(ret) = func_ty.and_then(|t| core::func_return_type(ctx, t)) {
        f.write_str(" -> ")?;
        write_type(ctx, f, ret)?;
    }

    match body {
        Some(region) if entry.is_some() => {
            f.write_str(" {\n")?;
            print_blocks(state, f, region, indent + 2, true)?;
            writeln!(f, "{indent_str}}}")
        }
        _ => f.write_char('\n'),
    }
}
