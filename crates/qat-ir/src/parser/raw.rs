//! Stage one of the text parser: winnow combinators producing unresolved
//! `Raw*` structures. Names are still strings here; the builder in the
//! parent module resolves them to arena references.

use derive_more::{Display, Error};
use winnow::ascii;
use winnow::combinator::{alt, delimited, opt, preceded, separated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

/// Parse error for the IR text format.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("parse error at offset {offset}: {message}")]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the input.
    pub offset: usize,
}

// ============================================================================
// Raw structures
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) struct RawOperation<'a> {
    /// Length of the remaining input where this operation starts.
    pub remaining: usize,
    pub results: Vec<&'a str>,
    pub dialect: &'a str,
    pub op_name: &'a str,
    /// `@name` after `dialect.op`.
    pub sym_name: Option<String>,
    /// Function-style parameters: `(%arg: type, ...)`.
    pub func_params: Vec<(&'a str, RawType<'a>)>,
    /// `-> type`
    pub return_type: Option<RawType<'a>>,
    pub operands: Vec<&'a str>,
    pub attributes: Vec<(&'a str, RawAttribute<'a>)>,
    pub result_types: Vec<RawType<'a>>,
    pub regions: Vec<RawRegion<'a>>,
    pub successors: Vec<&'a str>,
}

#[derive(Debug, Clone)]
pub(crate) struct RawRegion<'a> {
    pub blocks: Vec<RawBlock<'a>>,
}

#[derive(Debug, Clone)]
pub(crate) struct RawBlock<'a> {
    pub label: &'a str,
    pub args: Vec<(&'a str, RawType<'a>)>,
    pub ops: Vec<RawOperation<'a>>,
}

#[derive(Debug, Clone)]
pub(crate) struct RawType<'a> {
    pub dialect: &'a str,
    pub name: &'a str,
    pub params: Vec<RawType<'a>>,
    pub attrs: Vec<(&'a str, RawAttribute<'a>)>,
}

#[derive(Debug, Clone)]
pub(crate) enum RawAttribute<'a> {
    Bool(bool),
    Int(u64),
    Float(f64),
    String(String),
    Symbol(String),
    Type(RawType<'a>),
    List(Vec<RawAttribute<'a>>),
    Unit,
}

// ============================================================================
// Lexical parsers
// ============================================================================

pub(crate) fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_ascii_whitespace())
        .void()
        .parse_next(input)
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`
pub(crate) fn ident<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

fn name_chars<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

/// `%name`
pub(crate) fn value_ref<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded('%', name_chars).parse_next(input)
}

/// `^label`
pub(crate) fn block_label<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded('^', name_chars).parse_next(input)
}

/// `@name` or `@"quoted name"`; quoted symbols accept string escapes.
pub(crate) fn symbol_ref(input: &mut &str) -> ModalResult<String> {
    '@'.parse_next(input)?;
    if input.starts_with('"') {
        string_lit.parse_next(input)
    } else {
        name_chars.map(str::to_owned).parse_next(input)
    }
}

/// `dialect.name`
pub(crate) fn qualified_name<'a>(input: &mut &'a str) -> ModalResult<(&'a str, &'a str)> {
    (ident, '.', ident)
        .map(|(d, _, n)| (d, n))
        .parse_next(input)
}

/// Integer literal. Negative values are stored as two's complement.
pub(crate) fn integer_lit(input: &mut &str) -> ModalResult<u64> {
    let negative = opt('-').parse_next(input)?.is_some();
    let magnitude: u64 = ascii::dec_uint(input)?;
    if !negative {
        return Ok(magnitude);
    }
    let min_magnitude = i64::MAX as u64 + 1;
    if magnitude > min_magnitude {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    Ok(magnitude.wrapping_neg())
}

/// Float literal with a mandatory decimal point, so `42` stays an integer.
pub(crate) fn float_with_dot(input: &mut &str) -> ModalResult<f64> {
    let text = (
        opt('-'),
        take_while(1.., |c: char| c.is_ascii_digit()),
        '.',
        take_while(1.., |c: char| c.is_ascii_digit()),
        opt((
            one_of(['e', 'E']),
            opt(one_of(['+', '-'])),
            take_while(1.., |c: char| c.is_ascii_digit()),
        )),
    )
        .take()
        .parse_next(input)?;
    text.parse::<f64>()
        .map_err(|_| ErrMode::Backtrack(ContextError::new()))
}

/// `"content"` with `\\ \" \n \t \r \0 \xNN` escapes.
pub(crate) fn string_lit(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut out = String::new();
    loop {
        match any.parse_next(input)? {
            '"' => break,
            '\\' => match any.parse_next(input)? {
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                'x' => {
                    let hex: &str =
                        take_while(2, |c: char| c.is_ascii_hexdigit()).parse_next(input)?;
                    let code = u8::from_str_radix(hex, 16)
                        .map_err(|_| ErrMode::Backtrack(ContextError::new()))?;
                    out.push(code as char);
                }
                other => {
                    out.push('\\');
                    out.push(other);
                }
            },
            c => out.push(c),
        }
    }
    Ok(out)
}

// ============================================================================
// Types and attributes
// ============================================================================

/// `dialect.name`, `dialect.name(params)` or `dialect.name(params) {attrs}`.
///
/// Type attributes are only accepted after explicit parens, so that
/// `-> core.nil { ... }` keeps its `{` for the function body.
pub(crate) fn raw_type<'a>(input: &mut &'a str) -> ModalResult<RawType<'a>> {
    let (dialect, name) = qualified_name.parse_next(input)?;

    let params = opt(delimited(
        ('(', ws),
        separated(0.., (ws, raw_type, ws).map(|(_, t, _)| t), ','),
        (ws, ')'),
    ))
    .parse_next(input)?;

    let attrs = match params {
        Some(_) => opt(preceded(ws, raw_attr_dict))
            .parse_next(input)?
            .unwrap_or_default(),
        None => vec![],
    };

    Ok(RawType {
        dialect,
        name,
        params: params.unwrap_or_default(),
        attrs,
    })
}

pub(crate) fn raw_attr_value<'a>(input: &mut &'a str) -> ModalResult<RawAttribute<'a>> {
    alt((
        "true".value(RawAttribute::Bool(true)),
        "false".value(RawAttribute::Bool(false)),
        "unit".value(RawAttribute::Unit),
        string_lit.map(RawAttribute::String),
        symbol_ref.map(RawAttribute::Symbol),
        delimited(
            ('[', ws),
            separated(0.., (ws, raw_attr_value, ws).map(|(_, a, _)| a), ','),
            (ws, ']'),
        )
        .map(RawAttribute::List),
        float_with_dot.map(RawAttribute::Float),
        integer_lit.map(RawAttribute::Int),
        raw_type.map(RawAttribute::Type),
    ))
    .parse_next(input)
}

/// `{key = value, ...}`
pub(crate) fn raw_attr_dict<'a>(
    input: &mut &'a str,
) -> ModalResult<Vec<(&'a str, RawAttribute<'a>)>> {
    delimited(
        ('{', ws),
        separated(
            0..,
            (ws, ident, ws, '=', ws, raw_attr_value, ws).map(|(_, k, _, _, _, v, _)| (k, v)),
            ',',
        ),
        (ws, '}'),
    )
    .parse_next(input)
}

// ============================================================================
// Operations, blocks and regions
// ============================================================================

fn value_list<'a>(input: &mut &'a str) -> ModalResult<Vec<&'a str>> {
    separated(1.., (ws, value_ref, ws).map(|(_, v, _)| v), ',').parse_next(input)
}

/// `%0, %1 =`
fn result_list<'a>(input: &mut &'a str) -> ModalResult<Vec<&'a str>> {
    let results = value_list.parse_next(input)?;
    '='.parse_next(input)?;
    Ok(results)
}

/// `: type1, type2`
fn type_annotation<'a>(input: &mut &'a str) -> ModalResult<Vec<RawType<'a>>> {
    preceded(
        (ws, ':', ws),
        separated(1.., (ws, raw_type, ws).map(|(_, t, _)| t), ','),
    )
    .parse_next(input)
}

/// `(%arg: type, ...)`, shared by function signatures and block headers.
pub(crate) fn typed_args<'a>(input: &mut &'a str) -> ModalResult<Vec<(&'a str, RawType<'a>)>> {
    delimited(
        ('(', ws),
        separated(
            0..,
            (ws, value_ref, ws, ':', ws, raw_type, ws).map(|(_, name, _, _, _, ty, _)| (name, ty)),
            ',',
        ),
        (ws, ')'),
    )
    .parse_next(input)
}

/// `-> type`
fn return_type<'a>(input: &mut &'a str) -> ModalResult<RawType<'a>> {
    preceded((ws, "->", ws), raw_type).parse_next(input)
}

/// `[^bb0, ^bb1]`
fn successor_list<'a>(input: &mut &'a str) -> ModalResult<Vec<&'a str>> {
    delimited(
        ('[', ws),
        separated(1.., (ws, block_label, ws).map(|(_, l, _)| l), ','),
        (ws, ']'),
    )
    .parse_next(input)
}

/// A single operation.
///
/// ```text
/// [results =] dialect.op [@symbol] [(%arg: type, ...) | operands]
///   [[successors]] [-> type] [{attrs}] [: types] [regions]
/// ```
pub(crate) fn raw_operation<'a>(input: &mut &'a str) -> ModalResult<RawOperation<'a>> {
    ws.parse_next(input)?;
    let remaining = input.len();

    let results = opt(result_list).parse_next(input)?.unwrap_or_default();
    ws.parse_next(input)?;

    let (dialect, op_name) = qualified_name.parse_next(input)?;
    let sym_name = opt(preceded(ws, symbol_ref)).parse_next(input)?;

    let mut func_params = Vec::new();
    let mut operands = Vec::new();
    ws.parse_next(input)?;
    if input.starts_with('(') {
        func_params = typed_args.parse_next(input)?;
    } else if input.starts_with('%') {
        operands = value_list.parse_next(input)?;
    }

    let successors = opt(preceded(ws, successor_list))
        .parse_next(input)?
        .unwrap_or_default();
    let return_type = opt(return_type).parse_next(input)?;
    let attributes = opt(preceded(ws, raw_attr_dict))
        .parse_next(input)?
        .unwrap_or_default();
    let result_types = opt(type_annotation).parse_next(input)?.unwrap_or_default();

    let mut regions = Vec::new();
    loop {
        ws.parse_next(input)?;
        if !input.starts_with('{') {
            break;
        }
        regions.push(raw_region.parse_next(input)?);
    }

    Ok(RawOperation {
        remaining,
        results,
        dialect,
        op_name,
        sym_name,
        func_params,
        return_type,
        operands,
        attributes,
        result_types,
        regions,
        successors,
    })
}

/// Operations up to the next block label or the closing brace.
fn op_sequence<'a>(input: &mut &'a str) -> ModalResult<Vec<RawOperation<'a>>> {
    let mut ops = Vec::new();
    loop {
        ws.parse_next(input)?;
        if input.starts_with('^') || input.starts_with('}') || input.is_empty() {
            return Ok(ops);
        }
        ops.push(raw_operation.parse_next(input)?);
    }
}

/// `^label(args): ops...`
pub(crate) fn raw_block<'a>(input: &mut &'a str) -> ModalResult<RawBlock<'a>> {
    ws.parse_next(input)?;
    let label = block_label.parse_next(input)?;
    let args = opt(typed_args).parse_next(input)?.unwrap_or_default();
    (ws, ':').parse_next(input)?;
    let ops = op_sequence.parse_next(input)?;
    Ok(RawBlock { label, args, ops })
}

/// `{ ^bb0: ... ^bb1: ... }` or `{ ops... }` as a single unlabeled block.
pub(crate) fn raw_region<'a>(input: &mut &'a str) -> ModalResult<RawRegion<'a>> {
    ('{', ws).parse_next(input)?;

    let mut blocks = Vec::new();
    if input.starts_with('^') {
        loop {
            ws.parse_next(input)?;
            if input.starts_with('}') || input.is_empty() {
                break;
            }
            blocks.push(raw_block.parse_next(input)?);
        }
    } else if !input.starts_with('}') {
        let ops = op_sequence.parse_next(input)?;
        blocks.push(RawBlock {
            label: "bb0",
            args: vec![],
            ops,
        });
    }

    (ws, '}').parse_next(input)?;
    Ok(RawRegion { blocks })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_types() {
        let mut input = "qir.qubit";
        let raw = raw_type.parse_next(&mut input).unwrap();
        assert_eq!((raw.dialect, raw.name), ("qir", "qubit"));
        assert!(raw.params.is_empty());

        let mut input = "core.func(core.nil, qir.qubit, qir.result)";
        let raw = raw_type.parse_next(&mut input).unwrap();
        assert_eq!(raw.name, "func");
        assert_eq!(raw.params.len(), 3);
    }

    #[test]
    fn type_attrs_require_parens() {
        let mut input = "core.func(core.nil) {variadic = true}";
        let raw = raw_type.parse_next(&mut input).unwrap();
        assert_eq!(raw.attrs.len(), 1);
        assert!(input.is_empty());

        let mut input = "core.nil {";
        let raw = raw_type.parse_next(&mut input).unwrap();
        assert!(raw.attrs.is_empty());
        assert_eq!(input, " {");
    }

    #[test]
    fn parse_attribute_values() {
        let cases: [(&str, fn(&RawAttribute<'_>) -> bool); 7] = [
            ("42", |a| matches!(a, RawAttribute::Int(42))),
            ("3.25", |a| matches!(a, RawAttribute::Float(f) if (f - 3.25).abs() < 1e-10)),
            ("true", |a| matches!(a, RawAttribute::Bool(true))),
            ("unit", |a| matches!(a, RawAttribute::Unit)),
            (r#""hi""#, |a| matches!(a, RawAttribute::String(s) if s == "hi")),
            ("@foo", |a| matches!(a, RawAttribute::Symbol(s) if s == "foo")),
            ("[1, @x]", |a| matches!(a, RawAttribute::List(l) if l.len() == 2)),
        ];
        for (text, check) in cases {
            let mut input = text;
            let attr = raw_attr_value.parse_next(&mut input).unwrap();
            assert!(check(&attr), "unexpected attribute for {text}: {attr:?}");
        }
    }

    #[test]
    fn parse_string_escapes() {
        let cases = [
            (r#""a\nb""#, "a\nb"),
            (r#""a\tb""#, "a\tb"),
            (r#""a\\b""#, "a\\b"),
            (r#""a\"b""#, "a\"b"),
            (r#""a\x01b""#, "a\x01b"),
        ];
        for (text, expected) in cases {
            let mut input = text;
            assert_eq!(string_lit.parse_next(&mut input).unwrap(), expected);
        }
    }

    #[test]
    fn parse_quoted_symbol() {
        let mut input = r#"@"Microsoft::Quantum::Main""#;
        assert_eq!(
            symbol_ref.parse_next(&mut input).unwrap(),
            "Microsoft::Quantum::Main"
        );
    }

    #[test]
    fn integer_bounds() {
        let mut input = "-9223372036854775808";
        assert_eq!(integer_lit.parse_next(&mut input).unwrap(), i64::MIN as u64);

        let mut input = "-1";
        assert_eq!(integer_lit.parse_next(&mut input).unwrap(), u64::MAX);

        let mut input = "-9223372036854775809";
        assert!(integer_lit.parse_next(&mut input).is_err());
    }

    #[test]
    fn parse_call_with_operands() {
        let mut input = "%2 = func.call %0, %1 {callee = @f} : qir.result";
        let op = raw_operation.parse_next(&mut input).unwrap();
        assert_eq!(op.results, ["2"]);
        assert_eq!((op.dialect, op.op_name), ("func", "call"));
        assert_eq!(op.operands, ["0", "1"]);
        assert_eq!(op.attributes.len(), 1);
        assert_eq!(op.result_types.len(), 1);
    }

    #[test]
    fn parse_region_with_labeled_blocks() {
        let mut input = "{\n ^bb0:\n cf.br [^exit]\n ^exit(%x: core.i64):\n func.return\n}";
        let region = raw_region.parse_next(&mut input).unwrap();
        assert_eq!(region.blocks.len(), 2);
        assert_eq!(region.blocks[0].ops[0].successors, ["exit"]);
        assert_eq!(region.blocks[1].label, "exit");
        assert_eq!(region.blocks[1].args.len(), 1);
    }

    #[test]
    fn empty_region_has_no_blocks() {
        let mut input = "{ }";
        let region = raw_region.parse_next(&mut input).unwrap();
        assert!(region.blocks.is_empty());
    }
}
