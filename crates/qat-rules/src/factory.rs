//! The QIR adaptation rules, assembled from configuration.
//!
//! Each flag of [`FactoryConfig`] switches on one group of rules. Groups are
//! registered in a fixed order, so a group can rely on the rewrites of the
//! groups before it having happened to earlier instructions (the array
//! element rule, for example, only recognises arrays the allocation rule has
//! already made static).

use qat_ir::Symbol;
use qat_ir::dialect::{DialectOp, arith, core, qir};
use serde::{Deserialize, Serialize};

use crate::allocation::SharedAllocationManager;
use crate::captures::Captures;
use crate::error::{ActionError, RuleError};
use crate::notation::*;
use crate::pattern::OperandPattern;
use crate::rewriter::Rewriter;
use crate::rule::{RuleSet, UnmatchedPolicy};

/// Calls a base-profile program may make after adaptation.
pub const BASE_PROFILE_CALLEES: &[&str] = &[
    "__quantum__qis__h__body",
    "__quantum__qis__x__body",
    "__quantum__qis__y__body",
    "__quantum__qis__z__body",
    "__quantum__qis__s__body",
    "__quantum__qis__t__body",
    "__quantum__qis__s__adj",
    "__quantum__qis__t__adj",
    "__quantum__qis__cnot__body",
    "__quantum__qis__cz__body",
    "__quantum__qis__swap__body",
    "__quantum__qis__rx__body",
    "__quantum__qis__ry__body",
    "__quantum__qis__rz__body",
    "__quantum__qis__mz__body",
    "__quantum__qis__reset__body",
    "__quantum__qis__read_result__body",
    "__quantum__rt__initialize",
    "__quantum__rt__result_record_output",
    "__quantum__rt__bool_record_output",
    "__quantum__rt__integer_record_output",
    "__quantum__rt__double_record_output",
    "__quantum__rt__array_record_output",
    "__quantum__rt__tuple_record_output",
];

/// Non-call instructions a base-profile program may contain.
pub const BASE_PROFILE_OPS: &[(&str, &str)] = &[
    ("arith", "const"),
    ("arith", "not"),
    ("qir", "qubit_ref"),
    ("qir", "result_ref"),
    ("qir", "qubit_array"),
];

const REFERENCE_COUNTED: &[&str] = &["qubit", "array", "result", "string", "tuple", "callable"];
const ALIAS_COUNTED: &[&str] = &["array", "tuple", "callable"];

const QUBIT_ALLOCATE: &str = "__quantum__rt__qubit_allocate";
const QUBIT_RELEASE: &str = "__quantum__rt__qubit_release";
const QUBIT_ALLOCATE_ARRAY: &str = "__quantum__rt__qubit_allocate_array";
const QUBIT_RELEASE_ARRAY: &str = "__quantum__rt__qubit_release_array";
const ARRAY_ELEMENT_PTR: &str = "__quantum__rt__array_get_element_ptr_1d";
const MESSAGE: &str = "__quantum__rt__message";
const STRING_CREATE: &str = "__quantum__rt__string_create";
const RESULT_EQUAL: &str = "__quantum__rt__result_equal";
const RESULT_GET_ONE: &str = "__quantum__rt__result_get_one";
const RESULT_GET_ZERO: &str = "__quantum__rt__result_get_zero";
const READ_RESULT: &str = "__quantum__qis__read_result__body";
const MEASURE: &str = "__quantum__qis__m__body";
const MEASURE_INTO: &str = "__quantum__qis__mz__body";

/// Which rule groups to register. Read from the `transformation-rules`
/// configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FactoryConfig {
    pub disable_reference_counting: bool,
    pub disable_alias_counting: bool,
    pub disable_string_support: bool,
    pub optimise_result_one: bool,
    pub optimise_result_zero: bool,
    pub use_static_qubit_array_allocation: bool,
    pub use_static_qubit_allocation: bool,
    pub use_static_result_allocation: bool,
    /// Reject instructions that neither a rewrite rule nor the base-profile
    /// allowlist handles.
    pub strict: bool,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            disable_reference_counting: true,
            disable_alias_counting: true,
            disable_string_support: true,
            optimise_result_one: true,
            optimise_result_zero: true,
            use_static_qubit_array_allocation: true,
            use_static_qubit_allocation: true,
            use_static_result_allocation: true,
            strict: false,
        }
    }
}

impl FactoryConfig {
    /// Every rule group off.
    pub fn none() -> Self {
        Self {
            disable_reference_counting: false,
            disable_alias_counting: false,
            disable_string_support: false,
            optimise_result_one: false,
            optimise_result_zero: false,
            use_static_qubit_array_allocation: false,
            use_static_qubit_allocation: false,
            use_static_result_allocation: false,
            strict: false,
        }
    }
}

/// Builds a [`RuleSet`] wired to a profile's qubit and result managers.
pub struct RuleSetFactory {
    config: FactoryConfig,
    qubits: SharedAllocationManager,
    results: SharedAllocationManager,
}

impl RuleSetFactory {
    pub fn new(
        config: FactoryConfig,
        qubits: SharedAllocationManager,
        results: SharedAllocationManager,
    ) -> Self {
        Self {
            config,
            qubits,
            results,
        }
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    pub fn build(&self) -> Result<RuleSet, RuleError> {
        let mut rules = RuleSet::new();
        self.populate(&mut rules)?;
        Ok(rules)
    }

    /// Append every enabled group to `rules`, in registration order.
    pub fn populate(&self, rules: &mut RuleSet) -> Result<(), RuleError> {
        let config = &self.config;
        if config.disable_reference_counting {
            self.remove_reference_counting(rules)?;
        }
        if config.disable_alias_counting {
            self.remove_alias_counting(rules)?;
        }
        if config.disable_string_support {
            self.remove_string_support(rules)?;
        }
        if config.optimise_result_one {
            self.optimise_result_one(rules)?;
        }
        if config.optimise_result_zero {
            self.optimise_result_zero(rules)?;
        }
        if config.use_static_qubit_array_allocation {
            self.use_static_qubit_array_allocation(rules)?;
        }
        if config.use_static_qubit_allocation {
            self.use_static_qubit_allocation(rules)?;
        }
        if config.use_static_result_allocation {
            self.use_static_result_allocation(rules)?;
        }
        if config.strict {
            self.allow_base_profile(rules)?;
            rules.set_policy(UnmatchedPolicy::Reject);
        }
        tracing::debug!(rules = rules.len(), strict = config.strict, "rule set populated");
        Ok(())
    }

    pub fn remove_reference_counting(&self, rules: &mut RuleSet) -> Result<(), RuleError> {
        for kind in REFERENCE_COUNTED {
            let callee = format!("__quantum__rt__{kind}_update_reference_count");
            add_erase_call(rules, "remove-reference-count", callee)?;
        }
        Ok(())
    }

    pub fn remove_alias_counting(&self, rules: &mut RuleSet) -> Result<(), RuleError> {
        for kind in ALIAS_COUNTED {
            let callee = format!("__quantum__rt__{kind}_update_alias_count");
            add_erase_call(rules, "remove-alias-count", callee)?;
        }
        Ok(())
    }

    /// Messages are dropped, together with the strings built only for them.
    pub fn remove_string_support(&self, rules: &mut RuleSet) -> Result<(), RuleError> {
        rules.add_rule("remove-message", call(MESSAGE, vec![any().capture("text")]), |rw, caps| {
            let text = caps.value(rw.ctx(), "text")?;
            rw.erase()?;
            if let Some(producer) = rw.ctx().defining_op(text) {
                if call_to(STRING_CREATE).match_op(rw.ctx(), producer).is_some() {
                    rw.erase_if_dead(producer);
                }
            }
            Ok(())
        })
    }

    /// `result_equal(r, result_get_one())` reads the result directly.
    pub fn optimise_result_one(&self, rules: &mut RuleSet) -> Result<(), RuleError> {
        for (name, pattern) in result_comparisons(RESULT_GET_ONE) {
            rules.add_rule(name, pattern, |rw, caps| {
                let read = read_result(rw, caps)?;
                rw.erase_with(&[read])?;
                rw.erase_if_dead(caps.op(rw.ctx(), "literal")?);
                Ok(())
            })?;
        }
        Ok(())
    }

    /// `result_equal(r, result_get_zero())` becomes the negated read.
    pub fn optimise_result_zero(&self, rules: &mut RuleSet) -> Result<(), RuleError> {
        for (name, pattern) in result_comparisons(RESULT_GET_ZERO) {
            rules.add_rule(name, pattern, |rw, caps| {
                let read = read_result(rw, caps)?;
                let loc = rw.location();
                let negated = arith::not(rw.ctx_mut(), loc, read);
                rw.replace_with(negated.op_ref())?;
                rw.erase_if_dead(caps.op(rw.ctx(), "literal")?);
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Arrays of a constant size become contiguous blocks of static qubits,
    /// and element loads become direct qubit references.
    pub fn use_static_qubit_array_allocation(&self, rules: &mut RuleSet) -> Result<(), RuleError> {
        let qubits = self.qubits.clone();
        rules.add_rule(
            "static-qubit-array",
            call(QUBIT_ALLOCATE_ARRAY, vec![constant().capture("size")]),
            move |rw, caps| {
                let size = caps.constant(rw.ctx(), "size")?;
                let offset = qubits.allocate_block(size)?;
                let loc = rw.location();
                let array = qir::qubit_array(rw.ctx_mut(), loc, offset, size);
                rw.replace_with(array.op_ref())?;
                rw.erase_if_dead(caps.op(rw.ctx(), "size")?);
                Ok(())
            },
        )?;

        rules.add_rule(
            "static-array-element",
            load(captured(
                "element",
                call(
                    ARRAY_ELEMENT_PTR,
                    vec![op("qir", "qubit_array").capture("array"), constant().capture("index")],
                ),
            )),
            |rw, caps| {
                let (offset, size) = array_bounds(rw, caps)?;
                let index = caps.constant(rw.ctx(), "index")?;
                if index >= size {
                    return Err(ActionError::Unsupported(format!(
                        "element {index} of a {size}-qubit array"
                    )));
                }
                let loc = rw.location();
                let qubit = qir::qubit_ref(rw.ctx_mut(), loc, offset + index);
                rw.replace_with(qubit.op_ref())?;
                rw.erase_if_dead(caps.op(rw.ctx(), "element")?);
                rw.erase_if_dead(caps.op(rw.ctx(), "index")?);
                Ok(())
            },
        )?;

        let qubits = self.qubits.clone();
        rules.add_rule(
            "static-qubit-array-release",
            call(QUBIT_RELEASE_ARRAY, vec![op("qir", "qubit_array").capture("array")]),
            move |rw, caps| {
                let array_op = caps.op(rw.ctx(), "array")?;
                let (offset, size) = array_bounds(rw, caps)?;
                if qubits.supports_release() {
                    for index in offset..offset + size {
                        qubits.release(index)?;
                    }
                }
                rw.erase()?;
                rw.erase_if_dead(array_op);
                Ok(())
            },
        )
    }

    pub fn use_static_qubit_allocation(&self, rules: &mut RuleSet) -> Result<(), RuleError> {
        let qubits = self.qubits.clone();
        rules.add_rule("static-qubit", call_to(QUBIT_ALLOCATE), move |rw, _| {
            let index = qubits.allocate()?;
            let loc = rw.location();
            let qubit = qir::qubit_ref(rw.ctx_mut(), loc, index);
            rw.replace_with(qubit.op_ref())
        })?;

        let qubits = self.qubits.clone();
        rules.add_rule(
            "static-qubit-release",
            call(QUBIT_RELEASE, vec![op("qir", "qubit_ref").capture("qubit")]),
            move |rw, caps| {
                let qubit_op = caps.op(rw.ctx(), "qubit")?;
                let index = qir::QubitRef::from_op(rw.ctx(), qubit_op)
                    .and_then(|qubit| qubit.index(rw.ctx()))
                    .ok_or_else(|| ActionError::Unsupported("qubit without an index".to_owned()))?;
                if qubits.supports_release() {
                    qubits.release(index)?;
                }
                rw.erase()
            },
        )
    }

    /// `%r = m(q)` becomes a fresh result slot measured into with `mz`.
    pub fn use_static_result_allocation(&self, rules: &mut RuleSet) -> Result<(), RuleError> {
        let results = self.results.clone();
        rules.add_rule(
            "static-result",
            call(MEASURE, vec![any().capture("qubit")]),
            move |rw, caps| {
                let qubit = caps.value(rw.ctx(), "qubit")?;
                let index = results.allocate()?;
                let loc = rw.location();
                let slot = qir::result_ref(rw.ctx_mut(), loc, index);
                rw.insert_before(slot.op_ref());
                let slot = slot.result(rw.ctx());
                rw.call(MEASURE_INTO, &[qubit, slot], None);
                rw.erase_with(&[slot])
            },
        )
    }

    /// Pass-through rules for everything a base-profile program may keep.
    ///
    /// Producers that an enabled group consumes further down the block
    /// (element pointers, result literals, message strings) are let through
    /// as well; whatever survives of them is left to the profile validator.
    pub fn allow_base_profile(&self, rules: &mut RuleSet) -> Result<(), RuleError> {
        rules.add_rule("allow-terminator", terminator(vec![]), keep)?;
        for &(dialect, name) in BASE_PROFILE_OPS {
            rules.add_rule(format!("allow-{dialect}.{name}"), op(dialect, name), keep)?;
        }
        for &callee in BASE_PROFILE_CALLEES {
            rules.add_rule(format!("allow-{callee}"), call_to(callee), keep)?;
        }

        let config = &self.config;
        let consumed = [
            (config.use_static_qubit_array_allocation, ARRAY_ELEMENT_PTR),
            (config.optimise_result_one, RESULT_GET_ONE),
            (config.optimise_result_zero, RESULT_GET_ZERO),
            (config.disable_string_support, STRING_CREATE),
        ];
        for (enabled, callee) in consumed {
            if enabled {
                rules.add_rule(format!("allow-pending-{callee}"), call_to(callee), keep)?;
            }
        }
        Ok(())
    }
}

fn keep(_: &mut Rewriter<'_>, _: &Captures) -> Result<(), ActionError> {
    Ok(())
}

fn add_erase_call(rules: &mut RuleSet, group: &str, callee: String) -> Result<(), RuleError> {
    let name = format!("{group}:{callee}");
    rules.add_rule(name, call_to(Symbol::from(callee)), |rw, _| rw.erase())
}

/// Offset and size of the static qubit array captured as `array`.
fn array_bounds(rw: &Rewriter<'_>, caps: &Captures) -> Result<(u64, u64), ActionError> {
    let array_op = caps.op(rw.ctx(), "array")?;
    let Some(array) = qir::QubitArray::from_op(rw.ctx(), array_op) else {
        return Err(ActionError::CaptureKind {
            label: Symbol::new("array"),
            expected: "a static qubit array",
        });
    };
    match (array.offset(rw.ctx()), array.size(rw.ctx())) {
        (Some(offset), Some(size)) => Ok((offset, size)),
        _ => Err(ActionError::Unsupported("qubit array without offset or size".to_owned())),
    }
}

/// Both operand orders of `result_equal(r, literal())`.
fn result_comparisons(literal: &'static str) -> [(String, OperandPattern); 2] {
    let result = || any().capture("result");
    let literal_call = || call(literal, vec![]).capture("literal");
    let name = literal.trim_start_matches("__quantum__rt__");
    [
        (
            format!("{name}-rhs"),
            call(RESULT_EQUAL, vec![result(), literal_call()]),
        ),
        (
            format!("{name}-lhs"),
            call(RESULT_EQUAL, vec![literal_call(), result()]),
        ),
    ]
}

/// Insert `read_result__body(r)` for the captured result and return its value.
fn read_result(rw: &mut Rewriter<'_>, caps: &Captures) -> Result<qat_ir::ValueRef, ActionError> {
    let result = caps.value(rw.ctx(), "result")?;
    let i1 = core::i1(rw.ctx_mut());
    let read = rw.call(READ_RESULT, &[result], Some(i1));
    read.result(rw.ctx())
        .ok_or_else(|| ActionError::Unsupported(format!("{READ_RESULT} produced no value")))
}
