//! Checks that an adapted module only uses what a profile allows.

use std::fmt;
use std::ops::ControlFlow;

use qat_ir::dialect::{DialectOp, cf, full_name, func};
use qat_ir::walk::{WalkAction, walk_region};
use qat_ir::{IrContext, IrModule, OpRef};
use qat_rules::{BASE_PROFILE_CALLEES, BASE_PROFILE_OPS};
use serde::{Deserialize, Serialize};

/// What a profile permits. Stored in the `validation` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ValidationConfig {
    /// Non-call instructions, as `dialect.name`.
    pub allowed_ops: Vec<String>,
    pub allowed_callees: Vec<String>,
    pub allowed_callee_prefixes: Vec<String>,
    /// Permit calls to functions defined in the module itself.
    pub allow_internal_calls: bool,
}

impl Default for ValidationConfig {
    /// The base profile.
    fn default() -> Self {
        let terminators = [
            (func::DIALECT_NAME(), func::RETURN()),
            (cf::DIALECT_NAME(), cf::BR()),
            (cf::DIALECT_NAME(), cf::COND_BR()),
        ]
        .map(|(dialect, name)| format!("{dialect}.{name}"));
        let allowed_ops = terminators
            .into_iter()
            .chain(BASE_PROFILE_OPS.iter().map(|(d, n)| format!("{d}.{n}")))
            .collect();

        Self {
            allowed_ops,
            allowed_callees: BASE_PROFILE_CALLEES.iter().map(|c| c.to_string()).collect(),
            allowed_callee_prefixes: vec!["__quantum__qis__".to_owned()],
            allow_internal_calls: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub function: String,
    pub op: String,
    pub reason: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}: {}: {}", self.function, self.op, self.reason)
    }
}

#[derive(Debug, Clone)]
pub struct ProfileValidator {
    config: ValidationConfig,
}

impl ProfileValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Every disallowed instruction in the module's function bodies.
    pub fn verify(&self, ctx: &IrContext, module: IrModule) -> Vec<Violation> {
        let mut violations = Vec::new();
        for function in module.functions(ctx) {
            let Some(body) = function.body(ctx) else {
                continue;
            };
            let name = function.name(ctx).map(|n| n.to_string()).unwrap_or_default();
            let _ = walk_region::<()>(ctx, body, &mut |op| {
                if let Some(reason) = self.check(ctx, module, op) {
                    violations.push(Violation {
                        function: name.clone(),
                        op: full_name(ctx.op(op)),
                        reason,
                    });
                }
                ControlFlow::Continue(WalkAction::Advance)
            });
        }
        violations
    }

    fn check(&self, ctx: &IrContext, module: IrModule, op: OpRef) -> Option<String> {
        let Some(call) = func::Call::from_op(ctx, op) else {
            let name = full_name(ctx.op(op));
            return (!self.config.allowed_ops.contains(&name))
                .then(|| format!("instruction `{name}` is not allowed"));
        };

        let Some(callee) = call.callee(ctx) else {
            return Some("call without a callee".to_owned());
        };
        let allowed = callee.with_str(|callee| {
            self.config.allowed_callees.iter().any(|c| c == callee)
                || self
                    .config
                    .allowed_callee_prefixes
                    .iter()
                    .any(|prefix| callee.starts_with(prefix.as_str()))
        });
        if allowed {
            return None;
        }
        let internal = module
            .function(ctx, callee)
            .is_some_and(|f| !f.is_declaration(ctx));
        if internal && self.config.allow_internal_calls {
            return None;
        }
        Some(format!("call to `@{callee}` is not allowed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qat_ir::parser::parse_test_module;

    #[test]
    fn base_profile_program_passes() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(
            &mut ctx,
            r#"
core.module @ok {
  func.func @main() -> core.nil {
    %0 = qir.qubit_ref {index = 0} : qir.qubit
    %1 = qir.result_ref {index = 0} : qir.result
    func.call %0 {callee = @__quantum__qis__h__body}
    func.call %0, %1 {callee = @__quantum__qis__mz__body}
    func.call %1 {callee = @__quantum__rt__result_record_output}
    func.return
  }
}
"#,
        );
        let violations = ProfileValidator::new(ValidationConfig::default()).verify(&ctx, module);
        assert!(violations.is_empty(), "{violations:?}");
    }

    #[test]
    fn violations_name_function_and_instruction() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(
            &mut ctx,
            r#"
core.module @bad {
  func.func @helper() -> core.nil {
    func.return
  }
  func.func @main() -> core.nil {
    %0 = func.call {callee = @__quantum__rt__qubit_allocate} : qir.qubit
    %1 = mem.alloca : core.ptr
    func.call {callee = @helper}
    func.return
  }
}
"#,
        );
        let validator = ProfileValidator::new(ValidationConfig::default());
        let rendered: Vec<String> = validator
            .verify(&ctx, module)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            rendered,
            [
                "@main: func.call: call to `@__quantum__rt__qubit_allocate` is not allowed",
                "@main: mem.alloca: instruction `mem.alloca` is not allowed",
                "@main: func.call: call to `@helper` is not allowed",
            ]
        );

        let permissive = ProfileValidator::new(ValidationConfig {
            allow_internal_calls: true,
            allowed_callee_prefixes: vec!["__quantum__".to_owned()],
            ..ValidationConfig::default()
        });
        let remaining = permissive.verify(&ctx, module);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].op, "mem.alloca");
    }
}
