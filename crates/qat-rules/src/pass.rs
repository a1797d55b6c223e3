//! The rule transformation pass.

use qat_ir::dialect::{DialectOp, full_name, func};
use qat_ir::pass::{ModulePass, PassError, PassOutcome};
use qat_ir::{BlockRef, IrContext, IrModule, OpRef};

use crate::captures::Captures;
use crate::error::TransformError;
use crate::rewriter::Rewriter;
use crate::rule::{Rule, RuleSet, UnmatchedPolicy};

/// How many revisits one rewrite may chain before the pass moves past it.
pub const DEFAULT_MAX_REVISITS: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub instructions_visited: usize,
    pub match_attempts: usize,
    pub rules_applied: usize,
    pub modified: bool,
}

/// Applies a [`RuleSet`] to every instruction of a module in one linear
/// sweep.
///
/// Instructions are visited in program order, block by block. For each one
/// the rules are tried in registration order and the first match is
/// applied. The sweep then continues after whatever the action left at the
/// cursor, unless the action asked to revisit. Edits are not rolled back if a
/// later action fails.
#[derive(Debug)]
pub struct RuleTransformationPass {
    rules: RuleSet,
    max_revisits: usize,
}

impl RuleTransformationPass {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            max_revisits: DEFAULT_MAX_REVISITS,
        }
    }

    pub fn with_max_revisits(mut self, max_revisits: usize) -> Self {
        self.max_revisits = max_revisits;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn transform(
        &self,
        ctx: &mut IrContext,
        module: IrModule,
    ) -> Result<TransformStats, TransformError> {
        let mut stats = TransformStats::default();
        for function in module.functions(ctx) {
            let name = function
                .name(ctx)
                .map(|n| n.to_string())
                .unwrap_or_default();
            let blocks = function.blocks(ctx);
            if blocks.is_empty() {
                continue;
            }
            let _span = tracing::debug_span!("function", name = %name).entered();
            for block in blocks {
                self.transform_block(ctx, &name, block, &mut stats)?;
            }
        }
        tracing::debug!(
            visited = stats.instructions_visited,
            attempts = stats.match_attempts,
            applied = stats.rules_applied,
            modified = stats.modified,
            "rule transformation finished"
        );
        Ok(stats)
    }

    fn transform_block(
        &self,
        ctx: &mut IrContext,
        function: &str,
        block: BlockRef,
        stats: &mut TransformStats,
    ) -> Result<(), TransformError> {
        let mut index = 0;
        // Revisits granted since the cursor last reached `barrier`, the first
        // op after the rewrite that started the chain.
        let mut revisits = 0;
        let mut barrier: Option<OpRef> = None;
        while let Some(&op) = ctx.block(block).ops.get(index) {
            stats.instructions_visited += 1;
            if barrier == Some(op) {
                revisits = 0;
                barrier = None;
            }

            let Some((rule, captures)) = self.first_match(ctx, op, stats) else {
                if self.rules.policy() == UnmatchedPolicy::Reject {
                    return Err(TransformError::Unmatched {
                        function: function.to_owned(),
                        op: describe(ctx, op),
                    });
                }
                index += 1;
                continue;
            };

            tracing::trace!(rule = rule.name(), op = %describe(ctx, op), "rule matched");
            let mut rewriter = Rewriter::new(ctx, block, op);
            let result = rule.apply(&mut rewriter, &captures);
            let applied = rewriter.finish(result).map_err(|source| TransformError::Action {
                rule: rule.name().to_owned(),
                function: function.to_owned(),
                op: describe(ctx, op),
                source,
            })?;

            stats.rules_applied += 1;
            stats.modified |= applied.modified;
            if !applied.revisit {
                index = applied.skip;
            } else if revisits < self.max_revisits {
                if revisits == 0 {
                    barrier = ctx.block(block).ops.get(applied.skip).copied();
                }
                revisits += 1;
                index = applied.resume;
            } else {
                tracing::debug!(rule = rule.name(), "revisit limit reached");
                index = applied.skip;
            }
        }
        Ok(())
    }

    fn first_match(
        &self,
        ctx: &IrContext,
        op: OpRef,
        stats: &mut TransformStats,
    ) -> Option<(&Rule, Captures)> {
        self.rules.rules().iter().find_map(|rule| {
            stats.match_attempts += 1;
            rule.pattern().match_op(ctx, op).map(|captures| (rule, captures))
        })
    }
}

impl ModulePass for RuleTransformationPass {
    fn name(&self) -> &str {
        "rule-transformation"
    }

    fn run(&mut self, ctx: &mut IrContext, module: IrModule) -> Result<PassOutcome, PassError> {
        let stats = self
            .transform(ctx, module)
            .map_err(|err| PassError::failed(self.name(), err))?;
        Ok(PassOutcome {
            modified: stats.modified,
            ..PassOutcome::unchanged()
        }
        .with_stat("instructions-visited", stats.instructions_visited)
        .with_stat("match-attempts", stats.match_attempts)
        .with_stat("rules-applied", stats.rules_applied))
    }
}

/// `dialect.name`, plus the callee for calls.
fn describe(ctx: &IrContext, op: OpRef) -> String {
    let name = full_name(ctx.op(op));
    match func::Call::from_op(ctx, op).and_then(|c| c.callee(ctx)) {
        Some(callee) => format!("{name} @{callee}"),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionError;
    use crate::notation::*;
    use insta::assert_snapshot;
    use qat_ir::parser::parse_test_module;
    use qat_ir::printer::print_module;

    const INPUT: &str = r#"
core.module @m {
  func.func @main() -> core.nil {
    %0 = arith.const {value = 1} : core.i64
    %1 = arith.const {value = 2} : core.i64
    %2 = arith.add %0, %1 : core.i64
    func.return
  }
}
"#;

    #[test]
    fn first_matching_rule_wins() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(&mut ctx, INPUT);

        let mut rules = RuleSet::new();
        rules.add_rule("broad", constant(), |_, _| Ok(())).unwrap();
        rules
            .add_rule("specific", constant(), |rw, _| rw.erase())
            .unwrap();

        let stats = RuleTransformationPass::new(rules)
            .transform(&mut ctx, module)
            .unwrap();
        assert_eq!(stats.rules_applied, 2);
        assert!(!stats.modified);
        assert!(print_module(&ctx, module.op()).contains("value = 2"));
    }

    #[test]
    fn unmatched_module_costs_one_attempt_per_rule() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(&mut ctx, INPUT);

        let mut rules = RuleSet::new();
        for callee in ["a", "b", "c"] {
            rules
                .add_rule(callee, call_to(callee), |_, _| Ok(()))
                .unwrap();
        }
        let stats = RuleTransformationPass::new(rules)
            .transform(&mut ctx, module)
            .unwrap();
        assert_eq!(
            stats,
            TransformStats {
                instructions_visited: 4,
                match_attempts: 12,
                rules_applied: 0,
                modified: false,
            }
        );
    }

    #[test]
    fn reject_policy_reports_first_unmatched_op() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(&mut ctx, INPUT);

        let mut rules = RuleSet::new().with_policy(UnmatchedPolicy::Reject);
        rules.add_rule("consts", constant(), |_, _| Ok(())).unwrap();
        let err = RuleTransformationPass::new(rules)
            .transform(&mut ctx, module)
            .unwrap_err();
        assert_eq!(err.to_string(), "no rule handles arith.add in @main");
    }

    #[test]
    fn revisit_reevaluates_replacement() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(&mut ctx, INPUT);

        // Fold `add(const, const)` into a constant, then count constants
        // again on the revisit.
        let mut rules = RuleSet::new();
        rules
            .add_rule(
                "fold-add",
                instruction("arith", "add", vec![constant().capture("l"), constant().capture("r")]),
                |rw, caps| {
                    let sum = caps.constant(rw.ctx(), "l")? + caps.constant(rw.ctx(), "r")?;
                    let lhs = caps.op(rw.ctx(), "l")?;
                    let rhs = caps.op(rw.ctx(), "r")?;
                    let value = rw.const_i64(sum);
                    rw.erase_with(&[value])?;
                    rw.erase_if_dead(lhs);
                    rw.erase_if_dead(rhs);
                    rw.revisit();
                    Ok(())
                },
            )
            .unwrap();
        rules
            .add_rule("keep-const", constant(), |_, _| Ok(()))
            .unwrap();

        let stats = RuleTransformationPass::new(rules)
            .transform(&mut ctx, module)
            .unwrap();
        assert!(stats.modified);
        // 3 original ops, the folded constant, the return.
        assert_eq!(stats.instructions_visited, 5);
        assert_snapshot!(print_module(&ctx, module.op()), @r"
        core.module @m {
          func.func @main() -> core.nil {
            %0 = arith.const {value = 3} : core.i64
            func.return
          }
        }
        ");
    }

    #[test]
    fn endless_revisits_are_cut_off() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(&mut ctx, INPUT);

        let mut rules = RuleSet::new();
        rules
            .add_rule("grow", op("func", "return"), |rw, _| {
                rw.const_i64(0);
                rw.revisit();
                Ok(())
            })
            .unwrap();

        let stats = RuleTransformationPass::new(rules)
            .with_max_revisits(3)
            .transform(&mut ctx, module)
            .unwrap();
        assert_eq!(stats.rules_applied, 4);
        assert_eq!(ctx.block(module.functions(&ctx)[0].blocks(&ctx)[0]).ops.len(), 8);
    }

    #[test]
    fn action_failure_names_rule_and_op() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(&mut ctx, INPUT);

        let mut rules = RuleSet::new();
        rules
            .add_rule("erase-used", constant(), |rw, _| rw.erase())
            .unwrap();
        let mut pass = RuleTransformationPass::new(rules);
        let err = pass.run(&mut ctx, module).unwrap_err();
        assert_eq!(
            err.to_string(),
            "pass `rule-transformation` failed: rule `erase-used` failed on arith.const in @main: \
             cannot erase arith.const: its results are still used"
        );
        let source = err.pass_error().and_then(|e| e.downcast_ref::<TransformError>());
        assert!(matches!(
            source,
            Some(TransformError::Action { rule, .. }) if rule == "erase-used"
        ));
    }

    #[test]
    fn action_erasing_its_own_match_is_an_error() {
        let mut ctx = IrContext::new();
        let module = parse_test_module(
            &mut ctx,
            r#"
core.module @m {
  func.func @main() -> core.nil {
    func.call {callee = @foo}
    func.return
  }
}
"#,
        );

        let mut rules = RuleSet::new();
        rules
            .add_rule("erase-directly", call_to("foo"), |rw, _| {
                let target = rw.op();
                rw.ctx_mut().erase_op(target);
                Ok(())
            })
            .unwrap();
        let err = RuleTransformationPass::new(rules)
            .transform(&mut ctx, module)
            .unwrap_err();

        let TransformError::Action { rule, source, .. } = err else {
            panic!("expected an action error");
        };
        assert_eq!(rule, "erase-directly");
        assert_eq!(source, ActionError::MatchedOpDetached("func.call".to_owned()));
    }
}
