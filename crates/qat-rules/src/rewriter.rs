//! The mutation handle passed to rule actions.
//!
//! A [`Rewriter`] is positioned on the matched instruction. Structural edits
//! (insertions, replacement, erasure, dead-producer cleanup) are recorded and
//! applied together once the action returns `Ok`. If the action fails, the
//! recorded edits are dropped and the ops it created are destroyed, so the
//! block is left as the action found it. Edits made directly through
//! [`Rewriter::ctx_mut`] take effect immediately and are not undone.

use qat_ir::dialect::{DialectOp, arith, core, full_name, func};
use qat_ir::{BlockRef, IrContext, Location, OpRef, Symbol, TypeRef, ValueRef};
use smallvec::SmallVec;

use crate::error::ActionError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Disposition {
    Keep,
    Replace(OpRef),
    Erase(SmallVec<[ValueRef; 2]>),
}

/// Where the pass should continue after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Applied {
    pub modified: bool,
    pub revisit: bool,
    /// Index of the first op the action inserted before the cursor.
    pub resume: usize,
    /// Index of the first op after everything the action touched.
    pub skip: usize,
}

pub struct Rewriter<'a> {
    ctx: &'a mut IrContext,
    block: BlockRef,
    op: OpRef,
    before: Vec<OpRef>,
    after: Vec<OpRef>,
    disposition: Disposition,
    dead_candidates: Vec<OpRef>,
    revisit: bool,
}

impl<'a> Rewriter<'a> {
    pub(crate) fn new(ctx: &'a mut IrContext, block: BlockRef, op: OpRef) -> Self {
        Self {
            ctx,
            block,
            op,
            before: Vec::new(),
            after: Vec::new(),
            disposition: Disposition::Keep,
            dead_candidates: Vec::new(),
            revisit: false,
        }
    }

    pub fn ctx(&self) -> &IrContext {
        self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut IrContext {
        self.ctx
    }

    /// The matched instruction.
    pub fn op(&self) -> OpRef {
        self.op
    }

    pub fn block(&self) -> BlockRef {
        self.block
    }

    pub fn location(&self) -> Location {
        self.ctx.op(self.op).location
    }

    /// Insert a freshly created op before the matched instruction.
    /// Multiple insertions keep their call order. Ops that already sit in a
    /// block fail the rewrite when the action returns.
    pub fn insert_before(&mut self, op: OpRef) {
        self.before.push(op);
    }

    /// Insert a freshly created op after the matched instruction (or after
    /// its replacement).
    pub fn insert_after(&mut self, op: OpRef) {
        self.after.push(op);
    }

    /// Replace the matched instruction with `new_op`, redirecting every use
    /// of its results. Both must have the same number of results.
    pub fn replace_with(&mut self, new_op: OpRef) -> Result<(), ActionError> {
        self.set_disposition(Disposition::Replace(new_op))
    }

    /// Remove the matched instruction. Its results must be unused.
    pub fn erase(&mut self) -> Result<(), ActionError> {
        self.set_disposition(Disposition::Erase(SmallVec::new()))
    }

    /// Remove the matched instruction, redirecting the uses of its results
    /// to `values` (one per result).
    pub fn erase_with(&mut self, values: &[ValueRef]) -> Result<(), ActionError> {
        self.set_disposition(Disposition::Erase(SmallVec::from_slice(values)))
    }

    /// Erase `op` after the rewrite if nothing uses it any more.
    pub fn erase_if_dead(&mut self, op: OpRef) {
        if !self.dead_candidates.contains(&op) {
            self.dead_candidates.push(op);
        }
    }

    /// Run the rules again starting at the first inserted op, instead of
    /// moving past the rewrite.
    pub fn revisit(&mut self) {
        self.revisit = true;
    }

    /// Create an `i64` constant and insert it before the matched instruction.
    pub fn const_i64(&mut self, value: u64) -> ValueRef {
        let loc = self.location();
        let ty = core::i64(self.ctx);
        let c = arith::r#const(self.ctx, loc, ty, value);
        self.insert_before(c.op_ref());
        c.result(self.ctx)
    }

    /// Create a call and insert it before the matched instruction.
    pub fn call(
        &mut self,
        callee: impl Into<Symbol>,
        args: &[ValueRef],
        result_ty: Option<TypeRef>,
    ) -> func::Call {
        let loc = self.location();
        let call = func::call(self.ctx, loc, callee.into(), args.iter().copied(), result_ty);
        self.insert_before(call.op_ref());
        call
    }

    fn set_disposition(&mut self, disposition: Disposition) -> Result<(), ActionError> {
        if self.disposition != Disposition::Keep {
            return Err(ActionError::Unsupported(format!(
                "{} is already replaced or erased",
                full_name(self.ctx.op(self.op))
            )));
        }
        self.disposition = disposition;
        Ok(())
    }

    /// Apply the recorded edits if `result` is `Ok`, otherwise drop them.
    pub(crate) fn finish(self, result: Result<(), ActionError>) -> Result<Applied, ActionError> {
        match result.and_then(|()| self.check()) {
            Ok(()) => Ok(self.apply()),
            Err(err) => {
                self.discard();
                Err(err)
            }
        }
    }

    fn check(&self) -> Result<(), ActionError> {
        if self.ctx.op_index(self.block, self.op).is_none() {
            return Err(ActionError::MatchedOpDetached(full_name(self.ctx.op(self.op))));
        }
        let mut staged: Vec<OpRef> = Vec::with_capacity(self.before.len() + self.after.len() + 1);
        let replacement = match self.disposition {
            Disposition::Replace(new_op) => Some(new_op),
            _ => None,
        };
        for &new_op in self.before.iter().chain(&self.after).chain(&replacement) {
            if self.ctx.op(new_op).parent_block.is_some() {
                return Err(ActionError::AlreadyAttached(full_name(self.ctx.op(new_op))));
            }
            if staged.contains(&new_op) {
                return Err(ActionError::StagedTwice(full_name(self.ctx.op(new_op))));
            }
            staged.push(new_op);
        }

        let expected = self.ctx.op_results(self.op).len();
        match &self.disposition {
            Disposition::Keep => Ok(()),
            Disposition::Replace(new_op) => {
                let found = self.ctx.op_results(*new_op).len();
                if found == expected {
                    Ok(())
                } else {
                    Err(ActionError::ResultCountMismatch { expected, found })
                }
            }
            Disposition::Erase(values) if values.is_empty() => {
                if self.ctx.is_unused(self.op) {
                    Ok(())
                } else {
                    Err(ActionError::ResultsInUse(full_name(self.ctx.op(self.op))))
                }
            }
            Disposition::Erase(values) => {
                if values.len() == expected {
                    Ok(())
                } else {
                    Err(ActionError::ResultCountMismatch {
                        expected,
                        found: values.len(),
                    })
                }
            }
        }
    }

    fn apply(self) -> Applied {
        let Rewriter {
            ctx,
            block,
            op,
            before,
            after,
            disposition,
            dead_candidates,
            revisit,
        } = self;

        // `check` guarantees the matched op is still in place.
        let Some(mut pos) = ctx.op_index(block, op) else {
            unreachable!("rewriter: {op} is no longer in {block}");
        };
        let start = pos;
        let mut modified = !before.is_empty() || !after.is_empty();

        for new_op in before {
            ctx.insert_op_at(block, pos, new_op);
            pos += 1;
        }

        let remains = match disposition {
            Disposition::Keep => true,
            Disposition::Replace(new_op) => {
                let replacements = ctx.op_results(new_op).to_vec();
                redirect_results(ctx, op, replacements);
                ctx.remove_op_from_block(block, op);
                ctx.remove_op(op);
                ctx.insert_op_at(block, pos, new_op);
                modified = true;
                true
            }
            Disposition::Erase(values) => {
                redirect_results(ctx, op, values.to_vec());
                ctx.erase_op(op);
                modified = true;
                false
            }
        };

        let mut skip = pos + usize::from(remains);
        for new_op in after {
            ctx.insert_op_at(block, skip, new_op);
            skip += 1;
        }

        let mut resume = start;
        let mut pending = dead_candidates;
        loop {
            let before_len = pending.len();
            pending.retain(|&candidate| {
                let Some(parent) = ctx.op(candidate).parent_block else {
                    return false;
                };
                if !ctx.is_unused(candidate) {
                    return true;
                }
                if parent == block {
                    if let Some(index) = ctx.op_index(block, candidate) {
                        if index < resume {
                            resume -= 1;
                        }
                        if index < skip {
                            skip -= 1;
                        }
                    }
                }
                ctx.erase_op(candidate);
                modified = true;
                false
            });
            if pending.len() == before_len {
                break;
            }
        }

        Applied {
            modified,
            revisit: revisit && modified,
            resume,
            skip,
        }
    }

    /// Destroy the ops the action created and never got to attach.
    fn discard(self) {
        let mut created: Vec<OpRef> = self.before;
        created.extend(self.after);
        if let Disposition::Replace(new_op) = self.disposition {
            created.push(new_op);
        }
        let ctx = self.ctx;
        let mut unique: Vec<OpRef> = Vec::with_capacity(created.len());
        for op in created {
            if ctx.op(op).parent_block.is_none() && !unique.contains(&op) {
                unique.push(op);
            }
        }
        let mut created = unique;
        loop {
            let before_len = created.len();
            created.retain(|&op| {
                if ctx.is_unused(op) {
                    ctx.remove_op(op);
                    false
                } else {
                    true
                }
            });
            if created.is_empty() || created.len() == before_len {
                break;
            }
        }
    }
}

fn redirect_results(ctx: &mut IrContext, op: OpRef, replacements: Vec<ValueRef>) {
    let old: SmallVec<[ValueRef; 2]> = ctx.op_results(op).into();
    for (from, to) in old.into_iter().zip(replacements) {
        ctx.replace_all_uses(from, to);
    }
}
