//! The [`IrContext`] arena.
//!
//! Operations, values, blocks and regions are stored in `PrimaryMap`s and
//! addressed through the handles in [`crate::refs`]. Each operation keeps its
//! operand list inline; the context keeps, for every value, the list of
//! operand slots that read it. Every mutation below updates both sides, so
//! `uses(v)` and the operand lists always agree.

use std::collections::BTreeMap;

use cranelift_entity::{PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::location::{Location, PathTable};
use crate::refs::{BlockRef, OpRef, RegionRef, TypeRef, ValueDef, ValueRef};
use crate::symbol::Symbol;
use crate::types::{Attribute, TypeInterner};

/// Operand slot `operand_index` of `user` reads the value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: OpRef,
    pub operand_index: u32,
}

/// An operation. Operands and results are reached through the context
/// (`op_operands`, `op_results`) so that the use-chains stay consistent.
pub struct OperationData {
    pub location: Location,
    pub dialect: Symbol,
    pub name: Symbol,
    pub attributes: BTreeMap<Symbol, Attribute>,
    pub regions: SmallVec<[RegionRef; 1]>,
    pub successors: SmallVec<[BlockRef; 2]>,
    /// The block holding the op; `None` while detached.
    pub parent_block: Option<BlockRef>,
    operands: SmallVec<[ValueRef; 4]>,
    result_types: SmallVec<[TypeRef; 1]>,
    results: SmallVec<[ValueRef; 1]>,
}

impl OperationData {
    pub fn is(&self, dialect: Symbol, name: Symbol) -> bool {
        self.dialect == dialect && self.name == name
    }

    pub fn attr(&self, key: Symbol) -> Option<&Attribute> {
        self.attributes.get(&key)
    }
}

pub struct BlockData {
    pub location: Location,
    pub ops: SmallVec<[OpRef; 8]>,
    pub parent_region: Option<RegionRef>,
    args: SmallVec<[ValueRef; 2]>,
}

pub struct RegionData {
    pub location: Location,
    pub blocks: SmallVec<[BlockRef; 2]>,
    pub parent_op: Option<OpRef>,
}

struct ValueData {
    def: ValueDef,
    ty: TypeRef,
}

/// Owner of every IR entity of one or more modules.
#[derive(Default)]
pub struct IrContext {
    ops: PrimaryMap<OpRef, OperationData>,
    values: PrimaryMap<ValueRef, ValueData>,
    blocks: PrimaryMap<BlockRef, BlockData>,
    regions: PrimaryMap<RegionRef, RegionData>,
    uses: SecondaryMap<ValueRef, SmallVec<[Use; 2]>>,
    pub types: TypeInterner,
    pub paths: PathTable,
}

impl IrContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data`, take ownership of its regions, record its operand uses
    /// and give it one fresh value per result type. The op starts detached.
    fn create_op(&mut self, mut data: OperationData) -> OpRef {
        let op = self.ops.next_key();

        for &region in &data.regions {
            let owner = &mut self.regions[region].parent_op;
            if let Some(other) = *owner {
                panic!("{region} is already the body of {other}");
            }
            *owner = Some(op);
        }
        for (slot, &value) in data.operands.iter().enumerate() {
            self.uses[value].push(Use {
                user: op,
                operand_index: slot as u32,
            });
        }
        for (index, &ty) in data.result_types.iter().enumerate() {
            let value = self.values.push(ValueData {
                def: ValueDef::OpResult(op, index as u32),
                ty,
            });
            data.results.push(value);
        }

        let pushed = self.ops.push(data);
        debug_assert_eq!(pushed, op);
        op
    }

    /// A block whose arguments have `arg_types`. It belongs to no region
    /// until passed to [`IrContext::create_region`].
    pub fn create_block(
        &mut self,
        location: Location,
        arg_types: impl IntoIterator<Item = TypeRef>,
    ) -> BlockRef {
        let block = self.blocks.next_key();
        let args = arg_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| {
                self.values.push(ValueData {
                    def: ValueDef::BlockArg(block, index as u32),
                    ty,
                })
            })
            .collect();
        self.blocks.push(BlockData {
            location,
            ops: SmallVec::new(),
            parent_region: None,
            args,
        })
    }

    /// A region made of `blocks`, in order.
    ///
    /// # Panics
    ///
    /// If one of the blocks already belongs to a region.
    pub fn create_region(
        &mut self,
        location: Location,
        blocks: impl IntoIterator<Item = BlockRef>,
    ) -> RegionRef {
        let region = self.regions.next_key();
        let blocks: SmallVec<[BlockRef; 2]> = blocks.into_iter().collect();
        for &block in &blocks {
            let parent = &mut self.blocks[block].parent_region;
            if let Some(other) = *parent {
                panic!("{block} already belongs to {other}");
            }
            *parent = Some(region);
        }
        self.regions.push(RegionData {
            location,
            blocks,
            parent_op: None,
        })
    }
}

impl IrContext {
    pub fn op(&self, op: OpRef) -> &OperationData {
        &self.ops[op]
    }

    pub fn op_operands(&self, op: OpRef) -> &[ValueRef] {
        &self.ops[op].operands
    }

    pub fn op_result_types(&self, op: OpRef) -> &[TypeRef] {
        &self.ops[op].result_types
    }

    pub fn op_results(&self, op: OpRef) -> &[ValueRef] {
        &self.ops[op].results
    }

    pub fn op_result(&self, op: OpRef, index: u32) -> ValueRef {
        self.ops[op].results[index as usize]
    }

    pub fn value_ty(&self, value: ValueRef) -> TypeRef {
        self.values[value].ty
    }

    pub fn value_def(&self, value: ValueRef) -> ValueDef {
        self.values[value].def
    }

    /// `None` for block arguments.
    pub fn defining_op(&self, value: ValueRef) -> Option<OpRef> {
        self.value_def(value).op()
    }

    pub fn block(&self, block: BlockRef) -> &BlockData {
        &self.blocks[block]
    }

    pub fn block_args(&self, block: BlockRef) -> &[ValueRef] {
        &self.blocks[block].args
    }

    pub fn block_arg(&self, block: BlockRef, index: u32) -> ValueRef {
        self.blocks[block].args[index as usize]
    }

    pub fn region(&self, region: RegionRef) -> &RegionData {
        &self.regions[region]
    }
}

// Placement of ops in blocks. Attaching an op that already sits in a block
// is a bug in the caller and panics.
impl IrContext {
    pub fn op_index(&self, block: BlockRef, op: OpRef) -> Option<usize> {
        self.blocks[block].ops.iter().position(|&o| o == op)
    }

    pub fn push_op(&mut self, block: BlockRef, op: OpRef) {
        let end = self.blocks[block].ops.len();
        self.insert_op_at(block, end, op);
    }

    /// Attach `op` at position `index` of `block`.
    pub fn insert_op_at(&mut self, block: BlockRef, index: usize, op: OpRef) {
        let parent = &mut self.ops[op].parent_block;
        if let Some(current) = *parent {
            panic!("{op} is already attached to {current}");
        }
        *parent = Some(block);
        self.blocks[block].ops.insert(index, op);
    }

    /// Attach `op` right before `anchor`, which must be in `block`.
    pub fn insert_op_before(&mut self, block: BlockRef, anchor: OpRef, op: OpRef) {
        match self.op_index(block, anchor) {
            Some(index) => self.insert_op_at(block, index, op),
            None => panic!("{anchor} is not in {block}"),
        }
    }

    /// Detach `op` from `block`. The op itself, its operands and its uses
    /// are untouched.
    pub fn remove_op_from_block(&mut self, block: BlockRef, op: OpRef) {
        self.blocks[block].ops.retain(|o| *o != op);
        let parent = &mut self.ops[op].parent_block;
        if *parent == Some(block) {
            *parent = None;
        }
    }
}

// Use-chains.
impl IrContext {
    pub fn uses(&self, value: ValueRef) -> &[Use] {
        &self.uses[value]
    }

    pub fn has_uses(&self, value: ValueRef) -> bool {
        !self.uses[value].is_empty()
    }

    /// Whether no result of `op` is read anywhere.
    pub fn is_unused(&self, op: OpRef) -> bool {
        self.ops[op].results.iter().all(|&v| !self.has_uses(v))
    }

    /// Make every reader of `old` read `new` instead.
    pub fn replace_all_uses(&mut self, old: ValueRef, new: ValueRef) {
        if old == new {
            return;
        }
        let moved = std::mem::take(&mut self.uses[old]);
        for slot in &moved {
            self.ops[slot.user].operands[slot.operand_index as usize] = new;
        }
        self.uses[new].extend(moved);
    }

    /// Drop a detached op: its operands stop counting as uses.
    ///
    /// The arena slot is kept, so the op can still be inspected afterwards.
    ///
    /// # Panics
    ///
    /// If `op` is still in a block or one of its results is still read.
    pub fn remove_op(&mut self, op: OpRef) {
        let data = &self.ops[op];
        if let Some(block) = data.parent_block {
            panic!("{op} must be detached from {block} before removal");
        }
        for &result in &data.results {
            let readers = self.uses[result].len();
            assert!(readers == 0, "{op}: result {result} still has {readers} use(s)");
        }
        for (slot, &value) in data.operands.iter().enumerate() {
            self.uses[value].retain(|u| !(u.user == op && u.operand_index == slot as u32));
        }
    }

    /// Detach `op` if attached, then [`IrContext::remove_op`] it.
    pub fn erase_op(&mut self, op: OpRef) {
        if let Some(block) = self.ops[op].parent_block {
            self.remove_op_from_block(block, op);
        }
        self.remove_op(op);
    }
}

/// Assembles an operation; [`OperationDataBuilder::create`] adds it to a
/// context, detached.
pub struct OperationDataBuilder {
    data: OperationData,
}

impl OperationDataBuilder {
    pub fn new(location: Location, dialect: Symbol, name: Symbol) -> Self {
        Self {
            data: OperationData {
                location,
                dialect,
                name,
                attributes: BTreeMap::new(),
                regions: SmallVec::new(),
                successors: SmallVec::new(),
                parent_block: None,
                operands: SmallVec::new(),
                result_types: SmallVec::new(),
                results: SmallVec::new(),
            },
        }
    }

    pub fn operand(mut self, value: ValueRef) -> Self {
        self.data.operands.push(value);
        self
    }

    pub fn operands(mut self, values: impl IntoIterator<Item = ValueRef>) -> Self {
        self.data.operands.extend(values);
        self
    }

    pub fn result(mut self, ty: TypeRef) -> Self {
        self.data.result_types.push(ty);
        self
    }

    pub fn results(mut self, types: impl IntoIterator<Item = TypeRef>) -> Self {
        self.data.result_types.extend(types);
        self
    }

    pub fn attr(mut self, key: impl Into<Symbol>, value: Attribute) -> Self {
        self.data.attributes.insert(key.into(), value);
        self
    }

    /// Make `region` the op's next body. The region must not have an owner.
    pub fn region(mut self, region: RegionRef) -> Self {
        self.data.regions.push(region);
        self
    }

    pub fn successor(mut self, block: BlockRef) -> Self {
        self.data.successors.push(block);
        self
    }

    pub fn create(self, ctx: &mut IrContext) -> OpRef {
        ctx.create_op(self.data)
    }
}
