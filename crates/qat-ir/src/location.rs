//! Source locations attached to IR entities.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use cranelift_entity::PrimaryMap;

use crate::refs::PathRef;

/// A span of source text, as byte offsets.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Source location in the IR. Copy-able, no lifetime parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    pub path: PathRef,
    pub span: Span,
}

impl Location {
    pub const fn new(path: PathRef, span: Span) -> Self {
        Self { path, span }
    }
}

/// Source paths named by [`Location`]s, each stored once.
#[derive(Default)]
pub struct PathTable {
    paths: PrimaryMap<PathRef, String>,
    lookup: HashMap<String, PathRef>,
}

impl PathTable {
    pub fn intern(&mut self, path: impl Into<String>) -> PathRef {
        match self.lookup.entry(path.into()) {
            Entry::Occupied(found) => *found.get(),
            Entry::Vacant(slot) => {
                let path = self.paths.push(slot.key().clone());
                *slot.insert(path)
            }
        }
    }

    pub fn get(&self, path: PathRef) -> &str {
        &self.paths[path]
    }
}
