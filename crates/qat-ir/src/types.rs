//! Attribute values and the type table.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use cranelift_entity::PrimaryMap;
use smallvec::SmallVec;

use crate::refs::TypeRef;
use crate::symbol::Symbol;

/// Constant data on operations and types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Attribute {
    Unit,
    Bool(bool),
    /// Signless integer; negative literals keep their two's complement bits.
    IntBits(u64),
    FloatBits(u64),
    String(String),
    Symbol(Symbol),
    Type(TypeRef),
    List(Vec<Attribute>),
}

impl Attribute {
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Attribute::IntBits(bits) => Some(*bits),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self {
            Attribute::Symbol(symbol) => Some(*symbol),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<TypeRef> {
        match self {
            Attribute::Type(ty) => Some(*ty),
            _ => None,
        }
    }
}

/// A type such as `core.i64` or `core.func(core.nil, qir.qubit)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeData {
    pub dialect: Symbol,
    pub name: Symbol,
    pub params: SmallVec<[TypeRef; 2]>,
    pub attrs: BTreeMap<Symbol, Attribute>,
}

impl TypeData {
    pub fn new(dialect: Symbol, name: Symbol) -> Self {
        Self {
            dialect,
            name,
            params: SmallVec::new(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, ty: TypeRef) -> Self {
        self.params.push(ty);
        self
    }

    pub fn with_params(mut self, tys: impl IntoIterator<Item = TypeRef>) -> Self {
        self.params.extend(tys);
        self
    }

    pub fn with_attr(mut self, key: impl Into<Symbol>, value: Attribute) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn is(&self, dialect: Symbol, name: Symbol) -> bool {
        self.dialect == dialect && self.name == name
    }
}

/// Structurally equal types share one [`TypeRef`].
#[derive(Default)]
pub struct TypeInterner {
    data: PrimaryMap<TypeRef, TypeData>,
    lookup: HashMap<TypeData, TypeRef>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, data: TypeData) -> TypeRef {
        match self.lookup.entry(data) {
            Entry::Occupied(found) => *found.get(),
            Entry::Vacant(slot) => {
                let ty = self.data.push(slot.key().clone());
                *slot.insert(ty)
            }
        }
    }

    /// A type without parameters or attributes.
    pub fn simple(&mut self, dialect: Symbol, name: Symbol) -> TypeRef {
        self.intern(TypeData::new(dialect, name))
    }

    pub fn get(&self, ty: TypeRef) -> &TypeData {
        &self.data[ty]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(text: &'static str) -> Symbol {
        Symbol::new(text)
    }

    #[test]
    fn equal_types_intern_once() {
        let mut types = TypeInterner::new();
        let qubit = types.simple(sym("qir"), sym("qubit"));
        let again = types.intern(TypeData::new(sym("qir"), sym("qubit")));
        let result = types.simple(sym("qir"), sym("result"));

        assert_eq!(qubit, again);
        assert_ne!(qubit, result);
        assert!(types.get(result).is(sym("qir"), sym("result")));
    }

    #[test]
    fn params_and_attrs_distinguish_types() {
        let mut types = TypeInterner::new();
        let nil = types.simple(sym("core"), sym("nil"));
        let qubit = types.simple(sym("qir"), sym("qubit"));
        let func = TypeData::new(sym("core"), sym("func"))
            .with_param(nil)
            .with_params([qubit, qubit]);

        let unary = types.intern(func.clone());
        let tagged = types.intern(func.with_attr(sym("variadic"), Attribute::Bool(true)));
        assert_ne!(unary, tagged);
        assert_eq!(types.get(unary).params.as_slice(), &[nil, qubit, qubit]);
        assert_eq!(
            types.get(tagged).attrs.get(&sym("variadic")),
            Some(&Attribute::Bool(true))
        );
    }

    #[test]
    fn attribute_accessors_match_their_variant() {
        let mut types = TypeInterner::new();
        let int = types.simple(sym("core"), sym("i64"));

        assert_eq!(Attribute::IntBits(u64::MAX).as_int(), Some(u64::MAX));
        assert_eq!(Attribute::Symbol(sym("f")).as_symbol(), Some(sym("f")));
        assert_eq!(Attribute::Type(int).as_type(), Some(int));
        assert_eq!(Attribute::Unit.as_int(), None);
        assert_eq!(Attribute::Bool(true).as_symbol(), None);
    }
}
