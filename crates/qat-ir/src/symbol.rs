//! Interned symbols.

use std::borrow::Cow;
use std::sync::LazyLock;

use lasso::{Rodeo, Spur};
use parking_lot::RwLock;

/// Global string interner for symbols.
static INTERNER: LazyLock<RwLock<Rodeo>> = LazyLock::new(|| RwLock::new(Rodeo::default()));

/// Interned symbol for cheap comparison of names (dialects, ops, callees, capture labels).
///
/// Uses lasso for string interning with 4-byte Spur keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(Spur);

impl Symbol {
    /// Intern a static string and return its symbol. Prefer this over `from_dynamic` when possible.
    pub fn new(text: &'static str) -> Self {
        Self::get_or_else(text, |rodeo| rodeo.get_or_intern_static(text))
    }

    /// Intern a string and return its symbol. Prefer `new` if the text is static.
    pub fn from_dynamic(text: &str) -> Self {
        Self::get_or_else(text, |rodeo| rodeo.get_or_intern(text))
    }

    fn get_or_else(text: &str, f: impl for<'r> FnOnce(&'r mut Rodeo) -> Spur) -> Self {
        let mut lock = INTERNER.upgradable_read();
        Symbol(if let Some(spur) = lock.get(text) {
            spur
        } else {
            lock.with_upgraded(f)
        })
    }

    /// Access the symbol's text without allocating.
    ///
    /// Uses `read_recursive()` so nested symbol operations (Display, ==)
    /// inside the closure cannot deadlock.
    pub fn with_str<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        let interner = INTERNER.read_recursive();
        f(interner.resolve(&self.0))
    }

    /// Whether the symbol text starts with `prefix`.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.with_str(|s| s.starts_with(prefix))
    }
}

impl From<&'static str> for Symbol {
    fn from(text: &'static str) -> Self {
        Symbol::new(text)
    }
}

impl From<Cow<'_, str>> for Symbol {
    fn from(text: Cow<'_, str>) -> Self {
        Symbol::from_dynamic(&text)
    }
}

impl From<String> for Symbol {
    fn from(text: String) -> Self {
        Symbol::from_dynamic(&text)
    }
}

/// Declare several symbol helpers at once.
///
/// # Example
/// ```
/// use qat_ir::symbols;
///
/// symbols! {
///     ATTR_CALLEE => "callee",
///     ATTR_INDEX => "index",
/// }
///
/// assert_eq!(ATTR_CALLEE(), "callee");
/// ```
#[macro_export]
macro_rules! symbols {
    ($($(#[$attr:meta])* $name:ident => $text:literal),* $(,)?) => {
        $(
            $(#[$attr])*
            #[allow(non_snake_case)]
            #[inline]
            pub fn $name() -> $crate::Symbol {
                $crate::Symbol::new($text)
            }
        )*
    };
}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        self.with_str(|s| s == other)
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, other: &&str) -> bool {
        self.with_str(|s| s == *other)
    }
}

impl PartialEq<Symbol> for str {
    fn eq(&self, other: &Symbol) -> bool {
        other.with_str(|s| s == self)
    }
}

impl PartialEq<Symbol> for &str {
    fn eq(&self, other: &Symbol) -> bool {
        other.with_str(|s| s == *self)
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.with_str(|s| f.write_str(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_and_dynamic_intern_to_same_symbol() {
        let a = Symbol::new("__quantum__rt__qubit_allocate");
        let b = Symbol::from_dynamic(&String::from("__quantum__rt__qubit_allocate"));
        assert_eq!(a, b);
    }

    #[test]
    fn compares_with_str() {
        let sym = Symbol::new("qir");
        assert_eq!(sym, "qir");
        assert_eq!("qir", sym);
        assert_ne!(sym, "arith");
    }

    #[test]
    fn prefix_check() {
        let sym = Symbol::new("__quantum__qis__h__body");
        assert!(sym.starts_with("__quantum__qis__"));
        assert!(!sym.starts_with("__quantum__rt__"));
    }

    #[test]
    fn display_nested_in_with_str() {
        let outer = Symbol::new("outer");
        let inner = Symbol::new("inner");
        let joined = outer.with_str(|o| format!("{o}.{inner}"));
        assert_eq!(joined, "outer.inner");
    }
}
