use hashbrown::HashMap;

use crate::index::{simple_index, Index, IndexVec};

simple_index! {
    /// An index into an [`Interner`]
    pub struct Symbol;
}

/// Interning table owned by a single compilation. Every distinct name gets
/// one [`Symbol`], so comparing names is comparing indices.
#[derive(Debug, Default)]
pub struct Interner {
    strings: IndexVec<Symbol, Box<str>>,
    lookup: HashMap<Box<str>, Symbol>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, string: &str) -> Symbol {
        if let Some(symbol) = self.lookup.get(string) {
            return *symbol;
        }

        let symbol = self.strings.push(string.into());
        self.lookup.insert(string.into(), symbol);
        symbol
    }

    pub fn get(&self, string: &str) -> Option<Symbol> {
        self.lookup.get(string).copied()
    }

    pub fn resolve(&self, symbol: Symbol) -> &str {
        self.strings
            .get(symbol)
            .expect("symbols are only created by the interner that resolves them")
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Symbol {
    pub fn as_u32(self) -> u32 {
        self.index() as _
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut interner = Interner::new();

        let x = interner.intern("x");
        let y = interner.intern("y");

        assert_ne!(x, y);
        assert_eq!(interner.intern("x"), x);
        assert_eq!(interner.resolve(y), "y");
        assert_eq!(interner.get("z"), None);
        assert_eq!(interner.len(), 2);
    }
}
