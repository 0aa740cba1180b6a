//! String interning.
//!
//! A [`Symbol`] is a 4-byte handle into a global string table. Identifiers,
//! field names, and method names repeat constantly across a program, so the
//! pipeline compares symbols instead of strings. The table is global and
//! thread-safe: fiber threads intern method names at runtime, concurrently
//! with the main thread.

use std::fmt;
use std::sync::{OnceLock, RwLock};

use dashmap::DashMap;

/// An interned string identifier.
///
/// Interning the same string twice yields the same symbol, so equality is a
/// single integer comparison.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol {
    index: u32,
}

impl Symbol {
    /// Intern a string, returning its symbol.
    ///
    /// Thread-safe; concurrent interns of the same string race to a single
    /// table slot.
    pub fn intern(string: &str) -> Self {
        interner().intern(string)
    }

    /// Get the string value for this symbol.
    pub fn as_str(self) -> &'static str {
        interner().resolve(self.index)
    }

    /// The raw table index, for serialization and debugging.
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.index
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::intern(s)
    }
}

/// Global string table.
///
/// Strings are leaked on first intern; the set of distinct names in a
/// program is bounded, and `'static` strings keep `as_str` borrow-free.
struct Interner {
    /// string → slot index; sharded map so interning scales across threads
    names: DashMap<&'static str, u32>,
    /// slot index → string
    strings: RwLock<Vec<&'static str>>,
}

impl Interner {
    fn new() -> Self {
        Self {
            names: DashMap::new(),
            strings: RwLock::new(Vec::new()),
        }
    }

    fn intern(&self, string: &str) -> Symbol {
        if let Some(index) = self.names.get(string) {
            return Symbol { index: *index };
        }
        let leaked: &'static str = Box::leak(string.to_owned().into_boxed_str());
        // entry() serializes racing interns of the same new string
        let index = *self.names.entry(leaked).or_insert_with(|| {
            let mut strings = self.strings.write().unwrap();
            let index = strings.len() as u32;
            strings.push(leaked);
            index
        });
        Symbol { index }
    }

    fn resolve(&self, index: u32) -> &'static str {
        self.strings.read().unwrap()[index as usize]
    }
}

fn interner() -> &'static Interner {
    static INTERNER: OnceLock<Interner> = OnceLock::new();
    INTERNER.get_or_init(Interner::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_same_string_same_symbol() {
        let a = Symbol::intern("main");
        let b = Symbol::intern("main");
        assert_eq!(a, b);
        assert_eq!(a.as_u32(), b.as_u32());
    }

    #[test]
    fn test_intern_distinct_strings() {
        let a = Symbol::intern("foo_unique_1");
        let b = Symbol::intern("foo_unique_2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_as_str_roundtrip() {
        let s = Symbol::intern("roundtrip_name");
        assert_eq!(s.as_str(), "roundtrip_name");
    }

    #[test]
    fn test_display() {
        let s = Symbol::intern("display_me");
        assert_eq!(s.to_string(), "display_me");
    }

    #[test]
    fn test_concurrent_intern() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| Symbol::intern("concurrent_key").as_u32()))
            .collect();
        let ids: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }
}
