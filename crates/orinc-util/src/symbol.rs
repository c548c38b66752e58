//! String interning for identifiers, template names and field names.
//!
//! A [`Symbol`] is a 4-byte handle into a global, thread-safe string table.
//! Identifiers and template/field names repeat heavily across a source file
//! (the same variable or field name is referenced at every use site), so
//! interning once and comparing indices is both faster and more memory
//! efficient than carrying owned `String`s on every AST node.
//!
//! The table uses a concurrent map even though the compiler itself never
//! spawns a thread — interning is a small, self-contained piece of
//! infrastructure and a lock-free map costs nothing here while staying
//! consistent with how the rest of the toolchain this crate was lifted from
//! interns strings.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::LazyLock;

use ahash::AHasher;
use dashmap::DashMap;

static STRING_TABLE: LazyLock<StringTable> = LazyLock::new(StringTable::new);

/// An interned string handle. Two `Symbol`s are equal iff the strings they
/// were interned from are equal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

impl Symbol {
    pub fn intern(s: &str) -> Self {
        STRING_TABLE.intern(s)
    }

    pub fn as_str(&self) -> &'static str {
        STRING_TABLE.get(*self)
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

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol::intern(&s)
    }
}

struct StringTable {
    map: DashMap<u64, (&'static str, u32)>,
    reverse: DashMap<u32, &'static str>,
    next: AtomicU32,
}

impl StringTable {
    fn new() -> Self {
        Self {
            map: DashMap::with_capacity(256),
            reverse: DashMap::with_capacity(256),
            next: AtomicU32::new(0),
        }
    }

    fn hash(s: &str) -> u64 {
        let mut hasher = AHasher::default();
        s.hash(&mut hasher);
        hasher.finish()
    }

    fn intern(&self, s: &str) -> Symbol {
        let hash = Self::hash(s);
        if let Some(entry) = self.map.get(&hash) {
            if entry.value().0 == s {
                return Symbol(entry.value().1);
            }
        }
        match self.map.entry(hash) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                if entry.get().0 == s {
                    Symbol(entry.get().1)
                } else {
                    self.insert_colliding(s, hash)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let leaked: &'static str = Box::leak(s.to_string().into_boxed_str());
                let idx = self.next.fetch_add(1, Ordering::Relaxed);
                entry.insert((leaked, idx));
                self.reverse.insert(idx, leaked);
                Symbol(idx)
            }
        }
    }

    /// Linear probing for the rare case two distinct strings hash equal.
    fn insert_colliding(&self, s: &str, hash: u64) -> Symbol {
        const PROBE_PRIME: u64 = 0x9e3779b97f4a7c15;
        let mut probe = hash;
        loop {
            probe = probe.wrapping_add(PROBE_PRIME);
            match self.map.entry(probe) {
                dashmap::mapref::entry::Entry::Occupied(entry) => {
                    if entry.get().0 == s {
                        return Symbol(entry.get().1);
                    }
                }
                dashmap::mapref::entry::Entry::Vacant(entry) => {
                    let leaked: &'static str = Box::leak(s.to_string().into_boxed_str());
                    let idx = self.next.fetch_add(1, Ordering::Relaxed);
                    entry.insert((leaked, idx));
                    self.reverse.insert(idx, leaked);
                    return Symbol(idx);
                }
            }
        }
    }

    fn get(&self, symbol: Symbol) -> &'static str {
        *self
            .reverse
            .get(&symbol.0)
            .expect("symbol was interned through StringTable::intern, index must exist")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_string_same_symbol() {
        assert_eq!(Symbol::intern("foo"), Symbol::intern("foo"));
    }

    #[test]
    fn different_strings_different_symbols() {
        assert_ne!(Symbol::intern("foo_unique_a"), Symbol::intern("foo_unique_b"));
    }

    #[test]
    fn round_trips_through_as_str() {
        let sym = Symbol::intern("Foo");
        assert_eq!(sym.as_str(), "Foo");
    }
}
