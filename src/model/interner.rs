//! Name table: a string interner for symbol names.
//!
//! Uses `Arc<str>` for cheap cloning (reference count increment instead
//! of allocation); names are shared between the symbol arena and the
//! indexed trees, and must be able to cross worker threads.

use std::collections::HashSet;
use std::sync::Arc;

/// An interned name - cheap to clone (just Arc increment).
pub type NameRef = Arc<str>;

/// Deduplicating store for symbol names.
///
/// Interning the same string twice returns the same `Arc`.
#[derive(Debug, Default, Clone)]
pub struct NameTable {
    strings: HashSet<Arc<str>>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning a cheap-to-clone reference.
    pub fn intern(&mut self, s: &str) -> NameRef {
        if let Some(existing) = self.strings.get(s) {
            Arc::clone(existing)
        } else {
            let arc: Arc<str> = Arc::from(s);
            self.strings.insert(Arc::clone(&arc));
            arc
        }
    }

    /// Get an interned name if it exists, without creating it.
    pub fn get(&self, s: &str) -> Option<NameRef> {
        self.strings.get(s).cloned()
    }

    /// Number of unique names interned.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
