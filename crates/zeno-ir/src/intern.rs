//! Insertion-ordered, deduplicated string table.
//!
//! Downstream serializers use the indices to compress repeated identifiers.

use indexmap::IndexSet;

#[derive(Debug, Clone, Default)]
pub struct StringTable {
    entries: IndexSet<String>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its index. Existing entries keep theirs.
    pub fn add_string_if_new(&mut self, s: impl Into<String>) -> usize {
        self.entries.insert_full(s.into()).0
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get_index(index).map(String::as_str)
    }

    pub fn index_of(&self, s: &str) -> Option<usize> {
        self.entries.get_index_of(s)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}
