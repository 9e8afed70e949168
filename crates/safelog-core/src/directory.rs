//! Directory lookup.

use std::collections::HashMap;

use safelog_proto::{Address, DirectoryEntry};

/// Source of wrap targets: maps an address to its published keys.
///
/// The production implementation sits in front of the backend user
/// directory; [`MemoryDirectory`] serves tests and composition roots that
/// preload known peers.
pub trait Directory {
    /// Look up one identity. `None` means the address is unknown.
    fn lookup(&self, address: &Address) -> Option<DirectoryEntry>;
}

/// In-memory directory.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    entries: HashMap<Address, DirectoryEntry>,
}

impl MemoryDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, entry: DirectoryEntry) {
        self.entries.insert(entry.address.clone(), entry);
    }
}

impl Directory for MemoryDirectory {
    fn lookup(&self, address: &Address) -> Option<DirectoryEntry> {
        self.entries.get(address).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_via_address() {
        let mut dir = MemoryDirectory::new();
        dir.insert(DirectoryEntry::new("0xAlice", "aabb"));

        assert!(dir.lookup(&Address::new("0xALICE")).is_some());
        assert!(dir.lookup(&Address::new("0xbob")).is_none());
    }
}
