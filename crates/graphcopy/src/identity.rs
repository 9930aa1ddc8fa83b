//! Visited set for a single copy: original object identity to its copy.

use ahash::AHashMap;

use crate::heap::HeapId;

/// Identity map from original heap objects to the copies already produced for them.
///
/// Keys are arena slots, never value equality: two equal-looking originals are
/// distinct entries, and one original reached along several paths is a single
/// entry. A map lives for exactly one top-level copy.
#[derive(Debug, Default)]
pub struct IdentityMap {
    copies: AHashMap<HeapId, HeapId>,
}

impl IdentityMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the copy already produced for `original`, if any.
    #[inline]
    #[must_use]
    pub fn lookup(&self, original: HeapId) -> Option<HeapId> {
        self.copies.get(&original).copied()
    }

    /// Records `copy` as the copy of `original`.
    ///
    /// Must happen before the copy's contents are filled in, so that cycles
    /// back to `original` resolve to `copy`.
    #[inline]
    pub fn record(&mut self, original: HeapId, copy: HeapId) {
        self.copies.insert(original, copy);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.copies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }
}
