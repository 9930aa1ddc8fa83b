//! Memoised deep-copyable field sets per type.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::types::{FieldDescriptor, TypeId};

/// Cache of the fields the copy engine has to visit for each type.
///
/// An entry holds every field of the type's whole inheritance chain, of every
/// visibility, minus those whose declared type is atomic. Entries never change
/// once computed, so readers share them through an `Arc`.
///
/// The cache is thread-safe: hits take the read lock, misses compute the set
/// and publish it under the write lock. Two threads missing on the same type
/// may both compute it; the first one to publish wins.
#[derive(Debug, Default)]
pub struct FieldSetCache {
    entries: RwLock<AHashMap<TypeId, Arc<[FieldDescriptor]>>>,
}

impl FieldSetCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached set for `ty`, if present.
    #[must_use]
    pub fn get(&self, ty: TypeId) -> Option<Arc<[FieldDescriptor]>> {
        self.entries.read().get(&ty).cloned()
    }

    /// Returns the cached set for `ty`, computing and storing it on a miss.
    ///
    /// `compute` runs without any lock held. Its error is returned unchanged and
    /// nothing is cached.
    pub fn get_or_try_insert<E>(
        &self,
        ty: TypeId,
        compute: impl FnOnce() -> Result<Vec<FieldDescriptor>, E>,
    ) -> Result<Arc<[FieldDescriptor]>, E> {
        if let Some(fields) = self.get(ty) {
            return Ok(fields);
        }
        let fields: Arc<[FieldDescriptor]> = Arc::from(compute()?);
        let mut entries = self.entries.write();
        Ok(entries.entry(ty).or_insert(fields).clone())
    }

    /// Number of cached types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
